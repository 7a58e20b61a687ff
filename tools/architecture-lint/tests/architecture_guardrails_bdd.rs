//! Behaviour tests running the lint over importer trees written to disk.

use std::fs;

use architecture_lint::{ArchitectureLintError, Violation, lint_importer_sources};
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::{ScenarioState, given, scenario, then, when};
use tempfile::TempDir;

/// Named source files: `(path under importer/src, contents)`.
fn source(name: &str) -> (&'static str, &'static str) {
    match name {
        "recap-model" => (
            "domain/recap.rs",
            "pub struct UserRecapId(i64); impl UserRecapId { pub fn new(id: i64) -> Self { Self(id) } }",
        ),
        "diesel-store" => (
            "outbound/persistence/diesel_recap_store.rs",
            "use diesel::prelude::*; use crate::domain::UserRecapId; pub fn find(_id: UserRecapId) {}",
        ),
        "store-wiring-service" => (
            "domain/recap_import.rs",
            "use recap_importer::outbound::persistence::DieselRecapStore; fn wire() { let _ = DieselRecapStore::new; }",
        ),
        "diesel-writer" => (
            "domain/recap_writer.rs",
            "use diesel::insert_into; fn write() {}",
        ),
        "settings-aware-cache" => (
            "outbound/cache/mod.rs",
            "use crate::config::ImportSettings; pub fn connect(_settings: &ImportSettings) {}",
        ),
        "tokio-tested-service" => (
            "domain/recap_lookup.rs",
            "pub struct Lookup; #[cfg(test)] mod tests { #[tokio::test] async fn finds() {} }",
        ),
        "clap-spreadsheet" => (
            "outbound/spreadsheet.rs",
            "use clap::Parser; pub fn read() {}",
        ),
        other => panic!("no source named {other}"),
    }
}

#[derive(Default, ScenarioState)]
struct LintWorld {
    tree: Slot<std::sync::Arc<TempDir>>,
    violations: Slot<Vec<Violation>>,
}

impl LintWorld {
    fn tree(&self) -> std::sync::Arc<TempDir> {
        self.tree.get().expect("tree is set up")
    }

    fn violations(&self) -> Vec<Violation> {
        self.violations.get().expect("lint has run")
    }
}

#[fixture]
fn world() -> LintWorld {
    let world = LintWorld::default();
    world
        .tree
        .set(std::sync::Arc::new(TempDir::new().expect("create temp dir")));
    world
}

#[given("the {name} source")]
fn the_named_source(world: &LintWorld, name: String) {
    let (relative, contents) = source(&name);
    let path = world.tree().path().join("importer/src").join(relative);
    let parent = path.parent().expect("source paths have a parent");
    fs::create_dir_all(parent).expect("create layer directory");
    fs::write(&path, contents).expect("write source");
}

#[when("the importer sources are linted")]
fn the_importer_sources_are_linted(world: &LintWorld) {
    let violations = match lint_importer_sources(&world.tree().path().join("importer")) {
        Ok(()) => Vec::new(),
        Err(ArchitectureLintError::Violations(violations)) => violations,
        Err(other) => panic!("lint could not run: {other}"),
    };
    world.violations.set(violations);
}

#[then("the violation count is {count}")]
fn the_violation_count_is(world: &LintWorld, count: usize) {
    let violations = world.violations();
    assert_eq!(violations.len(), count, "got: {violations:?}");
}

#[then("a violation in {file} mentions {fragment}")]
fn a_violation_mentions(world: &LintWorld, file: String, fragment: String) {
    let violations = world.violations();
    assert!(
        violations.iter().any(|violation| {
            violation.file.to_str() == Some(file.as_str()) && violation.message.contains(&fragment)
        }),
        "no violation in {file} mentioning {fragment}: {violations:?}"
    );
}

#[scenario(
    path = "tests/features/architecture_guardrails.feature",
    name = "Clean layers pass"
)]
fn clean_layers_pass(world: LintWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/architecture_guardrails.feature",
    name = "The domain may not wire outbound adapters"
)]
fn domain_may_not_wire_outbound(world: LintWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/architecture_guardrails.feature",
    name = "The domain may not talk to the database driver"
)]
fn domain_may_not_use_diesel(world: LintWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/architecture_guardrails.feature",
    name = "Outbound adapters may not read settings"
)]
fn outbound_may_not_read_settings(world: LintWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/architecture_guardrails.feature",
    name = "Test modules may use the runtime"
)]
fn test_modules_may_use_the_runtime(world: LintWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/architecture_guardrails.feature",
    name = "Violations across layers are all reported"
)]
fn violations_across_layers_are_reported(world: LintWorld) {
    drop(world);
}
