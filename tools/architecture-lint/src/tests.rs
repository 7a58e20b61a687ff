use std::path::PathBuf;

use rstest::rstest;

use super::*;

fn lint_one(file: &str, contents: &str) -> Vec<String> {
    let source = LintSource {
        file: PathBuf::from(file),
        contents: contents.to_owned(),
    };
    match lint_sources(&[source]) {
        Ok(()) => Vec::new(),
        Err(ArchitectureLintError::Violations(found)) => {
            found.into_iter().map(|violation| violation.message).collect()
        }
        Err(other) => panic!("lint failed to run: {other}"),
    }
}

#[rstest]
#[case::domain_uses_crate_outbound(
    "domain/recap_import.rs",
    "use crate::outbound::persistence::DieselRecapStore;",
    "domain module must not depend on crate::outbound"
)]
#[case::domain_uses_bare_outbound(
    "domain/recap_import.rs",
    "use outbound::spreadsheet::CalamineRecapRowSource;",
    "domain module must not depend on crate::outbound"
)]
#[case::domain_uses_package_config(
    "domain/recap_import.rs",
    "use recap_importer::config::ImportSettings;",
    "domain module must not depend on crate::config"
)]
#[case::domain_uses_super_chain(
    "domain/ports/recap_store.rs",
    "fn settings() { let _ = super::super::config::ImportSettings::load; }",
    "domain module must not depend on crate::config"
)]
#[case::domain_uses_diesel(
    "domain/batch_import.rs",
    "use diesel::prelude::*;",
    "domain module must not depend on external crate `diesel`"
)]
#[case::domain_calls_redis_inline(
    "domain/cache_warmer.rs",
    "fn put() { let _ = bb8_redis::redis::cmd(\"SET\"); }",
    "domain module must not depend on external crate `bb8_redis`"
)]
#[case::domain_spawns_tasks(
    "domain/recap_import.rs",
    "async fn pause() { tokio::task::yield_now().await; }",
    "domain module must not depend on external crate `tokio`"
)]
#[case::outbound_reads_settings(
    "outbound/cache/mod.rs",
    "use crate::config::ImportSettings;",
    "outbound module must not depend on crate::config"
)]
#[case::outbound_uses_ortho_config(
    "outbound/spreadsheet.rs",
    "use ortho_config::OrthoConfig;",
    "outbound module must not depend on external crate `ortho_config`"
)]
fn forbidden_imports_are_reported(
    #[case] file: &str,
    #[case] contents: &str,
    #[case] message: &str,
) {
    assert_eq!(lint_one(file, contents), vec![message.to_owned()]);
}

#[rstest]
#[case::outbound_uses_domain(
    "outbound/persistence/diesel_recap_store.rs",
    "use crate::domain::UserRecapId; use diesel::prelude::*; fn id() { let _ = UserRecapId::new(1); }"
)]
#[case::outbound_uses_its_crates(
    "outbound/spreadsheet.rs",
    "use calamine::{Data, Reader}; use cap_std::fs::Dir; fn read() {}"
)]
#[case::local_named_config(
    "domain/batch_import.rs",
    "fn size(config: ImportConfig) -> usize { config.batch_size.get() }"
)]
#[case::cfg_test_module(
    "domain/recap_lookup.rs",
    "#[cfg(test)] mod tests { use tokio::runtime::Builder; #[tokio::test] async fn t() {} }"
)]
#[case::cfg_test_use("domain/recap_lookup.rs", "#[cfg(test)] use crate::outbound::cache::RedisRecapCache;")]
#[case::cfg_test_fn(
    "domain/recap_lookup.rs",
    "#[cfg(test)] fn helper() { let _ = diesel::result::Error::NotFound; }"
)]
fn permitted_imports_pass(#[case] file: &str, #[case] contents: &str) {
    assert_eq!(lint_one(file, contents), Vec::<String>::new());
}

#[rstest]
fn feature_gated_code_is_still_linted() {
    let found = lint_one(
        "domain/recap_lookup.rs",
        "#[cfg(feature = \"test-support\")] use diesel::prelude::*;",
    );
    assert_eq!(found.len(), 1);
}

#[rstest]
fn one_file_reports_each_rule_once() {
    let found = lint_one(
        "domain/recap_writer.rs",
        "use diesel::prelude::*; use diesel::upsert::excluded; use crate::outbound::persistence;",
    );
    assert_eq!(
        found,
        vec![
            "domain module must not depend on crate::outbound".to_owned(),
            "domain module must not depend on external crate `diesel`".to_owned(),
        ]
    );
}

#[rstest]
#[case("domain/batch_import_tests", true)]
#[case("domain/recap_import_tests.rs", true)]
#[case("domain/recap_import.rs", false)]
fn test_module_files_are_recognised(#[case] path: &str, #[case] expected: bool) {
    assert_eq!(is_test_module(Path::new(path)), expected);
}

#[rstest]
#[case::outside_layers("bin/recap_import.rs", "fn main() {}")]
#[case::not_rust("domain/recap.rs", "fn broken( {")]
fn unlintable_sources_are_parse_errors(#[case] file: &str, #[case] contents: &str) {
    let result = lint_sources(&[LintSource {
        file: PathBuf::from(file),
        contents: contents.to_owned(),
    }]);
    assert!(matches!(result, Err(ArchitectureLintError::Parse { .. })));
}

#[rstest]
fn violations_render_one_per_line() {
    let error = ArchitectureLintError::Violations(vec![Violation {
        file: PathBuf::from("domain/recap_writer.rs"),
        message: "domain module must not depend on external crate `diesel`".to_owned(),
    }]);
    assert_eq!(
        error.to_string(),
        "layer boundary violations:\n- domain/recap_writer.rs: domain module must not depend on external crate `diesel`\n"
    );
}
