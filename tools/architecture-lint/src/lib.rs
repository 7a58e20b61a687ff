//! Import guardrail for the recap importer's layers.
//!
//! `importer/src/domain` holds the import rules and ports and must stay free
//! of infrastructure. `importer/src/outbound` holds the Diesel, Redis and
//! spreadsheet adapters and must not read settings. Every path a source file
//! mentions is checked against [`RULES`]; `#[cfg(test)]` items and `*_tests`
//! modules are skipped.
//!
//! Run it with `cargo run -p architecture-lint`.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use syn::visit::Visit;

/// Package name the importer's own absolute paths start with.
const CRATE_NAME: &str = "recap_importer";

/// Top-level modules of the importer crate.
const INTERNAL_ROOTS: [&str; 3] = ["config", "domain", "outbound"];

/// Imports a layer may not make.
struct LayerRule {
    /// Directory under `importer/src` the rule applies to.
    dir: &'static str,
    modules: &'static [&'static str],
    crates: &'static [&'static str],
}

const RULES: [LayerRule; 2] = [
    LayerRule {
        dir: "domain",
        modules: &["config", "outbound"],
        crates: &[
            "bb8_redis",
            "calamine",
            "cap_std",
            "clap",
            "diesel",
            "diesel_async",
            "ortho_config",
            "redis",
            "tokio",
        ],
    },
    LayerRule {
        dir: "outbound",
        modules: &["config"],
        crates: &["clap", "ortho_config"],
    },
];

impl LayerRule {
    fn for_file(relative_path: &Path) -> Option<&'static Self> {
        let first = relative_path.components().next()?.as_os_str().to_str()?;
        RULES.iter().find(|rule| rule.dir == first)
    }

    fn check(&self, path: &[String]) -> impl Iterator<Item = String> + '_ {
        let module = internal_root(path)
            .filter(|root| self.modules.iter().any(|module| module == root))
            .map(|root| format!("{} module must not depend on crate::{root}", self.dir));
        let krate = external_root(path)
            .filter(|root| self.crates.iter().any(|krate| krate == root))
            .map(|root| {
                format!(
                    "{} module must not depend on external crate `{root}`",
                    self.dir
                )
            });
        module.into_iter().chain(krate)
    }
}

/// One forbidden import found in one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Path relative to `importer/src`.
    pub file: PathBuf,
    pub message: String,
}

/// Why the lint did not pass.
#[derive(Debug, thiserror::Error)]
pub enum ArchitectureLintError {
    #[error("could not read importer sources: {0}")]
    Io(#[from] io::Error),
    #[error("could not lint {}: {message}", .file.display())]
    Parse { file: PathBuf, message: String },
    #[error("layer boundary violations:\n{}", render(.0))]
    Violations(Vec<Violation>),
}

fn render(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|violation| format!("- {}: {}\n", violation.file.display(), violation.message))
        .collect()
}

/// A Rust file handed to [`lint_sources`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintSource {
    /// Path relative to `importer/src`.
    pub file: PathBuf,
    pub contents: String,
}

/// Lint every layered source file below `importer_dir/src`.
///
/// # Errors
///
/// See [`lint_sources`]; walking the tree can also fail with
/// [`ArchitectureLintError::Io`].
pub fn lint_importer_sources(importer_dir: &Path) -> Result<(), ArchitectureLintError> {
    let src_dir = importer_dir.join("src");
    let mut sources = Vec::new();
    for rule in &RULES {
        let dir = src_dir.join(rule.dir);
        if dir.is_dir() {
            collect_sources(&src_dir, &dir, &mut sources)?;
        }
    }
    lint_sources(&sources)
}

/// Lint sources that are already in memory.
///
/// # Errors
///
/// [`ArchitectureLintError::Parse`] when a file is outside a known layer or
/// is not valid Rust, otherwise [`ArchitectureLintError::Violations`] listing
/// every forbidden import.
pub fn lint_sources(sources: &[LintSource]) -> Result<(), ArchitectureLintError> {
    let mut violations = Vec::new();
    for source in sources {
        let parse_error = |message: String| ArchitectureLintError::Parse {
            file: source.file.clone(),
            message,
        };
        let rule = LayerRule::for_file(&source.file)
            .ok_or_else(|| parse_error("file is not under a linted layer".to_owned()))?;
        let parsed =
            syn::parse_file(&source.contents).map_err(|err| parse_error(err.to_string()))?;

        let mut paths = PathCollector::default();
        paths.visit_file(&parsed);
        let messages: BTreeSet<String> = paths
            .seen
            .iter()
            .flat_map(|path| rule.check(path))
            .collect();
        violations.extend(messages.into_iter().map(|message| Violation {
            file: source.file.clone(),
            message,
        }));
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ArchitectureLintError::Violations(violations))
    }
}

fn is_relative(segment: &str) -> bool {
    matches!(segment, "crate" | "self" | "super")
}

/// First importer module a path names, if it names one.
fn internal_root(path: &[String]) -> Option<&str> {
    let (first, rest) = path.split_first()?;
    let root = match first.as_str() {
        // `config.batch_size` style locals parse as one-segment paths.
        bare if INTERNAL_ROOTS.iter().any(|root| *root == bare) => {
            return (!rest.is_empty()).then_some(bare);
        }
        CRATE_NAME => rest.first()?,
        relative if is_relative(relative) => path
            .iter()
            .find(|segment| !is_relative(segment.as_str()))?,
        _ => return None,
    };
    Some(root.as_str())
}

fn external_root(path: &[String]) -> Option<&str> {
    let first = path.first()?.as_str();
    (!is_relative(first) && first != CRATE_NAME).then_some(first)
}

/// Every path mentioned outside test-only code, as identifier segments.
#[derive(Default)]
struct PathCollector {
    seen: BTreeSet<Vec<String>>,
}

impl PathCollector {
    fn use_tree(&mut self, tree: &syn::UseTree, mut prefix: Vec<String>) {
        match tree {
            syn::UseTree::Path(path) => {
                prefix.push(path.ident.to_string());
                self.use_tree(&path.tree, prefix);
            }
            syn::UseTree::Name(syn::UseName { ident })
            | syn::UseTree::Rename(syn::UseRename { ident, .. }) => {
                prefix.push(ident.to_string());
                self.seen.insert(prefix);
            }
            syn::UseTree::Glob(_) => {
                prefix.push("*".to_owned());
                self.seen.insert(prefix);
            }
            syn::UseTree::Group(group) => {
                for item in &group.items {
                    self.use_tree(item, prefix.clone());
                }
            }
        }
    }
}

/// `#[cfg(test)]` exactly; feature gates are still linted.
fn is_cfg_test(attrs: &[syn::Attribute]) -> bool {
    attrs.iter().any(|attr| {
        attr.path().is_ident("cfg")
            && attr
                .parse_args::<syn::Ident>()
                .is_ok_and(|ident| ident == "test")
    })
}

impl<'ast> Visit<'ast> for PathCollector {
    fn visit_path(&mut self, node: &'ast syn::Path) {
        let segments: Vec<String> = node
            .segments
            .iter()
            .map(|segment| segment.ident.to_string())
            .collect();
        if !segments.is_empty() {
            self.seen.insert(segments);
        }
        syn::visit::visit_path(self, node);
    }

    fn visit_item_use(&mut self, node: &'ast syn::ItemUse) {
        if !is_cfg_test(&node.attrs) {
            self.use_tree(&node.tree, Vec::new());
        }
    }

    fn visit_item_mod(&mut self, node: &'ast syn::ItemMod) {
        if !is_cfg_test(&node.attrs) {
            syn::visit::visit_item_mod(self, node);
        }
    }

    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        if !is_cfg_test(&node.attrs) {
            syn::visit::visit_item_fn(self, node);
        }
    }
}

fn collect_sources(
    src_dir: &Path,
    dir: &Path,
    sources: &mut Vec<LintSource>,
) -> Result<(), ArchitectureLintError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if is_test_module(&path) {
            continue;
        }
        if path.is_dir() {
            collect_sources(src_dir, &path, sources)?;
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            let file = path
                .strip_prefix(src_dir)
                .map_err(|err| ArchitectureLintError::Parse {
                    file: path.clone(),
                    message: err.to_string(),
                })?
                .to_path_buf();
            let contents = fs::read_to_string(&path)?;
            sources.push(LintSource { file, contents });
        }
    }
    Ok(())
}

/// `foo_tests.rs` and `foo_tests/` are test modules mounted via `#[path]`.
fn is_test_module(path: &Path) -> bool {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .is_some_and(|stem| stem.ends_with("_tests"))
}

#[cfg(test)]
mod tests;
