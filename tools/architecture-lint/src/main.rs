//! `architecture-lint [IMPORTER_DIR]`
//!
//! Without an argument the importer crate next to this tool in the workspace
//! is linted.

use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

fn importer_dir() -> PathBuf {
    env::args_os().nth(1).map_or_else(
        || {
            PathBuf::from(env!("CARGO_MANIFEST_DIR"))
                .join("../..")
                .join("importer")
        },
        PathBuf::from,
    )
}

fn main() -> ExitCode {
    let dir = importer_dir();
    match architecture_lint::lint_importer_sources(&dir) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Nothing useful to do if stderr itself is gone.
            let _ = writeln!(io::stderr().lock(), "{}: {err}", dir.display());
            ExitCode::FAILURE
        }
    }
}
