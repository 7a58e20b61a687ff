//! Driven port for reading raw recap rows from an exported workbook.
//!
//! Rows arrive loosely typed: each one maps a header name to a JSON cell
//! value. Typing is the normaliser's job, not the source's.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::define_port_error;

/// One source row keyed by column header.
pub type RawRecapRow = Map<String, Value>;

define_port_error! {
    /// Errors raised while reading or decoding the row source.
    pub enum RecapRowSourceError {
        /// The input file does not exist.
        NotFound { path: String } =>
            "recap source not found: {path}",
        /// The input could not be read.
        Read { message: String } =>
            "recap source read failed: {message}",
        /// The input was read but is not a usable workbook.
        Decode { message: String } =>
            "recap source decode failed: {message}",
    }
}

/// Port for loading every data row of a recap export.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecapRowSource: Send + Sync {
    /// Read all non-empty data rows of the export at `path`, in file order.
    async fn read_rows(&self, path: &Path) -> Result<Vec<RawRecapRow>, RecapRowSourceError>;
}
