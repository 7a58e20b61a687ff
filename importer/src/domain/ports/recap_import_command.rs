//! Driving port for running one recap import.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::{Error, ImportReport};

/// Command request for one import run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecapImportRequest {
    /// Path to the `.xlsx` export.
    pub source_path: PathBuf,
}

impl RecapImportRequest {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
        }
    }
}

/// Driving port for the import run.
///
/// A halted run is still `Ok`; the halt is carried on the report. `Err` is
/// reserved for failures before any chunk starts, such as an unreadable
/// source.
#[async_trait]
pub trait RecapImportCommand: Send + Sync {
    async fn import(&self, request: RecapImportRequest) -> Result<ImportReport, Error>;
}
