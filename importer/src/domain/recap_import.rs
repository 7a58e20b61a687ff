//! Run driver for recap imports.
//!
//! Reads the whole export, then feeds its chunks to the
//! [`BatchCoordinator`] strictly one after another. The first chunk-level
//! failure halts the run; the report keeps the totals of the chunks that
//! committed before it.

use std::sync::Arc;

use async_trait::async_trait;
use mockable::Clock;
use tracing::{error, info};

use crate::domain::batch_import::{chunk_count, partition};
use crate::domain::ports::{
    RecapCache, RecapImportCommand, RecapImportRequest, RecapRowSource, RecapRowSourceError,
    RecapStore,
};
use crate::domain::{BatchCoordinator, BatchSize, Error, ImportHalt, ImportReport};

/// Domain service implementing the import command.
pub struct RecapImportService<R, S, C> {
    source: Arc<R>,
    coordinator: BatchCoordinator<S, C>,
    batch_size: BatchSize,
    clock: Arc<dyn Clock>,
}

impl<R, S, C> RecapImportService<R, S, C> {
    pub fn new(
        source: Arc<R>,
        coordinator: BatchCoordinator<S, C>,
        batch_size: BatchSize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            coordinator,
            batch_size,
            clock,
        }
    }
}

#[async_trait]
impl<R, S, C> RecapImportCommand for RecapImportService<R, S, C>
where
    R: RecapRowSource,
    S: RecapStore,
    C: RecapCache,
{
    async fn import(&self, request: RecapImportRequest) -> Result<ImportReport, Error> {
        let rows = self
            .source
            .read_rows(&request.source_path)
            .await
            .map_err(map_source_error)?;
        let chunks_total = chunk_count(rows.len(), self.batch_size);
        info!(
            path = %request.source_path.display(),
            rows = rows.len(),
            batch_size = self.batch_size.get(),
            chunks = chunks_total,
            "starting recap import"
        );

        let mut report = ImportReport::begin(rows.len(), chunks_total, self.clock.utc());
        for chunk in partition(&rows, self.batch_size) {
            let chunk_number = chunk.number();
            match self.coordinator.process_chunk(chunk).await {
                Ok(outcome) => report.absorb(outcome),
                Err(failure) => {
                    error!(
                        chunk = chunk_number,
                        chunks = chunks_total,
                        error = %failure,
                        "chunk rolled back; halting import"
                    );
                    report.halt = Some(ImportHalt {
                        chunk_number,
                        failure,
                    });
                    break;
                }
            }
        }
        report.finished_at = self.clock.utc();

        info!(
            succeeded = report.succeeded,
            errors = report.error_count(),
            chunks_committed = report.chunks_committed,
            halted = report.is_halted(),
            "recap import finished"
        );
        Ok(report)
    }
}

fn map_source_error(error: RecapRowSourceError) -> Error {
    match error {
        RecapRowSourceError::NotFound { path } => {
            Error::not_found(format!("input file not found: {path}"))
        }
        RecapRowSourceError::Read { message } => {
            Error::service_unavailable(format!("failed to read input: {message}"))
        }
        RecapRowSourceError::Decode { message } => {
            Error::invalid_request(format!("input is not a readable workbook: {message}"))
        }
    }
}

#[cfg(test)]
#[path = "recap_import_tests.rs"]
mod tests;
