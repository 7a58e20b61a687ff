//! Batch coordinator: one transaction per fixed-size chunk of rows.
//!
//! Per chunk the coordinator opens a transaction, normalises and writes each
//! row, then commits or rolls back. Rows that fail to normalise are reported
//! and skipped. Writer failures follow the configured [`RowErrorPolicy`].
//! Views to cache are read on the chunk's own transaction before the commit
//! and projected into the cache only after it succeeds.

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::ports::{
    RawRecapRow, RecapCache, RecapStore, RecapStoreError, RecapTransaction,
};
use crate::domain::recap_normalizer::{RecapFieldError, normalize_row, raw_user_id};
use crate::domain::recap_writer::write_recap;
use crate::domain::{
    BatchSize, CacheWarmTally, CacheWarmer, NormalizedRecap, RowErrorPolicy, UserRecapId,
    UserRecapView, WarmOutcome,
};

/// A contiguous slice of input rows processed as one transaction.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    /// Zero-based position of the chunk in the run.
    pub index: usize,
    /// One-based data row number of the first row in the chunk.
    pub first_row_number: usize,
    pub rows: &'a [RawRecapRow],
}

impl Chunk<'_> {
    /// One-based chunk number used in logs and reports.
    pub fn number(&self) -> usize {
        self.index + 1
    }

    /// One-based data row number of the last row in the chunk.
    pub fn last_row_number(&self) -> usize {
        self.first_row_number + self.rows.len().saturating_sub(1)
    }
}

/// Split `rows` into chunks of `batch_size`, preserving order. The last chunk
/// may be smaller.
pub fn partition(rows: &[RawRecapRow], batch_size: BatchSize) -> impl Iterator<Item = Chunk<'_>> {
    let size = batch_size.get();
    rows.chunks(size).enumerate().map(move |(index, rows)| Chunk {
        index,
        first_row_number: index * size + 1,
        rows,
    })
}

/// Number of chunks [`partition`] yields for `row_count` rows.
pub fn chunk_count(row_count: usize, batch_size: BatchSize) -> usize {
    row_count.div_ceil(batch_size.get())
}

/// Why a single row was not imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowErrorCause {
    Normalize(RecapFieldError),
    Write(RecapStoreError),
}

impl fmt::Display for RowErrorCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normalize(error) => write!(f, "{error}"),
            Self::Write(error) => write!(f, "{error}"),
        }
    }
}

/// A row that was skipped while the rest of its chunk committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub row_number: usize,
    /// The raw `user_id` cell, when the row had one.
    pub user_id: Option<String>,
    pub cause: RowErrorCause,
}

/// Result of a committed chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOutcome {
    pub chunk_index: usize,
    pub row_count: usize,
    pub succeeded: usize,
    pub row_errors: Vec<RowError>,
    pub cache: CacheWarmTally,
}

/// Chunk-level fatal error. The chunk was rolled back and the run must halt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkFailure {
    #[error("failed to open transaction: {0}")]
    Begin(#[source] RecapStoreError),
    #[error("savepoint handling failed at row {row_number}: {source}")]
    Savepoint {
        row_number: usize,
        #[source]
        source: RecapStoreError,
    },
    #[error(
        "row {row_number} (user_id {}) failed: {source}",
        .user_id.as_deref().unwrap_or("unknown")
    )]
    RowWrite {
        row_number: usize,
        user_id: Option<String>,
        #[source]
        source: RecapStoreError,
    },
    #[error("failed to commit: {0}")]
    Commit(#[source] RecapStoreError),
}

/// Rows written inside the open transaction, pending commit.
struct WrittenRows {
    records: Vec<NormalizedRecap>,
    row_errors: Vec<RowError>,
}

/// Runs chunks against the store and warms the cache after each commit.
pub struct BatchCoordinator<S, C> {
    store: Arc<S>,
    warmer: CacheWarmer<C>,
    policy: RowErrorPolicy,
}

impl<S, C> Clone for BatchCoordinator<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            warmer: self.warmer.clone(),
            policy: self.policy,
        }
    }
}

impl<S, C> BatchCoordinator<S, C>
where
    S: RecapStore,
    C: RecapCache,
{
    pub fn new(store: Arc<S>, warmer: CacheWarmer<C>, policy: RowErrorPolicy) -> Self {
        Self {
            store,
            warmer,
            policy,
        }
    }

    /// Process one chunk inside a single transaction.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkFailure`] when the transaction could not be opened,
    /// savepoints failed, a row failed under [`RowErrorPolicy::AbortChunk`],
    /// or the commit failed. Nothing from the chunk is applied in that case.
    pub async fn process_chunk(&self, chunk: Chunk<'_>) -> Result<ChunkOutcome, ChunkFailure> {
        info!(
            chunk = chunk.number(),
            first_row = chunk.first_row_number,
            last_row = chunk.last_row_number(),
            "processing chunk"
        );
        let mut tx = self.store.begin().await.map_err(ChunkFailure::Begin)?;

        let written = match self.write_rows(&mut tx, &chunk).await {
            Ok(written) => written,
            Err(failure) => {
                if let Err(error) = tx.rollback().await {
                    warn!(chunk = chunk.number(), %error, "rollback after chunk failure failed");
                }
                return Err(failure);
            }
        };
        let views = self.pending_views(&mut tx, &written.records).await;
        tx.commit().await.map_err(ChunkFailure::Commit)?;

        let succeeded = written.records.len();
        info!(
            chunk = chunk.number(),
            succeeded,
            errors = written.row_errors.len(),
            "chunk committed"
        );
        let cache = self.warm_committed(views).await;

        Ok(ChunkOutcome {
            chunk_index: chunk.index,
            row_count: chunk.rows.len(),
            succeeded,
            row_errors: written.row_errors,
            cache,
        })
    }

    async fn write_rows(
        &self,
        tx: &mut S::Transaction,
        chunk: &Chunk<'_>,
    ) -> Result<WrittenRows, ChunkFailure> {
        let mut written = WrittenRows {
            records: Vec::with_capacity(chunk.rows.len()),
            row_errors: Vec::new(),
        };
        for (offset, row) in chunk.rows.iter().enumerate() {
            let row_number = chunk.first_row_number + offset;
            let record = match normalize_row(row) {
                Ok(record) => record,
                Err(error) => {
                    written
                        .row_errors
                        .push(reject(row_number, row, RowErrorCause::Normalize(error)));
                    continue;
                }
            };
            match self.write_row(tx, &record, row_number, row).await? {
                Ok(()) => written.records.push(record),
                Err(row_error) => written.row_errors.push(row_error),
            }
        }
        Ok(written)
    }

    /// Outer `Err` is fatal for the chunk; inner `Err` is a row error.
    async fn write_row(
        &self,
        tx: &mut S::Transaction,
        record: &NormalizedRecap,
        row_number: usize,
        row: &RawRecapRow,
    ) -> Result<Result<(), RowError>, ChunkFailure> {
        let savepoint_failure =
            |source: RecapStoreError| ChunkFailure::Savepoint { row_number, source };
        match self.policy {
            RowErrorPolicy::AbortChunk => {
                write_recap(tx, record)
                    .await
                    .map_err(|source| ChunkFailure::RowWrite {
                        row_number,
                        user_id: raw_user_id(row),
                        source,
                    })?;
                Ok(Ok(()))
            }
            RowErrorPolicy::IsolateRow => {
                tx.savepoint().await.map_err(savepoint_failure)?;
                match write_recap(tx, record).await {
                    Ok(()) => {
                        tx.release_savepoint().await.map_err(savepoint_failure)?;
                        Ok(Ok(()))
                    }
                    Err(error) => {
                        tx.rollback_to_savepoint()
                            .await
                            .map_err(savepoint_failure)?;
                        Ok(Err(reject(row_number, row, RowErrorCause::Write(error))))
                    }
                }
            }
        }
    }

    /// Views of the written rows, read before the commit so no second
    /// connection is needed.
    ///
    /// A row carrying both child lists describes its whole view. Otherwise
    /// the untouched children live only in the store and the view is read on
    /// `tx`. Those reads run under one savepoint so a failed read cannot
    /// poison the chunk; after the first failure the remaining reads are
    /// skipped.
    async fn pending_views(
        &self,
        tx: &mut S::Transaction,
        records: &[NormalizedRecap],
    ) -> Vec<(UserRecapId, Option<UserRecapView>)> {
        if !self.warmer.is_available() {
            return records
                .iter()
                .map(|record| (record.user_id(), None))
                .collect();
        }
        let needs_reads = records
            .iter()
            .any(|record| record.favorite_products.is_none() || record.favorite_stores.is_none());
        let fenced = if needs_reads {
            match tx.savepoint().await {
                Ok(()) => true,
                Err(error) => {
                    warn!(%error, "cannot fence cache view reads; skipping them");
                    false
                }
            }
        } else {
            false
        };
        let mut readable = fenced;

        let mut views = Vec::with_capacity(records.len());
        for record in records {
            let user_id = record.user_id();
            let view = match complete_view(record) {
                Some(view) => Some(view),
                None if readable => match tx.find_recap(user_id).await {
                    Ok(Some(view)) => Some(view),
                    Ok(None) => {
                        warn!(%user_id, "written recap not found when reading cache view");
                        None
                    }
                    Err(error) => {
                        warn!(%user_id, %error, "failed to read recap view for cache");
                        readable = false;
                        None
                    }
                },
                None => None,
            };
            views.push((user_id, view));
        }

        if fenced {
            let closed = if readable {
                tx.release_savepoint().await
            } else {
                tx.rollback_to_savepoint().await
            };
            if let Err(error) = closed {
                warn!(%error, "failed to close cache view savepoint");
            }
        }
        views
    }

    async fn warm_committed(
        &self,
        views: Vec<(UserRecapId, Option<UserRecapView>)>,
    ) -> CacheWarmTally {
        let mut tally = CacheWarmTally::default();
        if !self.warmer.is_enabled() {
            return tally;
        }
        for (user_id, view) in views {
            match view {
                Some(view) => tally.record(self.warmer.warm(user_id, &view).await),
                None if self.warmer.is_available() => tally.skipped_view_unavailable += 1,
                None => tally.record(WarmOutcome::SkippedCacheUnavailable),
            }
        }
        tally
    }
}

/// The view a row describes on its own, when it carries both child lists.
fn complete_view(record: &NormalizedRecap) -> Option<UserRecapView> {
    let (Some(products), Some(stores)) = (&record.favorite_products, &record.favorite_stores)
    else {
        return None;
    };
    Some(UserRecapView::compose(
        record.recap.clone(),
        products.clone(),
        stores.clone(),
    ))
}

fn reject(row_number: usize, row: &RawRecapRow, cause: RowErrorCause) -> RowError {
    let user_id = raw_user_id(row);
    warn!(
        row_number,
        user_id = user_id.as_deref().unwrap_or("unknown"),
        error = %cause,
        "skipping recap row"
    );
    RowError {
        row_number,
        user_id,
        cause,
    }
}

#[cfg(test)]
#[path = "batch_import_tests/mod.rs"]
mod tests;
