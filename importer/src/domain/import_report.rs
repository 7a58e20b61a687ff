//! Run totals and the console summary.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::{CacheWarmTally, ChunkFailure, ChunkOutcome, RowError};

const RULE_WIDTH: usize = 60;

/// Why and where a run stopped early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportHalt {
    /// One-based number of the chunk that was rolled back.
    pub chunk_number: usize,
    pub failure: ChunkFailure,
}

/// Aggregated result of one import run.
///
/// When halted, the counts cover committed chunks only.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport {
    pub total_rows: usize,
    pub succeeded: usize,
    pub row_errors: Vec<RowError>,
    pub chunks_total: usize,
    pub chunks_committed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub cache: CacheWarmTally,
    pub halt: Option<ImportHalt>,
}

impl ImportReport {
    /// Start an empty report for `total_rows` rows split into `chunks_total`
    /// chunks.
    pub fn begin(total_rows: usize, chunks_total: usize, started_at: DateTime<Utc>) -> Self {
        Self {
            total_rows,
            succeeded: 0,
            row_errors: Vec::new(),
            chunks_total,
            chunks_committed: 0,
            started_at,
            finished_at: started_at,
            cache: CacheWarmTally::default(),
            halt: None,
        }
    }

    /// Fold a committed chunk into the totals.
    pub fn absorb(&mut self, outcome: ChunkOutcome) {
        self.succeeded += outcome.succeeded;
        self.row_errors.extend(outcome.row_errors);
        self.chunks_committed += 1;
        self.cache.absorb(outcome.cache);
    }

    pub fn error_count(&self) -> usize {
        self.row_errors.len()
    }

    pub fn is_halted(&self) -> bool {
        self.halt.is_some()
    }

    /// Wall time between start and finish; zero if the clock went backwards.
    pub fn elapsed(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Successful rows per second, or zero when no time elapsed.
    pub fn rows_per_second(&self) -> f64 {
        let seconds = self.elapsed().as_secs_f64();
        if seconds == 0.0 {
            return 0.0;
        }
        self.succeeded as f64 / seconds
    }
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(RULE_WIDTH);
        writeln!(f, "{rule}")?;
        match &self.halt {
            None => writeln!(f, "Import completed!")?,
            Some(halt) => writeln!(
                f,
                "Import halted at chunk {}/{}: {}",
                halt.chunk_number, self.chunks_total, halt.failure
            )?,
        }
        writeln!(f, "  Total rows: {}", self.total_rows)?;
        writeln!(f, "  Success: {}", self.succeeded)?;
        writeln!(f, "  Errors: {}", self.error_count())?;
        writeln!(
            f,
            "  Chunks committed: {}/{}",
            self.chunks_committed, self.chunks_total
        )?;
        writeln!(
            f,
            "  Cache warmed: {} (skipped {})",
            self.cache.written,
            self.cache.skipped()
        )?;
        writeln!(f, "  Time elapsed: {:.2}s", self.elapsed().as_secs_f64())?;
        writeln!(f, "  Rate: {:.2} rows/second", self.rows_per_second())?;
        write!(f, "{rule}")
    }
}
