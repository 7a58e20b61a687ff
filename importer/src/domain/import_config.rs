//! Validated tunables shared by the import services.

use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::cache_warmer::DEFAULT_CACHE_TTL;

/// Number of rows committed per transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSize(NonZeroUsize);

impl BatchSize {
    pub const DEFAULT: Self = Self(match NonZeroUsize::new(10_000) {
        Some(value) => value,
        None => NonZeroUsize::MIN,
    });

    /// Validate a raw chunk size.
    pub fn new(value: usize) -> Result<Self, ImportConfigError> {
        NonZeroUsize::new(value)
            .map(Self)
            .ok_or(ImportConfigError::ZeroBatchSize)
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for BatchSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// What a writer failure does to the enclosing chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RowErrorPolicy {
    /// Fence each row with a savepoint; a failed row is rolled back alone and
    /// reported as a row error.
    #[default]
    IsolateRow,
    /// Roll back the whole chunk on the first writer failure and halt the run.
    AbortChunk,
}

impl RowErrorPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IsolateRow => "isolate-row",
            Self::AbortChunk => "abort-chunk",
        }
    }
}

impl fmt::Display for RowErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RowErrorPolicy {
    type Err = ImportConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "isolate-row" => Ok(Self::IsolateRow),
            "abort-chunk" => Ok(Self::AbortChunk),
            _ => Err(ImportConfigError::UnknownRowErrorPolicy {
                value: value.to_owned(),
            }),
        }
    }
}

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImportConfigError {
    #[error("batch size must be greater than zero")]
    ZeroBatchSize,
    #[error("cache TTL must be greater than zero seconds")]
    ZeroCacheTtl,
    #[error("unknown row error policy `{value}` (expected `isolate-row` or `abort-chunk`)")]
    UnknownRowErrorPolicy { value: String },
}

/// Import tunables, built once at startup and passed by reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportConfig {
    pub batch_size: BatchSize,
    pub cache_ttl: Duration,
    pub row_error_policy: RowErrorPolicy,
}

impl ImportConfig {
    /// Build a config, rejecting a zero TTL.
    pub fn new(
        batch_size: BatchSize,
        cache_ttl: Duration,
        row_error_policy: RowErrorPolicy,
    ) -> Result<Self, ImportConfigError> {
        if cache_ttl.is_zero() {
            return Err(ImportConfigError::ZeroCacheTtl);
        }
        Ok(Self {
            batch_size,
            cache_ttl,
            row_error_policy,
        })
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: BatchSize::DEFAULT,
            cache_ttl: DEFAULT_CACHE_TTL,
            row_error_policy: RowErrorPolicy::default(),
        }
    }
}
