//! Domain primitives, ports and services for recap imports.
//!
//! Purpose: turn loosely typed export rows into upserted recap records,
//! one transaction per chunk, and keep a disposable cache projection of the
//! composed views. Nothing here depends on Diesel, Redis or the spreadsheet
//! decoder; adapters live in `outbound`.
//!
//! Public surface:
//! - Error / ErrorCode: transport-agnostic failure payload.
//! - UserRecap, FavoriteProduct, FavoriteStore, UserRecapView: the data model.
//! - normalize_row: row normaliser.
//! - write_recap: entity writer.
//! - CacheWarmer: best-effort cache projection.
//! - BatchCoordinator: per-chunk transaction protocol.
//! - RecapImportService / RecapLookupService: driving port implementations.

pub mod batch_import;
pub mod cache_warmer;
pub mod error;
pub mod import_config;
pub mod import_report;
pub mod ports;
pub mod recap;
pub mod recap_import;
pub mod recap_lookup;
pub mod recap_normalizer;
pub mod recap_writer;

pub use self::batch_import::{
    BatchCoordinator, Chunk, ChunkFailure, ChunkOutcome, RowError, RowErrorCause, chunk_count,
    partition,
};
pub use self::cache_warmer::{CacheWarmTally, CacheWarmer, DEFAULT_CACHE_TTL, WarmOutcome};
pub use self::error::{Error, ErrorCode};
pub use self::import_config::{BatchSize, ImportConfig, ImportConfigError, RowErrorPolicy};
pub use self::import_report::{ImportHalt, ImportReport};
pub use self::recap::{
    FavoriteProduct, FavoriteStore, NormalizedRecap, UserRecap, UserRecapId, UserRecapView,
};
pub use self::recap_import::RecapImportService;
pub use self::recap_lookup::RecapLookupService;
pub use self::recap_normalizer::{RecapFieldError, normalize_row, raw_user_id};
pub use self::recap_writer::write_recap;
