//! Test utilities for the importer crate.
//!
//! Shared by unit tests (in `src/`) and integration tests (in `tests/`).
//! Compiled for tests and when the `test-support` feature is enabled.

pub mod fixtures;
pub mod recap_cache;
pub mod recap_store;

pub use fixtures::{MutableClock, recap_row, recap_rows};
pub use recap_cache::InMemoryRecapCache;
pub use recap_store::{InMemoryRecapStore, InMemoryRecapTransaction, StoredRecap};
