//! Shared fixtures and module wiring for batch coordinator unit tests.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::domain::ports::RawRecapRow;
use crate::domain::{BatchCoordinator, CacheWarmer, Chunk, RowErrorPolicy, UserRecapId};
use crate::test_support::{InMemoryRecapCache, InMemoryRecapStore};

pub(super) const TTL: Duration = Duration::from_secs(3600);

pub(super) type Coordinator = BatchCoordinator<InMemoryRecapStore, InMemoryRecapCache>;

pub(super) fn coordinator(
    store: &InMemoryRecapStore,
    cache: Option<&Arc<InMemoryRecapCache>>,
    policy: RowErrorPolicy,
) -> Coordinator {
    let warmer = cache.map_or_else(CacheWarmer::disabled, |cache| {
        CacheWarmer::new(Arc::clone(cache), TTL)
    });
    BatchCoordinator::new(Arc::new(store.clone()), warmer, policy)
}

pub(super) fn row(value: Value) -> RawRecapRow {
    match value {
        Value::Object(row) => row,
        other => panic!("fixture rows must be objects, got {other}"),
    }
}

/// The whole slice as the first chunk of a run.
pub(super) fn single_chunk(rows: &[RawRecapRow]) -> Chunk<'_> {
    Chunk {
        index: 0,
        first_row_number: 1,
        rows,
    }
}

pub(super) fn id(value: i64) -> UserRecapId {
    UserRecapId::new(value)
}

mod cache_warming;
mod partitioning;
mod row_processing;
mod transaction_failures;
