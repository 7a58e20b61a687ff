//! Post-commit cache projection.

use std::sync::Arc;

use rstest::rstest;
use serde_json::json;

use super::{TTL, coordinator, id, row, single_chunk};
use crate::domain::{CacheWarmTally, FavoriteStore, RowErrorPolicy, UserRecap};
use crate::test_support::{InMemoryRecapCache, InMemoryRecapStore, recap_rows};

#[rstest]
#[tokio::test]
async fn committed_rows_are_cached_with_the_ttl() {
    let store = InMemoryRecapStore::new();
    let cache = Arc::new(InMemoryRecapCache::new());
    let coordinator = coordinator(&store, Some(&cache), RowErrorPolicy::default());
    let mut rows = recap_rows(3);
    rows.push(row(json!({"user_id": "nope"})));

    let outcome = coordinator
        .process_chunk(single_chunk(&rows))
        .await
        .expect("chunk commits");

    assert_eq!(
        outcome.cache,
        CacheWarmTally {
            written: 3,
            ..CacheWarmTally::default()
        }
    );
    assert_eq!(cache.len(), 3);
    let cached = cache.view(id(2)).expect("cached view");
    assert_eq!(cached.user_name, "user 2");
    assert_eq!(cache.ttl(id(2)), Some(TTL));
}

#[rstest]
#[tokio::test]
async fn nothing_is_cached_when_the_commit_fails() {
    let store = InMemoryRecapStore::new();
    store.fail_commit_number(1);
    let cache = Arc::new(InMemoryRecapCache::new());
    let coordinator = coordinator(&store, Some(&cache), RowErrorPolicy::default());
    let rows = recap_rows(2);

    coordinator
        .process_chunk(single_chunk(&rows))
        .await
        .expect_err("commit fails");

    assert!(cache.is_empty());
}

#[rstest]
#[tokio::test]
async fn cache_outage_never_changes_row_counts() {
    let store = InMemoryRecapStore::new();
    let cache = Arc::new(InMemoryRecapCache::new());
    cache.set_failing(true);
    let coordinator = coordinator(&store, Some(&cache), RowErrorPolicy::default());
    let rows = recap_rows(5);

    let outcome = coordinator
        .process_chunk(single_chunk(&rows))
        .await
        .expect("chunk commits");

    assert_eq!(outcome.succeeded, 5);
    assert!(outcome.row_errors.is_empty());
    assert_eq!(outcome.cache.skipped_unavailable, 5);
    assert_eq!(store.recap_count(), 5);
}

#[rstest]
#[tokio::test]
async fn partial_rows_cache_the_stored_view() {
    let store = InMemoryRecapStore::new();
    let kept = vec![FavoriteStore {
        store_name: "Cipete".to_owned(),
        transaction_count: 2,
        store_image: None,
    }];
    store.seed(UserRecap::new(id(4), "Old", 1), Vec::new(), kept.clone());
    let cache = Arc::new(InMemoryRecapCache::new());
    let coordinator = coordinator(&store, Some(&cache), RowErrorPolicy::default());
    let rows = vec![row(json!({
        "user_id": 4,
        "user_name": "New",
        "listProductFavorite": [{"productName": "Matcha", "countCups": 1}],
    }))];

    coordinator
        .process_chunk(single_chunk(&rows))
        .await
        .expect("chunk commits");

    let cached = cache.view(id(4)).expect("cached view");
    assert_eq!(store.pooled_reads(), 0);
    assert_eq!(cached.user_name, "New");
    assert_eq!(cached.list_favorite_store, Some(kept));
    assert_eq!(
        cached
            .list_product_favorite
            .map(|products| products.len()),
        Some(1)
    );
}

#[rstest]
#[tokio::test]
async fn unreadable_committed_view_is_tallied() {
    let store = InMemoryRecapStore::new();
    store.fail_reads();
    let cache = Arc::new(InMemoryRecapCache::new());
    let coordinator = coordinator(&store, Some(&cache), RowErrorPolicy::default());
    let rows = vec![row(json!({"user_id": 1}))];

    let outcome = coordinator
        .process_chunk(single_chunk(&rows))
        .await
        .expect("chunk commits");

    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.cache.skipped_view_unavailable, 1);
    assert!(cache.is_empty());
    assert_eq!(store.recap(id(1)).map(|recap| recap.trx_count), Some(0));
}

#[rstest]
#[tokio::test]
async fn view_reads_share_the_chunk_connection() {
    let store = InMemoryRecapStore::new();
    let cache = Arc::new(InMemoryRecapCache::new());
    let coordinator = coordinator(&store, Some(&cache), RowErrorPolicy::default());
    let rows: Vec<_> = (1..=50)
        .map(|user_id| row(json!({"user_id": user_id, "user_name": "Partial"})))
        .collect();

    let outcome = coordinator
        .process_chunk(single_chunk(&rows))
        .await
        .expect("chunk commits");

    assert_eq!(outcome.cache.written, 50);
    assert_eq!(store.begins(), 1);
    assert_eq!(store.pooled_reads(), 0);
}

#[rstest]
#[tokio::test]
async fn tripped_cache_skips_view_reads_in_later_chunks() {
    let store = InMemoryRecapStore::new();
    let cache = Arc::new(InMemoryRecapCache::new());
    cache.set_failing(true);
    let coordinator = coordinator(&store, Some(&cache), RowErrorPolicy::AbortChunk);
    let first = vec![row(json!({"user_id": 1})), row(json!({"user_id": 2}))];
    let second = vec![row(json!({"user_id": 3}))];

    let tripped = coordinator
        .process_chunk(single_chunk(&first))
        .await
        .expect("first chunk commits");
    // A view read would open a savepoint and poison the second chunk.
    store.fail_savepoints();
    cache.set_failing(false);
    let skipped = coordinator
        .process_chunk(single_chunk(&second))
        .await
        .expect("second chunk commits");

    assert_eq!(tripped.cache.skipped_unavailable, 2);
    assert_eq!(
        skipped.cache,
        CacheWarmTally {
            skipped_unavailable: 1,
            ..CacheWarmTally::default()
        }
    );
    assert!(cache.is_empty());
}

#[rstest]
#[tokio::test]
async fn disabled_cache_records_nothing() {
    let store = InMemoryRecapStore::new();
    let coordinator = coordinator(&store, None, RowErrorPolicy::default());
    let rows = recap_rows(2);

    let outcome = coordinator
        .process_chunk(single_chunk(&rows))
        .await
        .expect("chunk commits");

    assert_eq!(outcome.cache, CacheWarmTally::default());
}
