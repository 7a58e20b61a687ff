//! Statement, savepoint, begin and commit failures.

use rstest::rstest;
use serde_json::json;

use super::{coordinator, id, row, single_chunk};
use crate::domain::ports::RecapStoreError;
use crate::domain::{ChunkFailure, RowErrorCause, RowErrorPolicy, UserRecap};
use crate::test_support::{InMemoryRecapStore, recap_row, recap_rows};

#[rstest]
#[tokio::test]
async fn poisoned_statement_is_isolated_by_its_savepoint() {
    let store = InMemoryRecapStore::new();
    store.fail_upsert_for(id(2));
    let coordinator = coordinator(&store, None, RowErrorPolicy::IsolateRow);
    let rows = recap_rows(3);

    let outcome = coordinator
        .process_chunk(single_chunk(&rows))
        .await
        .expect("chunk commits");

    assert_eq!(outcome.succeeded, 2);
    assert_eq!(outcome.row_errors.len(), 1);
    let row_error = &outcome.row_errors[0];
    assert_eq!(row_error.row_number, 2);
    assert_eq!(row_error.user_id.as_deref(), Some("2"));
    assert!(matches!(
        row_error.cause,
        RowErrorCause::Write(RecapStoreError::Constraint { .. })
    ));
    assert!(store.recap(id(1)).is_some());
    assert!(store.recap(id(2)).is_none());
    assert!(store.recap(id(3)).is_some());
}

#[rstest]
#[tokio::test]
async fn abort_chunk_policy_rolls_back_everything() {
    let store = InMemoryRecapStore::new();
    store.fail_upsert_for(id(2));
    let coordinator = coordinator(&store, None, RowErrorPolicy::AbortChunk);
    let rows = recap_rows(3);

    let failure = coordinator
        .process_chunk(single_chunk(&rows))
        .await
        .expect_err("chunk aborts");

    assert!(matches!(
        failure,
        ChunkFailure::RowWrite {
            row_number: 2,
            ref user_id,
            source: RecapStoreError::Constraint { .. },
        } if user_id.as_deref() == Some("2")
    ));
    assert_eq!(store.recap_count(), 0);
    assert_eq!(store.rollbacks(), 1);
    assert_eq!(store.commits(), 0);
}

#[rstest]
#[tokio::test]
async fn failed_child_insert_undoes_the_row_upsert() {
    let store = InMemoryRecapStore::new();
    store.seed(UserRecap::new(id(5), "Before", 1), Vec::new(), Vec::new());
    store.fail_products_for(id(5));
    let coordinator = coordinator(&store, None, RowErrorPolicy::IsolateRow);
    let rows = vec![
        row(json!({
            "user_id": 5,
            "user_name": "After",
            "listProductFavorite": [{"productName": "Es Kopi", "countCups": 2}],
        })),
        recap_row(6),
    ];

    let outcome = coordinator
        .process_chunk(single_chunk(&rows))
        .await
        .expect("chunk commits");

    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.row_errors.len(), 1);
    assert_eq!(
        store.recap(id(5)).map(|recap| recap.user_name),
        Some("Before".to_owned())
    );
    assert!(store.recap(id(6)).is_some());
}

#[rstest]
#[tokio::test]
async fn commit_failure_is_fatal_and_applies_nothing() {
    let store = InMemoryRecapStore::new();
    store.fail_commit_number(1);
    let coordinator = coordinator(&store, None, RowErrorPolicy::default());
    let rows = recap_rows(4);

    let failure = coordinator
        .process_chunk(single_chunk(&rows))
        .await
        .expect_err("commit fails");

    assert!(matches!(failure, ChunkFailure::Commit(_)));
    assert_eq!(store.recap_count(), 0);
}

#[rstest]
#[tokio::test]
async fn savepoint_failure_is_fatal() {
    let store = InMemoryRecapStore::new();
    store.fail_savepoints();
    let coordinator = coordinator(&store, None, RowErrorPolicy::IsolateRow);
    let rows = recap_rows(2);

    let failure = coordinator
        .process_chunk(single_chunk(&rows))
        .await
        .expect_err("savepoint fails");

    assert!(matches!(
        failure,
        ChunkFailure::Savepoint { row_number: 1, .. }
    ));
    assert_eq!(store.rollbacks(), 1);
    assert_eq!(store.recap_count(), 0);
}

#[rstest]
#[tokio::test]
async fn begin_failure_is_fatal() {
    let store = InMemoryRecapStore::new();
    store.set_unreachable();
    let coordinator = coordinator(&store, None, RowErrorPolicy::default());
    let rows = recap_rows(1);

    let failure = coordinator
        .process_chunk(single_chunk(&rows))
        .await
        .expect_err("begin fails");

    assert_eq!(
        failure,
        ChunkFailure::Begin(RecapStoreError::connection("store unreachable"))
    );
}
