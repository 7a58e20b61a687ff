//! Upsert, replace-all and per-row isolation behaviour within one chunk.

use rstest::rstest;
use serde_json::json;

use super::{coordinator, id, row, single_chunk};
use crate::domain::ports::RawRecapRow;
use crate::domain::{
    FavoriteProduct, FavoriteStore, RecapFieldError, RowError, RowErrorCause, RowErrorPolicy,
    UserRecap,
};
use crate::test_support::{InMemoryRecapStore, recap_row};

fn products_row(user_id: i64, names: &[&str]) -> RawRecapRow {
    let products: Vec<_> = names
        .iter()
        .enumerate()
        .map(|(position, name)| json!({"productName": name, "countCups": position + 1}))
        .collect();
    row(json!({
        "user_id": user_id,
        "user_name": "Maya",
        "listProductFavorite": serde_json::to_string(&products).expect("encode products"),
    }))
}

fn product_names(store: &InMemoryRecapStore, user_id: i64) -> Vec<String> {
    store
        .products(id(user_id))
        .into_iter()
        .map(|product| product.product_name)
        .collect()
}

#[rstest]
#[tokio::test]
async fn reimport_overwrites_instead_of_duplicating() {
    let store = InMemoryRecapStore::new();
    let coordinator = coordinator(&store, None, RowErrorPolicy::default());
    let rows = vec![recap_row(1)];

    coordinator
        .process_chunk(single_chunk(&rows))
        .await
        .expect("first import");
    let first_products = store.products(id(1));
    coordinator
        .process_chunk(single_chunk(&rows))
        .await
        .expect("second import");

    assert_eq!(store.recap_count(), 1);
    assert_eq!(store.products(id(1)), first_products);
    assert_eq!(store.stored(id(1)).map(|stored| stored.revision), Some(2));
}

#[rstest]
#[tokio::test]
async fn child_lists_are_replaced_wholesale_in_input_order() {
    let store = InMemoryRecapStore::new();
    let coordinator = coordinator(&store, None, RowErrorPolicy::default());

    coordinator
        .process_chunk(single_chunk(&[products_row(4, &["A", "B"])]))
        .await
        .expect("first import");
    assert_eq!(product_names(&store, 4), ["A", "B"]);

    coordinator
        .process_chunk(single_chunk(&[products_row(4, &["C"])]))
        .await
        .expect("second import");

    assert_eq!(
        store.products(id(4)),
        vec![FavoriteProduct {
            product_name: "C".to_owned(),
            count_cups: 1,
            product_image: None,
        }]
    );
}

#[rstest]
#[tokio::test]
async fn bad_identifier_fails_only_its_row() {
    let store = InMemoryRecapStore::new();
    let coordinator = coordinator(&store, None, RowErrorPolicy::default());
    let rows = vec![
        recap_row(1),
        row(json!({"user_id": "abc", "user_name": "broken"})),
        recap_row(3),
    ];

    let outcome = coordinator
        .process_chunk(single_chunk(&rows))
        .await
        .expect("chunk commits");

    assert_eq!(outcome.succeeded, 2);
    assert_eq!(
        outcome.row_errors,
        vec![RowError {
            row_number: 2,
            user_id: Some("abc".to_owned()),
            cause: RowErrorCause::Normalize(RecapFieldError::InvalidUserId {
                value: "abc".to_owned()
            }),
        }]
    );
    assert_eq!(store.recap_count(), 2);
    assert_eq!(store.commits(), 1);
}

#[rstest]
#[tokio::test]
async fn missing_points_persist_as_null() {
    let store = InMemoryRecapStore::new();
    let coordinator = coordinator(&store, None, RowErrorPolicy::default());
    let rows = vec![row(json!({"user_id": 9, "trx_count": 2, "pickup_count": 0}))];

    coordinator
        .process_chunk(single_chunk(&rows))
        .await
        .expect("chunk commits");

    let recap = store.recap(id(9)).expect("stored");
    assert_eq!(recap.total_point, None);
    assert_eq!(recap.pickup_count, Some(0));
}

#[rstest]
#[tokio::test]
async fn malformed_product_json_commits_the_primary_row() {
    let store = InMemoryRecapStore::new();
    let coordinator = coordinator(&store, None, RowErrorPolicy::default());
    let rows = vec![row(json!({
        "user_id": 12,
        "user_name": "Lia",
        "listProductFavorite": "{not valid json",
    }))];

    let outcome = coordinator
        .process_chunk(single_chunk(&rows))
        .await
        .expect("chunk commits");

    assert_eq!(outcome.succeeded, 1);
    assert!(outcome.row_errors.is_empty());
    assert_eq!(store.recap(id(12)).map(|recap| recap.user_name), Some("Lia".to_owned()));
    assert!(store.products(id(12)).is_empty());
}

#[rstest]
#[case(json!("[]"))]
#[case(json!(null))]
#[tokio::test]
async fn empty_or_absent_lists_keep_previous_children(#[case] stores_cell: serde_json::Value) {
    let store = InMemoryRecapStore::new();
    let previous = vec![FavoriteStore {
        store_name: "Blok M".to_owned(),
        transaction_count: 3,
        store_image: None,
    }];
    store.seed(UserRecap::new(id(6), "Old", 1), Vec::new(), previous.clone());
    let coordinator = coordinator(&store, None, RowErrorPolicy::default());
    let rows = vec![row(json!({
        "user_id": 6,
        "user_name": "New",
        "listFavoriteStore": stores_cell,
    }))];

    coordinator
        .process_chunk(single_chunk(&rows))
        .await
        .expect("chunk commits");

    assert_eq!(store.recap(id(6)).map(|recap| recap.user_name), Some("New".to_owned()));
    assert_eq!(store.stores(id(6)), previous);
}
