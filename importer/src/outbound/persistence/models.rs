//! Internal Diesel row structs for the recap tables.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain.

use diesel::prelude::*;
use serde_json::Value;

use crate::domain::{FavoriteProduct, FavoriteStore, UserRecap, UserRecapId};

use super::schema::{user_favorite_products, user_favorite_stores, user_recap_data};

/// Row struct for reading from the user_recap_data table.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = user_recap_data)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserRecapRow {
    pub user_id: i64,
    pub user_name: String,
    pub trx_count: i64,
    pub variant_count: Option<i64>,
    pub total_point: Option<i64>,
    pub total_point_description: Option<String>,
    pub total_point_possible_redeem: Option<i64>,
    pub total_point_image: Option<String>,
    pub delivery_count: Option<i64>,
    pub pickup_count: Option<i64>,
    pub cheaper_subs_desc: Option<String>,
    pub cheaper_subs_amount: Option<f64>,
    pub top_ranking: Option<i64>,
    pub list_circular_images: Option<Value>,
}

impl From<UserRecapRow> for UserRecap {
    fn from(row: UserRecapRow) -> Self {
        Self {
            user_id: UserRecapId::new(row.user_id),
            user_name: row.user_name,
            trx_count: row.trx_count,
            variant_count: row.variant_count,
            total_point: row.total_point,
            total_point_description: row.total_point_description,
            total_point_possible_redeem: row.total_point_possible_redeem,
            total_point_image: row.total_point_image,
            delivery_count: row.delivery_count,
            pickup_count: row.pickup_count,
            cheaper_subs_desc: row.cheaper_subs_desc,
            cheaper_subs_amount: row.cheaper_subs_amount,
            top_ranking: row.top_ranking,
            list_circular_images: row.list_circular_images.map(image_urls),
        }
    }
}

/// Keep the string members of a stored image array; anything else is dropped.
fn image_urls(value: Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(url) => Some(url),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Insertable struct for upserting recap records.
///
/// `created_at` and `updated_at` take their column defaults on insert.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = user_recap_data)]
pub(crate) struct NewUserRecapRow<'a> {
    pub user_id: i64,
    pub user_name: &'a str,
    pub trx_count: i64,
    pub variant_count: Option<i64>,
    pub total_point: Option<i64>,
    pub total_point_description: Option<&'a str>,
    pub total_point_possible_redeem: Option<i64>,
    pub total_point_image: Option<&'a str>,
    pub delivery_count: Option<i64>,
    pub pickup_count: Option<i64>,
    pub cheaper_subs_desc: Option<&'a str>,
    pub cheaper_subs_amount: Option<f64>,
    pub top_ranking: Option<i64>,
    pub list_circular_images: Option<Value>,
}

impl<'a> From<&'a UserRecap> for NewUserRecapRow<'a> {
    fn from(recap: &'a UserRecap) -> Self {
        Self {
            user_id: recap.user_id.get(),
            user_name: recap.user_name.as_str(),
            trx_count: recap.trx_count,
            variant_count: recap.variant_count,
            total_point: recap.total_point,
            total_point_description: recap.total_point_description.as_deref(),
            total_point_possible_redeem: recap.total_point_possible_redeem,
            total_point_image: recap.total_point_image.as_deref(),
            delivery_count: recap.delivery_count,
            pickup_count: recap.pickup_count,
            cheaper_subs_desc: recap.cheaper_subs_desc.as_deref(),
            cheaper_subs_amount: recap.cheaper_subs_amount,
            top_ranking: recap.top_ranking,
            list_circular_images: recap
                .list_circular_images
                .as_ref()
                .map(|urls| Value::Array(urls.iter().cloned().map(Value::String).collect())),
        }
    }
}

// ---------------------------------------------------------------------------
// Favourite products
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = user_favorite_products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct FavoriteProductRow {
    pub product_name: String,
    pub count_cups: i64,
    pub product_image: Option<String>,
}

impl From<FavoriteProductRow> for FavoriteProduct {
    fn from(row: FavoriteProductRow) -> Self {
        Self {
            product_name: row.product_name,
            count_cups: row.count_cups,
            product_image: row.product_image,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = user_favorite_products)]
pub(crate) struct NewFavoriteProductRow<'a> {
    pub user_id: i64,
    pub display_order: i32,
    pub product_name: &'a str,
    pub count_cups: i64,
    pub product_image: Option<&'a str>,
}

impl<'a> NewFavoriteProductRow<'a> {
    pub fn new(user_id: UserRecapId, display_order: i32, product: &'a FavoriteProduct) -> Self {
        Self {
            user_id: user_id.get(),
            display_order,
            product_name: product.product_name.as_str(),
            count_cups: product.count_cups,
            product_image: product.product_image.as_deref(),
        }
    }
}

// ---------------------------------------------------------------------------
// Favourite stores
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = user_favorite_stores)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct FavoriteStoreRow {
    pub store_name: String,
    pub transaction_count: i64,
    pub store_image: Option<String>,
}

impl From<FavoriteStoreRow> for FavoriteStore {
    fn from(row: FavoriteStoreRow) -> Self {
        Self {
            store_name: row.store_name,
            transaction_count: row.transaction_count,
            store_image: row.store_image,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = user_favorite_stores)]
pub(crate) struct NewFavoriteStoreRow<'a> {
    pub user_id: i64,
    pub display_order: i32,
    pub store_name: &'a str,
    pub transaction_count: i64,
    pub store_image: Option<&'a str>,
}

impl<'a> NewFavoriteStoreRow<'a> {
    pub fn new(user_id: UserRecapId, display_order: i32, store: &'a FavoriteStore) -> Self {
        Self {
            user_id: user_id.get(),
            display_order,
            store_name: store.store_name.as_str(),
            transaction_count: store.transaction_count,
            store_image: store.store_image.as_deref(),
        }
    }
}
