//! User recap aggregate, its favourite collections and the composed view.
//!
//! A [`UserRecap`] is the primary record keyed by [`UserRecapId`]. It owns two
//! ordered child collections, [`FavoriteProduct`] and [`FavoriteStore`], whose
//! position in the list is their presentation order. [`UserRecapView`] is the
//! camelCase JSON document readers receive and the cache stores.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Warehouse identifier of a recap user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRecapId(i64);

impl UserRecapId {
    /// Wrap a raw warehouse identifier.
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Return the raw identifier.
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserRecapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserRecapId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Primary recap record.
///
/// Every optional attribute persists as `NULL` when absent; a re-import
/// overwrites all of them, absent values included.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecap {
    pub user_id: UserRecapId,
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
    pub list_circular_images: Option<Vec<String>>,
}

impl UserRecap {
    /// Build a recap with only the required attributes populated.
    pub fn new(user_id: UserRecapId, user_name: impl Into<String>, trx_count: i64) -> Self {
        Self {
            user_id,
            user_name: user_name.into(),
            trx_count,
            variant_count: None,
            total_point: None,
            total_point_description: None,
            total_point_possible_redeem: None,
            total_point_image: None,
            delivery_count: None,
            pickup_count: None,
            cheaper_subs_desc: None,
            cheaper_subs_amount: None,
            top_ranking: None,
            list_circular_images: None,
        }
    }
}

/// One favourite product; list position is the display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteProduct {
    pub product_name: String,
    pub count_cups: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_image: Option<String>,
}

/// One favourite store; list position is the display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteStore {
    pub store_name: String,
    pub transaction_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_image: Option<String>,
}

/// Output of row normalisation: the recap plus any child collections present
/// in the source row.
///
/// `None` for a collection means "leave the stored children untouched". An
/// empty source list also normalises to `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecap {
    pub recap: UserRecap,
    pub favorite_products: Option<Vec<FavoriteProduct>>,
    pub favorite_stores: Option<Vec<FavoriteStore>>,
}

impl NormalizedRecap {
    /// Identifier of the normalised user.
    pub fn user_id(&self) -> UserRecapId {
        self.recap.user_id
    }
}

/// Composed recap document served to readers and stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecapView {
    pub user_name: String,
    pub trx_count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_point: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_point_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_point_possible_redeem: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_point_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cheaper_subs_desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cheaper_subs_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_ranking: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_circular_images: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_product_favorite: Option<Vec<FavoriteProduct>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_favorite_store: Option<Vec<FavoriteStore>>,
}

impl UserRecapView {
    /// Compose the view from a stored recap and its ordered children.
    ///
    /// Empty child collections are omitted from the document.
    pub fn compose(
        recap: UserRecap,
        products: Vec<FavoriteProduct>,
        stores: Vec<FavoriteStore>,
    ) -> Self {
        Self {
            user_name: recap.user_name,
            trx_count: recap.trx_count,
            variant_count: recap.variant_count,
            total_point: recap.total_point,
            total_point_description: recap.total_point_description,
            total_point_possible_redeem: recap.total_point_possible_redeem,
            total_point_image: recap.total_point_image,
            delivery_count: recap.delivery_count,
            pickup_count: recap.pickup_count,
            cheaper_subs_desc: recap.cheaper_subs_desc,
            cheaper_subs_amount: recap.cheaper_subs_amount,
            top_ranking: recap.top_ranking,
            list_circular_images: recap.list_circular_images,
            list_product_favorite: non_empty(products),
            list_favorite_store: non_empty(stores),
        }
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() { None } else { Some(items) }
}
