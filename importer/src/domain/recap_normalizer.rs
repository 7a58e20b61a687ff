//! Conversion of loosely typed spreadsheet rows into [`NormalizedRecap`].
//!
//! Cells arrive as JSON values: integers, floats, strings, booleans or
//! nothing at all. Scalar fields are parsed strictly enough to reject
//! garbage identifiers and counts. The embedded JSON lists are parsed
//! leniently: anything unusable is treated as absent and never fails the row.

use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::ports::RawRecapRow;
use crate::domain::{FavoriteProduct, FavoriteStore, NormalizedRecap, UserRecap, UserRecapId};

pub const USER_ID: &str = "user_id";
pub const USER_NAME: &str = "user_name";
pub const TRX_COUNT: &str = "trx_count";
pub const VARIANT_COUNT: &str = "variant_count";
pub const TOTAL_POINT: &str = "total_point";
pub const TOTAL_POINT_DESCRIPTION: &str = "total_point_description";
pub const TOTAL_POINT_POSSIBLE_REDEEM: &str = "total_point_possible_redeem";
pub const TOTAL_POINT_IMAGE: &str = "total_point_image";
pub const DELIVERY_COUNT: &str = "delivery_count";
pub const PICKUP_COUNT: &str = "pickup_count";
pub const CHEAPER_SUBS_DESC: &str = "cheaper_subs_desc";
pub const CHEAPER_SUBS_AMOUNT: &str = "cheaper_subs_amount";
pub const TOP_RANKING: &str = "top_ranking";
pub const LIST_CIRCULAR_IMAGES: &str = "list_circular_images";
pub const LIST_PRODUCT_FAVORITE: &str = "listProductFavorite";
pub const LIST_FAVORITE_STORE: &str = "listFavoriteStore";

/// Field-level failure that rejects a single row.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecapFieldError {
    /// The row carries no user identifier.
    #[error("user_id is missing")]
    MissingUserId,
    /// The identifier is not an integral number.
    #[error("user_id `{value}` is not an integer")]
    InvalidUserId { value: String },
    /// A numeric column holds something that is not a number.
    #[error("{field} `{value}` is not a number")]
    InvalidNumber { field: &'static str, value: String },
    /// A numeric column does not fit in a 64-bit integer.
    #[error("{field} is out of range")]
    OutOfRange { field: &'static str },
}

/// Normalise one raw row.
///
/// # Errors
///
/// Returns [`RecapFieldError`] when the identifier is missing or invalid, or
/// when a numeric column holds non-numeric text.
///
/// # Examples
/// ```
/// use recap_importer::domain::normalize_row;
/// use serde_json::json;
///
/// let row = json!({"user_id": "42", "trx_count": 3.0, "total_point": ""});
/// let normalized = normalize_row(row.as_object().unwrap()).unwrap();
/// assert_eq!(normalized.recap.user_id.get(), 42);
/// assert_eq!(normalized.recap.trx_count, 3);
/// assert_eq!(normalized.recap.total_point, None);
/// ```
pub fn normalize_row(row: &RawRecapRow) -> Result<NormalizedRecap, RecapFieldError> {
    let user_id = parse_user_id(row.get(USER_ID))?;

    let recap = UserRecap {
        user_id,
        user_name: optional_text(row.get(USER_NAME)).unwrap_or_default(),
        trx_count: optional_int(TRX_COUNT, row.get(TRX_COUNT))?.unwrap_or(0),
        variant_count: optional_int(VARIANT_COUNT, row.get(VARIANT_COUNT))?,
        total_point: optional_int(TOTAL_POINT, row.get(TOTAL_POINT))?,
        total_point_description: optional_text(row.get(TOTAL_POINT_DESCRIPTION)),
        total_point_possible_redeem: optional_int(
            TOTAL_POINT_POSSIBLE_REDEEM,
            row.get(TOTAL_POINT_POSSIBLE_REDEEM),
        )?,
        total_point_image: optional_text(row.get(TOTAL_POINT_IMAGE)),
        delivery_count: optional_int(DELIVERY_COUNT, row.get(DELIVERY_COUNT))?,
        pickup_count: optional_int(PICKUP_COUNT, row.get(PICKUP_COUNT))?,
        cheaper_subs_desc: optional_text(row.get(CHEAPER_SUBS_DESC)),
        cheaper_subs_amount: optional_float(CHEAPER_SUBS_AMOUNT, row.get(CHEAPER_SUBS_AMOUNT))?,
        top_ranking: optional_int(TOP_RANKING, row.get(TOP_RANKING))?,
        list_circular_images: circular_images(user_id, row.get(LIST_CIRCULAR_IMAGES)),
    };

    Ok(NormalizedRecap {
        recap,
        favorite_products: embedded_objects(user_id, LIST_PRODUCT_FAVORITE, row)
            .map(|items| items.iter().map(to_product).collect()),
        favorite_stores: embedded_objects(user_id, LIST_FAVORITE_STORE, row)
            .map(|items| items.iter().map(to_store).collect()),
    })
}

/// Render the raw `user_id` cell for error reports, whatever its type.
pub fn raw_user_id(row: &RawRecapRow) -> Option<String> {
    row.get(USER_ID).and_then(|value| match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    })
}

fn parse_user_id(value: Option<&Value>) -> Result<UserRecapId, RecapFieldError> {
    let invalid = |value: &Value| RecapFieldError::InvalidUserId {
        value: render(value),
    };
    let Some(value) = value.filter(|value| !is_blank(value)) else {
        return Err(RecapFieldError::MissingUserId);
    };
    let id = match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().and_then(exact_integer)),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<i64>()
                .ok()
                .or_else(|| text.parse::<f64>().ok().and_then(exact_integer))
        }
        _ => None,
    };
    id.map(UserRecapId::new).ok_or_else(|| invalid(value))
}

fn exact_integer(value: f64) -> Option<i64> {
    if value.fract() != 0.0 {
        return None;
    }
    truncate(value)
}

fn truncate(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    let truncated = value.trunc();
    // `i64::MAX as f64` rounds up to 2^63, so the upper bound is exclusive.
    if truncated >= -(2f64.powi(63)) && truncated < 2f64.powi(63) {
        Some(truncated as i64)
    } else {
        None
    }
}

fn optional_int(
    field: &'static str,
    value: Option<&Value>,
) -> Result<Option<i64>, RecapFieldError> {
    let Some(value) = value.filter(|value| !is_blank(value)) else {
        return Ok(None);
    };
    let invalid = || RecapFieldError::InvalidNumber {
        field,
        value: render(value),
    };
    match value {
        Value::Number(number) => match number.as_i64() {
            Some(int) => Ok(Some(int)),
            None => number
                .as_f64()
                .and_then(truncate)
                .map(Some)
                .ok_or(RecapFieldError::OutOfRange { field }),
        },
        Value::String(text) => {
            let text = text.trim();
            if let Ok(int) = text.parse::<i64>() {
                return Ok(Some(int));
            }
            let float = text.parse::<f64>().map_err(|_| invalid())?;
            truncate(float)
                .map(Some)
                .ok_or(RecapFieldError::OutOfRange { field })
        }
        _ => Err(invalid()),
    }
}

fn optional_float(
    field: &'static str,
    value: Option<&Value>,
) -> Result<Option<f64>, RecapFieldError> {
    let Some(value) = value.filter(|value| !is_blank(value)) else {
        return Ok(None);
    };
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|float| float.is_finite())
        .map(Some)
        .ok_or_else(|| RecapFieldError::InvalidNumber {
            field,
            value: render(value),
        })
}

fn optional_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(text) if text.trim().is_empty() => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Decode an embedded list cell. Unusable input is absent.
fn embedded_array(
    user_id: UserRecapId,
    field: &str,
    value: Option<&Value>,
) -> Option<Vec<Value>> {
    let decoded = match value? {
        Value::Null => return None,
        Value::String(text) if text.trim().is_empty() => return None,
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(decoded) => decoded,
            Err(error) => {
                debug!(%user_id, field, %error, "ignoring undecodable embedded list");
                return None;
            }
        },
        other => other.clone(),
    };
    match decoded {
        Value::Array(items) if items.is_empty() => None,
        Value::Array(items) => Some(items),
        _ => {
            debug!(%user_id, field, "ignoring embedded list that is not an array");
            None
        }
    }
}

fn embedded_objects(
    user_id: UserRecapId,
    field: &str,
    row: &RawRecapRow,
) -> Option<Vec<Map<String, Value>>> {
    let items = embedded_array(user_id, field, row.get(field))?;
    let objects = items
        .into_iter()
        .map(|item| match item {
            Value::Object(object) => Some(object),
            _ => None,
        })
        .collect::<Option<Vec<_>>>();
    if objects.is_none() {
        debug!(%user_id, field, "ignoring embedded list with non-object items");
    }
    objects
}

fn circular_images(user_id: UserRecapId, value: Option<&Value>) -> Option<Vec<String>> {
    let items = embedded_array(user_id, LIST_CIRCULAR_IMAGES, value)?;
    let images = items
        .into_iter()
        .map(|item| match item {
            Value::String(text) => Some(text),
            _ => None,
        })
        .collect::<Option<Vec<_>>>();
    if images.is_none() {
        debug!(%user_id, "ignoring circular image list with non-text items");
    }
    images
}

fn lenient_count(item: &Map<String, Value>, key: &'static str) -> i64 {
    optional_int(key, item.get(key)).ok().flatten().unwrap_or(0)
}

fn to_product(item: &Map<String, Value>) -> FavoriteProduct {
    FavoriteProduct {
        product_name: optional_text(item.get("productName")).unwrap_or_default(),
        count_cups: lenient_count(item, "countCups"),
        product_image: optional_text(item.get("productImage")),
    }
}

fn to_store(item: &Map<String, Value>) -> FavoriteStore {
    FavoriteStore {
        store_name: optional_text(item.get("storeName")).unwrap_or_default(),
        transaction_count: lenient_count(item, "transactionCount"),
        store_image: optional_text(item.get("storeImage")),
    }
}
