//! Row builders and a controllable clock.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta, Utc};
use mockable::Clock;
use serde_json::{Value, json};

use crate::domain::ports::RawRecapRow;

/// A well-formed row for `user_id` with one favourite product and store.
pub fn recap_row(user_id: i64) -> RawRecapRow {
    let value = json!({
        "user_id": user_id,
        "user_name": format!("user {user_id}"),
        "trx_count": 12,
        "variant_count": 3,
        "total_point": 450,
        "total_point_description": "Gold member",
        "delivery_count": 4,
        "pickup_count": 8,
        "cheaper_subs_amount": 12_500.5,
        "top_ranking": 7,
        "list_circular_images": "[\"circle-1.png\"]",
        "listProductFavorite": "[{\"productName\": \"Aren Latte\", \"countCups\": 9, \"productImage\": \"aren.png\"}]",
        "listFavoriteStore": "[{\"storeName\": \"Kemang\", \"transactionCount\": 6}]",
    });
    match value {
        Value::Object(row) => row,
        _ => panic!("json! object literal always builds an object"),
    }
}

/// `count` well-formed rows with sequential identifiers starting at 1.
pub fn recap_rows(count: usize) -> Vec<RawRecapRow> {
    (1..=count)
        .map(|id| match i64::try_from(id) {
            Ok(id) => recap_row(id),
            Err(_) => panic!("fixture row id {id} exceeds i64"),
        })
        .collect()
}

/// Clock that only moves when told to.
pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn advance(&self, delta: Duration) {
        let delta = match TimeDelta::from_std(delta) {
            Ok(delta) => delta,
            Err(error) => panic!("failed to convert Duration to TimeDelta: {error}"),
        };
        *self.lock_clock() += delta;
    }

    fn lock_clock(&self) -> MutexGuard<'_, DateTime<Utc>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("clock mutex"),
        }
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.lock_clock()
    }
}
