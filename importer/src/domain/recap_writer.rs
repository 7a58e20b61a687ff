//! Entity writer composing the per-row statements against an open
//! transaction.

use crate::domain::NormalizedRecap;
use crate::domain::ports::{RecapStoreError, RecapTransaction};

/// Upsert the recap, then replace each child collection the row carried.
///
/// Collections reported as absent are left untouched. The caller owns the
/// transaction boundary; this function never begins, commits or rolls back.
pub async fn write_recap<T>(tx: &mut T, record: &NormalizedRecap) -> Result<(), RecapStoreError>
where
    T: RecapTransaction,
{
    tx.upsert_user_recap(&record.recap).await?;
    if let Some(products) = record.favorite_products.as_deref() {
        tx.replace_favorite_products(record.user_id(), products)
            .await?;
    }
    if let Some(stores) = record.favorite_stores.as_deref() {
        tx.replace_favorite_stores(record.user_id(), stores).await?;
    }
    Ok(())
}
