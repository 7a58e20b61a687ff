//! PostgreSQL-backed recap store.
//!
//! [`DieselRecapStore::begin`] checks a connection out of the pool and opens
//! a transaction on it; the returned [`DieselRecapTransaction`] owns that
//! connection until it commits or rolls back. Savepoints use Diesel's nested
//! transaction depth, so `SAVEPOINT`, `RELEASE SAVEPOINT` and
//! `ROLLBACK TO SAVEPOINT` are issued by the transaction manager.
//!
//! A transaction dropped while still open leaves its connection flagged as
//! broken; the pool discards it instead of handing it out again and the
//! server rolls the work back when the socket closes.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::{AnsiTransactionManager, AsyncPgConnection, RunQueryDsl, TransactionManager};
use tracing::debug;

use crate::domain::ports::{RecapStore, RecapStoreError, RecapTransaction};
use crate::domain::{FavoriteProduct, FavoriteStore, UserRecap, UserRecapId, UserRecapView};

use super::error_mapping::{map_diesel_error, map_pool_error, map_transaction_error};
use super::models::{
    FavoriteProductRow, FavoriteStoreRow, NewFavoriteProductRow, NewFavoriteStoreRow,
    NewUserRecapRow, UserRecapRow,
};
use super::pool::{DbPool, OwnedConnection};
use super::schema::{user_favorite_products, user_favorite_stores, user_recap_data};

type Transactions = AnsiTransactionManager;

/// Diesel-backed implementation of the recap store port.
#[derive(Clone)]
pub struct DieselRecapStore {
    pool: DbPool,
}

impl DieselRecapStore {
    /// Create a new store with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Open transaction holding its own pooled connection.
pub struct DieselRecapTransaction {
    conn: OwnedConnection,
}

impl DieselRecapTransaction {
    fn conn(&mut self) -> &mut AsyncPgConnection {
        &mut self.conn
    }
}

/// Read a recap and its ordered children on `conn`.
async fn load_view(
    conn: &mut AsyncPgConnection,
    user_id: UserRecapId,
) -> Result<Option<UserRecapView>, RecapStoreError> {
    let recap: Option<UserRecapRow> = user_recap_data::table
        .filter(user_recap_data::user_id.eq(user_id.get()))
        .select(UserRecapRow::as_select())
        .first(conn)
        .await
        .optional()
        .map_err(map_diesel_error)?;
    let Some(recap) = recap else {
        return Ok(None);
    };

    let products: Vec<FavoriteProductRow> = user_favorite_products::table
        .filter(user_favorite_products::user_id.eq(user_id.get()))
        .order_by(user_favorite_products::display_order.asc())
        .select(FavoriteProductRow::as_select())
        .load(conn)
        .await
        .map_err(map_diesel_error)?;
    let stores: Vec<FavoriteStoreRow> = user_favorite_stores::table
        .filter(user_favorite_stores::user_id.eq(user_id.get()))
        .order_by(user_favorite_stores::display_order.asc())
        .select(FavoriteStoreRow::as_select())
        .load(conn)
        .await
        .map_err(map_diesel_error)?;

    Ok(Some(UserRecapView::compose(
        recap.into(),
        products.into_iter().map(Into::into).collect(),
        stores.into_iter().map(Into::into).collect(),
    )))
}

/// Convert a list position to the `display_order` column type.
fn display_order(position: usize) -> Result<i32, RecapStoreError> {
    i32::try_from(position).map_err(|_| {
        RecapStoreError::query(format!(
            "favourite position {position} exceeds the display_order range"
        ))
    })
}

#[async_trait]
impl RecapTransaction for DieselRecapTransaction {
    async fn upsert_user_recap(&mut self, recap: &UserRecap) -> Result<(), RecapStoreError> {
        use user_recap_data::dsl as recaps;

        let row = NewUserRecapRow::from(recap);
        diesel::insert_into(recaps::user_recap_data)
            .values(&row)
            .on_conflict(recaps::user_id)
            .do_update()
            .set((
                recaps::user_name.eq(excluded(recaps::user_name)),
                recaps::trx_count.eq(excluded(recaps::trx_count)),
                recaps::variant_count.eq(excluded(recaps::variant_count)),
                recaps::total_point.eq(excluded(recaps::total_point)),
                recaps::total_point_description.eq(excluded(recaps::total_point_description)),
                recaps::total_point_possible_redeem
                    .eq(excluded(recaps::total_point_possible_redeem)),
                recaps::total_point_image.eq(excluded(recaps::total_point_image)),
                recaps::delivery_count.eq(excluded(recaps::delivery_count)),
                recaps::pickup_count.eq(excluded(recaps::pickup_count)),
                recaps::cheaper_subs_desc.eq(excluded(recaps::cheaper_subs_desc)),
                recaps::cheaper_subs_amount.eq(excluded(recaps::cheaper_subs_amount)),
                recaps::top_ranking.eq(excluded(recaps::top_ranking)),
                recaps::list_circular_images.eq(excluded(recaps::list_circular_images)),
                recaps::updated_at.eq(diesel::dsl::now),
            ))
            .execute(self.conn())
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn replace_favorite_products(
        &mut self,
        user_id: UserRecapId,
        products: &[FavoriteProduct],
    ) -> Result<(), RecapStoreError> {
        use user_favorite_products::dsl as favourites;

        diesel::delete(favourites::user_favorite_products)
            .filter(favourites::user_id.eq(user_id.get()))
            .execute(self.conn())
            .await
            .map_err(map_diesel_error)?;
        if products.is_empty() {
            return Ok(());
        }

        let rows = products
            .iter()
            .enumerate()
            .map(|(position, product)| {
                Ok(NewFavoriteProductRow::new(
                    user_id,
                    display_order(position)?,
                    product,
                ))
            })
            .collect::<Result<Vec<_>, RecapStoreError>>()?;
        diesel::insert_into(favourites::user_favorite_products)
            .values(&rows)
            .execute(self.conn())
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn replace_favorite_stores(
        &mut self,
        user_id: UserRecapId,
        stores: &[FavoriteStore],
    ) -> Result<(), RecapStoreError> {
        use user_favorite_stores::dsl as favourites;

        diesel::delete(favourites::user_favorite_stores)
            .filter(favourites::user_id.eq(user_id.get()))
            .execute(self.conn())
            .await
            .map_err(map_diesel_error)?;
        if stores.is_empty() {
            return Ok(());
        }

        let rows = stores
            .iter()
            .enumerate()
            .map(|(position, store)| {
                Ok(NewFavoriteStoreRow::new(
                    user_id,
                    display_order(position)?,
                    store,
                ))
            })
            .collect::<Result<Vec<_>, RecapStoreError>>()?;
        diesel::insert_into(favourites::user_favorite_stores)
            .values(&rows)
            .execute(self.conn())
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn find_recap(
        &mut self,
        user_id: UserRecapId,
    ) -> Result<Option<UserRecapView>, RecapStoreError> {
        load_view(self.conn(), user_id).await
    }

    async fn savepoint(&mut self) -> Result<(), RecapStoreError> {
        Transactions::begin_transaction(self.conn())
            .await
            .map_err(|error| map_transaction_error(error, "savepoint"))
    }

    async fn release_savepoint(&mut self) -> Result<(), RecapStoreError> {
        Transactions::commit_transaction(self.conn())
            .await
            .map_err(|error| map_transaction_error(error, "release savepoint"))
    }

    async fn rollback_to_savepoint(&mut self) -> Result<(), RecapStoreError> {
        Transactions::rollback_transaction(self.conn())
            .await
            .map_err(|error| map_transaction_error(error, "rollback to savepoint"))
    }

    async fn commit(mut self) -> Result<(), RecapStoreError> {
        match Transactions::commit_transaction(self.conn()).await {
            Ok(()) => Ok(()),
            Err(error) => {
                if let Err(rollback_error) = Transactions::rollback_transaction(self.conn()).await
                {
                    debug!(error = %rollback_error, "rollback after failed commit");
                }
                Err(map_transaction_error(error, "commit"))
            }
        }
    }

    async fn rollback(mut self) -> Result<(), RecapStoreError> {
        Transactions::rollback_transaction(self.conn())
            .await
            .map_err(|error| map_transaction_error(error, "rollback"))
    }
}

#[async_trait]
impl RecapStore for DieselRecapStore {
    type Transaction = DieselRecapTransaction;

    async fn begin(&self) -> Result<Self::Transaction, RecapStoreError> {
        let mut conn = self.pool.get_owned().await.map_err(map_pool_error)?;
        Transactions::begin_transaction(&mut *conn)
            .await
            .map_err(|error| map_transaction_error(error, "begin"))?;
        Ok(DieselRecapTransaction { conn })
    }

    async fn find_recap(
        &self,
        user_id: UserRecapId,
    ) -> Result<Option<UserRecapView>, RecapStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        load_view(&mut conn, user_id).await
    }

    async fn ping(&self) -> Result<(), RecapStoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        diesel::sql_query("SELECT 1")
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, 0)]
    #[case(4, 4)]
    fn display_order_is_the_list_position(#[case] position: usize, #[case] expected: i32) {
        assert_eq!(display_order(position), Ok(expected));
    }

    #[rstest]
    fn oversized_position_is_a_query_error() {
        let position = usize::try_from(i64::from(i32::MAX) + 1).expect("64-bit usize");

        assert!(matches!(
            display_order(position),
            Err(RecapStoreError::Query { .. })
        ));
    }
}
