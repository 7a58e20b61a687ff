//! Port abstraction for the relational recap store.
//!
//! The import path works against an explicitly opened [`RecapTransaction`].
//! Within it each row may be fenced by a savepoint so that a failing
//! statement can be undone without discarding the rest of the chunk.

use async_trait::async_trait;

use crate::domain::{FavoriteProduct, FavoriteStore, UserRecap, UserRecapId, UserRecapView};

use super::define_port_error;

define_port_error! {
    /// Errors raised by recap store adapters.
    pub enum RecapStoreError {
        /// A connection could not be obtained or was lost.
        Connection { message: String } =>
            "recap store connection failed: {message}",
        /// A statement failed to execute.
        Query { message: String } =>
            "recap store query failed: {message}",
        /// A statement violated a table constraint.
        Constraint { message: String } =>
            "recap store constraint violated: {message}",
        /// Transaction control (begin, savepoint, commit, rollback) failed.
        Transaction { message: String } =>
            "recap store transaction failed: {message}",
    }
}

/// An open store transaction owned by one chunk.
///
/// Dropping a transaction without calling [`RecapTransaction::commit`] or
/// [`RecapTransaction::rollback`] must not leave partial writes visible.
#[async_trait]
pub trait RecapTransaction: Send {
    /// Insert the recap, or overwrite every mutable column of the existing
    /// row for the same user and stamp `updated_at`.
    async fn upsert_user_recap(&mut self, recap: &UserRecap) -> Result<(), RecapStoreError>;

    /// Delete all favourite products of the user, then insert `products` with
    /// `display_order` equal to their position.
    async fn replace_favorite_products(
        &mut self,
        user_id: UserRecapId,
        products: &[FavoriteProduct],
    ) -> Result<(), RecapStoreError>;

    /// Delete all favourite stores of the user, then insert `stores` with
    /// `display_order` equal to their position.
    async fn replace_favorite_stores(
        &mut self,
        user_id: UserRecapId,
        stores: &[FavoriteStore],
    ) -> Result<(), RecapStoreError>;

    /// Load the composed view for `user_id` as this transaction sees it,
    /// uncommitted writes included.
    async fn find_recap(
        &mut self,
        user_id: UserRecapId,
    ) -> Result<Option<UserRecapView>, RecapStoreError>;

    /// Open a savepoint nested in the transaction.
    async fn savepoint(&mut self) -> Result<(), RecapStoreError>;

    /// Release the innermost savepoint, keeping its writes.
    async fn release_savepoint(&mut self) -> Result<(), RecapStoreError>;

    /// Undo every write since the innermost savepoint and discard it.
    async fn rollback_to_savepoint(&mut self) -> Result<(), RecapStoreError>;

    /// Commit the transaction. A failed commit leaves nothing applied.
    async fn commit(self) -> Result<(), RecapStoreError>;

    /// Roll the whole transaction back.
    async fn rollback(self) -> Result<(), RecapStoreError>;
}

/// Relational store for user recaps.
#[async_trait]
pub trait RecapStore: Send + Sync {
    /// Transaction handle produced by [`RecapStore::begin`].
    type Transaction: RecapTransaction;

    /// Check out a connection and open a transaction on it.
    async fn begin(&self) -> Result<Self::Transaction, RecapStoreError>;

    /// Load the composed view for `user_id`, children ordered by
    /// `display_order`.
    async fn find_recap(
        &self,
        user_id: UserRecapId,
    ) -> Result<Option<UserRecapView>, RecapStoreError>;

    /// Verify the store is reachable.
    async fn ping(&self) -> Result<(), RecapStoreError>;
}
