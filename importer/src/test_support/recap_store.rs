//! In-memory recap store modelling PostgreSQL transaction semantics.
//!
//! Writes go to a per-transaction change set and become visible on commit.
//! Savepoints are marks in an undo journal. A failed statement poisons the
//! transaction the way PostgreSQL does: every later statement fails until the
//! caller rolls back to a savepoint or abandons the transaction.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::ports::{RecapStore, RecapStoreError, RecapTransaction};
use crate::domain::{FavoriteProduct, FavoriteStore, UserRecap, UserRecapId, UserRecapView};

const ABORTED: &str = "current transaction is aborted, commands ignored until end of transaction block";

/// Everything stored for one user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredRecap {
    pub recap: Option<UserRecap>,
    pub products: Vec<FavoriteProduct>,
    pub stores: Vec<FavoriteStore>,
    /// Number of upserts applied; stands in for `updated_at`.
    pub revision: u64,
}

#[derive(Debug, Default)]
struct Failures {
    upsert: BTreeSet<UserRecapId>,
    products: BTreeSet<UserRecapId>,
    commit_numbers: BTreeSet<usize>,
    begin_numbers: BTreeSet<usize>,
    savepoints: bool,
    reads: bool,
    unreachable: bool,
}

#[derive(Debug, Default)]
struct State {
    committed: BTreeMap<UserRecapId, StoredRecap>,
    failures: Failures,
    begins: usize,
    commits: usize,
    rollbacks: usize,
    /// `find_recap` calls made on the store itself rather than a transaction.
    pooled_reads: usize,
}

/// Shared handle to the in-memory tables. Clones observe the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecapStore {
    state: Arc<Mutex<State>>,
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    match state.lock() {
        Ok(guard) => guard,
        Err(_) => panic!("recap store mutex"),
    }
}

impl InMemoryRecapStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every upsert of `user_id` fail with a constraint violation.
    pub fn fail_upsert_for(&self, user_id: UserRecapId) {
        lock(&self.state).failures.upsert.insert(user_id);
    }

    /// Make every favourite product replacement for `user_id` fail.
    pub fn fail_products_for(&self, user_id: UserRecapId) {
        lock(&self.state).failures.products.insert(user_id);
    }

    /// Make the `number`th commit (one-based) fail.
    pub fn fail_commit_number(&self, number: usize) {
        lock(&self.state).failures.commit_numbers.insert(number);
    }

    /// Make the `number`th begin (one-based) fail.
    pub fn fail_begin_number(&self, number: usize) {
        lock(&self.state).failures.begin_numbers.insert(number);
    }

    /// Make savepoint creation fail.
    pub fn fail_savepoints(&self) {
        lock(&self.state).failures.savepoints = true;
    }

    /// Make `find_recap` fail, on the store and inside transactions.
    pub fn fail_reads(&self) {
        lock(&self.state).failures.reads = true;
    }

    /// Make every store call report a lost connection.
    pub fn set_unreachable(&self) {
        lock(&self.state).failures.unreachable = true;
    }

    /// Seed committed state directly.
    pub fn seed(
        &self,
        recap: UserRecap,
        products: Vec<FavoriteProduct>,
        stores: Vec<FavoriteStore>,
    ) {
        let user_id = recap.user_id;
        lock(&self.state).committed.insert(
            user_id,
            StoredRecap {
                recap: Some(recap),
                products,
                stores,
                revision: 1,
            },
        );
    }

    pub fn stored(&self, user_id: UserRecapId) -> Option<StoredRecap> {
        lock(&self.state).committed.get(&user_id).cloned()
    }

    pub fn recap(&self, user_id: UserRecapId) -> Option<UserRecap> {
        self.stored(user_id).and_then(|stored| stored.recap)
    }

    pub fn products(&self, user_id: UserRecapId) -> Vec<FavoriteProduct> {
        self.stored(user_id)
            .map(|stored| stored.products)
            .unwrap_or_default()
    }

    pub fn stores(&self, user_id: UserRecapId) -> Vec<FavoriteStore> {
        self.stored(user_id)
            .map(|stored| stored.stores)
            .unwrap_or_default()
    }

    /// Number of committed primary rows.
    pub fn recap_count(&self) -> usize {
        lock(&self.state)
            .committed
            .values()
            .filter(|stored| stored.recap.is_some())
            .count()
    }

    pub fn begins(&self) -> usize {
        lock(&self.state).begins
    }

    pub fn commits(&self) -> usize {
        lock(&self.state).commits
    }

    pub fn rollbacks(&self) -> usize {
        lock(&self.state).rollbacks
    }

    /// Reads that needed a connection of their own.
    pub fn pooled_reads(&self) -> usize {
        lock(&self.state).pooled_reads
    }
}

fn compose(stored: &StoredRecap) -> Option<UserRecapView> {
    stored.recap.clone().map(|recap| {
        UserRecapView::compose(recap, stored.products.clone(), stored.stores.clone())
    })
}

/// Open transaction against [`InMemoryRecapStore`].
#[derive(Debug)]
pub struct InMemoryRecapTransaction {
    state: Arc<Mutex<State>>,
    changes: BTreeMap<UserRecapId, StoredRecap>,
    journal: Vec<(UserRecapId, Option<StoredRecap>)>,
    savepoints: Vec<usize>,
    aborted: bool,
}

impl InMemoryRecapTransaction {
    fn guard(&self) -> Result<(), RecapStoreError> {
        if self.aborted {
            return Err(RecapStoreError::transaction(ABORTED));
        }
        Ok(())
    }

    fn fail(&mut self, error: RecapStoreError) -> Result<(), RecapStoreError> {
        self.aborted = true;
        Err(error)
    }

    /// Journal the current change-set entry for `user_id`, then hand out a
    /// mutable copy seeded from committed state.
    fn touch(&mut self, user_id: UserRecapId) -> &mut StoredRecap {
        let previous = self.changes.get(&user_id).cloned();
        self.journal.push((user_id, previous));
        let state = &self.state;
        self.changes.entry(user_id).or_insert_with(|| {
            lock(state)
                .committed
                .get(&user_id)
                .cloned()
                .unwrap_or_default()
        })
    }
}

#[async_trait]
impl RecapTransaction for InMemoryRecapTransaction {
    async fn upsert_user_recap(&mut self, recap: &UserRecap) -> Result<(), RecapStoreError> {
        self.guard()?;
        if lock(&self.state).failures.upsert.contains(&recap.user_id) {
            return self.fail(RecapStoreError::constraint(format!(
                "user_recap_data rejected user_id {}",
                recap.user_id
            )));
        }
        let entry = self.touch(recap.user_id);
        entry.recap = Some(recap.clone());
        entry.revision += 1;
        Ok(())
    }

    async fn replace_favorite_products(
        &mut self,
        user_id: UserRecapId,
        products: &[FavoriteProduct],
    ) -> Result<(), RecapStoreError> {
        self.guard()?;
        if lock(&self.state).failures.products.contains(&user_id) {
            return self.fail(RecapStoreError::query(format!(
                "user_favorite_products insert failed for user_id {user_id}"
            )));
        }
        self.touch(user_id).products = products.to_vec();
        Ok(())
    }

    async fn replace_favorite_stores(
        &mut self,
        user_id: UserRecapId,
        stores: &[FavoriteStore],
    ) -> Result<(), RecapStoreError> {
        self.guard()?;
        self.touch(user_id).stores = stores.to_vec();
        Ok(())
    }

    async fn find_recap(
        &mut self,
        user_id: UserRecapId,
    ) -> Result<Option<UserRecapView>, RecapStoreError> {
        self.guard()?;
        if lock(&self.state).failures.reads {
            self.fail(RecapStoreError::query("read refused"))?;
        }
        if let Some(pending) = self.changes.get(&user_id) {
            return Ok(compose(pending));
        }
        Ok(lock(&self.state).committed.get(&user_id).and_then(compose))
    }

    async fn savepoint(&mut self) -> Result<(), RecapStoreError> {
        self.guard()?;
        if lock(&self.state).failures.savepoints {
            return self.fail(RecapStoreError::transaction("savepoint refused"));
        }
        self.savepoints.push(self.journal.len());
        Ok(())
    }

    async fn release_savepoint(&mut self) -> Result<(), RecapStoreError> {
        self.guard()?;
        self.savepoints
            .pop()
            .map(|_| ())
            .ok_or_else(|| RecapStoreError::transaction("no savepoint to release"))
    }

    async fn rollback_to_savepoint(&mut self) -> Result<(), RecapStoreError> {
        let Some(mark) = self.savepoints.pop() else {
            return Err(RecapStoreError::transaction("no savepoint to roll back to"));
        };
        while self.journal.len() > mark {
            let Some((user_id, previous)) = self.journal.pop() else {
                break;
            };
            match previous {
                Some(entry) => {
                    self.changes.insert(user_id, entry);
                }
                None => {
                    self.changes.remove(&user_id);
                }
            }
        }
        self.aborted = false;
        Ok(())
    }

    async fn commit(self) -> Result<(), RecapStoreError> {
        let mut state = lock(&self.state);
        state.commits += 1;
        let number = state.commits;
        if self.aborted {
            state.rollbacks += 1;
            return Err(RecapStoreError::transaction(ABORTED));
        }
        if state.failures.commit_numbers.contains(&number) {
            state.rollbacks += 1;
            return Err(RecapStoreError::transaction(format!(
                "commit {number} rejected"
            )));
        }
        state.committed.extend(self.changes);
        Ok(())
    }

    async fn rollback(self) -> Result<(), RecapStoreError> {
        lock(&self.state).rollbacks += 1;
        Ok(())
    }
}

#[async_trait]
impl RecapStore for InMemoryRecapStore {
    type Transaction = InMemoryRecapTransaction;

    async fn begin(&self) -> Result<Self::Transaction, RecapStoreError> {
        let mut state = lock(&self.state);
        state.begins += 1;
        if state.failures.unreachable {
            return Err(RecapStoreError::connection("store unreachable"));
        }
        if state.failures.begin_numbers.contains(&state.begins) {
            return Err(RecapStoreError::transaction(format!(
                "begin {} rejected",
                state.begins
            )));
        }
        Ok(InMemoryRecapTransaction {
            state: Arc::clone(&self.state),
            changes: BTreeMap::new(),
            journal: Vec::new(),
            savepoints: Vec::new(),
            aborted: false,
        })
    }

    async fn find_recap(
        &self,
        user_id: UserRecapId,
    ) -> Result<Option<UserRecapView>, RecapStoreError> {
        let mut state = lock(&self.state);
        state.pooled_reads += 1;
        if state.failures.unreachable {
            return Err(RecapStoreError::connection("store unreachable"));
        }
        if state.failures.reads {
            return Err(RecapStoreError::query("read refused"));
        }
        Ok(state.committed.get(&user_id).and_then(compose))
    }

    async fn ping(&self) -> Result<(), RecapStoreError> {
        if lock(&self.state).failures.unreachable {
            return Err(RecapStoreError::connection("store unreachable"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn store() -> InMemoryRecapStore {
        InMemoryRecapStore::new()
    }

    fn recap(id: i64) -> UserRecap {
        UserRecap::new(UserRecapId::new(id), format!("user {id}"), 1)
    }

    #[rstest]
    #[tokio::test]
    async fn writes_are_invisible_until_commit(store: InMemoryRecapStore) {
        let mut tx = store.begin().await.expect("begin");
        tx.upsert_user_recap(&recap(1)).await.expect("upsert");
        assert_eq!(store.recap_count(), 0);

        tx.commit().await.expect("commit");

        assert_eq!(store.recap(UserRecapId::new(1)), Some(recap(1)));
    }

    #[rstest]
    #[tokio::test]
    async fn failed_statement_poisons_until_savepoint_rollback(store: InMemoryRecapStore) {
        store.fail_upsert_for(UserRecapId::new(2));
        let mut tx = store.begin().await.expect("begin");
        tx.upsert_user_recap(&recap(1)).await.expect("first upsert");

        tx.savepoint().await.expect("savepoint");
        tx.upsert_user_recap(&recap(2))
            .await
            .expect_err("injected failure");
        let poisoned = tx
            .upsert_user_recap(&recap(3))
            .await
            .expect_err("aborted transaction rejects statements");
        assert_eq!(poisoned, RecapStoreError::transaction(ABORTED));

        tx.rollback_to_savepoint().await.expect("rollback to savepoint");
        tx.upsert_user_recap(&recap(3)).await.expect("usable again");
        tx.commit().await.expect("commit");

        assert_eq!(store.recap_count(), 2);
        assert_eq!(store.recap(UserRecapId::new(2)), None);
    }

    #[rstest]
    #[tokio::test]
    async fn savepoint_rollback_restores_earlier_writes(store: InMemoryRecapStore) {
        let mut tx = store.begin().await.expect("begin");
        tx.upsert_user_recap(&recap(1)).await.expect("upsert");
        tx.savepoint().await.expect("savepoint");
        let mut renamed = recap(1);
        renamed.user_name = "renamed".to_owned();
        tx.upsert_user_recap(&renamed).await.expect("second upsert");

        tx.rollback_to_savepoint().await.expect("rollback");
        tx.commit().await.expect("commit");

        let stored = store.stored(UserRecapId::new(1)).expect("stored");
        assert_eq!(stored.recap, Some(recap(1)));
        assert_eq!(stored.revision, 1);
    }

    #[rstest]
    #[tokio::test]
    async fn transaction_reads_see_uncommitted_writes(store: InMemoryRecapStore) {
        store.seed(recap(2), Vec::new(), Vec::new());
        let mut tx = store.begin().await.expect("begin");
        tx.upsert_user_recap(&recap(1)).await.expect("upsert");

        let pending = tx.find_recap(UserRecapId::new(1)).await.expect("read");
        let committed = tx.find_recap(UserRecapId::new(2)).await.expect("read");

        assert_eq!(pending.map(|view| view.user_name), Some("user 1".to_owned()));
        assert_eq!(committed.map(|view| view.user_name), Some("user 2".to_owned()));
        assert_eq!(store.pooled_reads(), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn injected_commit_failure_applies_nothing(store: InMemoryRecapStore) {
        store.fail_commit_number(1);
        let mut tx = store.begin().await.expect("begin");
        tx.upsert_user_recap(&recap(1)).await.expect("upsert");

        tx.commit().await.expect_err("commit rejected");

        assert_eq!(store.recap_count(), 0);
        assert_eq!(store.rollbacks(), 1);
    }
}
