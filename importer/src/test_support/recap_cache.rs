//! In-memory cache double with a switchable outage.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::ports::{RecapCache, RecapCacheError, RecapCacheKey};
use crate::domain::{UserRecapId, UserRecapView};

#[derive(Debug, Default)]
pub struct InMemoryRecapCache {
    entries: Mutex<BTreeMap<String, (Vec<u8>, Duration)>>,
    failing: AtomicBool,
    reads: AtomicUsize,
}

impl InMemoryRecapCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle a simulated backend outage for reads and writes.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Store raw bytes, bypassing the outage switch.
    pub fn insert_raw(&self, key: &RecapCacheKey, payload: &[u8]) {
        self.lock()
            .insert(key.as_str().to_owned(), (payload.to_vec(), Duration::ZERO));
    }

    /// Decode the cached view for `user_id`.
    pub fn view(&self, user_id: UserRecapId) -> Option<UserRecapView> {
        let key = RecapCacheKey::for_user(user_id);
        let entries = self.lock();
        let (payload, _) = entries.get(key.as_str())?;
        serde_json::from_slice(payload).ok()
    }

    /// TTL the entry for `user_id` was written with.
    pub fn ttl(&self, user_id: UserRecapId) -> Option<Duration> {
        let key = RecapCacheKey::for_user(user_id);
        self.lock().get(key.as_str()).map(|(_, ttl)| *ttl)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of `get` calls served, failed ones included.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, (Vec<u8>, Duration)>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(_) => panic!("recap cache mutex"),
        }
    }

    fn check_available(&self) -> Result<(), RecapCacheError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RecapCacheError::backend("connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl RecapCache for InMemoryRecapCache {
    async fn get(&self, key: &RecapCacheKey) -> Result<Option<Vec<u8>>, RecapCacheError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.lock().get(key.as_str()).map(|(payload, _)| payload.clone()))
    }

    async fn put(
        &self,
        key: &RecapCacheKey,
        payload: &[u8],
        ttl: Duration,
    ) -> Result<(), RecapCacheError> {
        self.check_available()?;
        self.lock()
            .insert(key.as_str().to_owned(), (payload.to_vec(), ttl));
        Ok(())
    }
}
