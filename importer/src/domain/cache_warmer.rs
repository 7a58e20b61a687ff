//! Best-effort projection of composed recap views into the cache.
//!
//! Nothing here can fail a row or a chunk. Every problem is logged and
//! folded into a [`WarmOutcome`].
//!
//! The first backend failure trips the warmer for the rest of the run: later
//! attempts are skipped without touching the cache, so an outage costs at
//! most one backend timeout.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use crate::domain::ports::{RecapCache, RecapCacheKey};
use crate::domain::{UserRecapId, UserRecapView};

/// Default lifetime of a cached view.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Result of one warm attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmOutcome {
    /// The view was stored.
    Written,
    /// No cache is configured or the backend rejected the write.
    SkippedCacheUnavailable,
    /// The view could not be encoded.
    SkippedSerializationFailed,
}

/// Per-chunk and per-run counts of warm attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheWarmTally {
    pub written: u64,
    pub skipped_unavailable: u64,
    pub skipped_serialization: u64,
    /// Committed rows whose view could not be read back for warming.
    pub skipped_view_unavailable: u64,
}

impl CacheWarmTally {
    pub fn record(&mut self, outcome: WarmOutcome) {
        match outcome {
            WarmOutcome::Written => self.written += 1,
            WarmOutcome::SkippedCacheUnavailable => self.skipped_unavailable += 1,
            WarmOutcome::SkippedSerializationFailed => self.skipped_serialization += 1,
        }
    }

    pub fn absorb(&mut self, other: Self) {
        self.written += other.written;
        self.skipped_unavailable += other.skipped_unavailable;
        self.skipped_serialization += other.skipped_serialization;
        self.skipped_view_unavailable += other.skipped_view_unavailable;
    }

    /// Attempts that did not end in a write.
    pub fn skipped(&self) -> u64 {
        self.skipped_unavailable + self.skipped_serialization + self.skipped_view_unavailable
    }
}

/// Writes composed views under `user:recap:<user_id>` with a fixed TTL.
///
/// Clones share the tripped state.
pub struct CacheWarmer<C> {
    cache: Option<Arc<C>>,
    ttl: Duration,
    tripped: Arc<AtomicBool>,
}

impl<C> Clone for CacheWarmer<C> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            ttl: self.ttl,
            tripped: Arc::clone(&self.tripped),
        }
    }
}

impl<C> CacheWarmer<C> {
    pub fn new(cache: Arc<C>, ttl: Duration) -> Self {
        Self {
            cache: Some(cache),
            ttl,
            tripped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A warmer with no backing cache; every attempt is skipped.
    pub fn disabled() -> Self {
        Self {
            cache: None,
            ttl: DEFAULT_CACHE_TTL,
            tripped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a cache was configured at all.
    pub fn is_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Whether attempts still reach the cache: configured and not tripped.
    pub fn is_available(&self) -> bool {
        self.is_enabled() && !self.tripped.load(Ordering::Acquire)
    }

    fn trip(&self) {
        if !self.tripped.swap(true, Ordering::AcqRel) {
            warn!("recap cache unavailable; skipping cache work for the rest of the run");
        }
    }

    fn live_cache(&self) -> Option<&C> {
        if self.tripped.load(Ordering::Acquire) {
            return None;
        }
        self.cache.as_deref()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl<C: RecapCache> CacheWarmer<C> {
    /// Serialise `view` and store it for `user_id`.
    pub async fn warm<V>(&self, user_id: UserRecapId, view: &V) -> WarmOutcome
    where
        V: Serialize + ?Sized + Sync,
    {
        let Some(cache) = self.live_cache() else {
            return WarmOutcome::SkippedCacheUnavailable;
        };
        let payload = match serde_json::to_vec(view) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(%user_id, %error, "failed to serialise recap view for cache");
                return WarmOutcome::SkippedSerializationFailed;
            }
        };
        let key = RecapCacheKey::for_user(user_id);
        match cache.put(&key, &payload, self.ttl).await {
            Ok(()) => WarmOutcome::Written,
            Err(error) => {
                warn!(%user_id, %error, "failed to cache recap view");
                self.trip();
                WarmOutcome::SkippedCacheUnavailable
            }
        }
    }

    /// Read the cached view for `user_id`.
    ///
    /// Backend failures and undecodable entries read as a miss.
    pub async fn read(&self, user_id: UserRecapId) -> Option<UserRecapView> {
        let cache = self.live_cache()?;
        let key = RecapCacheKey::for_user(user_id);
        let payload = match cache.get(&key).await {
            Ok(payload) => payload?,
            Err(error) => {
                warn!(%user_id, %error, "recap cache read failed");
                self.trip();
                return None;
            }
        };
        match serde_json::from_slice(&payload) {
            Ok(view) => Some(view),
            Err(error) => {
                warn!(%user_id, %error, "discarding undecodable cached recap view");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;
    use rstest::rstest;
    use serde::ser::Error as _;

    use super::*;
    use crate::domain::UserRecap;
    use crate::domain::ports::{MockRecapCache, RecapCacheError};

    struct Unserialisable;

    impl Serialize for Unserialisable {
        fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("refusing to serialise"))
        }
    }

    fn view() -> UserRecapView {
        UserRecapView::compose(
            UserRecap::new(UserRecapId::new(11), "Rina", 4),
            Vec::new(),
            Vec::new(),
        )
    }

    #[rstest]
    #[tokio::test]
    async fn writes_json_under_user_key_with_ttl() {
        let expected_payload = serde_json::to_vec(&view()).expect("encode");
        let mut cache = MockRecapCache::new();
        cache
            .expect_put()
            .times(1)
            .withf(move |key, payload, ttl| {
                key.as_str() == "user:recap:11"
                    && payload.to_vec() == expected_payload
                    && *ttl == Duration::from_secs(60)
            })
            .return_once(|_, _, _| Ok(()));
        let warmer = CacheWarmer::new(Arc::new(cache), Duration::from_secs(60));

        let outcome = warmer.warm(UserRecapId::new(11), &view()).await;

        assert_eq!(outcome, WarmOutcome::Written);
    }

    #[rstest]
    #[tokio::test]
    async fn backend_failure_is_swallowed() {
        let mut cache = MockRecapCache::new();
        cache
            .expect_put()
            .times(1)
            .return_once(|_, _, _| Err(RecapCacheError::backend("connection refused")));
        let warmer = CacheWarmer::new(Arc::new(cache), DEFAULT_CACHE_TTL);

        let outcome = warmer.warm(UserRecapId::new(11), &view()).await;

        assert_eq!(outcome, WarmOutcome::SkippedCacheUnavailable);
    }

    #[rstest]
    #[tokio::test]
    async fn first_backend_failure_skips_the_rest_of_the_run() {
        let mut cache = MockRecapCache::new();
        cache
            .expect_put()
            .times(1)
            .return_once(|_, _, _| Err(RecapCacheError::backend("connection refused")));
        cache.expect_get().never();
        let warmer = CacheWarmer::new(Arc::new(cache), DEFAULT_CACHE_TTL);
        let shared = warmer.clone();

        let mut outcomes = Vec::new();
        for id in 1..=3 {
            outcomes.push(warmer.warm(UserRecapId::new(id), &view()).await);
        }

        assert_eq!(outcomes, vec![WarmOutcome::SkippedCacheUnavailable; 3]);
        assert!(warmer.is_enabled());
        assert!(!shared.is_available());
        assert_eq!(shared.read(UserRecapId::new(1)).await, None);
    }

    #[rstest]
    #[tokio::test]
    async fn failed_read_trips_later_writes() {
        let mut cache = MockRecapCache::new();
        cache
            .expect_get()
            .times(1)
            .return_once(|_| Err(RecapCacheError::backend("timeout")));
        cache.expect_put().never();
        let warmer = CacheWarmer::new(Arc::new(cache), DEFAULT_CACHE_TTL);

        assert_eq!(warmer.read(UserRecapId::new(11)).await, None);

        assert_eq!(
            warmer.warm(UserRecapId::new(11), &view()).await,
            WarmOutcome::SkippedCacheUnavailable
        );
    }

    #[rstest]
    #[tokio::test]
    async fn serialisation_failure_skips_the_write() {
        let mut cache = MockRecapCache::new();
        cache.expect_put().never();
        let warmer = CacheWarmer::new(Arc::new(cache), DEFAULT_CACHE_TTL);

        let outcome = warmer.warm(UserRecapId::new(11), &Unserialisable).await;

        assert_eq!(outcome, WarmOutcome::SkippedSerializationFailed);
    }

    #[rstest]
    #[tokio::test]
    async fn disabled_warmer_skips_everything() {
        let warmer = CacheWarmer::<MockRecapCache>::disabled();

        assert!(!warmer.is_enabled());
        assert!(!warmer.is_available());
        assert_eq!(
            warmer.warm(UserRecapId::new(1), &view()).await,
            WarmOutcome::SkippedCacheUnavailable
        );
        assert_eq!(warmer.read(UserRecapId::new(1)).await, None);
    }

    #[rstest]
    #[case(Ok(None), None)]
    #[case(Ok(Some(b"not json".to_vec())), None)]
    #[case(Err(RecapCacheError::backend("timeout")), None)]
    #[tokio::test]
    async fn unusable_reads_are_misses(
        #[case] response: Result<Option<Vec<u8>>, RecapCacheError>,
        #[case] expected: Option<UserRecapView>,
    ) {
        let mut cache = MockRecapCache::new();
        cache
            .expect_get()
            .with(eq(RecapCacheKey::for_user(UserRecapId::new(11))))
            .times(1)
            .return_once(move |_| response);
        let warmer = CacheWarmer::new(Arc::new(cache), DEFAULT_CACHE_TTL);

        assert_eq!(warmer.read(UserRecapId::new(11)).await, expected);
    }

    #[rstest]
    fn tally_records_and_absorbs() {
        let mut first = CacheWarmTally::default();
        first.record(WarmOutcome::Written);
        first.record(WarmOutcome::SkippedCacheUnavailable);
        let mut second = CacheWarmTally::default();
        second.record(WarmOutcome::SkippedSerializationFailed);
        second.skipped_view_unavailable = 2;

        first.absorb(second);

        assert_eq!(first.written, 1);
        assert_eq!(first.skipped(), 4);
    }
}
