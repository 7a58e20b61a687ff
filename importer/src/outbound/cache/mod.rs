//! Redis-backed recap cache.
//!
//! Payloads are stored verbatim with `SETEX` so every entry expires after the
//! configured TTL. Connections come from a shared `bb8-redis` pool that is
//! built once and reused for the whole run.

use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::RedisConnectionManager;
use bb8_redis::bb8::{Pool, PooledConnection};
use bb8_redis::redis::{self, AsyncCommands};

use crate::domain::ports::{RecapCache, RecapCacheError, RecapCacheKey};

/// Checkout timeout for cache connections. Kept short so an outage costs
/// each row a bounded wait rather than stalling the import.
const CHECKOUT_TIMEOUT: Duration = Duration::from_secs(2);
const MAX_CONNECTIONS: u32 = 4;

/// Recap cache backed by a Redis connection pool.
#[derive(Clone)]
pub struct RedisRecapCache {
    pool: Pool<RedisConnectionManager>,
}

impl RedisRecapCache {
    /// Build a pool for `redis_url` without opening any connection yet.
    ///
    /// # Errors
    ///
    /// Returns [`RecapCacheError::Backend`] when the URL cannot be parsed.
    pub fn connect(redis_url: &str) -> Result<Self, RecapCacheError> {
        let manager = RedisConnectionManager::new(redis_url)
            .map_err(|err| RecapCacheError::backend(err.to_string()))?;
        let pool = Pool::builder()
            .max_size(MAX_CONNECTIONS)
            .min_idle(None)
            .connection_timeout(CHECKOUT_TIMEOUT)
            .build_unchecked(manager);
        Ok(Self { pool })
    }

    /// Round-trip a `PING` to confirm the server answers.
    pub async fn ping(&self) -> Result<(), RecapCacheError> {
        let mut conn = self.checkout().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|err| RecapCacheError::backend(err.to_string()))?;
        Ok(())
    }

    async fn checkout(
        &self,
    ) -> Result<PooledConnection<'_, RedisConnectionManager>, RecapCacheError> {
        self.pool
            .get()
            .await
            .map_err(|err| RecapCacheError::backend(err.to_string()))
    }
}

/// Whole seconds for `SETEX`; sub-second TTLs round up to one second.
fn ttl_seconds(ttl: Duration) -> u64 {
    let seconds = ttl.as_secs();
    if ttl.subsec_nanos() > 0 {
        seconds.saturating_add(1)
    } else {
        seconds.max(1)
    }
}

#[async_trait]
impl RecapCache for RedisRecapCache {
    async fn get(&self, key: &RecapCacheKey) -> Result<Option<Vec<u8>>, RecapCacheError> {
        let mut conn = self.checkout().await?;
        conn.get(key.as_str())
            .await
            .map_err(|err| RecapCacheError::backend(err.to_string()))
    }

    async fn put(
        &self,
        key: &RecapCacheKey,
        payload: &[u8],
        ttl: Duration,
    ) -> Result<(), RecapCacheError> {
        let mut conn = self.checkout().await?;
        conn.set_ex::<_, _, ()>(key.as_str(), payload, ttl_seconds(ttl))
            .await
            .map_err(|err| RecapCacheError::backend(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use rstest::rstest;

    use super::*;
    use crate::domain::{
        CacheWarmer, DEFAULT_CACHE_TTL, UserRecap, UserRecapId, UserRecapView, WarmOutcome,
    };

    #[rstest]
    #[case(Duration::from_secs(3600), 3600)]
    #[case(Duration::from_millis(1500), 2)]
    #[case(Duration::from_millis(10), 1)]
    fn ttl_rounds_up_to_whole_seconds(#[case] ttl: Duration, #[case] expected: u64) {
        assert_eq!(ttl_seconds(ttl), expected);
    }

    #[rstest]
    fn malformed_url_is_a_backend_error() {
        let result = RedisRecapCache::connect("not a redis url");

        assert!(matches!(result, Err(RecapCacheError::Backend { .. })));
    }

    #[rstest]
    #[tokio::test]
    async fn dead_server_costs_one_timeout_per_run() {
        let cache = RedisRecapCache::connect("redis://127.0.0.1:1/").expect("valid url");
        let warmer = CacheWarmer::new(Arc::new(cache), DEFAULT_CACHE_TTL);
        let view = UserRecapView::compose(
            UserRecap::new(UserRecapId::new(1), "Dewi", 1),
            Vec::new(),
            Vec::new(),
        );

        let started = Instant::now();
        let mut outcomes = Vec::new();
        for id in 1..=3 {
            outcomes.push(warmer.warm(UserRecapId::new(id), &view).await);
        }

        assert_eq!(outcomes, vec![WarmOutcome::SkippedCacheUnavailable; 3]);
        assert!(started.elapsed() < CHECKOUT_TIMEOUT * 2);
    }

    #[rstest]
    #[tokio::test]
    async fn unreachable_server_fails_ping() {
        let cache = RedisRecapCache::connect("redis://127.0.0.1:1/").expect("valid url");

        let err = cache.ping().await.expect_err("nothing listens on port 1");

        assert!(matches!(err, RecapCacheError::Backend { .. }));
    }
}
