//! Point-in-time recap reads: cache first, store on a miss.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::ports::{RecapCache, RecapLookupQuery, RecapStore, RecapStoreError};
use crate::domain::{CacheWarmer, Error, UserRecapId, UserRecapView};

/// Read-through lookup that re-warms the cache after a miss.
pub struct RecapLookupService<S, C> {
    store: Arc<S>,
    warmer: CacheWarmer<C>,
}

impl<S, C> RecapLookupService<S, C> {
    pub fn new(store: Arc<S>, warmer: CacheWarmer<C>) -> Self {
        Self { store, warmer }
    }
}

#[async_trait]
impl<S, C> RecapLookupQuery for RecapLookupService<S, C>
where
    S: RecapStore,
    C: RecapCache,
{
    async fn find(&self, user_id: UserRecapId) -> Result<UserRecapView, Error> {
        if let Some(view) = self.warmer.read(user_id).await {
            return Ok(view);
        }
        let view = self
            .store
            .find_recap(user_id)
            .await
            .map_err(map_store_error)?
            .ok_or_else(|| Error::not_found(format!("no recap for user {user_id}")))?;
        self.warmer.warm(user_id, &view).await;
        Ok(view)
    }
}

fn map_store_error(error: RecapStoreError) -> Error {
    match error {
        RecapStoreError::Connection { message } => Error::service_unavailable(message),
        RecapStoreError::Query { message }
        | RecapStoreError::Constraint { message }
        | RecapStoreError::Transaction { message } => Error::internal(message),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::{fixture, rstest};

    use super::*;
    use crate::domain::ports::{MockRecapCache, RecapCacheKey};
    use crate::domain::{ErrorCode, FavoriteProduct, UserRecap};
    use crate::test_support::{InMemoryRecapCache, InMemoryRecapStore};

    const TTL: Duration = Duration::from_secs(3600);

    #[fixture]
    fn store() -> InMemoryRecapStore {
        let store = InMemoryRecapStore::new();
        store.seed(
            UserRecap::new(UserRecapId::new(8), "Tono", 5),
            vec![FavoriteProduct {
                product_name: "Kopi Tubruk".to_owned(),
                count_cups: 3,
                product_image: None,
            }],
            Vec::new(),
        );
        store
    }

    #[rstest]
    #[tokio::test]
    async fn miss_reads_store_and_rewarms(store: InMemoryRecapStore) {
        let cache = Arc::new(InMemoryRecapCache::new());
        let service =
            RecapLookupService::new(Arc::new(store), CacheWarmer::new(Arc::clone(&cache), TTL));

        let view = service.find(UserRecapId::new(8)).await.expect("found");

        assert_eq!(view.user_name, "Tono");
        assert_eq!(cache.view(UserRecapId::new(8)), Some(view));
        assert_eq!(cache.ttl(UserRecapId::new(8)), Some(TTL));
    }

    #[rstest]
    #[tokio::test]
    async fn hit_skips_the_store() {
        let cached = UserRecapView::compose(
            UserRecap::new(UserRecapId::new(8), "Cached", 1),
            Vec::new(),
            Vec::new(),
        );
        let payload = serde_json::to_vec(&cached).expect("encode");
        let mut cache = MockRecapCache::new();
        cache
            .expect_get()
            .times(1)
            .return_once(move |_| Ok(Some(payload)));
        cache.expect_put().never();
        let empty_store = InMemoryRecapStore::new();
        empty_store.fail_reads();
        let service = RecapLookupService::new(
            Arc::new(empty_store),
            CacheWarmer::new(Arc::new(cache), TTL),
        );

        let view = service.find(UserRecapId::new(8)).await.expect("cache hit");

        assert_eq!(view, cached);
    }

    #[rstest]
    #[tokio::test]
    async fn undecodable_entry_falls_back_to_store(store: InMemoryRecapStore) {
        let cache = Arc::new(InMemoryRecapCache::new());
        cache.insert_raw(&RecapCacheKey::for_user(UserRecapId::new(8)), b"{broken");
        let service =
            RecapLookupService::new(Arc::new(store), CacheWarmer::new(Arc::clone(&cache), TTL));

        let view = service.find(UserRecapId::new(8)).await.expect("found");

        assert_eq!(view.user_name, "Tono");
        assert_eq!(cache.view(UserRecapId::new(8)), Some(view));
    }

    #[rstest]
    #[tokio::test]
    async fn cache_outage_still_serves_from_store(store: InMemoryRecapStore) {
        let cache = Arc::new(InMemoryRecapCache::new());
        cache.set_failing(true);
        let service =
            RecapLookupService::new(Arc::new(store), CacheWarmer::new(Arc::clone(&cache), TTL));

        let view = service.find(UserRecapId::new(8)).await.expect("found");

        assert_eq!(view.user_name, "Tono");
        assert!(cache.is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn unknown_user_is_not_found(store: InMemoryRecapStore) {
        let service = RecapLookupService::new(
            Arc::new(store),
            CacheWarmer::<InMemoryRecapCache>::disabled(),
        );

        let err = service
            .find(UserRecapId::new(404))
            .await
            .expect_err("missing user");

        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[rstest]
    #[case(InMemoryRecapStore::set_unreachable, ErrorCode::ServiceUnavailable)]
    #[case(InMemoryRecapStore::fail_reads, ErrorCode::InternalError)]
    #[tokio::test]
    async fn store_failures_map_to_error_codes(
        #[case] break_store: fn(&InMemoryRecapStore),
        #[case] expected: ErrorCode,
    ) {
        let store = InMemoryRecapStore::new();
        break_store(&store);
        let service = RecapLookupService::new(
            Arc::new(store),
            CacheWarmer::<InMemoryRecapCache>::disabled(),
        );

        let err = service
            .find(UserRecapId::new(1))
            .await
            .expect_err("read failure");

        assert_eq!(err.code(), expected);
    }
}
