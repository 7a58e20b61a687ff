//! Port interface for the key-value cache holding composed recap views.
use std::time::Duration;

use async_trait::async_trait;

use super::{RecapCacheKey, define_port_error};

define_port_error! {
    /// Errors surfaced by the caching adapter.
    pub enum RecapCacheError {
        /// Cache backend is unavailable or timing out.
        Backend { message: String } => "recap cache backend failure: {message}",
        /// Serialisation or deserialisation of cached content failed.
        Serialization { message: String } => "recap cache serialisation failed: {message}",
    }
}

/// Byte-oriented cache store. Payloads are JSON documents encoded by the
/// domain; adapters store them verbatim.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecapCache: Send + Sync {
    /// Read the payload stored under `key`, if present and unexpired.
    async fn get(&self, key: &RecapCacheKey) -> Result<Option<Vec<u8>>, RecapCacheError>;

    /// Store `payload` under `key`, expiring after `ttl`.
    async fn put(
        &self,
        key: &RecapCacheKey,
        payload: &[u8],
        ttl: Duration,
    ) -> Result<(), RecapCacheError>;
}
