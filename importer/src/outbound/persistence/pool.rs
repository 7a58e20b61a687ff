//! bb8 pool of async Diesel PostgreSQL connections.
//!
//! A chunk transaction checks out one connection with [`DbPool::get_owned`]
//! and keeps it until commit or rollback. Point reads borrow a connection
//! with [`DbPool::get`] for the duration of the query.

use std::time::Duration;

use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};

const DEFAULT_MAX_SIZE: u32 = 10;
const IDLE_CONNECTIONS: u32 = 1;
const CHECKOUT_TIMEOUT: Duration = Duration::from_secs(30);

/// Pooled connection that owns its pool handle, so it can move into a
/// transaction value.
pub type OwnedConnection = PooledConnection<'static, AsyncPgConnection>;

/// Failures raised by [`DbPool`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("could not build the recap database pool: {message}")]
    Build { message: String },
    #[error("no recap database connection available: {message}")]
    Checkout { message: String },
}

impl PoolError {
    fn build(err: impl ToString) -> Self {
        Self::Build {
            message: err.to_string(),
        }
    }

    pub fn checkout(err: impl ToString) -> Self {
        Self::Checkout {
            message: err.to_string(),
        }
    }
}

/// Connection settings for [`DbPool::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    database_url: String,
    max_size: u32,
}

impl PoolConfig {
    /// Settings for `database_url` with room for ten connections.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_size: DEFAULT_MAX_SIZE,
        }
    }

    pub fn with_max_size(self, max_size: u32) -> Self {
        Self { max_size, ..self }
    }
}

/// Shared handle to the recap database.
#[derive(Clone)]
pub struct DbPool {
    inner: Pool<AsyncPgConnection>,
}

impl DbPool {
    /// Build the pool and open its idle connection.
    ///
    /// # Errors
    ///
    /// [`PoolError::Build`] when the URL is rejected or the first connection
    /// cannot be established.
    pub async fn new(config: PoolConfig) -> Result<Self, PoolError> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(config.database_url);
        let inner = Pool::builder()
            .max_size(config.max_size)
            .min_idle(Some(IDLE_CONNECTIONS.min(config.max_size)))
            .connection_timeout(CHECKOUT_TIMEOUT)
            .build(manager)
            .await
            .map_err(PoolError::build)?;
        Ok(Self { inner })
    }

    /// Borrow a connection for a single query.
    ///
    /// # Errors
    ///
    /// [`PoolError::Checkout`] when no connection frees up in time.
    pub async fn get(&self) -> Result<PooledConnection<'_, AsyncPgConnection>, PoolError> {
        self.inner.get().await.map_err(PoolError::checkout)
    }

    /// Check out a connection detached from the borrow of `self`.
    ///
    /// # Errors
    ///
    /// [`PoolError::Checkout`] when no connection frees up in time.
    pub async fn get_owned(&self) -> Result<OwnedConnection, PoolError> {
        self.inner.get_owned().await.map_err(PoolError::checkout)
    }
}
