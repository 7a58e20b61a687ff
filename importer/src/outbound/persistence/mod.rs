//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Diesel row structs (`models.rs`) and table definitions (`schema.rs`) are
//! internal details; only the store and the pool types are exported.
//!
//! # Example
//!
//! ```ignore
//! use recap_importer::outbound::persistence::{DbPool, DieselRecapStore, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/recaps")).await?;
//! let store = DieselRecapStore::new(pool);
//! ```

mod diesel_recap_store;
mod error_mapping;
mod models;
mod pool;
mod schema;

pub use diesel_recap_store::{DieselRecapStore, DieselRecapTransaction};
pub use pool::{DbPool, OwnedConnection, PoolConfig, PoolError};
