//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **persistence**: PostgreSQL recap store using Diesel ORM
//! - **cache**: Redis-backed recap cache
//! - **spreadsheet**: `.xlsx` row source
//!
//! Adapters are thin translators between domain types and
//! infrastructure-specific representations. They contain no business logic.

pub mod cache;
pub mod persistence;
pub mod spreadsheet;
