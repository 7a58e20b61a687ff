//! Recap importer library.
//!
//! Loads user recap exports into PostgreSQL in fixed-size transactional
//! chunks and projects the composed views into Redis.

pub mod config;
pub mod domain;
pub mod outbound;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
