//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod recap_cache;
mod recap_cache_key;
mod recap_import_command;
mod recap_lookup_query;
mod recap_row_source;
mod recap_store;

#[cfg(test)]
pub use recap_cache::MockRecapCache;
pub use recap_cache::{RecapCache, RecapCacheError};
pub use recap_cache_key::RecapCacheKey;
pub use recap_import_command::{RecapImportCommand, RecapImportRequest};
pub use recap_lookup_query::RecapLookupQuery;
#[cfg(test)]
pub use recap_row_source::MockRecapRowSource;
pub use recap_row_source::{RawRecapRow, RecapRowSource, RecapRowSourceError};
pub use recap_store::{RecapStore, RecapStoreError, RecapTransaction};
