//! Import settings loaded via OrthoConfig.
//!
//! Values come from `RECAP_IMPORT_*` environment variables (and any
//! configuration file OrthoConfig discovers); the binary layers its
//! command-line flags on top before validating.

use std::env;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::{BatchSize, ImportConfig, ImportConfigError, RowErrorPolicy};

const DATABASE_URL_FALLBACK: &str = "DATABASE_URL";

/// Errors raised while turning settings into runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    /// No database URL was configured anywhere.
    #[error("database URL missing: set --database-url, RECAP_IMPORT_DATABASE_URL or DATABASE_URL")]
    MissingDatabaseUrl,
    /// A URL setting was present but blank.
    #[error("{setting} must not be empty when provided")]
    BlankUrl { setting: &'static str },
    /// The pool would hold no connections.
    #[error("pool max size must be greater than zero")]
    ZeroPoolSize,
    /// Batch size, TTL or row policy was invalid.
    #[error(transparent)]
    Import(#[from] ImportConfigError),
}

/// Raw import settings; every field is optional until validated.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "RECAP_IMPORT")]
pub struct ImportSettings {
    /// PostgreSQL connection URL.
    pub database_url: Option<String>,
    /// Redis connection URL; the cache is disabled when absent.
    pub redis_url: Option<String>,
    /// Rows per transaction.
    pub batch_size: Option<usize>,
    /// Lifetime of warmed cache entries.
    pub cache_ttl_seconds: Option<u64>,
    /// `isolate-row` or `abort-chunk`.
    pub row_error_policy: Option<String>,
    /// Upper bound on pooled database connections.
    #[ortho_config(default = 10)]
    pub pool_max_size: u32,
}

impl ImportSettings {
    /// Resolve the database URL, falling back to `DATABASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::BlankUrl`] for an empty value and
    /// [`SettingsError::MissingDatabaseUrl`] when nothing is set.
    pub fn database_url(&self) -> Result<String, SettingsError> {
        if let Some(value) = &self.database_url {
            return non_blank(value, "database URL").map(str::to_owned);
        }
        let from_env =
            env::var(DATABASE_URL_FALLBACK).map_err(|_| SettingsError::MissingDatabaseUrl)?;
        non_blank(&from_env, DATABASE_URL_FALLBACK).map(str::to_owned)
    }

    /// Return the Redis URL, if one was configured.
    pub fn redis_url(&self) -> Result<Option<&str>, SettingsError> {
        self.redis_url
            .as_deref()
            .map(|value| non_blank(value, "redis URL"))
            .transpose()
    }

    /// Return the pool size, rejecting an empty pool.
    pub fn pool_max_size(&self) -> Result<u32, SettingsError> {
        match self.pool_max_size {
            0 => Err(SettingsError::ZeroPoolSize),
            size => Ok(size),
        }
    }

    /// Build the validated [`ImportConfig`], applying defaults for unset
    /// values.
    pub fn import_config(&self) -> Result<ImportConfig, SettingsError> {
        let defaults = ImportConfig::default();
        let batch_size = self
            .batch_size
            .map(BatchSize::new)
            .transpose()?
            .unwrap_or(defaults.batch_size);
        let cache_ttl = self
            .cache_ttl_seconds
            .map_or(defaults.cache_ttl, Duration::from_secs);
        let row_error_policy = self
            .row_error_policy
            .as_deref()
            .map(str::parse::<RowErrorPolicy>)
            .transpose()?
            .unwrap_or(defaults.row_error_policy);
        Ok(ImportConfig::new(batch_size, cache_ttl, row_error_policy)?)
    }
}

fn non_blank<'a>(value: &'a str, setting: &'static str) -> Result<&'a str, SettingsError> {
    if value.trim().is_empty() {
        Err(SettingsError::BlankUrl { setting })
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for import settings parsing and validation.

    use super::*;
    use std::ffi::OsString;

    use env_lock::lock_env;
    use rstest::rstest;

    const VARS: [&str; 7] = [
        "RECAP_IMPORT_DATABASE_URL",
        "RECAP_IMPORT_REDIS_URL",
        "RECAP_IMPORT_BATCH_SIZE",
        "RECAP_IMPORT_CACHE_TTL_SECONDS",
        "RECAP_IMPORT_ROW_ERROR_POLICY",
        "RECAP_IMPORT_POOL_MAX_SIZE",
        "DATABASE_URL",
    ];

    fn load_from_empty_args() -> ImportSettings {
        ImportSettings::load_from_iter([OsString::from("recap-import")])
            .expect("config should load")
    }

    fn unset() -> ImportSettings {
        ImportSettings {
            database_url: None,
            redis_url: None,
            batch_size: None,
            cache_ttl_seconds: None,
            row_error_policy: None,
            pool_max_size: 10,
        }
    }

    fn cleared() -> Vec<(&'static str, Option<String>)> {
        VARS.iter().map(|name| (*name, None)).collect()
    }

    fn with(overrides: &[(&'static str, &str)]) -> Vec<(&'static str, Option<String>)> {
        let mut vars = cleared();
        for (name, value) in overrides {
            if let Some(slot) = vars.iter_mut().find(|(var, _)| var == name) {
                slot.1 = Some((*value).to_owned());
            }
        }
        vars
    }

    #[rstest]
    fn defaults_apply_when_nothing_is_set() {
        let _guard = lock_env(cleared());

        let settings = load_from_empty_args();
        let config = settings.import_config().expect("defaults are valid");

        assert_eq!(settings.pool_max_size, 10);
        assert_eq!(config, ImportConfig::default());
        assert_eq!(settings.redis_url(), Ok(None));
        assert_eq!(settings.pool_max_size(), Ok(10));
        assert_eq!(
            settings.database_url(),
            Err(SettingsError::MissingDatabaseUrl)
        );
    }

    #[rstest]
    fn environment_overrides_are_respected() {
        let _guard = lock_env(with(&[
            ("RECAP_IMPORT_DATABASE_URL", "postgres://db/recaps"),
            ("RECAP_IMPORT_REDIS_URL", "redis://cache:6379"),
            ("RECAP_IMPORT_BATCH_SIZE", "500"),
            ("RECAP_IMPORT_CACHE_TTL_SECONDS", "120"),
            ("RECAP_IMPORT_ROW_ERROR_POLICY", "abort-chunk"),
            ("RECAP_IMPORT_POOL_MAX_SIZE", "3"),
        ]));

        let settings = load_from_empty_args();
        let config = settings.import_config().expect("valid overrides");

        assert_eq!(config.batch_size.get(), 500);
        assert_eq!(config.cache_ttl, Duration::from_secs(120));
        assert_eq!(config.row_error_policy, RowErrorPolicy::AbortChunk);
        assert_eq!(settings.database_url().as_deref(), Ok("postgres://db/recaps"));
        assert_eq!(settings.redis_url(), Ok(Some("redis://cache:6379")));
        assert_eq!(settings.pool_max_size(), Ok(3));
    }

    #[rstest]
    fn database_url_falls_back_to_the_shared_variable() {
        let _guard = lock_env(with(&[("DATABASE_URL", "postgres://shared/recaps")]));

        let settings = load_from_empty_args();

        assert_eq!(
            settings.database_url().as_deref(),
            Ok("postgres://shared/recaps")
        );
    }

    #[rstest]
    #[case(
        ImportSettings { batch_size: Some(0), ..unset() },
        SettingsError::Import(ImportConfigError::ZeroBatchSize)
    )]
    #[case(
        ImportSettings { cache_ttl_seconds: Some(0), ..unset() },
        SettingsError::Import(ImportConfigError::ZeroCacheTtl)
    )]
    #[case(
        ImportSettings { row_error_policy: Some("skip".to_owned()), ..unset() },
        SettingsError::Import(ImportConfigError::UnknownRowErrorPolicy { value: "skip".to_owned() })
    )]
    fn invalid_import_values_are_rejected(
        #[case] settings: ImportSettings,
        #[case] expected: SettingsError,
    ) {
        assert_eq!(settings.import_config(), Err(expected));
    }

    #[rstest]
    fn blank_urls_and_empty_pools_are_rejected() {
        let settings = ImportSettings {
            database_url: Some("  ".to_owned()),
            redis_url: Some(String::new()),
            pool_max_size: 0,
            ..unset()
        };

        assert_eq!(
            settings.database_url(),
            Err(SettingsError::BlankUrl {
                setting: "database URL"
            })
        );
        assert_eq!(
            settings.redis_url(),
            Err(SettingsError::BlankUrl {
                setting: "redis URL"
            })
        );
        assert_eq!(settings.pool_max_size(), Err(SettingsError::ZeroPoolSize));
    }
}
