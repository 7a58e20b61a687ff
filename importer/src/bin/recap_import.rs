//! Load user recap workbooks into PostgreSQL and warm the Redis recap cache.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use mockable::DefaultClock;
use ortho_config::OrthoConfig;
use recap_importer::config::ImportSettings;
use recap_importer::domain::ports::{
    RecapImportCommand, RecapImportRequest, RecapLookupQuery, RecapStore,
};
use recap_importer::domain::{
    BatchCoordinator, CacheWarmer, Error, ErrorCode, ImportConfig, RecapImportService,
    RecapLookupService, UserRecapId,
};
use recap_importer::outbound::cache::RedisRecapCache;
use recap_importer::outbound::persistence::{DbPool, DieselRecapStore, PoolConfig};
use recap_importer::outbound::spreadsheet::CalamineRecapRowSource;
use tokio::runtime::Builder;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// `recap-import` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "recap-import",
    about = "Import user recap workbooks and warm the recap cache",
    version
)]
struct CliArgs {
    /// Database connection URL. Overrides RECAP_IMPORT_DATABASE_URL and
    /// DATABASE_URL.
    #[arg(long = "database-url", value_name = "url", global = true)]
    database_url: Option<String>,
    /// Redis connection URL. The cache is skipped when none is configured.
    #[arg(long = "redis-url", value_name = "url", global = true)]
    redis_url: Option<String>,
    /// Rows committed per transaction.
    #[arg(long = "batch-size", value_name = "rows", global = true)]
    batch_size: Option<usize>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Import every row of an `.xlsx` export.
    Import {
        /// Path to the workbook.
        #[arg(value_name = "path")]
        path: PathBuf,
    },
    /// Print the stored recap of one user as JSON.
    Show {
        #[arg(value_name = "user_id")]
        user_id: i64,
    },
}

impl CliArgs {
    /// Layer explicit flags over the loaded settings.
    fn apply_to(&self, settings: &mut ImportSettings) {
        if let Some(url) = &self.database_url {
            settings.database_url = Some(url.clone());
        }
        if let Some(url) = &self.redis_url {
            settings.redis_url = Some(url.clone());
        }
        if let Some(size) = self.batch_size {
            settings.batch_size = Some(size);
        }
    }
}

fn main() -> io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|error| io::Error::other(format!("create Tokio runtime: {error}")))?;
    runtime.block_on(async_main())
}

async fn async_main() -> io::Result<()> {
    let args = CliArgs::parse();
    let mut settings = ImportSettings::load_from_iter([OsString::from("recap-import")])
        .map_err(|error| io::Error::other(format!("load settings: {error}")))?;
    args.apply_to(&mut settings);

    let config = settings.import_config().map_err(invalid_input)?;
    let store = Arc::new(connect_store(&settings).await?);
    let warmer = build_warmer(&settings, &config).await?;

    match args.command {
        Command::Import { path } => {
            let coordinator = BatchCoordinator::new(store, warmer, config.row_error_policy);
            let service = RecapImportService::new(
                Arc::new(CalamineRecapRowSource),
                coordinator,
                config.batch_size,
                Arc::new(DefaultClock),
            );
            let report = service
                .import(RecapImportRequest::new(path))
                .await
                .map_err(|error| service_failure("import", &error))?;

            println!("{report}");
            if let Some(halt) = &report.halt {
                return Err(io::Error::other(format!(
                    "import halted at chunk {}/{}",
                    halt.chunk_number, report.chunks_total
                )));
            }
            Ok(())
        }
        Command::Show { user_id } => {
            let service = RecapLookupService::new(store, warmer);
            let view = service
                .find(UserRecapId::new(user_id))
                .await
                .map_err(|error| service_failure("lookup", &error))?;
            let json = serde_json::to_string_pretty(&view)
                .map_err(|error| io::Error::other(format!("encode recap: {error}")))?;
            println!("{json}");
            Ok(())
        }
    }
}

async fn connect_store(settings: &ImportSettings) -> io::Result<DieselRecapStore> {
    let database_url = settings.database_url().map_err(invalid_input)?;
    let pool_size = settings.pool_max_size().map_err(invalid_input)?;
    let pool = DbPool::new(PoolConfig::new(database_url).with_max_size(pool_size))
        .await
        .map_err(|error| io::Error::other(format!("create database pool: {error}")))?;
    let store = DieselRecapStore::new(pool);
    store
        .ping()
        .await
        .map_err(|error| io::Error::other(format!("database unreachable: {error}")))?;
    Ok(store)
}

async fn build_warmer(
    settings: &ImportSettings,
    config: &ImportConfig,
) -> io::Result<CacheWarmer<RedisRecapCache>> {
    let Some(redis_url) = settings.redis_url().map_err(invalid_input)? else {
        info!("no redis URL configured; cache warming disabled");
        return Ok(CacheWarmer::disabled());
    };
    let cache = RedisRecapCache::connect(redis_url).map_err(invalid_input)?;
    if let Err(error) = cache.ping().await {
        warn!(%error, "redis unreachable at startup; cache warming disabled");
        return Ok(CacheWarmer::disabled());
    }
    Ok(CacheWarmer::new(Arc::new(cache), config.cache_ttl))
}

fn service_failure(operation: &str, error: &Error) -> io::Error {
    let kind = match error.code() {
        ErrorCode::NotFound => io::ErrorKind::NotFound,
        ErrorCode::InvalidRequest => io::ErrorKind::InvalidInput,
        _ => io::ErrorKind::Other,
    };
    io::Error::new(kind, format!("{operation} failed ({}): {error}", error.code()))
}

fn invalid_input(error: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, error.to_string())
}
