//! Command implementations.

pub mod admin;
pub mod migrate;
pub mod payment;
pub mod seed;
pub mod shop;

use dub_core::{ExternalId, ExternalIdError};
use dub_server::config::{self, ConfigError};
use dub_server::db::{self, RepositoryError, postgres::PgStore};
use dub_server::services::EconomyError;
use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Economy(#[from] EconomyError),

    #[error("Storage error: {0}")]
    Storage(#[from] RepositoryError),

    #[error("Invalid external id: {0}")]
    InvalidExternalId(#[from] ExternalIdError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0} catalog validation errors found")]
    InvalidCatalog(usize),
}

/// Connect to the economy database.
async fn connect() -> Result<PgPool, CliError> {
    let database_url = config::database_url_from_env()?;
    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&database_url).await?)
}

/// Connect and wrap the pool in the storage implementation.
async fn store() -> Result<PgStore, CliError> {
    Ok(PgStore::new(connect().await?))
}

fn parse_external_id(raw: &str) -> Result<ExternalId, CliError> {
    Ok(ExternalId::parse(raw.trim())?)
}
