//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;

use crate::event_store::StoreOptions;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL; the in-memory backend is used without one
    pub database_url: Option<String>,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Prefix of per-stream-type event tables
    pub table_prefix: String,

    /// Shared snapshot table
    pub snapshot_table: String,

    /// Environment (development, production)
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let defaults = StoreOptions::default();

        let database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());

        let database_max_connections = lookup("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?;

        let table_prefix = lookup("EVENT_TABLE_PREFIX").unwrap_or(defaults.table_prefix);

        let snapshot_table = lookup("SNAPSHOT_TABLE").unwrap_or(defaults.snapshot_collection);
        if snapshot_table.is_empty() {
            return Err(ConfigError::InvalidValue("SNAPSHOT_TABLE"));
        }

        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());

        Ok(Self {
            database_url,
            database_max_connections,
            table_prefix,
            snapshot_table,
            environment,
        })
    }

    /// Require a database URL
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::MissingEnv("DATABASE_URL"))
    }

    /// Collection naming for the event store
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            table_prefix: self.table_prefix.clone(),
            snapshot_collection: self.snapshot_table.clone(),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
