//! Configuration management
//!
//! All settings are fixed when the indexer is built and read-only while it
//! runs. Dry-run is not a setting: it is passed to each indexing call as
//! [`Execution`](crate::engine::Execution).

use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::error::{IndexError, IndexResult};
use crate::geometry::GeometryMode;

// ============================================================================
// Database Configuration Constants
// ============================================================================

/// Default PostGIS host.
pub const DEFAULT_DATABASE_HOST: &str = "localhost";

/// Default PostGIS port.
pub const DEFAULT_DATABASE_PORT: u16 = 5432;

/// Default database user.
pub const DEFAULT_DATABASE_USER: &str = "postgres";

/// Default database name.
pub const DEFAULT_DATABASE_NAME: &str = "whosonfirst";

/// Default maximum number of concurrent database sessions.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default timeout for opening a new session, in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Database connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    /// Capacity of the connection pool
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DATABASE_HOST.to_string(),
            port: DEFAULT_DATABASE_PORT,
            user: DEFAULT_DATABASE_USER.to_string(),
            password: String::new(),
            dbname: DEFAULT_DATABASE_NAME.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl DatabaseConfig {
    /// Load settings from `WOF_PGIS_*` environment variables, falling back
    /// to defaults for anything unset
    pub fn from_env() -> IndexResult<Self> {
        let defaults = Self::default();

        let config = Self {
            host: std::env::var("WOF_PGIS_HOST").unwrap_or(defaults.host),
            port: parse_env("WOF_PGIS_PORT")?.unwrap_or(defaults.port),
            user: std::env::var("WOF_PGIS_USER").unwrap_or(defaults.user),
            password: std::env::var("WOF_PGIS_PASSWORD").unwrap_or(defaults.password),
            dbname: std::env::var("WOF_PGIS_DATABASE").unwrap_or(defaults.dbname),
            max_connections: parse_env("WOF_PGIS_MAX_CONNECTIONS")?
                .unwrap_or(defaults.max_connections),
            connect_timeout_secs: parse_env("WOF_PGIS_CONNECT_TIMEOUT")?
                .unwrap_or(defaults.connect_timeout_secs),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> IndexResult<()> {
        if self.host.is_empty() {
            return Err(IndexError::config("Database host cannot be empty"));
        }

        if self.dbname.is_empty() {
            return Err(IndexError::config("Database name cannot be empty"));
        }

        if self.max_connections == 0 {
            return Err(IndexError::config("Database max_connections must be greater than 0"));
        }

        Ok(())
    }

    /// Connection options for sqlx; TLS is disabled as for a local loader
    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.dbname)
            .ssl_mode(PgSslMode::Disable);

        if self.password.is_empty() {
            options
        } else {
            options.password(&self.password)
        }
    }
}

/// Settings that shape how each record is indexed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexerOptions {
    /// Geometry strategy, fixed for the lifetime of the indexer
    pub geometry: GeometryMode,

    /// Log each statement before it is executed
    pub verbose: bool,

    /// Maximum number of concurrently running indexing tasks in batch drivers
    pub workers: usize,
}

impl Default for IndexerOptions {
    fn default() -> Self {
        Self {
            geometry: GeometryMode::Default,
            verbose: false,
            workers: default_workers(),
        }
    }
}

impl IndexerOptions {
    pub fn validate(&self) -> IndexResult<()> {
        if self.workers == 0 {
            return Err(IndexError::config("Worker count must be greater than 0"));
        }

        if let GeometryMode::Unsupported(mode) = &self.geometry {
            tracing::warn!(mode = %mode, "Unsupported geometry mode, every record will fail");
        }

        Ok(())
    }
}

/// Full client configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexerConfig {
    pub database: DatabaseConfig,
    pub options: IndexerOptions,
}

impl IndexerConfig {
    pub fn validate(&self) -> IndexResult<()> {
        self.database.validate()?;
        self.options.validate()
    }
}

/// Number of processing units available to this process
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn parse_env<T: std::str::FromStr>(key: &str) -> IndexResult<Option<T>> {
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| IndexError::config(format!("{} has an invalid value '{}'", key, value))),
        Err(_) => Ok(None),
    }
}
