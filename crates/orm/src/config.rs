//! Database configuration
//!
//! Plain serde-friendly structs with defaults, fluent setters and an
//! environment loader.

use std::env;

use serde::{Deserialize, Serialize};

use crate::backends::DatabaseBackendType;
use crate::error::{ModelError, OrmResult, PoolError};

/// Default values for database configuration
pub struct DatabaseDefaults;

impl DatabaseDefaults {
    pub const NAME: &'static str = "default";
    pub const URL: &'static str = "memory://";
    pub const MAX_CONNECTIONS: usize = 10;
    pub const LOG_QUERIES: bool = false;
    pub const MIGRATIONS_TABLE: &'static str = "migrations";
}

/// Connection pool configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Upper bound on live connections
    pub max_connections: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DatabaseDefaults::MAX_CONNECTIONS,
        }
    }
}

impl PoolConfig {
    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn validate(&self) -> OrmResult<()> {
        if self.max_connections == 0 {
            return Err(PoolError::InvalidCapacity(self.max_connections).into());
        }
        Ok(())
    }
}

/// Configuration for one named database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Registry name
    pub name: String,
    /// Connection URL; `memory://` selects the in-memory backend
    pub url: String,
    pub pool: PoolConfig,
    /// Emit every statement through the tracing query logger
    pub log_queries: bool,
    /// Name of the migration log table
    pub migrations_table: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: DatabaseDefaults::NAME.to_string(),
            url: DatabaseDefaults::URL.to_string(),
            pool: PoolConfig::default(),
            log_queries: DatabaseDefaults::LOG_QUERIES,
            migrations_table: DatabaseDefaults::MIGRATIONS_TABLE.to_string(),
        }
    }
}

impl DatabaseConfig {
    /// Load from `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS`,
    /// `DATABASE_LOG_QUERIES` and `DATABASE_MIGRATIONS_TABLE`
    pub fn from_env() -> OrmResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> OrmResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("DATABASE_URL") {
            config.url = url;
        }
        if let Some(raw) = lookup("DATABASE_MAX_CONNECTIONS") {
            config.pool.max_connections = raw.parse::<usize>().map_err(|_| {
                ModelError::Configuration(format!(
                    "DATABASE_MAX_CONNECTIONS must be a positive integer, got '{}'",
                    raw
                ))
            })?;
        }
        if let Some(raw) = lookup("DATABASE_LOG_QUERIES") {
            config.log_queries = parse_flag(&raw).ok_or_else(|| {
                ModelError::Configuration(format!(
                    "DATABASE_LOG_QUERIES must be a boolean, got '{}'",
                    raw
                ))
            })?;
        }
        if let Some(table) = lookup("DATABASE_MIGRATIONS_TABLE") {
            config.migrations_table = table;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.pool.max_connections = max_connections;
        self
    }

    pub fn with_log_queries(mut self, log_queries: bool) -> Self {
        self.log_queries = log_queries;
        self
    }

    pub fn with_migrations_table(mut self, table: impl Into<String>) -> Self {
        self.migrations_table = table.into();
        self
    }

    /// Backend selected by the URL scheme
    pub fn backend_type(&self) -> OrmResult<DatabaseBackendType> {
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| ModelError::Configuration(format!("Invalid database URL '{}': {}", self.url, e)))?;
        parsed.scheme().parse()
    }

    pub fn validate(&self) -> OrmResult<()> {
        self.pool.validate()?;
        if self.migrations_table.trim().is_empty() {
            return Err(ModelError::Configuration(
                "Migrations table name must not be empty".to_string(),
            ));
        }
        self.backend_type().map(|_| ())
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
