//! Core Database Backend Traits
//!
//! The driver boundary: a backend opens raw connections, and a raw
//! connection executes neutral `Query` and `Schema` values. Backends never
//! see builders, models or pools.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::row::Record;
use crate::error::{ModelError, OrmResult};
use crate::logging::Statement;
use crate::query::Query;
use crate::schema::Schema;

/// Callback receiving each result row, in order.
pub type RowSink<'a> = &'a mut (dyn FnMut(Record) -> OrmResult<()> + Send);

/// Raw connection to a database.
///
/// Methods are only ever called from the connection's own pipeline task, one
/// operation at a time.
#[async_trait]
pub trait DatabaseConnection: Send {
    /// Execute a query, handing each produced row to `on_row`.
    ///
    /// Read queries produce the selected rows, create queries produce the
    /// inserted rows when the backend can return them. Update and delete
    /// produce nothing.
    async fn execute(&mut self, query: &Query, on_row: RowSink<'_>) -> OrmResult<()>;

    /// Apply a schema change
    async fn execute_schema(&mut self, schema: &Schema) -> OrmResult<()>;

    /// Begin a transaction
    async fn begin_transaction(&mut self) -> OrmResult<()>;

    /// Commit the open transaction
    async fn commit(&mut self) -> OrmResult<()>;

    /// Roll back the open transaction
    async fn rollback(&mut self) -> OrmResult<()>;

    /// Flag the driver raises once the connection is gone. The pool reads it
    /// without going through the connection's pipeline.
    fn closed_flag(&self) -> Arc<AtomicBool>;

    /// Whether the underlying connection is gone
    fn is_closed(&self) -> bool {
        self.closed_flag().load(Ordering::SeqCst)
    }

    /// Close the connection
    async fn close(&mut self) -> OrmResult<()>;
}

/// Database backend: the factory for raw connections plus its description.
#[async_trait]
pub trait DatabaseBackend: Send + Sync + 'static {
    /// Get the backend type
    fn backend_type(&self) -> DatabaseBackendType;

    /// What this backend can do
    fn capabilities(&self) -> &'static Capabilities;

    /// Open a new raw connection
    async fn connect(&self) -> OrmResult<Box<dyn DatabaseConnection>>;

    /// Describe a query for the query log
    fn describe(&self, query: &Query) -> Statement {
        Statement::describe(query)
    }
}

/// Backend feature flags consulted by the builder and migration layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// The backend speaks SQL.
    pub sql: bool,

    /// Transactions can be opened on a single connection.
    pub transactions: bool,

    /// Foreign key references can be dropped from an existing table.
    pub drop_foreign_keys: bool,

    /// Create queries hand back the inserted rows.
    pub returning: bool,
}

impl Capabilities {
    /// In-memory backend capabilities
    pub const MEMORY: Self = Self {
        sql: false,
        transactions: true,
        drop_foreign_keys: false,
        returning: true,
    };

    /// PostgreSQL capabilities
    pub const POSTGRESQL: Self = Self {
        sql: true,
        transactions: true,
        drop_foreign_keys: true,
        returning: true,
    };

    /// Fail with `Unsupported` unless `enabled`
    pub fn require(
        enabled: bool,
        backend: DatabaseBackendType,
        operation: &str,
    ) -> OrmResult<()> {
        if enabled {
            Ok(())
        } else {
            Err(ModelError::unsupported(backend.to_string(), operation))
        }
    }
}

/// Database backend type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseBackendType {
    Memory,
    PostgreSQL,
}

impl DatabaseBackendType {
    /// SQL dialect spoken by this backend, if any
    pub fn sql_dialect(&self) -> Option<SqlDialect> {
        match self {
            DatabaseBackendType::Memory => None,
            DatabaseBackendType::PostgreSQL => Some(SqlDialect::PostgreSQL),
        }
    }
}

impl fmt::Display for DatabaseBackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseBackendType::Memory => write!(f, "memory"),
            DatabaseBackendType::PostgreSQL => write!(f, "postgresql"),
        }
    }
}

impl FromStr for DatabaseBackendType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(DatabaseBackendType::Memory),
            "postgresql" | "postgres" => Ok(DatabaseBackendType::PostgreSQL),
            _ => Err(ModelError::Configuration(format!(
                "Unsupported database backend: {}",
                s
            ))),
        }
    }
}

/// SQL dialect enumeration for generating database-specific SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl SqlDialect {
    /// Get the parameter placeholder for the parameter at `index` (zero based)
    pub fn parameter_placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::PostgreSQL => format!("${}", index + 1),
            SqlDialect::MySQL | SqlDialect::SQLite => "?".to_string(),
        }
    }

    /// Get the quote character for identifiers in this dialect
    pub fn identifier_quote(&self) -> char {
        match self {
            SqlDialect::PostgreSQL | SqlDialect::SQLite => '"',
            SqlDialect::MySQL => '`',
        }
    }

    /// Quote an identifier, splitting `table.column` into its parts
    pub fn quote_identifier(&self, identifier: &str) -> String {
        let quote = self.identifier_quote();
        identifier
            .split('.')
            .map(|part| {
                if part == "*" {
                    part.to_string()
                } else {
                    let escaped = part.replace(quote, &format!("{}{}", quote, quote));
                    format!("{}{}{}", quote, escaped, quote)
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Whether `INSERT ... RETURNING` is available
    pub fn supports_returning(&self) -> bool {
        matches!(self, SqlDialect::PostgreSQL | SqlDialect::SQLite)
    }

    /// Check if this dialect supports boolean types
    pub fn supports_boolean(&self) -> bool {
        match self {
            SqlDialect::PostgreSQL | SqlDialect::SQLite => true,
            SqlDialect::MySQL => false,
        }
    }

    /// Get the auto-increment primary key column type for this dialect
    pub fn auto_increment(&self) -> &'static str {
        match self {
            SqlDialect::PostgreSQL => "SERIAL PRIMARY KEY",
            SqlDialect::MySQL => "INT AUTO_INCREMENT PRIMARY KEY",
            SqlDialect::SQLite => "INTEGER PRIMARY KEY AUTOINCREMENT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_type_parsing() {
        assert_eq!(
            "postgres".parse::<DatabaseBackendType>().unwrap(),
            DatabaseBackendType::PostgreSQL
        );
        assert_eq!(
            "MEMORY".parse::<DatabaseBackendType>().unwrap(),
            DatabaseBackendType::Memory
        );
        assert!("oracle".parse::<DatabaseBackendType>().is_err());
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(
            SqlDialect::PostgreSQL.quote_identifier("users.id"),
            "\"users\".\"id\""
        );
        assert_eq!(SqlDialect::MySQL.quote_identifier("posts.*"), "`posts`.*");
    }

    #[test]
    fn test_capability_gate() {
        assert!(Capabilities::require(
            Capabilities::POSTGRESQL.drop_foreign_keys,
            DatabaseBackendType::PostgreSQL,
            "drop foreign key"
        )
        .is_ok());

        let err = Capabilities::require(
            Capabilities::MEMORY.drop_foreign_keys,
            DatabaseBackendType::Memory,
            "drop foreign key",
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::Unsupported { .. }));
    }
}
