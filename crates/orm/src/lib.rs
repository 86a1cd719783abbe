//! # strata-orm: backend-agnostic ORM core
//!
//! A neutral query and schema model, a fluent query builder with soft-delete
//! scoping and batched eager loading, a migration batch engine, and an
//! owner-keyed connection pool with pipelined connections. Backends plug in
//! through the [`backends::DatabaseBackend`] contract; an in-memory backend
//! is always available and PostgreSQL comes with the `postgres` feature.
//!
//! ```ignore
//! use strata_orm::prelude::*;
//!
//! let db = Database::connect(DatabaseConfig::default())?;
//! let adults = db.table("users").where_gte("age", 18i64).order_by("name").all().await?;
//! ```

pub mod backends;
pub mod config;
pub mod connection;
pub mod database;
pub mod error;
pub mod loading;
pub mod logging;
pub mod migrations;
pub mod model;
pub mod query;
pub mod relationships;
pub mod schema;
pub mod sql;

// Re-export core traits and types
pub use backends::{
    Capabilities, DatabaseBackend, DatabaseBackendType, DatabaseConnection, DatabaseRow,
    DatabaseRowExt, DatabaseValue, MemoryBackend, Payload, Record, SqlDialect,
};
#[cfg(feature = "postgres")]
pub use backends::PostgresBackend;
pub use config::{DatabaseConfig, PoolConfig};
pub use connection::{Connection, ConnectionPool, OwnerId, PoolStats};
pub use database::{Database, DatabaseRegistry};
pub use error::*;
pub use loading::{EagerLoadCache, Loaded};
pub use logging::{CollectingQueryLogger, NullQueryLogger, QueryLogger, Statement, TracingQueryLogger};
pub use migrations::{Migration, MigrationRollback, Migrator};
pub use model::{FromRow, Model, ModelExt};
pub use query::{FilterBuilder, Query, QueryBuilder};
pub use relationships::{Relationship, RelationshipType};
pub use schema::{Schema, SchemaBuilder};

/// Common imports for application code
pub mod prelude {
    pub use crate::backends::{DatabaseRow, DatabaseRowExt, DatabaseValue, Payload, Record};
    pub use crate::config::DatabaseConfig;
    pub use crate::database::Database;
    pub use crate::error::{ModelError, OrmError, OrmResult};
    pub use crate::loading::Loaded;
    pub use crate::migrations::{Migration, MigrationRollback, Migrator};
    pub use crate::model::{FromRow, Model, ModelExt};
    pub use crate::query::{FilterBuilder, OrderDirection, QueryBuilder, QueryOperator};
    pub use crate::relationships::Relationship;
    pub use crate::schema::ReferentialAction;
}
