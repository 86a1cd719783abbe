//! Error types for the ORM system
//!
//! Provides the crate-wide error type covering query construction, connection
//! pooling, backend execution, migrations and eager loading.

use thiserror::Error;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// Error types for ORM operations
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// Backend execution error, surfaced unchanged from the driver
    #[error("Database error: {0}")]
    Database(String),

    /// Model not found in database
    #[error("Record not found in table '{0}'")]
    NotFound(String),

    /// Model validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Update or delete was requested for a model without an identifier
    #[error("Identifier required: '{entity}' has no value for '{field}'")]
    MissingPrimaryKey { entity: String, field: String },

    /// An aggregate ran over an empty set and no default was supplied
    #[error("No aggregate result for {function} on '{entity}'")]
    NoAggregateResult { entity: String, function: String },

    /// The backend does not support the requested operation
    #[error("Unsupported operation on {backend}: {operation}")]
    Unsupported { backend: String, operation: String },

    /// Relationship definition or loading failed
    #[error("Relationship error: {0}")]
    Relationship(String),

    /// A relation was read that was never requested with `with(...)`
    #[error("Relationship '{relation}' on '{entity}' was not eager loaded; request it with `with(\"{relation}\")`")]
    RelationshipNotLoaded { entity: String, relation: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A user migration failed to prepare or revert
    #[error("Migration '{name}' failed: {message}")]
    Migration { name: String, message: String },

    /// Connection level error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Connection pool error
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Schema error
    #[error("Schema error: {0}")]
    Schema(String),

    /// Query building error
    #[error("Query error: {0}")]
    Query(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Column missing from a result row
    #[error("Column '{0}' not found")]
    ColumnNotFound(String),
}

impl ModelError {
    /// Build an [`ModelError::Unsupported`] for a backend capability gap
    pub fn unsupported(backend: impl Into<String>, operation: impl Into<String>) -> Self {
        ModelError::Unsupported {
            backend: backend.into(),
            operation: operation.into(),
        }
    }

    /// Wrap a failure raised while preparing or reverting a migration
    pub fn migration(name: impl Into<String>, source: &ModelError) -> Self {
        ModelError::Migration {
            name: name.into(),
            message: source.to_string(),
        }
    }
}

/// Connection pool error types
#[derive(Debug, Clone, Error)]
pub enum PoolError {
    #[error("Connection acquisition failed: {0}")]
    AcquisitionFailed(String),

    #[error("Pool is closed")]
    PoolClosed,

    #[error("Pool capacity must be at least 1, got {0}")]
    InvalidCapacity(usize),

    #[error("Connection pipeline stopped before the operation completed")]
    PipelineStopped,
}

// Convert from serde_json errors
impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for ModelError {
    fn from(err: sqlx::Error) -> Self {
        ModelError::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_error_converts_into_model_error() {
        let err: ModelError = PoolError::AcquisitionFailed("refused".into()).into();
        assert!(matches!(err, ModelError::Pool(_)));
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn test_relationship_not_loaded_message_names_relation() {
        let err = ModelError::RelationshipNotLoaded {
            entity: "users".into(),
            relation: "posts".into(),
        };
        let message = err.to_string();
        assert!(message.contains("posts"));
        assert!(message.contains("with(\"posts\")"));
    }

    #[test]
    fn test_migration_error_keeps_source_message() {
        let source = ModelError::Schema("table exists".into());
        let err = ModelError::migration("CreateUsers", &source);
        assert_eq!(
            err.to_string(),
            "Migration 'CreateUsers' failed: Schema error: table exists"
        );
    }
}
