//! Core Model Trait - Base definition for database entities
//!
//! Defines the row decoding contract, table metadata, primary key handling,
//! timestamp and soft-delete markers, and the field payload used for writes.

use std::fmt::{Debug, Display};

use chrono::{DateTime, Utc};

use crate::backends::{DatabaseRow, DatabaseValue, Payload, Record};
use crate::database::Database;
use crate::error::ModelResult;
use crate::query::QueryBuilder;
use crate::relationships::Relationship;

/// Decoding of a result row into a value
pub trait FromRow: Sized + Send + 'static {
    fn from_row(row: &dyn DatabaseRow) -> ModelResult<Self>;
}

impl FromRow for Record {
    fn from_row(row: &dyn DatabaseRow) -> ModelResult<Self> {
        row.column_names()
            .into_iter()
            .map(|column| {
                let value = row.get_by_name(&column)?;
                Ok((column, value))
            })
            .collect()
    }
}

/// Core trait for database models with standard ORM operations
pub trait Model: FromRow + Clone + Debug + Sync {
    /// The type used for this model's primary key
    type PrimaryKey: Clone + Send + Sync + Debug + Display + Into<DatabaseValue>;

    /// Table name for this model
    fn table_name() -> &'static str;

    /// Primary key field name
    fn primary_key_name() -> &'static str {
        "id"
    }

    /// Get the primary key value for this model instance
    fn primary_key(&self) -> Option<Self::PrimaryKey>;

    /// Check if this model uses timestamps (created_at, updated_at)
    fn uses_timestamps() -> bool {
        false
    }

    /// Check if this model supports soft deletes
    fn uses_soft_deletes() -> bool {
        false
    }

    fn soft_delete_column() -> &'static str {
        "deleted_at"
    }

    fn set_created_at(&mut self, _timestamp: DateTime<Utc>) {}

    fn set_updated_at(&mut self, _timestamp: DateTime<Utc>) {}

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn set_deleted_at(&mut self, _timestamp: Option<DateTime<Utc>>) {}

    /// Soft deleted once the deletion timestamp is no longer in the future
    fn is_soft_deleted(&self) -> bool {
        self.deleted_at().map_or(false, |at| at <= Utc::now())
    }

    /// Field-value pairs written on create and update
    fn to_fields(&self) -> Payload;

    /// Relationship metadata by name, consulted by eager loading
    fn relationship(_name: &str) -> Option<Relationship> {
        None
    }

    /// Query builder over this model's table
    fn query(db: &Database) -> QueryBuilder<Self> {
        QueryBuilder::for_model(db.clone())
    }
}
