//! Relationship Metadata - how a model reaches its related rows

use std::fmt;

use crate::model::Model;

/// Defines the type of relationship between models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipType {
    /// One-to-one, foreign key on the related table
    HasOne,
    /// One-to-many, foreign key on the related table
    HasMany,
    /// Inverse side, foreign key on this model
    BelongsTo,
}

impl RelationshipType {
    /// Returns true if this relationship yields a collection
    pub fn is_collection(self) -> bool {
        matches!(self, Self::HasMany)
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HasOne => write!(f, "has_one"),
            Self::HasMany => write!(f, "has_many"),
            Self::BelongsTo => write!(f, "belongs_to"),
        }
    }
}

const DEFAULT_KEY: &str = "id";

/// A named relation from a model's rows to rows of `related_table`.
///
/// For `HasOne`/`HasMany`, `foreign_key` lives on the related table and points
/// at this model's `local_key`. For `BelongsTo`, `foreign_key` lives on this
/// model and points at the related table's `local_key`. An unset `local_key`
/// is filled with the declaring model's primary key when a model query
/// resolves the relation, and reads as `id` otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub name: String,
    pub relationship_type: RelationshipType,
    pub related_table: String,
    pub foreign_key: String,
    pub local_key: Option<String>,
    /// Soft-delete column of the related table, if it has one
    pub soft_delete_column: Option<String>,
}

impl Relationship {
    pub fn new(
        name: impl Into<String>,
        relationship_type: RelationshipType,
        related_table: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            relationship_type,
            related_table: related_table.into(),
            foreign_key: foreign_key.into(),
            local_key: None,
            soft_delete_column: None,
        }
    }

    fn of<R: Model>(name: &str, relationship_type: RelationshipType, foreign_key: &str) -> Self {
        let mut relationship = Self::new(name, relationship_type, R::table_name(), foreign_key);
        if relationship_type == RelationshipType::BelongsTo {
            relationship.local_key = Some(R::primary_key_name().to_string());
        }
        if R::uses_soft_deletes() {
            relationship.soft_delete_column = Some(R::soft_delete_column().to_string());
        }
        relationship
    }

    pub fn has_many<R: Model>(name: &str, foreign_key: &str) -> Self {
        Self::of::<R>(name, RelationshipType::HasMany, foreign_key)
    }

    pub fn has_one<R: Model>(name: &str, foreign_key: &str) -> Self {
        Self::of::<R>(name, RelationshipType::HasOne, foreign_key)
    }

    pub fn belongs_to<R: Model>(name: &str, foreign_key: &str) -> Self {
        Self::of::<R>(name, RelationshipType::BelongsTo, foreign_key)
    }

    pub fn with_local_key(mut self, local_key: impl Into<String>) -> Self {
        self.local_key = Some(local_key.into());
        self
    }

    /// Fill an unset local key with `primary_key`
    pub(crate) fn keyed_by(mut self, primary_key: &str) -> Self {
        if self.local_key.is_none() {
            self.local_key = Some(primary_key.to_string());
        }
        self
    }

    pub fn local_key(&self) -> &str {
        self.local_key.as_deref().unwrap_or(DEFAULT_KEY)
    }

    pub fn with_soft_deletes(mut self, column: impl Into<String>) -> Self {
        self.soft_delete_column = Some(column.into());
        self
    }

    /// Column read from parent rows to collect lookup keys
    pub fn parent_key(&self) -> &str {
        match self.relationship_type {
            RelationshipType::HasOne | RelationshipType::HasMany => self.local_key(),
            RelationshipType::BelongsTo => &self.foreign_key,
        }
    }

    /// Column of the related table matched against the collected keys
    pub fn related_key(&self) -> &str {
        match self.relationship_type {
            RelationshipType::HasOne | RelationshipType::HasMany => &self.foreign_key,
            RelationshipType::BelongsTo => self.local_key(),
        }
    }
}
