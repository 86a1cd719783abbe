//! Schema Model
//!
//! A backend-neutral description of one structural change to one entity.
//! Built through [`TableBuilder`](builder::TableBuilder) and handed to the
//! backend as a whole.

pub mod builder;

use std::fmt;

use crate::backends::DatabaseValue;

pub use builder::{ColumnBuilder, ForeignKeyBuilder, SchemaBuilder, TableBuilder};

/// Kind of structural change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaAction {
    Create,
    Alter,
    Drop,
}

impl fmt::Display for SchemaAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaAction::Create => write!(f, "create"),
            SchemaAction::Alter => write!(f, "alter"),
            SchemaAction::Drop => write!(f, "drop"),
        }
    }
}

/// Abstract column types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// Auto-incrementing integer identifier
    Increments,
    Integer,
    BigInteger,
    Float,
    Boolean,
    /// Variable-length string with an optional maximum length
    String(Option<u32>),
    Text,
    Uuid,
    Timestamp,
    Json,
    Binary,
}

/// A column added by a schema change
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
    pub unique: bool,
    pub default: Option<DatabaseValue>,
    pub identifier: bool,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let identifier = field_type == FieldType::Increments;
        Self {
            name: name.into(),
            field_type,
            nullable: false,
            unique: false,
            default: None,
            identifier,
        }
    }
}

/// Action taken on dependent rows when the referenced row changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferentialAction {
    /// Refuse the change
    #[default]
    Prevent,
    /// Set the referencing field to null
    Nullify,
    /// Apply the change to the referencing rows
    Cascade,
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferentialAction::Prevent => write!(f, "RESTRICT"),
            ReferentialAction::Nullify => write!(f, "SET NULL"),
            ReferentialAction::Cascade => write!(f, "CASCADE"),
        }
    }
}

/// Foreign key reference from `field` to `referenced_entity.referenced_field`
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub field: String,
    pub referenced_entity: String,
    pub referenced_field: String,
    pub on_update: ReferentialAction,
    pub on_delete: ReferentialAction,
}

impl ForeignKey {
    /// Constraint name used by SQL backends
    pub fn constraint_name(&self, entity: &str) -> String {
        format!("{}_{}_foreign", entity, self.field)
    }
}

/// One structural change to one entity
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    entity: String,
    pub action: SchemaAction,
    pub add_fields: Vec<FieldDefinition>,
    pub remove_fields: Vec<String>,
    pub add_references: Vec<ForeignKey>,
    /// Fields whose foreign key reference is dropped
    pub remove_references: Vec<String>,
    /// Composite unique constraints
    pub unique_constraints: Vec<Vec<String>>,
}

impl Schema {
    pub fn new(entity: impl Into<String>, action: SchemaAction) -> Self {
        Self {
            entity: entity.into(),
            action,
            add_fields: Vec::new(),
            remove_fields: Vec::new(),
            add_references: Vec::new(),
            remove_references: Vec::new(),
            unique_constraints: Vec::new(),
        }
    }

    /// Describe a new table
    pub fn create<F>(entity: &str, build: F) -> Self
    where
        F: FnOnce(&mut TableBuilder),
    {
        let mut table = TableBuilder::new(Schema::new(entity, SchemaAction::Create));
        build(&mut table);
        table.into_schema()
    }

    /// Describe changes to an existing table
    pub fn alter<F>(entity: &str, build: F) -> Self
    where
        F: FnOnce(&mut TableBuilder),
    {
        let mut table = TableBuilder::new(Schema::new(entity, SchemaAction::Alter));
        build(&mut table);
        table.into_schema()
    }

    /// Describe dropping a table
    pub fn drop(entity: &str) -> Self {
        Schema::new(entity, SchemaAction::Drop)
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.add_fields.iter().find(|f| f.name == name)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} table {}", self.action, self.entity)?;
        if !self.add_fields.is_empty() {
            let names: Vec<&str> = self.add_fields.iter().map(|f| f.name.as_str()).collect();
            write!(f, " add ({})", names.join(", "))?;
        }
        if !self.remove_fields.is_empty() {
            write!(f, " remove ({})", self.remove_fields.join(", "))?;
        }
        for reference in &self.add_references {
            write!(
                f,
                " references {} -> {}.{}",
                reference.field, reference.referenced_entity, reference.referenced_field
            )?;
        }
        if !self.remove_references.is_empty() {
            write!(f, " drop references ({})", self.remove_references.join(", "))?;
        }
        Ok(())
    }
}
