//! Schema Builder - DSL for describing and applying schema changes
//!
//! ```ignore
//! db.schema().create("posts", |t| {
//!     t.increments("id");
//!     t.string("title", Some(200));
//!     t.integer("user_id");
//!     t.foreign("user_id").references("users", "id").on_delete(ReferentialAction::Cascade);
//!     t.timestamps();
//! }).await?;
//! ```

use tracing::debug;

use super::{FieldDefinition, FieldType, ForeignKey, ReferentialAction, Schema};
use crate::backends::DatabaseValue;
use crate::database::Database;
use crate::error::OrmResult;

/// Applies schema changes through a database handle
pub struct SchemaBuilder {
    db: Database,
}

impl SchemaBuilder {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a new table
    pub async fn create<F>(&self, entity: &str, build: F) -> OrmResult<()>
    where
        F: FnOnce(&mut TableBuilder),
    {
        self.apply(Schema::create(entity, build)).await
    }

    /// Modify an existing table
    pub async fn alter<F>(&self, entity: &str, build: F) -> OrmResult<()>
    where
        F: FnOnce(&mut TableBuilder),
    {
        self.apply(Schema::alter(entity, build)).await
    }

    /// Drop a table
    pub async fn drop(&self, entity: &str) -> OrmResult<()> {
        self.apply(Schema::drop(entity)).await
    }

    /// Apply a prepared schema change
    pub async fn apply(&self, schema: Schema) -> OrmResult<()> {
        debug!(entity = schema.entity(), action = %schema.action, "Applying schema change");
        self.db.execute_schema(schema).await
    }
}

/// Accumulates one schema change
pub struct TableBuilder {
    schema: Schema,
}

impl TableBuilder {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    pub fn into_schema(self) -> Schema {
        self.schema
    }

    /// Add a column of any type
    pub fn column(&mut self, name: &str, field_type: FieldType) -> ColumnBuilder<'_> {
        self.schema.add_fields.push(FieldDefinition::new(name, field_type));
        let index = self.schema.add_fields.len() - 1;
        ColumnBuilder {
            field: &mut self.schema.add_fields[index],
        }
    }

    /// Auto-increment identifier column
    pub fn increments(&mut self, name: &str) -> ColumnBuilder<'_> {
        self.column(name, FieldType::Increments)
    }

    pub fn string(&mut self, name: &str, length: Option<u32>) -> ColumnBuilder<'_> {
        self.column(name, FieldType::String(length))
    }

    pub fn text(&mut self, name: &str) -> ColumnBuilder<'_> {
        self.column(name, FieldType::Text)
    }

    pub fn integer(&mut self, name: &str) -> ColumnBuilder<'_> {
        self.column(name, FieldType::Integer)
    }

    pub fn big_integer(&mut self, name: &str) -> ColumnBuilder<'_> {
        self.column(name, FieldType::BigInteger)
    }

    pub fn float(&mut self, name: &str) -> ColumnBuilder<'_> {
        self.column(name, FieldType::Float)
    }

    pub fn boolean(&mut self, name: &str) -> ColumnBuilder<'_> {
        self.column(name, FieldType::Boolean)
    }

    pub fn uuid(&mut self, name: &str) -> ColumnBuilder<'_> {
        self.column(name, FieldType::Uuid)
    }

    pub fn timestamp(&mut self, name: &str) -> ColumnBuilder<'_> {
        self.column(name, FieldType::Timestamp)
    }

    pub fn json(&mut self, name: &str) -> ColumnBuilder<'_> {
        self.column(name, FieldType::Json)
    }

    pub fn binary(&mut self, name: &str) -> ColumnBuilder<'_> {
        self.column(name, FieldType::Binary)
    }

    /// Nullable `created_at` and `updated_at` columns
    pub fn timestamps(&mut self) -> &mut Self {
        self.timestamp("created_at").nullable();
        self.timestamp("updated_at").nullable();
        self
    }

    /// Nullable `deleted_at` column
    pub fn soft_deletes(&mut self) -> &mut Self {
        self.timestamp("deleted_at").nullable();
        self
    }

    /// Unique constraint across several columns
    pub fn unique(&mut self, columns: &[&str]) -> &mut Self {
        self.schema
            .unique_constraints
            .push(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Foreign key reference from `field`
    pub fn foreign(&mut self, field: &str) -> ForeignKeyBuilder<'_> {
        self.schema.add_references.push(ForeignKey {
            field: field.to_string(),
            referenced_entity: String::new(),
            referenced_field: "id".to_string(),
            on_update: ReferentialAction::default(),
            on_delete: ReferentialAction::default(),
        });
        let index = self.schema.add_references.len() - 1;
        ForeignKeyBuilder {
            reference: &mut self.schema.add_references[index],
        }
    }

    pub fn drop_column(&mut self, name: &str) -> &mut Self {
        self.schema.remove_fields.push(name.to_string());
        self
    }

    /// Drop the foreign key reference held by `field`
    pub fn drop_foreign(&mut self, field: &str) -> &mut Self {
        self.schema.remove_references.push(field.to_string());
        self
    }
}

/// Modifiers for the column just added
pub struct ColumnBuilder<'a> {
    field: &'a mut FieldDefinition,
}

impl<'a> ColumnBuilder<'a> {
    pub fn nullable(self) -> Self {
        self.field.nullable = true;
        self
    }

    pub fn unique(self) -> Self {
        self.field.unique = true;
        self
    }

    pub fn default<V: Into<DatabaseValue>>(self, value: V) -> Self {
        self.field.default = Some(value.into());
        self
    }

    /// Mark as the entity identifier
    pub fn primary(self) -> Self {
        self.field.identifier = true;
        self
    }
}

/// Completes a foreign key reference
pub struct ForeignKeyBuilder<'a> {
    reference: &'a mut ForeignKey,
}

impl<'a> ForeignKeyBuilder<'a> {
    pub fn references(self, entity: &str, field: &str) -> Self {
        self.reference.referenced_entity = entity.to_string();
        self.reference.referenced_field = field.to_string();
        self
    }

    /// Set both update and delete actions
    pub fn on(self, action: ReferentialAction) -> Self {
        self.reference.on_update = action;
        self.reference.on_delete = action;
        self
    }

    pub fn on_update(self, action: ReferentialAction) -> Self {
        self.reference.on_update = action;
        self
    }

    pub fn on_delete(self, action: ReferentialAction) -> Self {
        self.reference.on_delete = action;
        self
    }
}
