//! Table storage and mutation for the in-memory backend

use std::collections::HashMap;

use crate::backends::{DatabaseValue, Payload, Record};
use crate::error::{ModelError, OrmResult};
use crate::query::Query;
use crate::schema::{FieldDefinition, FieldType, ForeignKey, Schema, SchemaAction};

use super::evaluate::matches_all;

pub(crate) type Tables = HashMap<String, MemoryTable>;

#[derive(Debug, Clone, Default)]
pub(crate) struct MemoryTable {
    pub fields: Vec<FieldDefinition>,
    pub rows: Vec<Record>,
    pub unique_constraints: Vec<Vec<String>>,
    pub references: Vec<ForeignKey>,
    next_id: i64,
}

pub(crate) fn table<'a>(tables: &'a Tables, entity: &str) -> OrmResult<&'a MemoryTable> {
    tables
        .get(entity)
        .ok_or_else(|| ModelError::Database(format!("relation \"{}\" does not exist", entity)))
}

fn table_mut<'a>(tables: &'a mut Tables, entity: &str) -> OrmResult<&'a mut MemoryTable> {
    tables
        .get_mut(entity)
        .ok_or_else(|| ModelError::Database(format!("relation \"{}\" does not exist", entity)))
}

impl MemoryTable {
    fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    fn check_columns(&self, entity: &str, payload: &Payload) -> OrmResult<()> {
        for column in payload.columns() {
            if self.field(column).is_none() {
                return Err(ModelError::Database(format!(
                    "column \"{}\" of relation \"{}\" does not exist",
                    column, entity
                )));
            }
        }
        Ok(())
    }

    fn build_row(&mut self, entity: &str, payload: &Payload) -> OrmResult<Record> {
        self.check_columns(entity, payload)?;

        let mut record = Record::new();
        for field in &self.fields {
            let provided = payload.get(&field.name).cloned().map(DatabaseValue::normalized);
            let value = match provided {
                Some(value) if !value.is_null() => {
                    if field.field_type == FieldType::Increments {
                        if let Some(id) = value.as_i64() {
                            self.next_id = self.next_id.max(id);
                        }
                    }
                    value
                }
                _ if field.field_type == FieldType::Increments => {
                    self.next_id += 1;
                    DatabaseValue::Int64(self.next_id)
                }
                Some(null) => null,
                None => field.default.clone().unwrap_or(DatabaseValue::Null),
            };
            check_not_null(entity, field, &value)?;
            record.insert(field.name.clone(), value);
        }
        Ok(record)
    }

    fn unique_sets(&self) -> Vec<Vec<String>> {
        let mut sets: Vec<Vec<String>> = self
            .fields
            .iter()
            .filter(|f| f.unique || f.identifier)
            .map(|f| vec![f.name.clone()])
            .collect();
        sets.extend(self.unique_constraints.iter().cloned());
        sets
    }

    /// Check that the row at `index` in `rows` collides with no other row
    fn check_unique(entity: &str, sets: &[Vec<String>], rows: &[Record], index: usize) -> OrmResult<()> {
        let candidate = &rows[index];
        for set in sets {
            let key: Vec<&DatabaseValue> = set
                .iter()
                .map(|column| candidate.get(column).unwrap_or(&DatabaseValue::Null))
                .collect();
            if key.iter().any(|v| v.is_null()) {
                continue;
            }
            let collision = rows.iter().enumerate().any(|(i, other)| {
                i != index
                    && set
                        .iter()
                        .zip(key.iter())
                        .all(|(column, value)| other.get(column).map_or(false, |o| o == *value))
            });
            if collision {
                return Err(ModelError::Database(format!(
                    "duplicate key value violates unique constraint \"{}_{}_unique\"",
                    entity,
                    set.join("_")
                )));
            }
        }
        Ok(())
    }
}

fn check_not_null(entity: &str, field: &FieldDefinition, value: &DatabaseValue) -> OrmResult<()> {
    if value.is_null() && !field.nullable {
        return Err(ModelError::Database(format!(
            "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
            field.name, entity
        )));
    }
    Ok(())
}

/// Insert every payload row; all or nothing
pub(crate) fn insert(tables: &mut Tables, query: &Query) -> OrmResult<Vec<Record>> {
    let entity = query.entity();
    let table = table_mut(tables, entity)?;

    let mut staged = table.clone();
    let mut inserted = Vec::with_capacity(query.payload.len());
    let sets = staged.unique_sets();
    for payload in &query.payload {
        let record = staged.build_row(entity, payload)?;
        staged.rows.push(record.clone());
        MemoryTable::check_unique(entity, &sets, &staged.rows, staged.rows.len() - 1)?;
        inserted.push(record);
    }

    *table = staged;
    Ok(inserted)
}

/// Apply the query's changes to every matching row, returning each touched
/// row before and after the change
pub(crate) fn update(tables: &mut Tables, query: &Query) -> OrmResult<Vec<(Record, Record)>> {
    let entity = query.entity();
    let table = table_mut(tables, entity)?;
    let Some(changes) = query.changes() else {
        return Ok(Vec::new());
    };
    table.check_columns(entity, changes)?;

    let mut rows = table.rows.clone();
    let mut touched = Vec::new();
    for (index, row) in rows.iter_mut().enumerate() {
        if !matches_all(entity, row, &query.filters) {
            continue;
        }
        for (column, value) in changes.iter() {
            let value = value.clone().normalized();
            if let Some(field) = table.field(column) {
                check_not_null(entity, field, &value)?;
            }
            row.insert(column, value);
        }
        touched.push(index);
    }

    let sets = table.unique_sets();
    for index in &touched {
        MemoryTable::check_unique(entity, &sets, &rows, *index)?;
    }

    let changed = touched
        .iter()
        .map(|index| (table.rows[*index].clone(), rows[*index].clone()))
        .collect();
    table.rows = rows;
    Ok(changed)
}

/// Remove every matching row, returning the removed rows with their positions
pub(crate) fn delete(tables: &mut Tables, query: &Query) -> OrmResult<Vec<(usize, Record)>> {
    let entity = query.entity();
    let table = table_mut(tables, entity)?;
    let mut removed = Vec::new();
    let mut kept = Vec::with_capacity(table.rows.len());
    for (index, row) in std::mem::take(&mut table.rows).into_iter().enumerate() {
        if matches_all(entity, &row, &query.filters) {
            removed.push((index, row));
        } else {
            kept.push(row);
        }
    }
    table.rows = kept;
    Ok(removed)
}

/// Inverse of one change made inside a transaction
#[derive(Debug, Clone)]
pub(crate) enum Undo {
    /// Remove a row the transaction inserted
    Remove { entity: String, row: Record },
    /// Put back the prior version of a row the transaction updated
    Restore { entity: String, before: Record, after: Record },
    /// Put back a row the transaction deleted
    Reinsert { entity: String, index: usize, row: Record },
    /// Put back a whole table the transaction created, altered or dropped
    Table { entity: String, previous: Option<MemoryTable> },
}

/// Revert `journal`, newest change first. Rows written by other connections
/// in the meantime are left alone.
pub(crate) fn undo(tables: &mut Tables, journal: Vec<Undo>) {
    for entry in journal.into_iter().rev() {
        match entry {
            Undo::Remove { entity, row } => {
                if let Some(table) = tables.get_mut(&entity) {
                    if let Some(position) = table.rows.iter().position(|r| *r == row) {
                        table.rows.remove(position);
                    }
                }
            }
            Undo::Restore { entity, before, after } => {
                if let Some(table) = tables.get_mut(&entity) {
                    if let Some(current) = table.rows.iter_mut().find(|r| **r == after) {
                        *current = before;
                    }
                }
            }
            Undo::Reinsert { entity, index, row } => {
                if let Some(table) = tables.get_mut(&entity) {
                    let index = index.min(table.rows.len());
                    table.rows.insert(index, row);
                }
            }
            Undo::Table { entity, previous } => match previous {
                Some(table) => {
                    tables.insert(entity, table);
                }
                None => {
                    tables.remove(&entity);
                }
            },
        }
    }
}

/// Apply a schema change. Removing foreign key references is rejected by
/// the caller before this runs.
pub(crate) fn apply_schema(tables: &mut Tables, schema: &Schema) -> OrmResult<()> {
    let entity = schema.entity();
    match schema.action {
        SchemaAction::Create => {
            if tables.contains_key(entity) {
                return Err(ModelError::Schema(format!(
                    "relation \"{}\" already exists",
                    entity
                )));
            }
            let mut table = MemoryTable::default();
            for field in &schema.add_fields {
                if table.field(&field.name).is_some() {
                    return Err(ModelError::Schema(format!(
                        "column \"{}\" specified more than once",
                        field.name
                    )));
                }
                table.fields.push(field.clone());
            }
            for reference in &schema.add_references {
                if table.field(&reference.field).is_none() {
                    return Err(ModelError::Schema(format!(
                        "column \"{}\" referenced in foreign key constraint does not exist",
                        reference.field
                    )));
                }
            }
            table.references = schema.add_references.clone();
            table.unique_constraints = schema.unique_constraints.clone();
            tables.insert(entity.to_string(), table);
            Ok(())
        }
        SchemaAction::Alter => {
            let existing = tables
                .get(entity)
                .ok_or_else(|| ModelError::Schema(format!("relation \"{}\" does not exist", entity)))?;
            let mut table = existing.clone();

            for name in &schema.remove_fields {
                if table.field(name).is_none() {
                    return Err(ModelError::Schema(format!(
                        "column \"{}\" of relation \"{}\" does not exist",
                        name, entity
                    )));
                }
                table.fields.retain(|f| &f.name != name);
                table.references.retain(|r| &r.field != name);
                table.unique_constraints.retain(|set| !set.contains(name));
                for row in &mut table.rows {
                    row.remove(name);
                }
            }

            for field in &schema.add_fields {
                if table.field(&field.name).is_some() {
                    return Err(ModelError::Schema(format!(
                        "column \"{}\" of relation \"{}\" already exists",
                        field.name, entity
                    )));
                }
                for row in &mut table.rows {
                    let value = if field.field_type == FieldType::Increments {
                        table.next_id += 1;
                        DatabaseValue::Int64(table.next_id)
                    } else {
                        field.default.clone().unwrap_or(DatabaseValue::Null)
                    };
                    if value.is_null() && !field.nullable {
                        return Err(ModelError::Schema(format!(
                            "column \"{}\" contains null values",
                            field.name
                        )));
                    }
                    row.insert(field.name.clone(), value);
                }
                table.fields.push(field.clone());
            }

            table.references.extend(schema.add_references.iter().cloned());
            table.unique_constraints.extend(schema.unique_constraints.iter().cloned());
            tables.insert(entity.to_string(), table);
            Ok(())
        }
        SchemaAction::Drop => tables
            .remove(entity)
            .map(|_| ())
            .ok_or_else(|| ModelError::Schema(format!("table \"{}\" does not exist", entity))),
    }
}
