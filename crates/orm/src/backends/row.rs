//! Result rows
//!
//! `DatabaseRow` is the read-only view every backend hands back for a result
//! row. `Record` is the owned, ordered implementation shared by all backends
//! and doubles as the field/value payload for inserts and updates.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};

use super::value::DatabaseValue;
use crate::error::{ModelError, OrmResult};

/// Abstract database row trait
pub trait DatabaseRow: Send + Sync {
    /// Get a column value by index
    fn get_by_index(&self, index: usize) -> OrmResult<DatabaseValue>;

    /// Get a column value by name
    fn get_by_name(&self, name: &str) -> OrmResult<DatabaseValue>;

    /// Get column count
    fn column_count(&self) -> usize;

    /// Get column names
    fn column_names(&self) -> Vec<String>;

    /// Convert row to JSON value
    fn to_json(&self) -> OrmResult<JsonValue>;

    /// Convert row to HashMap
    fn to_map(&self) -> OrmResult<HashMap<String, DatabaseValue>>;
}

/// Typed column access for decoding rows into models
pub trait DatabaseRowExt {
    /// Get a typed value from a column
    fn get<T>(&self, column: &str) -> OrmResult<T>
    where
        T: DeserializeOwned;

    /// Get a typed value, `None` when the column is missing or null
    fn try_get<T>(&self, column: &str) -> OrmResult<Option<T>>
    where
        T: DeserializeOwned;

    /// Decode the whole row through serde
    fn deserialize<T>(&self) -> OrmResult<T>
    where
        T: DeserializeOwned;
}

impl<R: DatabaseRow + ?Sized> DatabaseRowExt for R {
    fn get<T>(&self, column: &str) -> OrmResult<T>
    where
        T: DeserializeOwned,
    {
        let value = self.get_by_name(column)?;
        serde_json::from_value(value.to_json()).map_err(|e| {
            ModelError::Serialization(format!("Failed to deserialize column '{}': {}", column, e))
        })
    }

    fn try_get<T>(&self, column: &str) -> OrmResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        match self.get_by_name(column) {
            Ok(value) if value.is_null() => Ok(None),
            Ok(value) => serde_json::from_value(value.to_json()).map(Some).map_err(|e| {
                ModelError::Serialization(format!(
                    "Failed to deserialize column '{}': {}",
                    column, e
                ))
            }),
            Err(ModelError::ColumnNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn deserialize<T>(&self) -> OrmResult<T>
    where
        T: DeserializeOwned,
    {
        serde_json::from_value(self.to_json()?)
            .map_err(|e| ModelError::Serialization(format!("Failed to deserialize row: {}", e)))
    }
}

/// Ordered set of named values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: Vec<(String, DatabaseValue)>,
}

/// Field/value mapping carried by create and update queries.
pub type Payload = Record;

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn set<K, V>(mut self, column: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<DatabaseValue>,
    {
        self.insert(column, value);
        self
    }

    /// Insert or replace a column, keeping the original position on replace
    pub fn insert<K, V>(&mut self, column: K, value: V)
    where
        K: Into<String>,
        V: Into<DatabaseValue>,
    {
        let column = column.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.columns.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&DatabaseValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, column: &str) -> Option<&mut DatabaseValue> {
        self.columns
            .iter_mut()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn remove(&mut self, column: &str) -> Option<DatabaseValue> {
        let index = self.columns.iter().position(|(name, _)| name == column)?;
        Some(self.columns.remove(index).1)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DatabaseValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Build a record from a JSON object
    pub fn from_json(json: JsonValue) -> OrmResult<Self> {
        match json {
            JsonValue::Object(map) => Ok(map
                .into_iter()
                .map(|(k, v)| (k, DatabaseValue::from_json(v)))
                .collect()),
            other => Err(ModelError::Serialization(format!(
                "Expected a JSON object, got {}",
                other
            ))),
        }
    }
}

impl FromIterator<(String, DatabaseValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, DatabaseValue)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (column, value) in iter {
            record.insert(column, value);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, DatabaseValue);
    type IntoIter = std::vec::IntoIter<(String, DatabaseValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

impl DatabaseRow for Record {
    fn get_by_index(&self, index: usize) -> OrmResult<DatabaseValue> {
        self.columns
            .get(index)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| ModelError::ColumnNotFound(format!("index {}", index)))
    }

    fn get_by_name(&self, name: &str) -> OrmResult<DatabaseValue> {
        self.get(name)
            .cloned()
            .ok_or_else(|| ModelError::ColumnNotFound(name.to_string()))
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|(name, _)| name.clone()).collect()
    }

    fn to_json(&self) -> OrmResult<JsonValue> {
        let map: Map<String, JsonValue> = self
            .columns
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        Ok(JsonValue::Object(map))
    }

    fn to_map(&self) -> OrmResult<HashMap<String, DatabaseValue>> {
        Ok(self.columns.iter().cloned().collect())
    }
}
