//! Query Builder mutations
//!
//! Bulk mutations apply to every row matching the accumulated filters and the
//! soft-delete scope; joins, sorts and ranges do not apply. Model mutations
//! target a single row by identifier.

use chrono::Utc;

use crate::backends::{DatabaseValue, Payload};
use crate::error::{ModelError, OrmResult};
use crate::model::{FromRow, Model};

use super::builder::{QueryBuilder, SoftDeleteScope};
use super::statement::Query;
use super::types::*;

impl<M> QueryBuilder<M> {
    fn mutation(&self, action: QueryAction, payload: Vec<Payload>) -> Query {
        let prepared = self.prepared();
        let mut query = Query::new(prepared.entity(), action);
        query.filters = prepared.filters;
        query.payload = payload;
        query
    }

    fn by_identifier(&self, action: QueryAction, id: DatabaseValue, payload: Vec<Payload>) -> Query {
        let mut query = Query::new(self.entity(), action);
        query.filters.push(Filter::predicate(
            self.primary_key.as_str(),
            QueryOperator::Equal,
            Operand::Value(id),
        ));
        query.payload = payload;
        query
    }

    /// Set `values` on every matching row
    pub async fn update_all(&self, values: Payload) -> OrmResult<()> {
        if values.is_empty() {
            return Ok(());
        }
        self.db
            .fetch_all(self.mutation(QueryAction::Update, vec![values]))
            .await
            .map(|_| ())
    }

    /// Delete every matching row; soft-deletable entities are stamped instead
    pub async fn delete_all(&self) -> OrmResult<()> {
        match &self.soft_delete_column {
            Some(column) => {
                let stamp = Payload::new().set(column.as_str(), Utc::now());
                self.update_all(stamp).await
            }
            None => self.force_delete_all().await,
        }
    }

    /// Physically delete every matching row
    pub async fn force_delete_all(&self) -> OrmResult<()> {
        self.db
            .fetch_all(self.mutation(QueryAction::Delete, Vec::new()))
            .await
            .map(|_| ())
    }

    /// Clear the deletion timestamp of matching soft-deleted rows
    pub async fn restore_all(&self) -> OrmResult<()> {
        let column = self.soft_delete_column.clone().ok_or_else(|| {
            ModelError::Query(format!("'{}' does not use soft deletes", self.entity()))
        })?;
        let mut scoped = self.copy();
        if scoped.scope == SoftDeleteScope::Exclude {
            scoped.scope = SoftDeleteScope::Only;
        }
        scoped
            .update_all(Payload::new().set(column, DatabaseValue::Null))
            .await
    }
}

impl<M: FromRow> QueryBuilder<M> {
    /// Insert `values` as new rows, returning the stored rows when the
    /// backend reports them
    pub async fn insert(&self, values: Vec<Payload>) -> OrmResult<Vec<M>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let mut query = Query::new(self.entity(), QueryAction::Create);
        query.payload = values;
        self.db
            .fetch_all(query)
            .await?
            .iter()
            .map(|record| M::from_row(record))
            .collect()
    }
}

impl<M: Model> QueryBuilder<M> {
    fn identifier_required(&self) -> ModelError {
        ModelError::MissingPrimaryKey {
            entity: self.entity().to_string(),
            field: self.primary_key.clone(),
        }
    }

    /// Insert `model`, stamping timestamps. A null identifier is left to the
    /// backend to assign.
    pub async fn create(&self, model: &M) -> OrmResult<M> {
        let mut model = model.clone();
        if M::uses_timestamps() {
            let now = Utc::now();
            model.set_created_at(now);
            model.set_updated_at(now);
        }

        let mut fields = model.to_fields();
        if fields.get(&self.primary_key).map_or(false, DatabaseValue::is_null) {
            fields.remove(&self.primary_key);
        }
        let mut stored = self.insert(vec![fields]).await?;
        Ok(stored.pop().unwrap_or(model))
    }

    /// Write every field of `model` to the row identified by `original_id`,
    /// or by the model's own identifier when `None`. Passing the original
    /// identifier allows the identifier itself to change.
    pub async fn update(&self, model: &M, original_id: Option<M::PrimaryKey>) -> OrmResult<M> {
        let changes_key = original_id.is_some();
        let id = original_id
            .or_else(|| model.primary_key())
            .ok_or_else(|| self.identifier_required())?;

        let mut model = model.clone();
        if M::uses_timestamps() {
            model.set_updated_at(Utc::now());
        }
        let mut fields = model.to_fields();
        if !changes_key {
            fields.remove(&self.primary_key);
        }

        let query = self.by_identifier(QueryAction::Update, id.into(), vec![fields]);
        self.db.fetch_all(query).await?;
        Ok(model)
    }

    /// Write only the fields of `model` that differ from `original`, the
    /// state last read from or written to the row. The row is addressed by
    /// `original`'s identifier; nothing is written when no field changed.
    pub async fn update_changed(&self, original: &M, model: &M) -> OrmResult<M> {
        let id = original
            .primary_key()
            .ok_or_else(|| self.identifier_required())?;
        let before = original.to_fields();
        if changed_fields(&before, model.to_fields()).is_empty() {
            return Ok(model.clone());
        }

        let mut model = model.clone();
        if M::uses_timestamps() {
            model.set_updated_at(Utc::now());
        }
        let fields = changed_fields(&before, model.to_fields());
        let query = self.by_identifier(QueryAction::Update, id.into(), vec![fields]);
        self.db.fetch_all(query).await?;
        Ok(model)
    }

    /// Delete `model`'s row. Soft-deletable models get their deletion
    /// timestamp set unless `force` is true.
    pub async fn delete(&self, model: &M, force: bool) -> OrmResult<()> {
        let id: DatabaseValue = model
            .primary_key()
            .ok_or_else(|| self.identifier_required())?
            .into();

        let query = match (&self.soft_delete_column, force) {
            (Some(column), false) => {
                let stamp = Payload::new().set(column.as_str(), Utc::now());
                self.by_identifier(QueryAction::Update, id, vec![stamp])
            }
            _ => self.by_identifier(QueryAction::Delete, id, Vec::new()),
        };
        self.db.fetch_all(query).await.map(|_| ())
    }
}

fn changed_fields(before: &Payload, after: Payload) -> Payload {
    after
        .into_iter()
        .filter(|(column, value)| before.get(column) != Some(value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changed_fields_keeps_only_differences() {
        let before = Payload::new().set("id", 1i64).set("name", "Ada").set("age", 36i64);
        let after = Payload::new()
            .set("id", 1i64)
            .set("name", "Ada")
            .set("age", 37i64)
            .set("nickname", DatabaseValue::Null);

        let changed = changed_fields(&before, after);
        assert_eq!(changed, Payload::new().set("age", 37i64).set("nickname", DatabaseValue::Null));
    }
}
