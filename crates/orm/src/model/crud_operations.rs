//! Model convenience operations on top of the query builder

use async_trait::async_trait;
use chrono::Utc;

use crate::database::Database;
use crate::error::{ModelError, ModelResult};
use crate::loading::Loaded;
use crate::model::core_trait::Model;

/// Create, read, update and delete for single models
#[async_trait]
pub trait ModelExt: Model {
    /// Find a model by its primary key
    async fn find(db: &Database, id: Self::PrimaryKey) -> ModelResult<Option<Self>> {
        Ok(Self::query(db).find(id).await?.map(Loaded::into_inner))
    }

    async fn find_or_fail(db: &Database, id: Self::PrimaryKey) -> ModelResult<Self> {
        let label = id.to_string();
        Self::find(db, id)
            .await?
            .ok_or_else(|| ModelError::NotFound(format!("{}({})", Self::table_name(), label)))
    }

    /// Every row visible under the default soft-delete scope
    async fn all(db: &Database) -> ModelResult<Vec<Self>> {
        Self::query(db).all().await
    }

    /// Insert and return the stored model
    async fn insert(&self, db: &Database) -> ModelResult<Self> {
        Self::query(db).create(self).await
    }

    /// Update the row identified by this model's primary key
    async fn save(&self, db: &Database) -> ModelResult<Self> {
        Self::query(db).update(self, None).await
    }

    /// Update only the fields that differ from `original`
    async fn save_changes(&self, db: &Database, original: &Self) -> ModelResult<Self> {
        Self::query(db).update_changed(original, self).await
    }

    /// Delete, or soft delete when the model supports it
    async fn delete(&mut self, db: &Database) -> ModelResult<()> {
        Self::query(db).delete(self, false).await?;
        if Self::uses_soft_deletes() {
            self.set_deleted_at(Some(Utc::now()));
        }
        Ok(())
    }

    /// Physically delete the row
    async fn force_delete(&self, db: &Database) -> ModelResult<()> {
        Self::query(db).delete(self, true).await
    }
}

impl<T: Model> ModelExt for T {}
