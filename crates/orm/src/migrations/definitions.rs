//! Migration Definitions - Core types and structures for migrations
//!
//! Defines the `Migration` trait user migrations implement, the persisted log
//! record, and the summaries returned by the runner.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backends::{DatabaseRow, DatabaseRowExt};
use crate::database::Database;
use crate::error::OrmResult;
use crate::model::FromRow;

/// A reversible schema or data change.
///
/// The name is the migration's identity in the log; it defaults to the
/// implementing type's name.
#[async_trait]
pub trait Migration: Send + Sync {
    fn name(&self) -> String {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full).to_string()
    }

    /// Apply the change
    async fn prepare(&self, db: &Database) -> OrmResult<()>;

    /// Undo the change
    async fn revert(&self, db: &Database) -> OrmResult<()>;
}

/// Row of the migration log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub name: String,
    /// Batch number (for grouping migrations)
    pub batch: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl FromRow for MigrationRecord {
    fn from_row(row: &dyn DatabaseRow) -> OrmResult<Self> {
        Ok(Self {
            name: row.get("name")?,
            batch: row.get("batch")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Migration status in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MigrationStatus {
    /// Registered but not yet applied
    Pending,
    /// Applied as part of `batch`
    Applied { batch: i64 },
}

/// Status of one registered migration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationState {
    pub name: String,
    pub status: MigrationStatus,
}

/// Result of preparing a batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationRunResult {
    /// Batch number assigned to the applied migrations
    pub batch: i64,
    /// Migrations applied by this run, in registration order
    pub applied: Vec<String>,
    /// Migrations that were already applied
    pub skipped: Vec<String>,
}

impl MigrationRunResult {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}

/// Result of reverting migrations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackResult {
    /// Batch that was reverted; `None` for a full revert or an empty log
    pub batch: Option<i64>,
    /// Reverted migrations, in reverse registration order
    pub reverted: Vec<String>,
}

impl RollbackResult {
    pub fn reverted_count(&self) -> usize {
        self.reverted.len()
    }
}
