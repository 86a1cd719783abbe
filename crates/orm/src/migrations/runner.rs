//! Migration Runner - Executes migrations against the database
//!
//! Tracks applied migrations in a log table and groups every migration
//! applied by one `prepare_batch` call under a shared batch number.
//! A single writer is assumed: concurrent runs against one log may race on
//! the batch number.

use std::collections::HashMap;

use chrono::Utc;
use tracing::{error, info, warn};

use super::definitions::*;
use crate::backends::{Payload, Record};
use crate::database::Database;
use crate::error::{ModelError, OrmResult};
use crate::model::FromRow;
use crate::query::{FilterBuilder, QueryBuilder};
use crate::schema::Schema;

/// Migration runner over a registered, ordered set of migrations
pub struct Migrator {
    db: Database,
    table: String,
    migrations: Vec<Box<dyn Migration>>,
}

impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("db", &self.db)
            .field("table", &self.table)
            .field("migrations", &self.names())
            .finish()
    }
}

impl Migrator {
    /// Runner logging to the database's configured migrations table
    pub fn new(db: Database) -> Self {
        let table = db.config().migrations_table.clone();
        Self {
            db,
            table,
            migrations: Vec::new(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Append a migration; registration order is execution order
    pub fn register<T: Migration + 'static>(&mut self, migration: T) -> OrmResult<&mut Self> {
        let name = migration.name();
        if self.migrations.iter().any(|m| m.name() == name) {
            return Err(ModelError::Configuration(format!(
                "Migration '{}' is already registered",
                name
            )));
        }
        self.migrations.push(Box::new(migration));
        Ok(self)
    }

    pub fn names(&self) -> Vec<String> {
        self.migrations.iter().map(|m| m.name()).collect()
    }

    pub(crate) fn migrations(&self) -> &[Box<dyn Migration>] {
        &self.migrations
    }

    pub(crate) fn log(&self) -> QueryBuilder<Record> {
        self.db.table(&self.table)
    }

    /// Make sure the log table exists. Counts its rows and creates the
    /// table when reading it fails.
    pub async fn bootstrap(&self) -> OrmResult<()> {
        if let Err(e) = self.log().count().await {
            warn!(table = %self.table, error = %e, "Migration log not readable, creating it");
            let schema = Schema::create(&self.table, |t| {
                t.increments("id");
                t.string("name", Some(255)).unique();
                t.big_integer("batch");
                t.timestamps();
            });
            self.db.execute_schema(schema).await?;
        }
        Ok(())
    }

    /// Log entries keyed by migration name
    pub async fn applied(&self) -> OrmResult<HashMap<String, MigrationRecord>> {
        let records: Vec<MigrationRecord> = self
            .log()
            .all()
            .await?
            .iter()
            .map(|record| MigrationRecord::from_row(record))
            .collect::<OrmResult<_>>()?;
        Ok(records.into_iter().map(|r| (r.name.clone(), r)).collect())
    }

    /// Highest batch number in the log, 0 when empty
    pub async fn last_batch(&self) -> OrmResult<i64> {
        self.log().max_or("batch", 0i64).await
    }

    /// Apply every pending migration in registration order under the next
    /// batch number. Stops at the first failure without undoing migrations
    /// already applied by this call.
    pub async fn prepare_batch(&self) -> OrmResult<MigrationRunResult> {
        self.bootstrap().await?;
        let applied = self.applied().await?;
        let batch = self.last_batch().await? + 1;

        let mut result = MigrationRunResult {
            batch,
            ..Default::default()
        };
        for migration in &self.migrations {
            let name = migration.name();
            if applied.contains_key(&name) {
                result.skipped.push(name);
                continue;
            }

            info!(migration = %name, batch, "Preparing migration");
            if let Err(e) = migration.prepare(&self.db).await {
                error!(migration = %name, batch, error = %e, "Migration failed");
                return Err(ModelError::migration(name, &e));
            }

            let now = Utc::now();
            let entry = Payload::new()
                .set("name", name.as_str())
                .set("batch", batch)
                .set("created_at", now)
                .set("updated_at", now);
            self.log().insert(vec![entry]).await?;
            result.applied.push(name);
        }

        if result.applied.is_empty() {
            info!("No pending migrations");
        } else {
            info!(batch, count = result.applied.len(), "Migration batch applied");
        }
        Ok(result)
    }

    /// Status of every registered migration
    pub async fn status(&self) -> OrmResult<Vec<MigrationState>> {
        self.bootstrap().await?;
        let applied = self.applied().await?;
        Ok(self
            .migrations
            .iter()
            .map(|migration| {
                let name = migration.name();
                let status = match applied.get(&name) {
                    Some(record) => MigrationStatus::Applied {
                        batch: record.batch,
                    },
                    None => MigrationStatus::Pending,
                };
                MigrationState { name, status }
            })
            .collect())
    }

    /// Revert one migration and drop its log entry
    pub(crate) async fn revert_one(&self, migration: &dyn Migration) -> OrmResult<()> {
        let name = migration.name();
        info!(migration = %name, "Reverting migration");
        if let Err(e) = migration.revert(&self.db).await {
            error!(migration = %name, error = %e, "Migration revert failed");
            return Err(ModelError::migration(name, &e));
        }
        self.log().where_eq("name", name.as_str()).force_delete_all().await
    }
}
