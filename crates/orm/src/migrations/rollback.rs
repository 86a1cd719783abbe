//! Migration Rollback - reverting applied migrations
//!
//! Migrations revert in reverse registration order. Log entries with no
//! registered migration are left alone.

use async_trait::async_trait;
use tracing::{info, warn};

use super::definitions::RollbackResult;
use super::runner::Migrator;
use crate::error::OrmResult;

/// Reverting for the migration runner
#[async_trait]
pub trait MigrationRollback {
    /// Revert the migrations of the most recent batch
    async fn revert_batch(&self) -> OrmResult<RollbackResult>;

    /// Revert every applied migration regardless of batch
    async fn revert_all(&self) -> OrmResult<RollbackResult>;
}

#[async_trait]
impl MigrationRollback for Migrator {
    async fn revert_batch(&self) -> OrmResult<RollbackResult> {
        self.bootstrap().await?;
        let last = self.last_batch().await?;
        if last == 0 {
            info!("Nothing to revert");
            return Ok(RollbackResult::default());
        }

        let applied = self.applied().await?;
        let registered = self.names();
        for name in applied.keys().filter(|name| !registered.contains(name)) {
            if applied[name].batch == last {
                warn!(migration = %name, batch = last, "Logged migration is not registered, skipping");
            }
        }

        let mut result = RollbackResult {
            batch: Some(last),
            reverted: Vec::new(),
        };
        for migration in self.migrations().iter().rev() {
            let name = migration.name();
            match applied.get(&name) {
                Some(record) if record.batch == last => {
                    self.revert_one(migration.as_ref()).await?;
                    result.reverted.push(name);
                }
                _ => {}
            }
        }
        info!(batch = last, count = result.reverted.len(), "Migration batch reverted");
        Ok(result)
    }

    async fn revert_all(&self) -> OrmResult<RollbackResult> {
        self.bootstrap().await?;
        let applied = self.applied().await?;

        let mut result = RollbackResult::default();
        for migration in self.migrations().iter().rev() {
            let name = migration.name();
            if applied.contains_key(&name) {
                self.revert_one(migration.as_ref()).await?;
                result.reverted.push(name);
            }
        }
        info!(count = result.reverted.len(), "All migrations reverted");
        Ok(result)
    }
}
