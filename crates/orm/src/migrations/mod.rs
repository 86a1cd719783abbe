//! Migration System
//!
//! Named migrations applied in numbered batches and tracked in a log table.

pub mod definitions;
pub mod rollback;
pub mod runner;

pub use definitions::{
    Migration, MigrationRecord, MigrationRunResult, MigrationState, MigrationStatus, RollbackResult,
};
pub use rollback::MigrationRollback;
pub use runner::Migrator;
