mod common;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use strata_orm::migrations::{MigrationStatus, Migrator};
use strata_orm::prelude::*;

use common::memory_db;

/// Creates a single-column table named after the migration
struct CreateTable {
    name: &'static str,
    table: &'static str,
}

#[async_trait]
impl Migration for CreateTable {
    fn name(&self) -> String {
        self.name.to_string()
    }

    async fn prepare(&self, db: &Database) -> OrmResult<()> {
        db.schema()
            .create(self.table, |t| {
                t.increments("id");
            })
            .await
    }

    async fn revert(&self, db: &Database) -> OrmResult<()> {
        db.schema().drop(self.table).await
    }
}

struct Broken;

#[async_trait]
impl Migration for Broken {
    async fn prepare(&self, _db: &Database) -> OrmResult<()> {
        Err(ModelError::Schema("column type not supported".to_string()))
    }

    async fn revert(&self, _db: &Database) -> OrmResult<()> {
        Ok(())
    }
}

fn create(name: &'static str, table: &'static str) -> CreateTable {
    CreateTable { name, table }
}

fn migrator(db: &Database) -> Migrator {
    let mut migrator = db.migrator();
    migrator
        .register(create("create_a", "a"))
        .unwrap()
        .register(create("create_b", "b"))
        .unwrap()
        .register(create("create_c", "c"))
        .unwrap();
    migrator
}

async fn batch_of(db: &Database, name: &str) -> i64 {
    let record = db
        .table("migrations")
        .where_eq("name", name)
        .first_or_fail()
        .await
        .unwrap();
    DatabaseRowExt::get(record.model(), "batch").unwrap()
}

#[tokio::test]
async fn batches_are_numbered_per_run() {
    let (backend, db) = memory_db(2);
    let mut migrator = migrator(&db);

    let first = migrator.prepare_batch().await.unwrap();
    assert_eq!(first.batch, 1);
    assert_eq!(first.applied, vec!["create_a", "create_b", "create_c"]);
    assert!(backend.has_table("a") && backend.has_table("b") && backend.has_table("c"));

    migrator.register(create("create_d", "d")).unwrap();
    let second = migrator.prepare_batch().await.unwrap();
    assert_eq!(second.batch, 2);
    assert_eq!(second.applied, vec!["create_d"]);
    assert_eq!(second.skipped.len(), 3);

    assert_eq!(batch_of(&db, "create_a").await, 1);
    assert_eq!(batch_of(&db, "create_d").await, 2);
}

#[tokio::test]
async fn nothing_pending_applies_nothing() {
    let (_, db) = memory_db(2);
    let migrator = migrator(&db);
    migrator.prepare_batch().await.unwrap();

    let again = migrator.prepare_batch().await.unwrap();
    assert_eq!(again.applied_count(), 0);
    assert_eq!(migrator.last_batch().await.unwrap(), 1);
}

#[tokio::test]
async fn revert_batch_only_touches_the_last_batch() {
    let (backend, db) = memory_db(2);
    let mut migrator = migrator(&db);
    migrator.prepare_batch().await.unwrap();
    migrator.register(create("create_d", "d")).unwrap();
    migrator.register(create("create_e", "e")).unwrap();
    migrator.prepare_batch().await.unwrap();

    let reverted = migrator.revert_batch().await.unwrap();
    assert_eq!(reverted.batch, Some(2));
    assert_eq!(reverted.reverted, vec!["create_e", "create_d"]);
    assert!(!backend.has_table("d"));
    assert!(backend.has_table("c"));

    let states = migrator.status().await.unwrap();
    let pending: Vec<&str> = states
        .iter()
        .filter(|s| s.status == MigrationStatus::Pending)
        .map(|s| s.name.as_str())
        .collect();
    assert_eq!(pending, vec!["create_d", "create_e"]);

    // re-applying after a revert reuses the freed batch number
    assert_eq!(migrator.prepare_batch().await.unwrap().batch, 2);
}

#[tokio::test]
async fn revert_all_empties_the_log() {
    let (backend, db) = memory_db(2);
    let mut migrator = migrator(&db);
    migrator.prepare_batch().await.unwrap();
    migrator.register(create("create_d", "d")).unwrap();
    migrator.prepare_batch().await.unwrap();

    let reverted = migrator.revert_all().await.unwrap();
    assert_eq!(reverted.batch, None);
    assert_eq!(reverted.reverted_count(), 4);
    assert!(backend.rows("migrations").is_empty());
    assert!(!backend.has_table("a"));
}

#[tokio::test]
async fn revert_with_empty_log_is_a_no_op() {
    let (_, db) = memory_db(2);
    let migrator = migrator(&db);
    let reverted = migrator.revert_batch().await.unwrap();
    assert_eq!(reverted.batch, None);
    assert!(reverted.reverted.is_empty());
}

#[tokio::test]
async fn failure_keeps_earlier_migrations_of_the_batch() {
    let (backend, db) = memory_db(2);
    let mut migrator = db.migrator();
    migrator
        .register(create("create_a", "a"))
        .unwrap()
        .register(Broken)
        .unwrap()
        .register(create("create_c", "c"))
        .unwrap();

    let err = migrator.prepare_batch().await.unwrap_err();
    match err {
        ModelError::Migration { name, message } => {
            assert_eq!(name, "Broken");
            assert!(message.contains("column type not supported"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert!(backend.has_table("a"));
    assert!(!backend.has_table("c"));
    let states = migrator.status().await.unwrap();
    assert_eq!(states[0].status, MigrationStatus::Applied { batch: 1 });
    assert_eq!(states[1].status, MigrationStatus::Pending);
    assert_eq!(states[2].status, MigrationStatus::Pending);
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let (_, db) = memory_db(2);
    let mut migrator = db.migrator();
    migrator.register(create("create_a", "a")).unwrap();
    let err = migrator.register(create("create_a", "other")).unwrap_err();
    assert!(matches!(err, ModelError::Configuration(_)));
    assert_eq!(migrator.names(), vec!["create_a"]);
}

#[tokio::test]
async fn custom_log_table() {
    let (backend, db) = memory_db(2);
    let mut migrator = db.migrator().with_table("schema_log");
    migrator.register(create("create_a", "a")).unwrap();
    migrator.prepare_batch().await.unwrap();

    assert_eq!(backend.rows("schema_log").len(), 1);
    assert!(!backend.has_table("migrations"));
}
