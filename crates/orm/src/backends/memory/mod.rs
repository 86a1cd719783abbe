//! In-memory backend
//!
//! A complete backend over an in-process table store. Every connection opened
//! from one `MemoryBackend` shares the same tables. Alongside the backend
//! contract it exposes instrumentation used by tests: the executed-query log,
//! connection counters, simulated connection failures and forced closes.

mod evaluate;
mod storage;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use self::storage::{Tables, Undo};
use super::core::{Capabilities, DatabaseBackend, DatabaseBackendType, DatabaseConnection, RowSink};
use super::row::Record;
use crate::error::{ModelError, OrmResult};
use crate::query::{Query, QueryAction};
use crate::schema::{Schema, SchemaAction};

#[derive(Debug, Default)]
struct Instrumentation {
    queries: Mutex<Vec<Query>>,
    connections_opened: AtomicUsize,
    refuse_connections: AtomicBool,
    handles: Mutex<Vec<Arc<AtomicBool>>>,
}

/// In-memory database backend
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    store: Arc<RwLock<Tables>>,
    instrumentation: Arc<Instrumentation>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every query executed so far, in execution order
    pub fn executed_queries(&self) -> Vec<Query> {
        self.instrumentation.queries.lock().clone()
    }

    /// Number of read queries executed against `entity`
    pub fn read_count(&self, entity: &str) -> usize {
        self.instrumentation
            .queries
            .lock()
            .iter()
            .filter(|q| q.action == QueryAction::Read && q.entity() == entity)
            .count()
    }

    pub fn clear_query_log(&self) {
        self.instrumentation.queries.lock().clear();
    }

    /// Raw connections opened so far
    pub fn connections_opened(&self) -> usize {
        self.instrumentation.connections_opened.load(Ordering::SeqCst)
    }

    /// Make `connect` fail until switched back
    pub fn refuse_connections(&self, refuse: bool) {
        self.instrumentation
            .refuse_connections
            .store(refuse, Ordering::SeqCst);
    }

    /// Mark every open connection as closed
    pub fn close_all_connections(&self) {
        for handle in self.instrumentation.handles.lock().iter() {
            handle.store(true, Ordering::SeqCst);
        }
    }

    pub fn has_table(&self, entity: &str) -> bool {
        self.store.read().contains_key(entity)
    }

    /// Stored rows of `entity`, bypassing every query feature
    pub fn rows(&self, entity: &str) -> Vec<Record> {
        self.store
            .read()
            .get(entity)
            .map(|table| table.rows.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DatabaseBackend for MemoryBackend {
    fn backend_type(&self) -> DatabaseBackendType {
        DatabaseBackendType::Memory
    }

    fn capabilities(&self) -> &'static Capabilities {
        &Capabilities::MEMORY
    }

    async fn connect(&self) -> OrmResult<Box<dyn DatabaseConnection>> {
        if self.instrumentation.refuse_connections.load(Ordering::SeqCst) {
            return Err(ModelError::Connection("connection refused".to_string()));
        }

        let closed = Arc::new(AtomicBool::new(false));
        self.instrumentation.handles.lock().push(closed.clone());
        let opened = self
            .instrumentation
            .connections_opened
            .fetch_add(1, Ordering::SeqCst)
            + 1;
        debug!(opened, "Opened in-memory connection");

        Ok(Box::new(MemoryConnection {
            store: self.store.clone(),
            instrumentation: self.instrumentation.clone(),
            closed,
            journal: None,
        }))
    }
}

/// Connection to a `MemoryBackend`
pub struct MemoryConnection {
    store: Arc<RwLock<Tables>>,
    instrumentation: Arc<Instrumentation>,
    closed: Arc<AtomicBool>,
    /// Undo entries of the open transaction
    journal: Option<Vec<Undo>>,
}

impl MemoryConnection {
    fn ensure_open(&self) -> OrmResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(ModelError::Connection("connection is closed".to_string()))
        } else {
            Ok(())
        }
    }

    fn record<I: IntoIterator<Item = Undo>>(&mut self, entries: I) {
        if let Some(journal) = &mut self.journal {
            journal.extend(entries);
        }
    }
}

#[async_trait]
impl DatabaseConnection for MemoryConnection {
    async fn execute(&mut self, query: &Query, on_row: RowSink<'_>) -> OrmResult<()> {
        self.ensure_open()?;
        self.instrumentation.queries.lock().push(query.clone());
        let entity = query.entity().to_string();

        let rows = match query.action {
            QueryAction::Read => evaluate::read(&self.store.read(), query)?,
            QueryAction::Create => {
                let inserted = storage::insert(&mut self.store.write(), query)?;
                self.record(inserted.iter().map(|row| Undo::Remove {
                    entity: entity.clone(),
                    row: row.clone(),
                }));
                inserted
            }
            QueryAction::Update => {
                let changed = storage::update(&mut self.store.write(), query)?;
                debug!(entity = %entity, affected = changed.len(), "Updated rows");
                self.record(changed.into_iter().map(|(before, after)| Undo::Restore {
                    entity: entity.clone(),
                    before,
                    after,
                }));
                Vec::new()
            }
            QueryAction::Delete => {
                let removed = storage::delete(&mut self.store.write(), query)?;
                debug!(entity = %entity, affected = removed.len(), "Deleted rows");
                // newest first on rollback, so restore from the lowest position up
                self.record(removed.into_iter().rev().map(|(index, row)| Undo::Reinsert {
                    entity: entity.clone(),
                    index,
                    row,
                }));
                Vec::new()
            }
        };

        for row in rows {
            on_row(row)?;
        }
        Ok(())
    }

    async fn execute_schema(&mut self, schema: &Schema) -> OrmResult<()> {
        self.ensure_open()?;
        if schema.action == SchemaAction::Alter && !schema.remove_references.is_empty() {
            Capabilities::require(
                Capabilities::MEMORY.drop_foreign_keys,
                DatabaseBackendType::Memory,
                "drop foreign key reference",
            )?;
        }
        let previous = {
            let mut tables = self.store.write();
            let previous = tables.get(schema.entity()).cloned();
            storage::apply_schema(&mut tables, schema)?;
            previous
        };
        self.record([Undo::Table {
            entity: schema.entity().to_string(),
            previous,
        }]);
        Ok(())
    }

    async fn begin_transaction(&mut self) -> OrmResult<()> {
        self.ensure_open()?;
        if self.journal.is_some() {
            return Err(ModelError::Transaction(
                "a transaction is already open on this connection".to_string(),
            ));
        }
        self.journal = Some(Vec::new());
        Ok(())
    }

    async fn commit(&mut self) -> OrmResult<()> {
        self.journal
            .take()
            .map(|_| ())
            .ok_or_else(|| ModelError::Transaction("no open transaction".to_string()))
    }

    async fn rollback(&mut self) -> OrmResult<()> {
        let journal = self
            .journal
            .take()
            .ok_or_else(|| ModelError::Transaction("no open transaction".to_string()))?;
        debug!(changes = journal.len(), "Rolling back in-memory transaction");
        storage::undo(&mut self.store.write(), journal);
        Ok(())
    }

    fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }

    async fn close(&mut self) -> OrmResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
