//! Statement logging
//!
//! Every query and schema change is described as a [`Statement`] and handed to
//! the database's [`QueryLogger`] right before it executes.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::backends::DatabaseValue;
use crate::query::{Query, QueryAction};
use crate::schema::Schema;

/// Log record for one execution
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub entity: String,
    pub action: String,
    pub text: String,
    pub bindings: Vec<DatabaseValue>,
}

impl Statement {
    /// Neutral description of a query for backends without a text protocol
    pub fn describe(query: &Query) -> Self {
        Self {
            entity: query.entity().to_string(),
            action: query.action.to_string(),
            text: query.to_string(),
            bindings: query.bindings(),
        }
    }

    pub fn describe_schema(schema: &Schema) -> Self {
        Self {
            entity: schema.entity().to_string(),
            action: format!("schema {}", schema.action),
            text: schema.to_string(),
            bindings: Vec::new(),
        }
    }

    pub fn is_read(&self) -> bool {
        self.action == QueryAction::Read.to_string()
    }
}

/// Sink for statement records
pub trait QueryLogger: Send + Sync {
    fn log(&self, statement: &Statement);
}

/// Emits each statement as a `tracing` debug event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingQueryLogger;

impl QueryLogger for TracingQueryLogger {
    fn log(&self, statement: &Statement) {
        tracing::debug!(
            target: "strata_orm::query",
            entity = %statement.entity,
            action = %statement.action,
            bindings = ?statement.bindings,
            "{}",
            statement.text
        );
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullQueryLogger;

impl QueryLogger for NullQueryLogger {
    fn log(&self, _statement: &Statement) {}
}

/// Keeps statements in memory; handy for assertions
#[derive(Debug, Default, Clone)]
pub struct CollectingQueryLogger {
    statements: Arc<Mutex<Vec<Statement>>>,
}

impl CollectingQueryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.statements.lock().clone()
    }

    pub fn clear(&self) {
        self.statements.lock().clear();
    }
}

impl QueryLogger for CollectingQueryLogger {
    fn log(&self, statement: &Statement) {
        self.statements.lock().push(statement.clone());
    }
}
