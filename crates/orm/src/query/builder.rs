//! Query Builder - Core builder implementation

use std::fmt;
use std::marker::PhantomData;

use crate::backends::Record;
use crate::database::Database;
use crate::model::Model;
use crate::relationships::Relationship;

use super::statement::Query;

/// Which soft-deleted rows a query sees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SoftDeleteScope {
    /// Hide rows whose deletion timestamp has passed
    #[default]
    Exclude,
    /// See every row
    Include,
    /// See only rows whose deletion timestamp has passed
    Only,
}

pub(crate) type RelationResolver = fn(&str) -> Option<Relationship>;

fn no_relations(_name: &str) -> Option<Relationship> {
    None
}

fn model_relationship<M: Model>(name: &str) -> Option<Relationship> {
    M::relationship(name).map(|relationship| relationship.keyed_by(M::primary_key_name()))
}

/// Fluent builder over one entity.
///
/// Chaining methods consume and return the builder. Execution methods borrow
/// it and run against a copy of the accumulated [`Query`], so one builder can
/// be executed any number of times. Use [`QueryBuilder::copy`] to branch.
pub struct QueryBuilder<M = Record> {
    pub(crate) db: Database,
    pub(crate) query: Query,
    pub(crate) primary_key: String,
    pub(crate) soft_delete_column: Option<String>,
    pub(crate) scope: SoftDeleteScope,
    pub(crate) eager: Vec<String>,
    pub(crate) relations: RelationResolver,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for QueryBuilder<M> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            query: self.query.clone(),
            primary_key: self.primary_key.clone(),
            soft_delete_column: self.soft_delete_column.clone(),
            scope: self.scope,
            eager: self.eager.clone(),
            relations: self.relations,
            _model: PhantomData,
        }
    }
}

impl<M> fmt::Debug for QueryBuilder<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("query", &self.query)
            .field("primary_key", &self.primary_key)
            .field("soft_delete_column", &self.soft_delete_column)
            .field("scope", &self.scope)
            .field("eager", &self.eager)
            .finish()
    }
}

impl<M: Model> QueryBuilder<M> {
    /// Builder over `M`'s table, picking up its key, soft-delete column and
    /// relationships
    pub fn for_model(db: Database) -> Self {
        let mut builder = Self::over(db, M::table_name(), model_relationship::<M>);
        builder.primary_key = M::primary_key_name().to_string();
        if M::uses_soft_deletes() {
            builder.soft_delete_column = Some(M::soft_delete_column().to_string());
        }
        builder
    }
}

impl QueryBuilder<Record> {
    /// Untyped builder over `entity`
    pub fn table(db: Database, entity: &str) -> Self {
        Self::over(db, entity, no_relations)
    }
}

impl<M> QueryBuilder<M> {
    fn over(db: Database, entity: &str, relations: RelationResolver) -> Self {
        Self {
            db,
            query: Query::read(entity),
            primary_key: "id".to_string(),
            soft_delete_column: None,
            scope: SoftDeleteScope::default(),
            eager: Vec::new(),
            relations,
            _model: PhantomData,
        }
    }

    /// Independent builder carrying the same state
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Treat `column` as the soft-delete timestamp
    pub fn soft_deletes(mut self, column: &str) -> Self {
        self.soft_delete_column = Some(column.to_string());
        self
    }

    /// Identifier column used by `find` and model mutations
    pub fn primary_key(mut self, column: &str) -> Self {
        self.primary_key = column.to_string();
        self
    }

    pub fn entity(&self) -> &str {
        self.query.entity()
    }

    /// The accumulated query, before soft-delete policy is applied
    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn into_query(self) -> Query {
        self.query
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn soft_delete_scope(&self) -> SoftDeleteScope {
        self.scope
    }
}

impl<M> fmt::Display for QueryBuilder<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.query)
    }
}
