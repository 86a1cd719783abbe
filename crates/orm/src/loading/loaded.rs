//! Query results with their eager-loaded relations attached

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use crate::backends::Record;
use crate::error::{ModelError, OrmResult};
use crate::model::FromRow;

/// A decoded row plus the relation rows requested with `with(...)`.
///
/// Dereferences to the model. Reading a relation that was not requested is
/// an error rather than an empty result.
#[derive(Debug, Clone)]
pub struct Loaded<M> {
    model: M,
    entity: String,
    relations: HashMap<String, Vec<Record>>,
}

impl<M> Loaded<M> {
    pub fn new(model: M, entity: impl Into<String>, relations: HashMap<String, Vec<Record>>) -> Self {
        Self {
            model,
            entity: entity.into(),
            relations,
        }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_inner(self) -> M {
        self.model
    }

    pub fn is_loaded(&self, relation: &str) -> bool {
        self.relations.contains_key(relation)
    }

    /// Raw rows of `relation`
    pub fn related_records(&self, relation: &str) -> OrmResult<&[Record]> {
        self.relations
            .get(relation)
            .map(Vec::as_slice)
            .ok_or_else(|| ModelError::RelationshipNotLoaded {
                entity: self.entity.clone(),
                relation: relation.to_string(),
            })
    }

    /// Decode every row of `relation`
    pub fn related<R: FromRow>(&self, relation: &str) -> OrmResult<Vec<R>> {
        self.related_records(relation)?
            .iter()
            .map(|record| R::from_row(record))
            .collect()
    }

    /// Decode the first row of a to-one `relation`
    pub fn related_one<R: FromRow>(&self, relation: &str) -> OrmResult<Option<R>> {
        self.related_records(relation)?
            .first()
            .map(|record| R::from_row(record))
            .transpose()
    }
}

impl<M> Deref for Loaded<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.model
    }
}

impl<M> DerefMut for Loaded<M> {
    fn deref_mut(&mut self) -> &mut M {
        &mut self.model
    }
}
