//! Batched eager loading
//!
//! One follow-up query per requested relation, filtered by the distinct keys
//! of the parent rows just fetched.

use std::collections::HashSet;

use tracing::debug;

use crate::backends::{DatabaseValue, Record};
use crate::database::Database;
use crate::error::{ModelError, OrmResult};
use crate::query::builder::{RelationResolver, SoftDeleteScope};
use crate::query::with::soft_delete_filter;
use crate::query::{Filter, Operand, Query, QueryOperator};
use crate::relationships::Relationship;

use super::cache::EagerLoadCache;

pub(crate) struct EagerLoader<'a> {
    db: &'a Database,
    entity: &'a str,
    resolve: RelationResolver,
}

impl<'a> EagerLoader<'a> {
    pub fn new(db: &'a Database, entity: &'a str, resolve: RelationResolver) -> Self {
        Self {
            db,
            entity,
            resolve,
        }
    }

    /// Fetch every relation in `relations` for `parents`
    pub async fn load(&self, relations: &[String], parents: &[Record]) -> OrmResult<EagerLoadCache> {
        let mut cache = EagerLoadCache::new();
        for name in relations {
            let relationship = (self.resolve)(name).ok_or_else(|| {
                ModelError::Relationship(format!(
                    "'{}' has no relationship named '{}'",
                    self.entity, name
                ))
            })?;
            let rows = self.fetch(&relationship, parents).await?;
            cache.insert(relationship, rows);
        }
        Ok(cache)
    }

    async fn fetch(&self, relationship: &Relationship, parents: &[Record]) -> OrmResult<Vec<Record>> {
        let keys = distinct_keys(parents, relationship.parent_key());
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let key_count = keys.len();
        let mut query = Query::read(relationship.related_table.as_str());
        query.filters.push(Filter::predicate(
            relationship.related_key(),
            QueryOperator::In,
            Operand::List(keys),
        ));
        if let Some(column) = &relationship.soft_delete_column {
            query.filters.extend(soft_delete_filter(column, SoftDeleteScope::Exclude));
        }

        let rows = self.db.fetch_all(query).await?;
        debug!(
            entity = self.entity,
            relation = %relationship.name,
            parents = parents.len(),
            keys = key_count,
            rows = rows.len(),
            "Eager loaded relation"
        );
        Ok(rows)
    }
}

/// Non-null values of `column`, first occurrence order
fn distinct_keys(rows: &[Record], column: &str) -> Vec<DatabaseValue> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter_map(|row| row.get(column))
        .filter(|value| !value.is_null())
        .map(|value| value.clone().normalized())
        .filter(|value| seen.insert(value.clone()))
        .collect()
}
