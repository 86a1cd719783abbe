//! Query Builder WITH methods - eager loading requests and soft-delete scopes

use chrono::Utc;

use crate::backends::DatabaseValue;

use super::builder::{QueryBuilder, SoftDeleteScope};
use super::types::*;

impl<M> QueryBuilder<M> {
    /// Eager load `relation` when the query runs
    pub fn with(mut self, relation: &str) -> Self {
        if !self.eager.iter().any(|r| r == relation) {
            self.eager.push(relation.to_string());
        }
        self
    }

    /// Include soft-deleted rows
    pub fn with_soft_deleted(mut self) -> Self {
        self.scope = SoftDeleteScope::Include;
        self
    }

    /// Only soft-deleted rows
    pub fn only_soft_deleted(mut self) -> Self {
        self.scope = SoftDeleteScope::Only;
        self
    }

    /// Requested relations, in request order
    pub fn eager_relations(&self) -> &[String] {
        &self.eager
    }
}

/// Filter enforcing `scope` on `column`. A row counts as deleted once its
/// timestamp is no longer in the future.
pub(crate) fn soft_delete_filter(column: &str, scope: SoftDeleteScope) -> Option<Filter> {
    let now = DatabaseValue::DateTime(Utc::now());
    match scope {
        SoftDeleteScope::Include => None,
        SoftDeleteScope::Exclude => Some(Filter::group(
            FilterRelation::Or,
            vec![
                Filter::predicate(column, QueryOperator::IsNull, Operand::None),
                Filter::predicate(column, QueryOperator::GreaterThan, Operand::Value(now)),
            ],
        )),
        SoftDeleteScope::Only => Some(Filter::group(
            FilterRelation::And,
            vec![
                Filter::predicate(column, QueryOperator::IsNotNull, Operand::None),
                Filter::predicate(column, QueryOperator::LessThanOrEqual, Operand::Value(now)),
            ],
        )),
    }
}
