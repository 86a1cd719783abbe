//! Query Builder WHERE clause operations
//!
//! Predicates are shared by [`QueryBuilder`] and [`FilterGroup`] through the
//! [`FilterBuilder`] trait, so nested groups take the same helpers at any
//! depth. A group always starts empty.

use crate::backends::DatabaseValue;

use super::builder::QueryBuilder;
use super::types::*;

/// Accumulates filter nodes
pub trait FilterBuilder: Sized {
    /// Append one filter node
    fn push_filter(self, filter: Filter) -> Self;

    /// Add a predicate with an explicit operator
    fn filter<V: Into<DatabaseValue>>(self, field: &str, operator: QueryOperator, value: V) -> Self {
        self.push_filter(Filter::predicate(field, operator, Operand::Value(value.into())))
    }

    /// Add WHERE condition with equality
    fn where_eq<V: Into<DatabaseValue>>(self, field: &str, value: V) -> Self {
        self.filter(field, QueryOperator::Equal, value)
    }

    fn where_ne<V: Into<DatabaseValue>>(self, field: &str, value: V) -> Self {
        self.filter(field, QueryOperator::NotEqual, value)
    }

    fn where_gt<V: Into<DatabaseValue>>(self, field: &str, value: V) -> Self {
        self.filter(field, QueryOperator::GreaterThan, value)
    }

    fn where_gte<V: Into<DatabaseValue>>(self, field: &str, value: V) -> Self {
        self.filter(field, QueryOperator::GreaterThanOrEqual, value)
    }

    fn where_lt<V: Into<DatabaseValue>>(self, field: &str, value: V) -> Self {
        self.filter(field, QueryOperator::LessThan, value)
    }

    fn where_lte<V: Into<DatabaseValue>>(self, field: &str, value: V) -> Self {
        self.filter(field, QueryOperator::LessThanOrEqual, value)
    }

    /// Add WHERE condition with LIKE (`%` and `_` wildcards)
    fn where_like(self, field: &str, pattern: &str) -> Self {
        self.filter(field, QueryOperator::Like, pattern)
    }

    fn where_not_like(self, field: &str, pattern: &str) -> Self {
        self.filter(field, QueryOperator::NotLike, pattern)
    }

    /// Add WHERE condition with IN; an empty list matches nothing
    fn where_in<V, I>(self, field: &str, values: I) -> Self
    where
        V: Into<DatabaseValue>,
        I: IntoIterator<Item = V>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push_filter(Filter::predicate(field, QueryOperator::In, Operand::List(values)))
    }

    /// Add WHERE condition with NOT IN; an empty list matches everything
    fn where_not_in<V, I>(self, field: &str, values: I) -> Self
    where
        V: Into<DatabaseValue>,
        I: IntoIterator<Item = V>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.push_filter(Filter::predicate(field, QueryOperator::NotIn, Operand::List(values)))
    }

    fn where_null(self, field: &str) -> Self {
        self.push_filter(Filter::predicate(field, QueryOperator::IsNull, Operand::None))
    }

    fn where_not_null(self, field: &str) -> Self {
        self.push_filter(Filter::predicate(field, QueryOperator::IsNotNull, Operand::None))
    }

    /// Inclusive range
    fn where_between<V: Into<DatabaseValue>>(self, field: &str, low: V, high: V) -> Self {
        self.push_filter(Filter::predicate(
            field,
            QueryOperator::Between,
            Operand::Range(low.into(), high.into()),
        ))
    }

    /// Compare two columns
    fn where_column(self, field: &str, operator: QueryOperator, other: &str) -> Self {
        self.push_filter(Filter::predicate(field, operator, Operand::Field(other.to_string())))
    }

    /// Nested group whose children must all match
    fn where_all<F>(self, build: F) -> Self
    where
        F: FnOnce(FilterGroup) -> FilterGroup,
    {
        match build(FilterGroup::new(FilterRelation::And)).into_filter() {
            Some(group) => self.push_filter(group),
            None => self,
        }
    }

    /// Nested group where any child may match
    fn where_any<F>(self, build: F) -> Self
    where
        F: FnOnce(FilterGroup) -> FilterGroup,
    {
        match build(FilterGroup::new(FilterRelation::Or)).into_filter() {
            Some(group) => self.push_filter(group),
            None => self,
        }
    }
}

/// Children of a nested AND/OR group
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGroup {
    relation: FilterRelation,
    children: Vec<Filter>,
}

impl FilterGroup {
    pub fn new(relation: FilterRelation) -> Self {
        Self {
            relation,
            children: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// The group node, or `None` when nothing was added
    pub fn into_filter(self) -> Option<Filter> {
        if self.children.is_empty() {
            None
        } else {
            Some(Filter::group(self.relation, self.children))
        }
    }
}

impl FilterBuilder for FilterGroup {
    fn push_filter(mut self, filter: Filter) -> Self {
        self.children.push(filter);
        self
    }
}

impl<M> FilterBuilder for QueryBuilder<M> {
    fn push_filter(mut self, filter: Filter) -> Self {
        self.query.filters.push(filter);
        self
    }
}
