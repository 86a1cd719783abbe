//! Query Builder ORDER BY and GROUP BY operations

use super::builder::QueryBuilder;
use super::types::*;

impl<M> QueryBuilder<M> {
    /// Add ORDER BY clause (ascending)
    pub fn order_by(self, field: &str) -> Self {
        self.sort(field, OrderDirection::Asc)
    }

    /// Add ORDER BY clause (descending)
    pub fn order_by_desc(self, field: &str) -> Self {
        self.sort(field, OrderDirection::Desc)
    }

    /// Append a sort key; keys apply in the order they were added
    pub fn sort(mut self, field: &str, direction: OrderDirection) -> Self {
        self.query.sorts.push(OrderByClause {
            field: field.to_string(),
            direction,
        });
        self
    }

    /// Add GROUP BY field
    pub fn group_by(mut self, field: &str) -> Self {
        if !self.query.groups.iter().any(|g| g == field) {
            self.query.groups.push(field.to_string());
        }
        self
    }
}
