//! Query Builder JOIN operations

use super::builder::QueryBuilder;
use super::types::*;

impl<M> QueryBuilder<M> {
    /// Add INNER JOIN on `local_field = foreign_field`
    pub fn join(self, table: &str, local_field: &str, foreign_field: &str) -> Self {
        self.join_with(JoinType::Inner, table, local_field, foreign_field)
    }

    /// Add LEFT JOIN; unmatched rows carry nulls for the joined table
    pub fn left_join(self, table: &str, local_field: &str, foreign_field: &str) -> Self {
        self.join_with(JoinType::Left, table, local_field, foreign_field)
    }

    pub fn join_with(
        mut self,
        join_type: JoinType,
        table: &str,
        local_field: &str,
        foreign_field: &str,
    ) -> Self {
        self.query.joins.push(JoinClause {
            join_type,
            table: table.to_string(),
            local_field: local_field.to_string(),
            foreign_field: foreign_field.to_string(),
        });
        self
    }
}
