//! Query Builder SELECT operations

use super::builder::QueryBuilder;

impl<M> QueryBuilder<M> {
    /// Restrict the selected fields; `table.*` selects every field of a joined table
    pub fn select(mut self, fields: &[&str]) -> Self {
        self.query.fields.extend(fields.iter().map(|f| f.to_string()));
        self
    }

    /// Add SELECT DISTINCT
    pub fn distinct(mut self) -> Self {
        self.query.distinct = true;
        self
    }
}
