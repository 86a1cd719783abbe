//! Query Builder pagination operations

use super::builder::QueryBuilder;
use super::types::QueryRange;

impl<M> QueryBuilder<M> {
    fn window(&mut self) -> &mut QueryRange {
        self.query.range.get_or_insert_with(QueryRange::default)
    }

    /// Add LIMIT clause
    pub fn limit(mut self, count: u64) -> Self {
        self.window().limit = Some(count);
        self
    }

    /// Add OFFSET clause
    pub fn offset(mut self, count: u64) -> Self {
        self.window().offset = Some(count);
        self
    }

    /// Rows `lower..upper` of the result (zero based, upper exclusive)
    pub fn range(mut self, lower: u64, upper: u64) -> Self {
        self.query.range = Some(QueryRange {
            offset: Some(lower),
            limit: Some(upper.saturating_sub(lower)),
        });
        self
    }

    /// Add pagination (LIMIT + OFFSET); pages start at 1. Offsets past
    /// `u64::MAX` saturate.
    pub fn paginate(mut self, per_page: u64, page: u64) -> Self {
        let skipped = page.max(1) - 1;
        self.query.range = Some(QueryRange {
            offset: Some(skipped.saturating_mul(per_page)),
            limit: Some(per_page),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use crate::database::Database;
    use crate::query::QueryRange;

    #[test]
    fn test_paginate_sets_window() {
        let db = Database::connect(Default::default()).unwrap();
        let builder = db.table("users").paginate(25, 3);
        assert_eq!(
            builder.query().range,
            Some(QueryRange {
                offset: Some(50),
                limit: Some(25)
            })
        );

        let first = db.table("users").paginate(10, 0);
        assert_eq!(first.query().range.and_then(|r| r.offset), Some(0));
    }

    #[test]
    fn test_paginate_far_page_saturates() {
        let db = Database::connect(Default::default()).unwrap();
        let builder = db.table("users").paginate(u64::MAX / 2, u64::MAX);
        assert_eq!(
            builder.query().range,
            Some(QueryRange {
                offset: Some(u64::MAX),
                limit: Some(u64::MAX / 2)
            })
        );
    }

    #[test]
    fn test_limit_keeps_offset() {
        let db = Database::connect(Default::default()).unwrap();
        let builder = db.table("users").offset(5).limit(2);
        assert_eq!(
            builder.query().range,
            Some(QueryRange {
                offset: Some(5),
                limit: Some(2)
            })
        );
    }
}
