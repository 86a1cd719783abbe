//! Per-query cache of eager-loaded relation rows

use std::collections::HashMap;

use crate::backends::{DatabaseValue, Record};
use crate::relationships::Relationship;

struct CachedRelation {
    relationship: Relationship,
    by_key: HashMap<DatabaseValue, Vec<Record>>,
    row_count: usize,
}

/// Related rows fetched for one top-level execution, keyed by relation name
/// and grouped by the related key. Built after the primary rows arrive and
/// dropped when the execution returns.
#[derive(Default)]
pub struct EagerLoadCache {
    relations: HashMap<String, CachedRelation>,
}

impl EagerLoadCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the rows fetched for `relationship`
    pub fn insert(&mut self, relationship: Relationship, rows: Vec<Record>) {
        let row_count = rows.len();
        let mut by_key: HashMap<DatabaseValue, Vec<Record>> = HashMap::new();
        for row in rows {
            let key = row
                .get(relationship.related_key())
                .cloned()
                .unwrap_or(DatabaseValue::Null)
                .normalized();
            if !key.is_null() {
                by_key.entry(key).or_default().push(row);
            }
        }
        self.relations.insert(
            relationship.name.clone(),
            CachedRelation {
                relationship,
                by_key,
                row_count,
            },
        );
    }

    pub fn is_loaded(&self, relation: &str) -> bool {
        self.relations.contains_key(relation)
    }

    /// Number of related rows fetched for `relation`
    pub fn row_count(&self, relation: &str) -> Option<usize> {
        self.relations.get(relation).map(|cached| cached.row_count)
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// Rows of `relation` belonging to `parent`
    pub fn rows_for(&self, relation: &str, parent: &Record) -> Option<Vec<Record>> {
        let cached = self.relations.get(relation)?;
        let key = parent
            .get(cached.relationship.parent_key())
            .cloned()
            .unwrap_or(DatabaseValue::Null)
            .normalized();
        Some(cached.by_key.get(&key).cloned().unwrap_or_default())
    }

    /// Every loaded relation's rows for `parent`
    pub fn relations_for(&self, parent: &Record) -> HashMap<String, Vec<Record>> {
        self.relations
            .keys()
            .filter_map(|name| self.rows_for(name, parent).map(|rows| (name.clone(), rows)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relationships::RelationshipType;

    #[test]
    fn test_rows_grouped_by_related_key() {
        let mut cache = EagerLoadCache::new();
        let posts = Relationship::new("posts", RelationshipType::HasMany, "posts", "user_id");
        cache.insert(
            posts,
            vec![
                Record::new().set("id", 1i64).set("user_id", 7i64),
                Record::new().set("id", 2i64).set("user_id", 7i64),
                Record::new().set("id", 3i64).set("user_id", 9i64),
            ],
        );

        let parent = Record::new().set("id", 7i32);
        assert_eq!(cache.rows_for("posts", &parent).unwrap().len(), 2);
        assert_eq!(cache.row_count("posts"), Some(3));

        let lonely = Record::new().set("id", 8i64);
        assert_eq!(cache.rows_for("posts", &lonely), Some(Vec::new()));
        assert_eq!(cache.rows_for("comments", &parent), None);
    }
}
