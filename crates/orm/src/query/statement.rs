//! The neutral query description handed to drivers.

use std::fmt;

use super::types::*;
use crate::backends::{DatabaseValue, Payload};

/// A complete, backend-independent description of one operation on one
/// entity. The entity is fixed at construction; everything else is open to
/// the builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    entity: String,
    pub action: QueryAction,
    /// Selected fields; empty selects every field
    pub fields: Vec<String>,
    /// Top-level filters, combined with AND
    pub filters: Vec<Filter>,
    pub joins: Vec<JoinClause>,
    pub sorts: Vec<OrderByClause>,
    pub groups: Vec<String>,
    pub aggregates: Vec<Aggregate>,
    pub range: Option<QueryRange>,
    pub distinct: bool,
    /// Rows to insert for `Create`; the first entry holds the changes for `Update`
    pub payload: Vec<Payload>,
}

impl Query {
    pub fn new(entity: impl Into<String>, action: QueryAction) -> Self {
        Self {
            entity: entity.into(),
            action,
            fields: Vec::new(),
            filters: Vec::new(),
            joins: Vec::new(),
            sorts: Vec::new(),
            groups: Vec::new(),
            aggregates: Vec::new(),
            range: None,
            distinct: false,
            payload: Vec::new(),
        }
    }

    pub fn read(entity: impl Into<String>) -> Self {
        Self::new(entity, QueryAction::Read)
    }

    /// Name of the queried entity
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Changes carried by an update query
    pub fn changes(&self) -> Option<&Payload> {
        self.payload.first()
    }

    /// Every bound value, in the order a renderer meets them
    pub fn bindings(&self) -> Vec<DatabaseValue> {
        let mut bindings = Vec::new();
        match self.action {
            QueryAction::Create => {
                for row in &self.payload {
                    bindings.extend(row.iter().map(|(_, value)| value.clone()));
                }
            }
            QueryAction::Update => {
                if let Some(changes) = self.changes() {
                    bindings.extend(changes.iter().map(|(_, value)| value.clone()));
                }
            }
            QueryAction::Read | QueryAction::Delete => {}
        }
        bindings.extend(self.filters.iter().flat_map(Filter::bindings));
        bindings
    }

    /// The top-level filters as a single tree
    pub fn filter_tree(&self) -> Option<Filter> {
        match self.filters.len() {
            0 => None,
            1 => Some(self.filters[0].clone()),
            _ => Some(Filter::group(FilterRelation::And, self.filters.clone())),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.entity)?;

        if self.distinct {
            write!(f, " distinct")?;
        }
        if !self.fields.is_empty() || !self.aggregates.is_empty() {
            let mut selection: Vec<String> = self.fields.clone();
            selection.extend(self.aggregates.iter().map(|a| a.to_string()));
            write!(f, " [{}]", selection.join(", "))?;
        }
        for row in &self.payload {
            let columns: Vec<&str> = row.columns().collect();
            write!(f, " set ({})", columns.join(", "))?;
        }
        for join in &self.joins {
            write!(
                f,
                " {} {} ON {} = {}",
                join.join_type, join.table, join.local_field, join.foreign_field
            )?;
        }
        if let Some(tree) = self.filter_tree() {
            write!(f, " where {}", tree)?;
        }
        if !self.groups.is_empty() {
            write!(f, " group by {}", self.groups.join(", "))?;
        }
        if !self.sorts.is_empty() {
            let sorts: Vec<String> = self
                .sorts
                .iter()
                .map(|s| format!("{} {}", s.field, s.direction))
                .collect();
            write!(f, " order by {}", sorts.join(", "))?;
        }
        if let Some(range) = &self.range {
            if let Some(limit) = range.limit {
                write!(f, " limit {}", limit)?;
            }
            if let Some(offset) = range.offset {
                write!(f, " offset {}", offset)?;
            }
        }
        Ok(())
    }
}
