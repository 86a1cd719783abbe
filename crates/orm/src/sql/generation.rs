//! Query Model to SQL

use crate::backends::{DatabaseValue, SqlDialect};
use crate::query::{Filter, FilterRelation, Operand, Predicate, Query, QueryAction, QueryOperator};

/// Rendered statement with its bound parameters, in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub params: Vec<DatabaseValue>,
}

struct Renderer {
    dialect: SqlDialect,
    sql: String,
    params: Vec<DatabaseValue>,
}

impl Renderer {
    fn new(dialect: SqlDialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    fn ident(&mut self, identifier: &str) {
        let quoted = self.dialect.quote_identifier(identifier);
        self.sql.push_str(&quoted);
    }

    fn bind(&mut self, value: &DatabaseValue) {
        let placeholder = self.dialect.parameter_placeholder(self.params.len());
        self.sql.push_str(&placeholder);
        self.params.push(value.clone());
    }

    fn bind_list(&mut self, values: &[DatabaseValue]) {
        self.push("(");
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.bind(value);
        }
        self.push(")");
    }

    fn filter(&mut self, filter: &Filter) {
        match filter {
            Filter::Predicate(predicate) => self.predicate(predicate),
            Filter::Group { relation, children } => {
                if children.is_empty() {
                    self.push(match relation {
                        FilterRelation::And => "1 = 1",
                        FilterRelation::Or => "1 = 0",
                    });
                    return;
                }
                self.push("(");
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        self.push(&format!(" {} ", relation));
                    }
                    self.filter(child);
                }
                self.push(")");
            }
        }
    }

    fn predicate(&mut self, predicate: &Predicate) {
        match (&predicate.operator, &predicate.operand) {
            (QueryOperator::In, Operand::List(values)) if values.is_empty() => {
                self.push("1 = 0");
                return;
            }
            (QueryOperator::NotIn, Operand::List(values)) if values.is_empty() => {
                self.push("1 = 1");
                return;
            }
            _ => {}
        }

        self.ident(&predicate.field);
        self.push(&format!(" {}", predicate.operator));
        match &predicate.operand {
            Operand::None => {}
            Operand::Value(value) => {
                self.push(" ");
                self.bind(value);
            }
            Operand::List(values) => {
                self.push(" ");
                self.bind_list(values);
            }
            Operand::Range(low, high) => {
                self.push(" ");
                self.bind(low);
                self.push(" AND ");
                self.bind(high);
            }
            Operand::Field(field) => {
                self.push(" ");
                self.ident(field);
            }
        }
    }

    fn where_clause(&mut self, query: &Query) {
        if let Some(tree) = query.filter_tree() {
            self.push(" WHERE ");
            match tree {
                // Top level AND needs no outer parentheses
                Filter::Group {
                    relation: FilterRelation::And,
                    children,
                } if query.filters.len() > 1 => {
                    for (i, child) in children.iter().enumerate() {
                        if i > 0 {
                            self.push(" AND ");
                        }
                        self.filter(child);
                    }
                }
                other => self.filter(&other),
            }
        }
    }

    fn select(&mut self, query: &Query) {
        self.push(if query.distinct { "SELECT DISTINCT " } else { "SELECT " });

        let mut selection: Vec<String> = if query.fields.is_empty() && !query.aggregates.is_empty() {
            query.groups.iter().map(|g| self.dialect.quote_identifier(g)).collect()
        } else {
            query
                .fields
                .iter()
                .map(|f| self.dialect.quote_identifier(f))
                .collect()
        };
        for aggregate in &query.aggregates {
            let target = aggregate
                .field
                .as_deref()
                .map(|f| self.dialect.quote_identifier(f))
                .unwrap_or_else(|| "*".to_string());
            selection.push(format!(
                "{}({}) AS {}",
                aggregate.function,
                target,
                self.dialect.quote_identifier(&aggregate.alias)
            ));
        }
        if selection.is_empty() {
            selection.push("*".to_string());
        }
        self.push(&selection.join(", "));

        self.push(" FROM ");
        self.ident(query.entity());

        for join in &query.joins {
            self.push(&format!(" {} ", join.join_type));
            self.ident(&join.table);
            self.push(" ON ");
            self.ident(&join.local_field);
            self.push(" = ");
            self.ident(&join.foreign_field);
        }

        self.where_clause(query);

        if !query.groups.is_empty() {
            let groups: Vec<String> = query
                .groups
                .iter()
                .map(|g| self.dialect.quote_identifier(g))
                .collect();
            self.push(&format!(" GROUP BY {}", groups.join(", ")));
        }

        if !query.sorts.is_empty() {
            let sorts: Vec<String> = query
                .sorts
                .iter()
                .map(|s| format!("{} {}", self.dialect.quote_identifier(&s.field), s.direction))
                .collect();
            self.push(&format!(" ORDER BY {}", sorts.join(", ")));
        }

        if let Some(range) = &query.range {
            match (range.limit, range.offset) {
                (Some(limit), offset) => {
                    self.push(&format!(" LIMIT {}", limit));
                    if let Some(offset) = offset {
                        self.push(&format!(" OFFSET {}", offset));
                    }
                }
                (None, Some(offset)) => match self.dialect {
                    SqlDialect::PostgreSQL => self.push(&format!(" OFFSET {}", offset)),
                    SqlDialect::MySQL => {
                        self.push(&format!(" LIMIT 18446744073709551615 OFFSET {}", offset))
                    }
                    SqlDialect::SQLite => self.push(&format!(" LIMIT -1 OFFSET {}", offset)),
                },
                (None, None) => {}
            }
        }
    }

    fn insert(&mut self, query: &Query) {
        self.push("INSERT INTO ");
        self.ident(query.entity());

        let columns: Vec<String> = query
            .payload
            .first()
            .map(|row| row.columns().map(str::to_string).collect())
            .unwrap_or_default();

        if columns.is_empty() {
            self.push(" DEFAULT VALUES");
        } else {
            let quoted: Vec<String> = columns
                .iter()
                .map(|c| self.dialect.quote_identifier(c))
                .collect();
            self.push(&format!(" ({}) VALUES ", quoted.join(", ")));

            for (i, row) in query.payload.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                self.push("(");
                for (j, column) in columns.iter().enumerate() {
                    if j > 0 {
                        self.push(", ");
                    }
                    match row.get(column) {
                        Some(value) => self.bind(value),
                        None => self.push("DEFAULT"),
                    }
                }
                self.push(")");
            }
        }

        if self.dialect.supports_returning() {
            self.push(" RETURNING *");
        }
    }

    fn update(&mut self, query: &Query) {
        self.push("UPDATE ");
        self.ident(query.entity());
        self.push(" SET ");
        if let Some(changes) = query.changes() {
            for (i, (column, value)) in changes.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                self.ident(column);
                self.push(" = ");
                self.bind(value);
            }
        }
        self.where_clause(query);
    }

    fn delete(&mut self, query: &Query) {
        self.push("DELETE FROM ");
        self.ident(query.entity());
        self.where_clause(query);
    }
}

/// Render a query for `dialect`
pub fn render_query(query: &Query, dialect: SqlDialect) -> SqlStatement {
    let mut renderer = Renderer::new(dialect);
    match query.action {
        QueryAction::Read => renderer.select(query),
        QueryAction::Create => renderer.insert(query),
        QueryAction::Update => renderer.update(query),
        QueryAction::Delete => renderer.delete(query),
    }
    SqlStatement {
        sql: renderer.sql,
        params: renderer.params,
    }
}
