//! Query Types - the building blocks of the neutral query description

use std::fmt;

use crate::backends::DatabaseValue;

/// What a query does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryAction {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for QueryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryAction::Create => write!(f, "create"),
            QueryAction::Read => write!(f, "read"),
            QueryAction::Update => write!(f, "update"),
            QueryAction::Delete => write!(f, "delete"),
        }
    }
}

/// Query operator types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Like,
    NotLike,
    In,
    NotIn,
    IsNull,
    IsNotNull,
    Between,
}

impl fmt::Display for QueryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOperator::Equal => write!(f, "="),
            QueryOperator::NotEqual => write!(f, "!="),
            QueryOperator::GreaterThan => write!(f, ">"),
            QueryOperator::GreaterThanOrEqual => write!(f, ">="),
            QueryOperator::LessThan => write!(f, "<"),
            QueryOperator::LessThanOrEqual => write!(f, "<="),
            QueryOperator::Like => write!(f, "LIKE"),
            QueryOperator::NotLike => write!(f, "NOT LIKE"),
            QueryOperator::In => write!(f, "IN"),
            QueryOperator::NotIn => write!(f, "NOT IN"),
            QueryOperator::IsNull => write!(f, "IS NULL"),
            QueryOperator::IsNotNull => write!(f, "IS NOT NULL"),
            QueryOperator::Between => write!(f, "BETWEEN"),
        }
    }
}

/// Right-hand side of a predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Unary operators (`IS NULL`, `IS NOT NULL`)
    None,
    Value(DatabaseValue),
    List(Vec<DatabaseValue>),
    Range(DatabaseValue, DatabaseValue),
    /// Compare against another column
    Field(String),
}

impl Operand {
    /// Values that end up as bound parameters
    pub fn bindings(&self) -> Vec<DatabaseValue> {
        match self {
            Operand::None | Operand::Field(_) => Vec::new(),
            Operand::Value(value) => vec![value.clone()],
            Operand::List(values) => values.clone(),
            Operand::Range(low, high) => vec![low.clone(), high.clone()],
        }
    }
}

/// A single comparison
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub operator: QueryOperator,
    pub operand: Operand,
}

/// How the children of a group combine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterRelation {
    And,
    Or,
}

impl fmt::Display for FilterRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterRelation::And => write!(f, "AND"),
            FilterRelation::Or => write!(f, "OR"),
        }
    }
}

/// Filter tree node
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Predicate(Predicate),
    Group {
        relation: FilterRelation,
        children: Vec<Filter>,
    },
}

impl Filter {
    pub fn predicate(field: impl Into<String>, operator: QueryOperator, operand: Operand) -> Self {
        Filter::Predicate(Predicate {
            field: field.into(),
            operator,
            operand,
        })
    }

    pub fn group(relation: FilterRelation, children: Vec<Filter>) -> Self {
        Filter::Group { relation, children }
    }

    /// Bound values in rendering order
    pub fn bindings(&self) -> Vec<DatabaseValue> {
        match self {
            Filter::Predicate(predicate) => predicate.operand.bindings(),
            Filter::Group { children, .. } => children.iter().flat_map(Filter::bindings).collect(),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Predicate(p) => match &p.operand {
                Operand::None => write!(f, "{} {}", p.field, p.operator),
                Operand::Value(_) => write!(f, "{} {} ?", p.field, p.operator),
                Operand::List(values) => {
                    let marks = vec!["?"; values.len()].join(", ");
                    write!(f, "{} {} ({})", p.field, p.operator, marks)
                }
                Operand::Range(_, _) => write!(f, "{} {} ? AND ?", p.field, p.operator),
                Operand::Field(other) => write!(f, "{} {} {}", p.field, p.operator, other),
            },
            Filter::Group { relation, children } => {
                let parts: Vec<String> = children.iter().map(|c| c.to_string()).collect();
                write!(f, "({})", parts.join(&format!(" {} ", relation)))
            }
        }
    }
}

/// Join types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    /// Left outer join
    Left,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "INNER JOIN"),
            JoinType::Left => write!(f, "LEFT JOIN"),
        }
    }
}

/// Join clause
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: String,
    pub local_field: String,
    pub foreign_field: String,
}

/// Order by direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// Sort key
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByClause {
    pub field: String,
    pub direction: OrderDirection,
}

/// Aggregate functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Average,
    Min,
    Max,
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateFunction::Count => write!(f, "COUNT"),
            AggregateFunction::Sum => write!(f, "SUM"),
            AggregateFunction::Average => write!(f, "AVG"),
            AggregateFunction::Min => write!(f, "MIN"),
            AggregateFunction::Max => write!(f, "MAX"),
        }
    }
}

/// Aggregate selection; `field` of `None` means every row (`COUNT(*)`).
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub function: AggregateFunction,
    pub field: Option<String>,
    pub alias: String,
}

impl Aggregate {
    pub fn new(function: AggregateFunction, field: Option<&str>, alias: impl Into<String>) -> Self {
        Self {
            function,
            field: field.map(str::to_string),
            alias: alias.into(),
        }
    }

    pub fn count(alias: impl Into<String>) -> Self {
        Self::new(AggregateFunction::Count, None, alias)
    }

    pub fn sum(field: &str, alias: impl Into<String>) -> Self {
        Self::new(AggregateFunction::Sum, Some(field), alias)
    }

    pub fn average(field: &str, alias: impl Into<String>) -> Self {
        Self::new(AggregateFunction::Average, Some(field), alias)
    }

    pub fn min(field: &str, alias: impl Into<String>) -> Self {
        Self::new(AggregateFunction::Min, Some(field), alias)
    }

    pub fn max(field: &str, alias: impl Into<String>) -> Self {
        Self::new(AggregateFunction::Max, Some(field), alias)
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = self.field.as_deref().unwrap_or("*");
        write!(f, "{}({}) AS {}", self.function, field, self.alias)
    }
}

/// Offset/limit window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryRange {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}
