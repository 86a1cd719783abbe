//! Read-query evaluation for the in-memory backend

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use regex::Regex;

use super::storage::{table, Tables};
use crate::backends::{DatabaseValue, Record};
use crate::error::{ModelError, OrmResult};
use crate::query::{
    Aggregate, AggregateFunction, Filter, FilterRelation, JoinClause, JoinType, Operand,
    OrderDirection, Predicate, Query, QueryOperator,
};

/// Row visible to filters: plain column names plus `entity.column` aliases.
fn scoped(entity: &str, row: &Record, plain: bool) -> Record {
    let mut scoped = Record::new();
    for (column, value) in row.iter() {
        if plain {
            scoped.insert(column, value.clone());
        }
        scoped.insert(format!("{}.{}", entity, column), value.clone());
    }
    scoped
}

fn lookup(row: &Record, field: &str) -> DatabaseValue {
    row.get(field).cloned().unwrap_or(DatabaseValue::Null)
}

fn last_segment(field: &str) -> &str {
    field.rsplit('.').next().unwrap_or(field)
}

pub(crate) fn matches_all(entity: &str, row: &Record, filters: &[Filter]) -> bool {
    if filters.is_empty() {
        return true;
    }
    let row = scoped(entity, row, true);
    filters.iter().all(|filter| matches(&row, filter))
}

fn matches(row: &Record, filter: &Filter) -> bool {
    match filter {
        Filter::Predicate(predicate) => predicate_matches(row, predicate),
        Filter::Group {
            relation: FilterRelation::And,
            children,
        } => children.iter().all(|child| matches(row, child)),
        Filter::Group {
            relation: FilterRelation::Or,
            children,
        } => children.is_empty() || children.iter().any(|child| matches(row, child)),
    }
}

fn predicate_matches(row: &Record, predicate: &Predicate) -> bool {
    let left = lookup(row, &predicate.field);

    match (predicate.operator, &predicate.operand) {
        (QueryOperator::IsNull, _) => left.is_null(),
        (QueryOperator::IsNotNull, _) => !left.is_null(),
        (QueryOperator::In, Operand::List(values)) => values
            .iter()
            .any(|value| left.compare(value) == Some(Ordering::Equal)),
        (QueryOperator::NotIn, Operand::List(values)) => {
            !left.is_null()
                && values
                    .iter()
                    .all(|value| matches!(left.compare(value), Some(Ordering::Less | Ordering::Greater)))
        }
        (QueryOperator::Between, Operand::Range(low, high)) => {
            matches!(left.compare(low), Some(Ordering::Greater | Ordering::Equal))
                && matches!(left.compare(high), Some(Ordering::Less | Ordering::Equal))
        }
        (operator, operand) => {
            let right = match operand {
                Operand::Value(value) => value.clone(),
                Operand::Field(field) => lookup(row, field),
                _ => return false,
            };
            let ordering = left.compare(&right);
            match operator {
                QueryOperator::Equal => ordering == Some(Ordering::Equal),
                QueryOperator::NotEqual => {
                    matches!(ordering, Some(Ordering::Less | Ordering::Greater))
                }
                QueryOperator::GreaterThan => ordering == Some(Ordering::Greater),
                QueryOperator::GreaterThanOrEqual => {
                    matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
                }
                QueryOperator::LessThan => ordering == Some(Ordering::Less),
                QueryOperator::LessThanOrEqual => {
                    matches!(ordering, Some(Ordering::Less | Ordering::Equal))
                }
                QueryOperator::Like => like(&left, &right) == Some(true),
                QueryOperator::NotLike => like(&left, &right) == Some(false),
                _ => false,
            }
        }
    }
}

fn like(value: &DatabaseValue, pattern: &DatabaseValue) -> Option<bool> {
    let (DatabaseValue::String(value), DatabaseValue::String(pattern)) = (value, pattern) else {
        return None;
    };

    let mut expression = String::from("(?s)^");
    for c in pattern.chars() {
        match c {
            '%' => expression.push_str(".*"),
            '_' => expression.push('.'),
            other => expression.push_str(&regex::escape(&other.to_string())),
        }
    }
    expression.push('$');

    Regex::new(&expression).ok().map(|re| re.is_match(value))
}

fn apply_join(tables: &Tables, rows: Vec<Record>, join: &JoinClause) -> OrmResult<Vec<Record>> {
    let right_table = table(tables, &join.table)?;
    let right_rows: Vec<Record> = right_table
        .rows
        .iter()
        .map(|row| scoped(&join.table, row, true))
        .collect();

    let mut joined = Vec::new();
    for left in rows {
        let key = lookup(&left, &join.local_field);
        let mut matched = false;
        for right in &right_rows {
            if key.compare(&lookup(right, &join.foreign_field)) == Some(Ordering::Equal) {
                matched = true;
                joined.push(merge(&left, right));
            }
        }
        if !matched && join.join_type == JoinType::Left {
            let nulls: Record = right_table
                .fields
                .iter()
                .flat_map(|f| {
                    [
                        (f.name.clone(), DatabaseValue::Null),
                        (format!("{}.{}", join.table, f.name), DatabaseValue::Null),
                    ]
                })
                .collect();
            joined.push(merge(&left, &nulls));
        }
    }
    Ok(joined)
}

fn merge(left: &Record, right: &Record) -> Record {
    let mut merged = left.clone();
    for (column, value) in right.iter() {
        if column.contains('.') || !merged.contains(column) {
            merged.insert(column, value.clone());
        }
    }
    merged
}

fn aggregate_value(
    aggregate: &Aggregate,
    rows: &[Record],
) -> OrmResult<DatabaseValue> {
    let values: Vec<DatabaseValue> = match &aggregate.field {
        None => {
            return Ok(DatabaseValue::Int64(rows.len() as i64));
        }
        Some(field) => rows
            .iter()
            .map(|row| lookup(row, field))
            .filter(|value| !value.is_null())
            .collect(),
    };

    if aggregate.function == AggregateFunction::Count {
        return Ok(DatabaseValue::Int64(values.len() as i64));
    }
    if values.is_empty() {
        return Ok(DatabaseValue::Null);
    }

    let numeric = |value: &DatabaseValue| {
        value.as_f64().ok_or_else(|| {
            ModelError::Query(format!(
                "{} requires a numeric field, got {}",
                aggregate.function, value
            ))
        })
    };

    match aggregate.function {
        AggregateFunction::Count => Ok(DatabaseValue::Int64(values.len() as i64)),
        AggregateFunction::Sum => {
            if values.iter().all(|v| v.as_i64().is_some()) {
                let mut total = 0i64;
                for value in values.iter().filter_map(DatabaseValue::as_i64) {
                    total = total.checked_add(value).ok_or_else(|| {
                        ModelError::Query(format!(
                            "SUM({}) overflows a 64-bit integer",
                            aggregate.field.as_deref().unwrap_or_default()
                        ))
                    })?;
                }
                Ok(DatabaseValue::Int64(total))
            } else {
                let mut total = 0.0;
                for value in &values {
                    total += numeric(value)?;
                }
                Ok(DatabaseValue::Float64(total))
            }
        }
        AggregateFunction::Average => {
            let mut total = 0.0;
            for value in &values {
                total += numeric(value)?;
            }
            Ok(DatabaseValue::Float64(total / values.len() as f64))
        }
        AggregateFunction::Min | AggregateFunction::Max => {
            let wanted = if aggregate.function == AggregateFunction::Min {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            let mut best = values[0].clone();
            for value in &values[1..] {
                if value.compare(&best) == Some(wanted) {
                    best = value.clone();
                }
            }
            Ok(best)
        }
    }
}

fn group(rows: Vec<Record>, query: &Query) -> OrmResult<Vec<Record>> {
    let mut order: Vec<Vec<DatabaseValue>> = Vec::new();
    let mut buckets: HashMap<Vec<DatabaseValue>, Vec<Record>> = HashMap::new();

    if query.groups.is_empty() {
        order.push(Vec::new());
        buckets.insert(Vec::new(), rows);
    } else {
        for row in rows {
            let key: Vec<DatabaseValue> = query
                .groups
                .iter()
                .map(|field| lookup(&row, field).normalized())
                .collect();
            if !buckets.contains_key(&key) {
                order.push(key.clone());
            }
            buckets.entry(key).or_default().push(row);
        }
    }

    let mut grouped = Vec::with_capacity(order.len());
    for key in order {
        let members = buckets.remove(&key).unwrap_or_default();
        let mut output = Record::new();
        for (field, value) in query.groups.iter().zip(key) {
            output.insert(last_segment(field), value);
        }
        for aggregate in &query.aggregates {
            output.insert(aggregate.alias.clone(), aggregate_value(aggregate, &members)?);
        }
        grouped.push(output);
    }
    Ok(grouped)
}

fn project(row: &Record, fields: &[String], joined: bool) -> Record {
    if fields.is_empty() {
        return if joined {
            row.clone()
        } else {
            row.iter()
                .filter(|(column, _)| !column.contains('.'))
                .map(|(column, value)| (column.to_string(), value.clone()))
                .collect()
        };
    }

    let mut projected = Record::new();
    for field in fields {
        if field == "*" {
            for (column, value) in row.iter().filter(|(c, _)| !c.contains('.')) {
                projected.insert(column, value.clone());
            }
        } else if let Some(prefix) = field.strip_suffix(".*") {
            let prefix = format!("{}.", prefix);
            for (column, value) in row.iter() {
                if let Some(name) = column.strip_prefix(&prefix) {
                    projected.insert(name, value.clone());
                }
            }
        } else {
            projected.insert(last_segment(field), lookup(row, field));
        }
    }
    projected
}

/// Evaluate a read query against the current tables
pub(crate) fn read(tables: &Tables, query: &Query) -> OrmResult<Vec<Record>> {
    let entity = query.entity();
    let base = table(tables, entity)?;

    let mut rows: Vec<Record> = base.rows.iter().map(|row| scoped(entity, row, true)).collect();
    for join in &query.joins {
        rows = apply_join(tables, rows, join)?;
    }
    rows.retain(|row| query.filters.iter().all(|filter| matches(row, filter)));

    let grouped = !query.groups.is_empty() || !query.aggregates.is_empty();
    if grouped {
        rows = group(rows, query)?;
    }

    if !query.sorts.is_empty() {
        rows.sort_by(|a, b| {
            for sort in &query.sorts {
                let ordering = lookup(a, &sort.field).sort_cmp(&lookup(b, &sort.field));
                let ordering = match sort.direction {
                    OrderDirection::Asc => ordering,
                    OrderDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }

    if !grouped {
        let joined = !query.joins.is_empty();
        rows = rows
            .iter()
            .map(|row| project(row, &query.fields, joined))
            .collect();
    }

    if query.distinct {
        let mut seen = HashSet::new();
        rows.retain(|row| {
            let key: Vec<DatabaseValue> = row.iter().map(|(_, v)| v.clone().normalized()).collect();
            seen.insert(key)
        });
    }

    if let Some(range) = &query.range {
        let offset = range.offset.unwrap_or(0) as usize;
        let limit = range.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        rows = rows.into_iter().skip(offset).take(limit).collect();
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, DatabaseValue)]) -> Record {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_like_patterns() {
        let value = DatabaseValue::from("john.doe@example.com");
        assert_eq!(like(&value, &"%@example.com".into()), Some(true));
        assert_eq!(like(&value, &"john_doe%".into()), Some(true));
        assert_eq!(like(&value, &"jane%".into()), Some(false));
        assert_eq!(like(&DatabaseValue::Int64(1), &"%".into()), None);
    }

    #[test]
    fn test_integer_sum_overflow_is_an_error() {
        let rows = vec![
            row(&[("total", i64::MAX.into())]),
            row(&[("total", 1i64.into())]),
        ];
        let sum = Aggregate::new(AggregateFunction::Sum, Some("total"), "aggregate");
        let err = aggregate_value(&sum, &rows).unwrap_err();
        assert!(matches!(err, ModelError::Query(ref message) if message.contains("overflows")));

        let fits = vec![row(&[("total", (i64::MAX - 1).into())]), row(&[("total", 1i64.into())])];
        assert_eq!(aggregate_value(&sum, &fits).unwrap(), DatabaseValue::Int64(i64::MAX));
    }

    #[test]
    fn test_null_semantics_in_predicates() {
        let record = row(&[("age", DatabaseValue::Null)]);
        let eq = Filter::predicate("age", QueryOperator::Equal, Operand::Value(DatabaseValue::Null));
        let ne = Filter::predicate("age", QueryOperator::NotEqual, Operand::Value(1i64.into()));
        let is_null = Filter::predicate("age", QueryOperator::IsNull, Operand::None);

        assert!(!matches(&record, &eq));
        assert!(!matches(&record, &ne));
        assert!(matches(&record, &is_null));
    }

    #[test]
    fn test_field_comparison() {
        let record = row(&[("spent", 10i64.into()), ("budget", 12i64.into())]);
        let filter = Filter::predicate(
            "spent",
            QueryOperator::LessThan,
            Operand::Field("budget".into()),
        );
        assert!(matches(&record, &filter));
    }

    #[test]
    fn test_projection_strips_qualifiers() {
        let record = row(&[
            ("id", 1i64.into()),
            ("users.id", 1i64.into()),
            ("posts.title", "Hello".into()),
        ]);
        let projected = project(&record, &["users.id".into(), "posts.title".into()], true);
        let columns: Vec<&str> = projected.columns().collect();
        assert_eq!(columns, vec!["id", "title"]);
    }
}
