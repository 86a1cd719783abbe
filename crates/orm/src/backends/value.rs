//! Database values
//!
//! Backend-neutral value representation used for bound parameters, payloads,
//! filter operands and result rows.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Database value enumeration for type-safe parameter binding
#[derive(Debug, Clone)]
pub enum DatabaseValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    Json(JsonValue),
    Array(Vec<DatabaseValue>),
}

impl DatabaseValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Widen integers so values that compare equal also hash equal
    pub fn normalized(self) -> Self {
        match self {
            DatabaseValue::Int32(i) => DatabaseValue::Int64(i as i64),
            DatabaseValue::Array(values) => {
                DatabaseValue::Array(values.into_iter().map(DatabaseValue::normalized).collect())
            }
            other => other,
        }
    }

    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            DatabaseValue::Int32(i) => Some(*i as f64),
            DatabaseValue::Int64(i) => Some(*i as f64),
            DatabaseValue::Float64(f) => Some(*f),
            _ => None,
        }
    }

    pub(crate) fn as_i64(&self) -> Option<i64> {
        match self {
            DatabaseValue::Int32(i) => Some(*i as i64),
            DatabaseValue::Int64(i) => Some(*i),
            _ => None,
        }
    }

    /// SQL-style comparison. `None` when either side is null or the types
    /// cannot be ordered against each other.
    pub fn compare(&self, other: &DatabaseValue) -> Option<Ordering> {
        use DatabaseValue::*;

        match (self, other) {
            (Null, _) | (_, Null) => None,
            (Bool(a), Bool(b)) => Some(a.cmp(b)),
            (String(a), String(b)) => Some(a.cmp(b)),
            (Bytes(a), Bytes(b)) => Some(a.cmp(b)),
            (Uuid(a), Uuid(b)) => Some(a.cmp(b)),
            (Uuid(a), String(b)) => Some(a.to_string().cmp(b)),
            (String(a), Uuid(b)) => Some(a.cmp(&b.to_string())),
            (DateTime(a), DateTime(b)) => Some(a.cmp(b)),
            (DateTime(a), String(b)) => chrono::DateTime::parse_from_rfc3339(b)
                .ok()
                .map(|b| a.cmp(&b.with_timezone(&Utc))),
            (String(a), DateTime(b)) => chrono::DateTime::parse_from_rfc3339(a)
                .ok()
                .map(|a| a.with_timezone(&Utc).cmp(b)),
            (Json(a), Json(b)) => (a == b).then_some(Ordering::Equal),
            (Array(a), Array(b)) => {
                for (left, right) in a.iter().zip(b.iter()) {
                    match left.compare(right)? {
                        Ordering::Equal => continue,
                        unequal => return Some(unequal),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            (a, b) => match (a.as_i64(), b.as_i64()) {
                (Some(a), Some(b)) => Some(a.cmp(&b)),
                _ => match (a.as_f64(), b.as_f64()) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => None,
                },
            },
        }
    }

    /// Total ordering for sorting: nulls sort first, incomparable values tie.
    pub fn sort_cmp(&self, other: &DatabaseValue) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.compare(other).unwrap_or(Ordering::Equal),
        }
    }

    /// Convert to JSON value
    pub fn to_json(&self) -> JsonValue {
        match self {
            DatabaseValue::Null => JsonValue::Null,
            DatabaseValue::Bool(b) => JsonValue::Bool(*b),
            DatabaseValue::Int32(i) => JsonValue::Number((*i).into()),
            DatabaseValue::Int64(i) => JsonValue::Number((*i).into()),
            DatabaseValue::Float64(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            DatabaseValue::String(s) => JsonValue::String(s.clone()),
            DatabaseValue::Bytes(b) => {
                JsonValue::Array(b.iter().map(|&x| JsonValue::Number(x.into())).collect())
            }
            DatabaseValue::Uuid(u) => JsonValue::String(u.to_string()),
            DatabaseValue::DateTime(dt) => JsonValue::String(dt.to_rfc3339()),
            DatabaseValue::Json(j) => j.clone(),
            DatabaseValue::Array(arr) => JsonValue::Array(arr.iter().map(|v| v.to_json()).collect()),
        }
    }

    /// Create DatabaseValue from JSON value
    pub fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => DatabaseValue::Null,
            JsonValue::Bool(b) => DatabaseValue::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    DatabaseValue::Int64(i)
                } else if let Some(f) = n.as_f64() {
                    DatabaseValue::Float64(f)
                } else {
                    DatabaseValue::Null
                }
            }
            JsonValue::String(s) => DatabaseValue::String(s),
            JsonValue::Array(arr) => {
                DatabaseValue::Array(arr.into_iter().map(DatabaseValue::from_json).collect())
            }
            JsonValue::Object(_) => DatabaseValue::Json(json),
        }
    }
}

impl PartialEq for DatabaseValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DatabaseValue::Null, DatabaseValue::Null) => true,
            _ => self.compare(other) == Some(Ordering::Equal),
        }
    }
}

// Floats are compared by bit pattern when hashing; NaN keys are not expected
// in identifier sets.
impl Eq for DatabaseValue {}

impl Hash for DatabaseValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            DatabaseValue::Null => 0u8.hash(state),
            DatabaseValue::Bool(b) => b.hash(state),
            DatabaseValue::Int32(i) => (*i as i64).hash(state),
            DatabaseValue::Int64(i) => i.hash(state),
            DatabaseValue::Float64(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    (*f as i64).hash(state)
                } else {
                    f.to_bits().hash(state)
                }
            }
            DatabaseValue::String(s) => s.hash(state),
            DatabaseValue::Bytes(b) => b.hash(state),
            DatabaseValue::Uuid(u) => u.to_string().hash(state),
            DatabaseValue::DateTime(dt) => dt.hash(state),
            DatabaseValue::Json(j) => j.to_string().hash(state),
            DatabaseValue::Array(values) => values.hash(state),
        }
    }
}

impl fmt::Display for DatabaseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseValue::Null => write!(f, "NULL"),
            DatabaseValue::Bool(b) => write!(f, "{}", b),
            DatabaseValue::Int32(i) => write!(f, "{}", i),
            DatabaseValue::Int64(i) => write!(f, "{}", i),
            DatabaseValue::Float64(v) => write!(f, "{}", v),
            DatabaseValue::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            DatabaseValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            DatabaseValue::Uuid(u) => write!(f, "'{}'", u),
            DatabaseValue::DateTime(dt) => write!(f, "'{}'", dt.to_rfc3339()),
            DatabaseValue::Json(j) => write!(f, "'{}'", j),
            DatabaseValue::Array(values) => {
                let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        DatabaseValue::Bool(value)
    }
}

impl From<i32> for DatabaseValue {
    fn from(value: i32) -> Self {
        DatabaseValue::Int32(value)
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<u32> for DatabaseValue {
    fn from(value: u32) -> Self {
        DatabaseValue::Int64(value as i64)
    }
}

impl From<f64> for DatabaseValue {
    fn from(value: f64) -> Self {
        DatabaseValue::Float64(value)
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl From<&String> for DatabaseValue {
    fn from(value: &String) -> Self {
        DatabaseValue::String(value.clone())
    }
}

impl From<Vec<u8>> for DatabaseValue {
    fn from(value: Vec<u8>) -> Self {
        DatabaseValue::Bytes(value)
    }
}

impl From<Uuid> for DatabaseValue {
    fn from(value: Uuid) -> Self {
        DatabaseValue::Uuid(value)
    }
}

impl From<DateTime<Utc>> for DatabaseValue {
    fn from(value: DateTime<Utc>) -> Self {
        DatabaseValue::DateTime(value)
    }
}

impl From<JsonValue> for DatabaseValue {
    fn from(value: JsonValue) -> Self {
        DatabaseValue::Json(value)
    }
}

impl<T> From<Option<T>> for DatabaseValue
where
    T: Into<DatabaseValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => DatabaseValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_integer_widths_compare_and_hash_equal() {
        let narrow = DatabaseValue::Int32(7);
        let wide = DatabaseValue::Int64(7);
        assert_eq!(narrow, wide);

        let mut set = HashSet::new();
        set.insert(narrow);
        assert!(!set.insert(wide));
    }

    #[test]
    fn test_null_never_compares() {
        assert_eq!(DatabaseValue::Null.compare(&DatabaseValue::Int64(1)), None);
        assert_eq!(DatabaseValue::Null, DatabaseValue::Null);
        assert_eq!(
            DatabaseValue::Null.sort_cmp(&DatabaseValue::Int64(1)),
            Ordering::Less
        );
    }

    #[test]
    fn test_mixed_numeric_ordering() {
        let int = DatabaseValue::Int64(2);
        let float = DatabaseValue::Float64(2.5);
        assert_eq!(int.compare(&float), Some(Ordering::Less));
    }

    #[test]
    fn test_datetime_compares_with_rfc3339_string() {
        let now = Utc::now();
        let later = DatabaseValue::String((now + chrono::Duration::hours(1)).to_rfc3339());
        assert_eq!(
            DatabaseValue::DateTime(now).compare(&later),
            Some(Ordering::Less)
        );
    }

    #[test]
    fn test_json_round_trip_keeps_integers_wide() {
        let value = DatabaseValue::from_json(serde_json::json!(42));
        assert!(matches!(value, DatabaseValue::Int64(42)));
        assert_eq!(value.to_json(), serde_json::json!(42));
    }
}
