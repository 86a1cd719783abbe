//! Aggregate execution
//!
//! Aggregates run against a private copy of the builder's query; sorts,
//! selections and the range window are dropped from that copy. Counting a
//! distinct query runs the projection itself.

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::backends::{DatabaseValue, Record};
use crate::error::{ModelError, OrmResult};

use super::builder::QueryBuilder;
use super::statement::Query;
use super::types::{Aggregate, AggregateFunction};

const AGGREGATE_ALIAS: &str = "aggregate";

impl<M> QueryBuilder<M> {
    fn aggregate_query(&self, aggregates: Vec<Aggregate>, grouped: bool) -> Query {
        let mut query = self.prepared();
        query.sorts.clear();
        query.range = None;
        query.distinct = false;
        query.fields.clear();
        if !grouped {
            query.groups.clear();
        }
        query.aggregates = aggregates;
        query
    }

    async fn scalar(&self, function: AggregateFunction, field: Option<&str>) -> OrmResult<Option<DatabaseValue>> {
        let query = self.aggregate_query(vec![Aggregate::new(function, field, AGGREGATE_ALIAS)], false);
        let mut rows = self.db.fetch_all(query).await?;
        let value = match rows.first_mut() {
            Some(row) => row.remove(AGGREGATE_ALIAS),
            None => None,
        };
        Ok(value.filter(|v| !v.is_null()))
    }

    async fn scalar_as<T: DeserializeOwned>(&self, function: AggregateFunction, field: &str) -> OrmResult<T> {
        match self.scalar(function, Some(field)).await? {
            Some(value) => decode_aggregate(function, value),
            None => Err(ModelError::NoAggregateResult {
                entity: self.entity().to_string(),
                function: function.to_string(),
            }),
        }
    }

    async fn scalar_or<T: DeserializeOwned>(&self, function: AggregateFunction, field: &str, default: T) -> OrmResult<T> {
        match self.scalar(function, Some(field)).await? {
            Some(value) => decode_aggregate(function, value),
            None => Ok(default),
        }
    }

    /// Number of matching rows. A distinct query counts its distinct
    /// projected rows.
    pub async fn count(&self) -> OrmResult<u64> {
        if self.query.distinct {
            return self.count_rows().await;
        }
        let value = self.scalar(AggregateFunction::Count, None).await?;
        Ok(value.as_ref().and_then(DatabaseValue::as_i64).unwrap_or(0).max(0) as u64)
    }

    async fn count_rows(&self) -> OrmResult<u64> {
        let mut query = self.prepared();
        query.sorts.clear();
        query.range = None;

        let mut stream = self.db.stream(query).await?;
        let mut count = 0u64;
        while stream.next().await.is_some() {
            count += 1;
        }
        stream.finish().await?;
        Ok(count)
    }

    /// Fails with `NoAggregateResult` when no non-null value exists
    pub async fn sum<T: DeserializeOwned>(&self, field: &str) -> OrmResult<T> {
        self.scalar_as(AggregateFunction::Sum, field).await
    }

    pub async fn sum_or<T: DeserializeOwned>(&self, field: &str, default: T) -> OrmResult<T> {
        self.scalar_or(AggregateFunction::Sum, field, default).await
    }

    pub async fn avg<T: DeserializeOwned>(&self, field: &str) -> OrmResult<T> {
        self.scalar_as(AggregateFunction::Average, field).await
    }

    pub async fn avg_or<T: DeserializeOwned>(&self, field: &str, default: T) -> OrmResult<T> {
        self.scalar_or(AggregateFunction::Average, field, default).await
    }

    pub async fn min<T: DeserializeOwned>(&self, field: &str) -> OrmResult<T> {
        self.scalar_as(AggregateFunction::Min, field).await
    }

    pub async fn min_or<T: DeserializeOwned>(&self, field: &str, default: T) -> OrmResult<T> {
        self.scalar_or(AggregateFunction::Min, field, default).await
    }

    pub async fn max<T: DeserializeOwned>(&self, field: &str) -> OrmResult<T> {
        self.scalar_as(AggregateFunction::Max, field).await
    }

    pub async fn max_or<T: DeserializeOwned>(&self, field: &str, default: T) -> OrmResult<T> {
        self.scalar_or(AggregateFunction::Max, field, default).await
    }

    /// One row per group (per `group_by` fields) carrying the group fields
    /// and each aggregate under its alias
    pub async fn aggregate_rows(&self, aggregates: Vec<Aggregate>) -> OrmResult<Vec<Record>> {
        let query = self.aggregate_query(aggregates, true);
        self.db.fetch_all(query).await
    }
}

/// Decode an aggregate value into `T`. Numeric results some drivers report
/// as decimal strings are retried as numbers.
fn decode_aggregate<T: DeserializeOwned>(function: AggregateFunction, value: DatabaseValue) -> OrmResult<T> {
    let json = value.to_json();
    match serde_json::from_value::<T>(json.clone()) {
        Ok(decoded) => Ok(decoded),
        Err(e) => {
            let numeric = match &json {
                JsonValue::String(text) => text
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(JsonValue::Number),
                _ => None,
            };
            numeric
                .and_then(|number| serde_json::from_value(number).ok())
                .ok_or_else(|| {
                    ModelError::Serialization(format!("Cannot decode {} result {}: {}", function, json, e))
                })
        }
    }
}
