//! PostgreSQL Backend Implementation
//!
//! Executes Query and Schema models over `sqlx`, rendering them through the
//! `sql` module. Each raw connection is a single `PgConnection`; pooling is
//! left to the crate's own connection pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgConnection, PgRow};
use sqlx::{Column, Connection, Postgres, Row, TypeInfo, ValueRef};
use tracing::debug;

use super::core::*;
use super::row::Record;
use super::value::DatabaseValue;
use crate::error::{ModelError, OrmResult};
use crate::logging::Statement;
use crate::query::{Query, QueryAction};
use crate::schema::Schema;
use crate::sql::{render_query, render_schema};

/// PostgreSQL database backend implementation
#[derive(Debug, Clone)]
pub struct PostgresBackend {
    url: String,
}

impl PostgresBackend {
    /// Create a backend for `url`; connections open lazily
    pub fn new(url: impl Into<String>) -> OrmResult<Self> {
        let url = url.into();
        Self::validate_database_url(&url)?;
        Ok(Self { url })
    }

    fn validate_database_url(url: &str) -> OrmResult<()> {
        let parsed = url::Url::parse(url)
            .map_err(|e| ModelError::Configuration(format!("Invalid database URL: {}", e)))?;
        match parsed.scheme() {
            "postgres" | "postgresql" => {}
            other => {
                return Err(ModelError::Configuration(format!(
                    "Invalid PostgreSQL URL scheme '{}'",
                    other
                )))
            }
        }
        if parsed.host_str().is_none() {
            return Err(ModelError::Configuration(
                "Missing host in database URL".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DatabaseBackend for PostgresBackend {
    fn backend_type(&self) -> DatabaseBackendType {
        DatabaseBackendType::PostgreSQL
    }

    fn capabilities(&self) -> &'static Capabilities {
        &Capabilities::POSTGRESQL
    }

    async fn connect(&self) -> OrmResult<Box<dyn DatabaseConnection>> {
        let conn = PgConnection::connect(&self.url)
            .await
            .map_err(|e| ModelError::Connection(format!("Failed to connect to PostgreSQL: {}", e)))?;
        debug!("Opened PostgreSQL connection");
        Ok(Box::new(PostgresConnection {
            conn,
            closed: Arc::new(AtomicBool::new(false)),
        }))
    }

    fn describe(&self, query: &Query) -> Statement {
        let rendered = render_query(query, SqlDialect::PostgreSQL);
        Statement {
            entity: query.entity().to_string(),
            action: query.action.to_string(),
            text: rendered.sql,
            bindings: rendered.params,
        }
    }
}

/// PostgreSQL connection wrapper
pub struct PostgresConnection {
    conn: PgConnection,
    closed: Arc<AtomicBool>,
}

impl PostgresConnection {
    fn observe(&mut self, error: sqlx::Error) -> ModelError {
        if matches!(error, sqlx::Error::Io(_) | sqlx::Error::Protocol(_)) {
            self.closed.store(true, Ordering::SeqCst);
        }
        ModelError::from(error)
    }

    async fn run(&mut self, sql: &str) -> OrmResult<()> {
        let result = sqlx::query(sql).execute(&mut self.conn).await;
        result.map(|_| ()).map_err(|e| self.observe(e))
    }
}

#[async_trait]
impl DatabaseConnection for PostgresConnection {
    async fn execute(&mut self, query: &Query, on_row: RowSink<'_>) -> OrmResult<()> {
        let statement = render_query(query, SqlDialect::PostgreSQL);
        let mut prepared = sqlx::query(&statement.sql);
        for param in &statement.params {
            prepared = bind_database_value(prepared, param)?;
        }

        match query.action {
            QueryAction::Read | QueryAction::Create => {
                let mut failure = None;
                {
                    let mut rows = prepared.fetch(&mut self.conn);
                    loop {
                        match rows.try_next().await {
                            Ok(Some(row)) => on_row(postgres_row_to_record(&row)?)?,
                            Ok(None) => break,
                            Err(e) => {
                                failure = Some(e);
                                break;
                            }
                        }
                    }
                }
                match failure {
                    Some(e) => Err(self.observe(e)),
                    None => Ok(()),
                }
            }
            QueryAction::Update | QueryAction::Delete => {
                let result = prepared.execute(&mut self.conn).await;
                match result {
                    Ok(done) => {
                        debug!(entity = query.entity(), affected = done.rows_affected(), "Statement complete");
                        Ok(())
                    }
                    Err(e) => Err(self.observe(e)),
                }
            }
        }
    }

    async fn execute_schema(&mut self, schema: &Schema) -> OrmResult<()> {
        for statement in render_schema(schema, SqlDialect::PostgreSQL) {
            self.run(&statement).await?;
        }
        Ok(())
    }

    async fn begin_transaction(&mut self) -> OrmResult<()> {
        self.run("BEGIN").await
    }

    async fn commit(&mut self) -> OrmResult<()> {
        self.run("COMMIT").await
    }

    async fn rollback(&mut self) -> OrmResult<()> {
        self.run("ROLLBACK").await
    }

    fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }

    async fn close(&mut self) -> OrmResult<()> {
        // The socket itself is released when the connection is dropped
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Bind a DatabaseValue to a sqlx query
fn bind_database_value<'a>(
    query: sqlx::query::Query<'a, Postgres, PgArguments>,
    value: &DatabaseValue,
) -> OrmResult<sqlx::query::Query<'a, Postgres, PgArguments>> {
    match value {
        DatabaseValue::Null => Ok(query.bind(Option::<String>::None)),
        DatabaseValue::Bool(b) => Ok(query.bind(*b)),
        DatabaseValue::Int32(i) => Ok(query.bind(*i)),
        DatabaseValue::Int64(i) => Ok(query.bind(*i)),
        DatabaseValue::Float64(f) => Ok(query.bind(*f)),
        DatabaseValue::String(s) => Ok(query.bind(s.clone())),
        DatabaseValue::Bytes(b) => Ok(query.bind(b.clone())),
        DatabaseValue::Uuid(u) => Ok(query.bind(*u)),
        DatabaseValue::DateTime(dt) => Ok(query.bind(*dt)),
        DatabaseValue::Json(j) => Ok(query.bind(j.clone())),
        DatabaseValue::Array(_) => Err(ModelError::unsupported(
            "postgresql",
            "binding array values",
        )),
    }
}

fn postgres_row_to_record(row: &PgRow) -> OrmResult<Record> {
    let mut record = Record::new();
    for (index, column) in row.columns().iter().enumerate() {
        record.insert(column.name(), postgres_value_to_database_value(row, index)?);
    }
    Ok(record)
}

fn decode_error(type_name: &str, e: sqlx::Error) -> ModelError {
    ModelError::Query(format!("Failed to decode {} value: {}", type_name, e))
}

/// Convert a PostgreSQL column value to DatabaseValue
fn postgres_value_to_database_value(row: &PgRow, index: usize) -> OrmResult<DatabaseValue> {
    let raw = row.try_get_raw(index).map_err(|e| decode_error("raw", e))?;
    if raw.is_null() {
        return Ok(DatabaseValue::Null);
    }
    let type_name = row.columns()[index].type_info().name().to_string();

    let value = match type_name.as_str() {
        "BOOL" => DatabaseValue::Bool(row.try_get(index).map_err(|e| decode_error(&type_name, e))?),
        "INT2" => {
            let value: i16 = row.try_get(index).map_err(|e| decode_error(&type_name, e))?;
            DatabaseValue::Int32(value as i32)
        }
        "INT4" => DatabaseValue::Int32(row.try_get(index).map_err(|e| decode_error(&type_name, e))?),
        "INT8" => DatabaseValue::Int64(row.try_get(index).map_err(|e| decode_error(&type_name, e))?),
        "FLOAT4" => {
            let value: f32 = row.try_get(index).map_err(|e| decode_error(&type_name, e))?;
            DatabaseValue::Float64(value as f64)
        }
        "FLOAT8" => DatabaseValue::Float64(row.try_get(index).map_err(|e| decode_error(&type_name, e))?),
        "BYTEA" => DatabaseValue::Bytes(row.try_get(index).map_err(|e| decode_error(&type_name, e))?),
        "UUID" => DatabaseValue::Uuid(row.try_get(index).map_err(|e| decode_error(&type_name, e))?),
        "TIMESTAMPTZ" => {
            DatabaseValue::DateTime(row.try_get(index).map_err(|e| decode_error(&type_name, e))?)
        }
        "TIMESTAMP" => {
            let value: chrono::NaiveDateTime =
                row.try_get(index).map_err(|e| decode_error(&type_name, e))?;
            DatabaseValue::DateTime(value.and_utc())
        }
        "JSON" | "JSONB" => {
            let value: JsonValue = row.try_get(index).map_err(|e| decode_error(&type_name, e))?;
            DatabaseValue::Json(value)
        }
        _ => DatabaseValue::String(row.try_get(index).map_err(|e| decode_error(&type_name, e))?),
    };
    Ok(value)
}
