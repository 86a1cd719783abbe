//! Database handles
//!
//! A [`Database`] ties a backend, its connection pool and a statement logger
//! together. Handles are cheap to clone. Named databases live in an explicitly
//! constructed [`DatabaseRegistry`].

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::backends::{
    Capabilities, DatabaseBackend, DatabaseBackendType, MemoryBackend, Record,
};
use crate::config::DatabaseConfig;
use crate::connection::{Connection, ConnectionPool, OwnerId, PoolStats, RowStream};
use crate::error::{ModelError, OrmResult};
use crate::logging::{NullQueryLogger, QueryLogger, Statement, TracingQueryLogger};
use crate::migrations::Migrator;
use crate::model::Model;
use crate::query::{Query, QueryBuilder};
use crate::schema::{Schema, SchemaBuilder};

struct DatabaseInner {
    config: DatabaseConfig,
    backend: Arc<dyn DatabaseBackend>,
    pool: ConnectionPool,
    logger: Arc<dyn QueryLogger>,
}

/// Handle to one configured database
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    /// Connection pinned by an open transaction
    session: Option<Connection>,
    owner: Option<OwnerId>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.inner.config.name)
            .field("backend", &self.inner.backend.backend_type())
            .field("in_transaction", &self.session.is_some())
            .field("owner", &self.owner)
            .finish()
    }
}

impl Database {
    /// Build a handle over `backend`. Statements go to the tracing logger when
    /// `config.log_queries` is set.
    pub fn new(backend: Arc<dyn DatabaseBackend>, config: DatabaseConfig) -> OrmResult<Self> {
        let logger: Arc<dyn QueryLogger> = if config.log_queries {
            Arc::new(TracingQueryLogger)
        } else {
            Arc::new(NullQueryLogger)
        };
        Self::with_logger(backend, config, logger)
    }

    pub fn with_logger(
        backend: Arc<dyn DatabaseBackend>,
        config: DatabaseConfig,
        logger: Arc<dyn QueryLogger>,
    ) -> OrmResult<Self> {
        let pool = ConnectionPool::new(backend.clone(), &config.pool)?;
        info!(
            name = %config.name,
            backend = %backend.backend_type(),
            max_connections = config.pool.max_connections,
            "Database configured"
        );
        Ok(Self {
            inner: Arc::new(DatabaseInner {
                config,
                backend,
                pool,
                logger,
            }),
            session: None,
            owner: None,
        })
    }

    /// Pick the backend from the configured URL
    pub fn connect(config: DatabaseConfig) -> OrmResult<Self> {
        config.validate()?;
        let backend: Arc<dyn DatabaseBackend> = match config.backend_type()? {
            DatabaseBackendType::Memory => Arc::new(MemoryBackend::new()),
            #[cfg(feature = "postgres")]
            DatabaseBackendType::PostgreSQL => {
                Arc::new(crate::backends::PostgresBackend::new(config.url.clone())?)
            }
            #[cfg(not(feature = "postgres"))]
            DatabaseBackendType::PostgreSQL => {
                return Err(ModelError::Configuration(
                    "PostgreSQL support requires the `postgres` feature".to_string(),
                ))
            }
        };
        Self::new(backend, config)
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.inner.config
    }

    pub fn backend(&self) -> &Arc<dyn DatabaseBackend> {
        &self.inner.backend
    }

    pub fn backend_type(&self) -> DatabaseBackendType {
        self.inner.backend.backend_type()
    }

    pub fn capabilities(&self) -> &'static Capabilities {
        self.inner.backend.capabilities()
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.inner.pool
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.inner.pool.stats()
    }

    /// Handle whose connections are keyed by `owner` instead of the calling thread
    pub fn for_owner(&self, owner: OwnerId) -> Database {
        Database {
            inner: self.inner.clone(),
            session: self.session.clone(),
            owner: Some(owner),
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.session.is_some()
    }

    /// Connection for this handle: the transaction's connection when one is
    /// open, otherwise the owner's pooled connection
    pub async fn connection(&self) -> OrmResult<Connection> {
        if let Some(session) = &self.session {
            return Ok(session.clone());
        }
        match self.owner {
            Some(owner) => self.inner.pool.connection_for(owner).await,
            None => self.inner.pool.connection().await,
        }
    }

    /// Typed query builder for `M`
    pub fn query<M: Model>(&self) -> QueryBuilder<M> {
        QueryBuilder::for_model(self.clone())
    }

    /// Untyped query builder over `entity`
    pub fn table(&self, entity: &str) -> QueryBuilder<Record> {
        QueryBuilder::table(self.clone(), entity)
    }

    pub fn schema(&self) -> SchemaBuilder {
        SchemaBuilder::new(self.clone())
    }

    /// Migrator writing to the configured log table
    pub fn migrator(&self) -> Migrator {
        Migrator::new(self.clone())
    }

    pub(crate) fn log(&self, statement: &Statement) {
        self.inner.logger.log(statement);
    }

    /// Execute `query`, streaming rows back
    pub async fn stream(&self, query: Query) -> OrmResult<RowStream> {
        let connection = self.connection().await?;
        self.log(&self.inner.backend.describe(&query));
        connection.stream(query)
    }

    /// Execute `query` and collect its rows
    pub async fn fetch_all(&self, query: Query) -> OrmResult<Vec<Record>> {
        let mut stream = self.stream(query).await?;
        let mut records = Vec::new();
        while let Some(record) = stream.next().await {
            records.push(record);
        }
        stream.finish().await?;
        Ok(records)
    }

    pub async fn execute_schema(&self, schema: Schema) -> OrmResult<()> {
        let connection = self.connection().await?;
        self.log(&Statement::describe_schema(&schema));
        connection.execute_schema(schema).await
    }

    /// Run `work` inside a transaction on one pinned connection. Commits on
    /// `Ok`, rolls back on `Err` and returns the original error.
    ///
    /// Outside a transaction, tasks sharing a thread share that thread's
    /// pooled connection unless they use [`Database::for_owner`]. A
    /// transaction never borrows that shared entry: it takes a pool entry of
    /// its own, pinned so the pool cannot hand it to another owner until the
    /// transaction ends.
    pub async fn transaction<F, Fut, T>(&self, work: F) -> OrmResult<T>
    where
        F: FnOnce(Database) -> Fut,
        Fut: Future<Output = OrmResult<T>>,
    {
        Capabilities::require(
            self.capabilities().transactions,
            self.backend_type(),
            "transactions",
        )?;
        if self.session.is_some() {
            return Err(ModelError::Transaction(
                "nested transactions are not supported".to_string(),
            ));
        }

        let (pin, connection) = self.inner.pool.pinned_connection().await?;
        let outcome = self.run_transaction(&connection, work).await;
        self.inner.pool.unpin(pin);
        outcome
    }

    async fn run_transaction<F, Fut, T>(&self, connection: &Connection, work: F) -> OrmResult<T>
    where
        F: FnOnce(Database) -> Fut,
        Fut: Future<Output = OrmResult<T>>,
    {
        connection.begin_transaction().await?;
        debug!(database = %self.name(), connection = connection.id(), "Transaction started");

        let scoped = Database {
            inner: self.inner.clone(),
            session: Some(connection.clone()),
            owner: self.owner,
        };

        match work(scoped).await {
            Ok(value) => {
                connection.commit().await?;
                debug!(connection = connection.id(), "Transaction committed");
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = connection.rollback().await {
                    warn!(connection = connection.id(), error = %rollback, "Rollback failed");
                }
                debug!(connection = connection.id(), error = %e, "Transaction rolled back");
                Err(e)
            }
        }
    }

    /// Close the pool
    pub async fn close(&self) {
        self.inner.pool.close().await;
    }
}

/// Named databases with an optional default
#[derive(Debug, Clone, Default)]
pub struct DatabaseRegistry {
    databases: HashMap<String, Database>,
    default: Option<String>,
}

impl DatabaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect every configuration; the first one becomes the default
    pub fn from_configs(configs: Vec<DatabaseConfig>) -> OrmResult<Self> {
        let mut registry = Self::new();
        for config in configs {
            registry.register(Database::connect(config)?)?;
        }
        Ok(registry)
    }

    /// Register under the database's configured name
    pub fn register(&mut self, database: Database) -> OrmResult<()> {
        let name = database.name().to_string();
        if self.databases.contains_key(&name) {
            return Err(ModelError::Configuration(format!(
                "Database '{}' is already registered",
                name
            )));
        }
        if self.default.is_none() {
            self.default = Some(name.clone());
        }
        self.databases.insert(name, database);
        Ok(())
    }

    pub fn set_default(&mut self, name: &str) -> OrmResult<()> {
        if !self.databases.contains_key(name) {
            return Err(ModelError::Configuration(format!(
                "Unknown database '{}'",
                name
            )));
        }
        self.default = Some(name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Database> {
        self.databases.get(name)
    }

    pub fn default_database(&self) -> OrmResult<&Database> {
        self.default
            .as_deref()
            .and_then(|name| self.databases.get(name))
            .ok_or_else(|| ModelError::Configuration("No default database registered".to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.databases.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn pool_stats(&self) -> HashMap<String, PoolStats> {
        self.databases
            .iter()
            .map(|(name, db)| (name.clone(), db.pool_stats()))
            .collect()
    }

    pub async fn close_all(&self) {
        for database in self.databases.values() {
            database.close().await;
        }
    }
}
