//! Per-connection operation pipeline
//!
//! Each raw connection is owned by one background task. Callers submit
//! operations through a channel and the task runs them strictly in
//! submission order. A failed operation reports its error to its own caller
//! only; the pipeline keeps going.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::backends::{DatabaseBackendType, DatabaseConnection, Record};
use crate::error::{ModelError, OrmResult, PoolError};
use crate::query::Query;
use crate::schema::Schema;

type Operation =
    Box<dyn for<'c> FnOnce(&'c mut dyn DatabaseConnection) -> BoxFuture<'c, ()> + Send>;

fn operation<F>(f: F) -> Operation
where
    F: for<'c> FnOnce(&'c mut dyn DatabaseConnection) -> BoxFuture<'c, ()> + Send + 'static,
{
    Box::new(f)
}

/// Shared handle to a pipelined connection. Clones refer to the same
/// connection and the same queue.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    id: u64,
    backend: DatabaseBackendType,
    sender: mpsc::UnboundedSender<Operation>,
    closed: Arc<AtomicBool>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("backend", &self.inner.backend)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Connection {
    /// Hand `raw` to a new pipeline task. Must be called inside a tokio runtime.
    pub fn spawn(id: u64, backend: DatabaseBackendType, raw: Box<dyn DatabaseConnection>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let closed = raw.closed_flag();
        tokio::spawn(run_pipeline(id, raw, receiver));

        Self {
            inner: Arc::new(ConnectionInner {
                id,
                backend,
                sender,
                closed,
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn backend_type(&self) -> DatabaseBackendType {
        self.inner.backend
    }

    /// Whether the driver reported the connection closed. Read directly from
    /// the driver's flag, so no queued operation has to run first.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst) || self.inner.sender.is_closed()
    }

    /// Whether both handles refer to the same connection
    pub fn same_as(&self, other: &Connection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Queue `op` behind every previously submitted operation and wait for its result
    pub async fn submit<T, F>(&self, op: F) -> OrmResult<T>
    where
        T: Send + 'static,
        F: for<'c> FnOnce(&'c mut dyn DatabaseConnection) -> BoxFuture<'c, OrmResult<T>>
            + Send
            + 'static,
    {
        let (reply, result) = oneshot::channel();
        let id = self.inner.id;
        let queued = operation(move |conn| {
            Box::pin(async move {
                let outcome = op(conn).await;
                if let Err(e) = &outcome {
                    debug!(connection = id, error = %e, "Pipeline operation failed");
                }
                let _ = reply.send(outcome);
            })
        });

        self.inner
            .sender
            .send(queued)
            .map_err(|_| PoolError::PipelineStopped)?;
        result.await.map_err(|_| PoolError::PipelineStopped)?
    }

    /// Execute `query`, streaming rows back as the backend produces them
    pub fn stream(&self, query: Query) -> OrmResult<RowStream> {
        let (row_sender, rows) = mpsc::unbounded_channel();
        let (done_sender, done) = oneshot::channel();

        let queued = operation(move |conn| {
            Box::pin(async move {
                let mut sink = |record: Record| -> OrmResult<()> {
                    row_sender
                        .send(record)
                        .map_err(|_| ModelError::Query("row receiver dropped".to_string()))
                };
                let outcome = conn.execute(&query, &mut sink).await;
                let _ = done_sender.send(outcome);
            })
        });

        self.inner
            .sender
            .send(queued)
            .map_err(|_| PoolError::PipelineStopped)?;
        Ok(RowStream { rows, done })
    }

    /// Execute `query` and collect every produced row
    pub async fn fetch_all(&self, query: Query) -> OrmResult<Vec<Record>> {
        let mut stream = self.stream(query)?;
        let mut records = Vec::new();
        while let Some(record) = stream.next().await {
            records.push(record);
        }
        stream.finish().await?;
        Ok(records)
    }

    pub async fn execute_schema(&self, schema: Schema) -> OrmResult<()> {
        self.submit(move |conn| Box::pin(async move { conn.execute_schema(&schema).await }))
            .await
    }

    pub async fn begin_transaction(&self) -> OrmResult<()> {
        self.submit(|conn| conn.begin_transaction()).await
    }

    pub async fn commit(&self) -> OrmResult<()> {
        self.submit(|conn| conn.commit()).await
    }

    pub async fn rollback(&self) -> OrmResult<()> {
        self.submit(|conn| conn.rollback()).await
    }

    /// Close the raw connection; later submissions fail
    pub async fn close(&self) -> OrmResult<()> {
        let result = self.submit(|conn| conn.close()).await;
        self.inner.closed.store(true, Ordering::SeqCst);
        result
    }
}

/// Rows of one executing query, in backend order
pub struct RowStream {
    rows: mpsc::UnboundedReceiver<Record>,
    done: oneshot::Receiver<OrmResult<()>>,
}

impl RowStream {
    /// Next row; `None` once the query stopped producing rows
    pub async fn next(&mut self) -> Option<Record> {
        self.rows.recv().await
    }

    /// Outcome of the query. Rows not yet received are discarded.
    pub async fn finish(self) -> OrmResult<()> {
        self.done.await.map_err(|_| PoolError::PipelineStopped)?
    }
}

async fn run_pipeline(
    id: u64,
    mut raw: Box<dyn DatabaseConnection>,
    mut receiver: mpsc::UnboundedReceiver<Operation>,
) {
    debug!(connection = id, "Connection pipeline started");
    let mut reported = false;
    while let Some(op) = receiver.recv().await {
        op(raw.as_mut()).await;
        if !reported && raw.is_closed() {
            reported = true;
            warn!(connection = id, "Connection reported closed");
        }
    }
    debug!(connection = id, "Connection pipeline finished");
}
