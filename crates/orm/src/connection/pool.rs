//! Connection Pool Management
//!
//! Bounds the number of live connections while giving each owner a stable
//! connection. An owner is the calling thread by default, or an explicit
//! [`OwnerId`] handle. Repeat acquisitions by the same owner take a lock-free
//! path through the entry map; only admission of new owners serialises on
//! the pool lock. When full, closed entries are scavenged first and then the
//! least-recently-used entry is handed over to the new owner.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::pipeline::Connection;
use super::statistics::{PoolCounters, PoolStats};
use crate::backends::DatabaseBackend;
use crate::config::PoolConfig;
use crate::error::{OrmResult, PoolError};

static NEXT_OWNER_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Identity that pool entries are keyed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnerId {
    Thread(ThreadId),
    Handle(u64),
}

impl OwnerId {
    /// The calling thread
    pub fn current() -> Self {
        OwnerId::Thread(std::thread::current().id())
    }

    /// A fresh handle, distinct from every other owner
    pub fn unique() -> Self {
        OwnerId::Handle(NEXT_OWNER_HANDLE.fetch_add(1, Ordering::Relaxed))
    }
}

struct PoolEntry {
    connection: Connection,
    last_used: AtomicU64,
    /// Held by an open transaction; never transferred
    pinned: AtomicBool,
}

/// Owner-keyed connection pool
pub struct ConnectionPool {
    backend: Arc<dyn DatabaseBackend>,
    capacity: usize,
    entries: DashMap<OwnerId, PoolEntry>,
    admission: Mutex<()>,
    clock: AtomicU64,
    next_connection_id: AtomicU64,
    counters: PoolCounters,
    closed: AtomicBool,
}

impl ConnectionPool {
    pub fn new(backend: Arc<dyn DatabaseBackend>, config: &PoolConfig) -> OrmResult<Self> {
        config.validate()?;
        Ok(Self {
            backend,
            capacity: config.max_connections,
            entries: DashMap::new(),
            admission: Mutex::new(()),
            clock: AtomicU64::new(0),
            next_connection_id: AtomicU64::new(1),
            counters: PoolCounters::default(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Connection for the calling thread
    pub async fn connection(&self) -> OrmResult<Connection> {
        self.connection_for(OwnerId::current()).await
    }

    /// Connection for `owner`, reusing its entry when it has a live one
    pub async fn connection_for(&self, owner: OwnerId) -> OrmResult<Connection> {
        self.acquire(owner, false).await
    }

    /// Connection under a fresh owner, pinned so no other owner can be handed
    /// it until [`ConnectionPool::unpin`]
    pub async fn pinned_connection(&self) -> OrmResult<(OwnerId, Connection)> {
        let owner = OwnerId::unique();
        let connection = self.acquire(owner, true).await?;
        Ok((owner, connection))
    }

    /// Make `owner`'s entry transferable again
    pub fn unpin(&self, owner: OwnerId) {
        if let Some(entry) = self.entries.get(&owner) {
            entry.pinned.store(false, Ordering::SeqCst);
        }
    }

    /// Whether `owner`'s entry is pinned
    pub fn is_pinned(&self, owner: OwnerId) -> bool {
        self.entries
            .get(&owner)
            .map_or(false, |entry| entry.pinned.load(Ordering::SeqCst))
    }

    async fn acquire(&self, owner: OwnerId, pin: bool) -> OrmResult<Connection> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PoolError::PoolClosed.into());
        }
        if let Some(connection) = self.reuse(owner) {
            return Ok(connection);
        }

        let _admission = self.admission.lock().await;
        if let Some(connection) = self.reuse(owner) {
            return Ok(connection);
        }

        if self.entries.len() >= self.capacity {
            self.scavenge();
        }
        if self.entries.len() >= self.capacity {
            return self.transfer_lru(owner, pin).ok_or_else(|| {
                PoolError::AcquisitionFailed(
                    "every pooled connection is pinned by an open transaction".to_string(),
                )
                .into()
            });
        }

        match self.open().await {
            Ok(connection) => {
                let stamp = self.tick();
                self.entries.insert(
                    owner,
                    PoolEntry {
                        connection: connection.clone(),
                        last_used: AtomicU64::new(stamp),
                        pinned: AtomicBool::new(pin),
                    },
                );
                PoolCounters::bump(&self.counters.acquisitions);
                debug!(?owner, connection = connection.id(), live = self.entries.len(), "Admitted pool owner");
                Ok(connection)
            }
            Err(e) => {
                PoolCounters::bump(&self.counters.failures);
                warn!(?owner, error = %e, "Opening a connection failed, trying to reuse one");
                self.transfer_lru(owner, pin)
                    .ok_or_else(|| PoolError::AcquisitionFailed(e.to_string()).into())
            }
        }
    }

    /// Drop `owner`'s entry; returns whether it had one
    pub fn release(&self, owner: OwnerId) -> bool {
        self.entries.remove(&owner).is_some()
    }

    pub fn holds(&self, owner: OwnerId) -> bool {
        self.entries.contains_key(&owner)
    }

    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot(self.entries.len(), self.capacity)
    }

    /// Close every pooled connection and refuse further acquisitions
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _admission = self.admission.lock().await;

        let owners: Vec<OwnerId> = self.entries.iter().map(|e| *e.key()).collect();
        for owner in owners {
            if let Some((_, entry)) = self.entries.remove(&owner) {
                if let Err(e) = entry.connection.close().await {
                    debug!(?owner, error = %e, "Error while closing pooled connection");
                }
            }
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn reuse(&self, owner: OwnerId) -> Option<Connection> {
        let live = {
            let entry = self.entries.get(&owner)?;
            if entry.connection.is_closed() {
                None
            } else {
                entry.last_used.store(self.tick(), Ordering::SeqCst);
                Some(entry.connection.clone())
            }
        };

        match live {
            Some(connection) => {
                PoolCounters::bump(&self.counters.acquisitions);
                PoolCounters::bump(&self.counters.reuses);
                Some(connection)
            }
            None => {
                if self
                    .entries
                    .remove_if(&owner, |_, entry| entry.connection.is_closed())
                    .is_some()
                {
                    PoolCounters::bump(&self.counters.scavenged);
                    warn!(?owner, "Dropped closed pooled connection");
                }
                None
            }
        }
    }

    fn scavenge(&self) {
        let closed: Vec<OwnerId> = self
            .entries
            .iter()
            .filter(|entry| entry.connection.is_closed())
            .map(|entry| *entry.key())
            .collect();

        for owner in closed {
            if self.entries.remove(&owner).is_some() {
                PoolCounters::bump(&self.counters.scavenged);
                warn!(?owner, "Scavenged closed pooled connection");
            }
        }
    }

    /// Move the least-recently-used unpinned entry to `owner`
    fn transfer_lru(&self, owner: OwnerId, pin: bool) -> Option<Connection> {
        let victim = self
            .entries
            .iter()
            .filter(|entry| !entry.connection.is_closed() && !entry.pinned.load(Ordering::SeqCst))
            .min_by_key(|entry| entry.last_used.load(Ordering::SeqCst))
            .map(|entry| *entry.key())?;

        let (_, entry) = self.entries.remove(&victim)?;
        entry.last_used.store(self.tick(), Ordering::SeqCst);
        entry.pinned.store(pin, Ordering::SeqCst);
        let connection = entry.connection.clone();
        self.entries.insert(owner, entry);

        PoolCounters::bump(&self.counters.evictions);
        PoolCounters::bump(&self.counters.acquisitions);
        debug!(?victim, ?owner, connection = connection.id(), "Transferred least recently used connection");
        Some(connection)
    }

    async fn open(&self) -> OrmResult<Connection> {
        let raw = self.backend.connect().await?;
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        PoolCounters::bump(&self.counters.created);
        Ok(Connection::spawn(id, self.backend.backend_type(), raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryBackend;
    use crate::error::ModelError;

    fn pool(backend: &MemoryBackend, capacity: usize) -> ConnectionPool {
        ConnectionPool::new(
            Arc::new(backend.clone()),
            &PoolConfig::default().with_max_connections(capacity),
        )
        .unwrap()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let backend = MemoryBackend::new();
        let result = ConnectionPool::new(
            Arc::new(backend),
            &PoolConfig::default().with_max_connections(0),
        );
        assert!(matches!(
            result,
            Err(ModelError::Pool(PoolError::InvalidCapacity(0)))
        ));
    }

    #[tokio::test]
    async fn test_same_owner_reuses_connection() {
        let backend = MemoryBackend::new();
        let pool = pool(&backend, 2);
        let owner = OwnerId::unique();

        let first = pool.connection_for(owner).await.unwrap();
        let second = pool.connection_for(owner).await.unwrap();

        assert!(first.same_as(&second));
        assert_eq!(backend.connections_opened(), 1);
        assert_eq!(pool.stats().reuses, 1);
    }

    #[tokio::test]
    async fn test_closed_entries_are_replaced() {
        let backend = MemoryBackend::new();
        let pool = pool(&backend, 1);
        let owner = OwnerId::unique();

        let first = pool.connection_for(owner).await.unwrap();
        first.close().await.unwrap();

        let second = pool.connection_for(owner).await.unwrap();
        assert!(!second.same_as(&first));
        assert_eq!(pool.stats().scavenged, 1);
    }

    #[tokio::test]
    async fn test_factory_failure_without_reusable_connection() {
        let backend = MemoryBackend::new();
        backend.refuse_connections(true);
        let pool = pool(&backend, 2);

        let err = pool.connection_for(OwnerId::unique()).await.unwrap_err();
        assert!(matches!(err, ModelError::Pool(PoolError::AcquisitionFailed(_))));
    }

    #[tokio::test]
    async fn test_factory_failure_falls_back_to_transfer() {
        let backend = MemoryBackend::new();
        let pool = pool(&backend, 2);
        let first = pool.connection_for(OwnerId::unique()).await.unwrap();

        backend.refuse_connections(true);
        let second = pool.connection_for(OwnerId::unique()).await.unwrap();
        assert!(second.same_as(&first));
    }

    #[tokio::test]
    async fn test_pinned_entry_is_not_transferred() {
        let backend = MemoryBackend::new();
        let pool = pool(&backend, 1);

        let (pin, pinned) = pool.pinned_connection().await.unwrap();
        assert!(pool.is_pinned(pin));
        let err = pool.connection_for(OwnerId::unique()).await.unwrap_err();
        assert!(matches!(err, ModelError::Pool(PoolError::AcquisitionFailed(_))));

        pool.unpin(pin);
        let other = pool.connection_for(OwnerId::unique()).await.unwrap();
        assert!(other.same_as(&pinned));
        assert!(!pool.holds(pin));
    }

    #[tokio::test]
    async fn test_closed_pool_refuses() {
        let backend = MemoryBackend::new();
        let pool = pool(&backend, 2);
        pool.connection_for(OwnerId::unique()).await.unwrap();

        pool.close().await;
        assert_eq!(pool.stats().connections, 0);
        assert!(matches!(
            pool.connection().await,
            Err(ModelError::Pool(PoolError::PoolClosed))
        ));
    }
}
