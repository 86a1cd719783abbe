//! Connection Pool Statistics

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time pool counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Entries currently held by owners
    pub connections: usize,
    pub capacity: usize,
    /// Successful acquisitions, reuses included
    pub acquisitions: u64,
    /// Acquisitions answered from the owner's existing entry
    pub reuses: u64,
    /// Connections opened through the backend
    pub created: u64,
    /// Entries transferred from their least-recently-used owner
    pub evictions: u64,
    /// Closed entries dropped
    pub scavenged: u64,
    pub failures: u64,
}

impl PoolStats {
    /// Share of acquisitions served without touching the admission lock
    pub fn reuse_rate(&self) -> f64 {
        if self.acquisitions > 0 {
            self.reuses as f64 / self.acquisitions as f64
        } else {
            0.0
        }
    }

    pub fn is_full(&self) -> bool {
        self.connections >= self.capacity
    }
}

#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub acquisitions: AtomicU64,
    pub reuses: AtomicU64,
    pub created: AtomicU64,
    pub evictions: AtomicU64,
    pub scavenged: AtomicU64,
    pub failures: AtomicU64,
}

impl PoolCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, connections: usize, capacity: usize) -> PoolStats {
        PoolStats {
            connections,
            capacity,
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            reuses: self.reuses.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            scavenged: self.scavenged.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}
