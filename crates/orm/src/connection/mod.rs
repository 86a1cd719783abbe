//! Connection Management
//!
//! Pipelined connections and the owner-keyed pool that hands them out.

pub mod pipeline;
pub mod pool;
pub mod statistics;

pub use pipeline::{Connection, RowStream};
pub use pool::{ConnectionPool, OwnerId};
pub use statistics::PoolStats;
