//! Database Backend Abstractions
//!
//! Driver adapters behind a common contract. The in-memory backend is always
//! available; PostgreSQL is enabled with the `postgres` feature.

pub mod core;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod row;
pub mod value;

pub use self::core::*;
pub use memory::{MemoryBackend, MemoryConnection};
#[cfg(feature = "postgres")]
pub use postgres::PostgresBackend;
pub use row::{DatabaseRow, DatabaseRowExt, Payload, Record};
pub use value::DatabaseValue;
