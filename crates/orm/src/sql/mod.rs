//! SQL Generation
//!
//! Renders Query and Schema models to parameterised SQL for a [`SqlDialect`](crate::backends::SqlDialect).
//! Values are always bound; identifiers are always quoted.

pub mod generation;
pub mod schema;

pub use generation::{render_query, SqlStatement};
pub use schema::render_schema;
