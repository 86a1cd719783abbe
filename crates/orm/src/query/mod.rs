//! Query Module - the neutral query description and the fluent builder over it

pub mod aggregates;
pub mod builder;
pub mod dml;
pub mod execution;
pub mod joins;
pub mod ordering;
pub mod pagination;
pub mod select;
pub mod statement;
pub mod types;
pub mod where_clause;
pub mod with;

pub use builder::{QueryBuilder, SoftDeleteScope};
pub use statement::Query;
pub use types::*;
pub use where_clause::{FilterBuilder, FilterGroup};
