//! Model System - traits for database entities
//!
//! - `core_trait`: row decoding and the Model trait
//! - `crud_operations`: single-model convenience operations

pub mod core_trait;
pub mod crud_operations;

pub use core_trait::{FromRow, Model};
pub use crud_operations::ModelExt;
