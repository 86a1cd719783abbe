//! Relationships - named links between models used by eager loading

pub mod metadata;

pub use metadata::{Relationship, RelationshipType};
