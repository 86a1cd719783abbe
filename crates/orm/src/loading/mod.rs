//! Eager loading: batched relation fetches and the per-query cache

pub mod cache;
pub(crate) mod eager_loader;
pub mod loaded;

pub use cache::EagerLoadCache;
pub use loaded::Loaded;
