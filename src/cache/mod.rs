//! Cache Module
//!
//! Provides a concurrency-safe in-memory cache with TTL expiration.
//! Expired entries are hidden from readers immediately and physically removed
//! by the background sweeper (see [`crate::tasks::spawn_sweeper`]).

mod entry;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use stats::{CacheCounters, CacheStats};
pub use store::TtlCache;
