//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside the cache.
//!
//! # Tasks
//! - TTL Sweeper: removes expired cache entries at a fixed interval until stopped

mod sweeper;

pub use sweeper::{spawn_sweeper, SweeperHandle, MIN_SWEEP_INTERVAL};
