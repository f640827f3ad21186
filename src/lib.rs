//! Mini Concur - a TTL cache and a bounded worker pool
//!
//! Provides a concurrency-safe cache with per-entry expiration and a
//! stoppable background sweeper, and a fixed-size worker pool whose tasks run
//! under a deadline with cooperative cancellation.

pub mod cache;
pub mod cancel;
pub mod config;
pub mod error;
pub mod models;
pub mod pool;
pub mod tasks;
pub mod workload;

pub use cache::TtlCache;
pub use cancel::CancellationToken;
pub use config::Config;
pub use error::{ConcurError, Result};
pub use pool::{PoolConfig, Task, TaskOutcome, TaskResult, WorkerPool};
pub use tasks::spawn_sweeper;
