//! Worker Pool Module
//!
//! Bounded worker pool with per-task deadlines and cooperative cancellation,
//! plus a caller-side retry helper.

mod metrics;
#[allow(clippy::module_inception)]
mod pool;
mod retry;
mod task;

pub use metrics::{PoolMetrics, PoolStats};
pub use pool::{PoolConfig, ResultReceiver, Submitter, WorkerPool};
pub use retry::{retry_with_timeout, RetryConfig};
pub use task::{Task, TaskOutcome, TaskResult, TaskState};
