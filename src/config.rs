//! Configuration Module
//!
//! Handles loading the demo's cache and pool settings from environment
//! variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConcurError, Result};
use crate::pool::PoolConfig;

/// Demo configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Default TTL in milliseconds for cache entries
    pub default_ttl_ms: u64,
    /// Interval in milliseconds between sweeps of expired entries
    pub sweep_interval_ms: u64,
    /// Number of pool workers
    pub pool_workers: usize,
    /// Per-task deadline in milliseconds
    pub task_deadline_ms: u64,
    /// Queued tasks accepted before submitters wait
    pub queue_capacity: usize,
    /// Abandoned executions tolerated on top of the workers
    pub max_abandoned: usize,
    /// Number of simulated downloads in the pool demo
    pub demo_tasks: usize,
    /// Print the run report as JSON instead of log lines
    pub report_json: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `DEFAULT_TTL_MS` - Default cache TTL (default: 1000)
    /// - `SWEEP_INTERVAL_MS` - Sweep frequency (default: 1000)
    /// - `POOL_WORKERS` - Worker count (default: 3)
    /// - `TASK_DEADLINE_MS` - Per-task deadline (default: 600)
    /// - `QUEUE_CAPACITY` - Task queue capacity (default: 10)
    /// - `MAX_ABANDONED` - Abandoned execution allowance (default: 3)
    /// - `DEMO_TASKS` - Simulated downloads (default: 10)
    /// - `REPORT_JSON` - `true` to print a JSON report (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_ttl_ms: env_or("DEFAULT_TTL_MS", defaults.default_ttl_ms),
            sweep_interval_ms: env_or("SWEEP_INTERVAL_MS", defaults.sweep_interval_ms),
            pool_workers: env_or("POOL_WORKERS", defaults.pool_workers),
            task_deadline_ms: env_or("TASK_DEADLINE_MS", defaults.task_deadline_ms),
            queue_capacity: env_or("QUEUE_CAPACITY", defaults.queue_capacity),
            max_abandoned: env_or("MAX_ABANDONED", defaults.max_abandoned),
            demo_tasks: env_or("DEMO_TASKS", defaults.demo_tasks),
            report_json: env_or("REPORT_JSON", defaults.report_json),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Rejects settings the cache or pool cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.default_ttl_ms == 0 {
            return Err(ConcurError::InvalidConfig(
                "DEFAULT_TTL_MS must be greater than zero".to_string(),
            ));
        }
        if self.sweep_interval_ms == 0 {
            return Err(ConcurError::InvalidConfig(
                "SWEEP_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }
        self.pool_config().validate()
    }

    /// Pool settings derived from this configuration.
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::new(self.pool_workers, Duration::from_millis(self.task_deadline_ms))
            .with_queue_capacity(self.queue_capacity)
            .with_max_abandoned(self.max_abandoned)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_ttl_ms: 1000,
            sweep_interval_ms: 1000,
            pool_workers: 3,
            task_deadline_ms: 600,
            queue_capacity: 10,
            max_abandoned: 3,
            demo_tasks: 10,
            report_json: false,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
