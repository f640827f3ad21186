//! Run report DTOs
//!
//! Defines the summary the demo binary logs or prints as JSON.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::pool::{PoolStats, TaskOutcome, TaskResult};

/// Outcome of one cache scenario
#[derive(Debug, Clone, Serialize)]
pub struct CacheScenario {
    /// Short scenario name, e.g. "cache_aside"
    pub name: String,
    /// What was observed
    pub summary: String,
    /// Wall-clock duration in milliseconds
    pub elapsed_ms: u64,
}

impl CacheScenario {
    /// Creates a new CacheScenario
    pub fn new(name: impl Into<String>, summary: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            name: name.into(),
            summary: summary.into(),
            elapsed_ms,
        }
    }
}

/// Summary of one round of tasks through a worker pool
#[derive(Debug, Clone, Serialize)]
pub struct PoolRun {
    pub name: String,
    pub total_tasks: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
    /// Wall-clock duration of the round in milliseconds
    pub elapsed_ms: u64,
    /// Sum of per-task elapsed times, i.e. what running serially would cost
    pub serial_estimate_ms: u64,
    pub stats: PoolStats,
    /// Ids of tasks that did not succeed, in result order
    pub unsuccessful: Vec<u64>,
}

impl PoolRun {
    /// Builds a round summary from the results it produced
    pub fn from_results<O>(
        name: impl Into<String>,
        results: &[TaskResult<O>],
        elapsed_ms: u64,
        stats: PoolStats,
    ) -> Self {
        let mut run = Self {
            name: name.into(),
            total_tasks: results.len(),
            succeeded: 0,
            failed: 0,
            timed_out: 0,
            elapsed_ms,
            serial_estimate_ms: 0,
            stats,
            unsuccessful: Vec::new(),
        };

        for result in results {
            run.serial_estimate_ms += result.elapsed_ms;
            match result.outcome {
                TaskOutcome::Success(_) => run.succeeded += 1,
                TaskOutcome::Failure(_) => {
                    run.failed += 1;
                    run.unsuccessful.push(result.task_id);
                }
                TaskOutcome::TimedOut => {
                    run.timed_out += 1;
                    run.unsuccessful.push(result.task_id);
                }
            }
        }
        run
    }

    /// Serial estimate divided by actual duration, or 0.0 for an empty round
    pub fn speedup(&self) -> f64 {
        if self.elapsed_ms == 0 {
            0.0
        } else {
            self.serial_estimate_ms as f64 / self.elapsed_ms as f64
        }
    }
}

/// Summary of the retry scenario
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrySummary {
    pub requests: usize,
    pub succeeded: usize,
    pub average_ms: u64,
}

/// Everything the demo did, in one serializable document
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Start timestamp in RFC 3339 format
    pub started_at: String,
    /// End timestamp in RFC 3339 format
    pub finished_at: String,
    pub cache_scenarios: Vec<CacheScenario>,
    pub cache_stats: CacheStats,
    pub pool_runs: Vec<PoolRun>,
    pub retry: RetrySummary,
}

impl RunReport {
    /// Creates an empty report stamped with the current time
    pub fn start() -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            started_at: now.clone(),
            finished_at: now,
            cache_scenarios: Vec::new(),
            cache_stats: CacheStats::default(),
            pool_runs: Vec::new(),
            retry: RetrySummary::default(),
        }
    }

    /// Stamps the end time
    pub fn finish(&mut self) {
        self.finished_at = chrono::Utc::now().to_rfc3339();
    }
}
