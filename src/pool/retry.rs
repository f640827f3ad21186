//! Retry Module
//!
//! Caller-side retry with exponential backoff and an overall time budget.
//! The pool itself never retries; wrap an operation (or a resubmission loop)
//! with [`retry_with_timeout`] when retries are wanted.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::error::{ConcurError, Result};

// == Retry Config ==
/// Retry policy parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts
    pub max_retries: u32,
    /// Wait after the first failure
    pub initial_backoff: Duration,
    /// Upper bound for the doubling backoff
    pub max_backoff: Duration,
    /// Overall budget, checked before each attempt
    pub total_timeout: Duration,
    /// Limit for a single attempt
    pub attempt_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
            total_timeout: Duration::from_secs(10),
            attempt_timeout: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// Returns the backoff that follows `current`: doubled, capped at
    /// `max_backoff`.
    pub fn next_backoff(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_backoff)
    }

    /// Backoff schedule for every retry this config allows.
    pub fn backoff_schedule(&self) -> Vec<Duration> {
        let mut schedule = Vec::new();
        let mut backoff = self.initial_backoff.min(self.max_backoff);
        for _ in 1..self.max_retries {
            schedule.push(backoff);
            backoff = self.next_backoff(backoff);
        }
        schedule
    }
}

/// Runs `operation` until it succeeds, retrying with exponential backoff.
///
/// `operation` receives the 1-based attempt number. An attempt that errors or
/// exceeds `attempt_timeout` counts as a failure. Errors are followed by a
/// backoff; a timed-out attempt is retried right away.
///
/// # Errors
/// - `RetryTimeout` when `total_timeout` has passed before an attempt
/// - `RetriesExhausted` after `max_retries` failed attempts
pub async fn retry_with_timeout<T, E, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Display,
{
    let started = Instant::now();
    let mut backoff = config.initial_backoff.min(config.max_backoff);
    let mut last_error = String::from("no attempt made");

    for attempt in 1..=config.max_retries {
        if started.elapsed() > config.total_timeout {
            warn!("Retry budget of {:?} exhausted before attempt {}", config.total_timeout, attempt);
            return Err(ConcurError::RetryTimeout(config.total_timeout));
        }

        debug!("Attempt {}/{}", attempt, config.max_retries);

        match timeout(config.attempt_timeout, operation(attempt)).await {
            Ok(Ok(value)) => {
                info!("Succeeded on attempt {}", attempt);
                return Ok(value);
            }
            Ok(Err(err)) => {
                last_error = err.to_string();
                warn!("Attempt {} failed: {}", attempt, last_error);
            }
            Err(_) => {
                last_error = format!("attempt timed out after {:?}", config.attempt_timeout);
                warn!("Attempt {} timed out", attempt);
                continue;
            }
        }

        if attempt < config.max_retries {
            debug!("Waiting {:?} before retrying", backoff);
            sleep(backoff).await;
            backoff = config.next_backoff(backoff);
        }
    }

    Err(ConcurError::RetriesExhausted {
        attempts: config.max_retries,
        last_error,
    })
}
