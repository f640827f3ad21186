//! Error types for the cache and worker pool
//!
//! Provides unified error handling using thiserror.
//!
//! Cache misses, work failures and missed deadlines are not errors: they are
//! reported as data (`Option::None`, `TaskOutcome::Failure`,
//! `TaskOutcome::TimedOut`). Only misuse of the pool and exhausted retries
//! surface here.

use std::time::Duration;

use thiserror::Error;

// == Concur Error Enum ==
/// Unified error type for the crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConcurError {
    /// The pool no longer accepts submissions
    #[error("Task queue is closed")]
    QueueClosed,

    /// Non-blocking submission found the queue at capacity
    #[error("Task queue is full")]
    QueueFull,

    /// Pool configuration rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The overall retry budget ran out before an attempt succeeded
    #[error("Retry timeout exceeded after {0:?}")]
    RetryTimeout(Duration),

    /// Every allowed attempt failed
    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

// == Result Type Alias ==
/// Convenience Result type for the crate.
pub type Result<T> = std::result::Result<T, ConcurError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(ConcurError::QueueClosed.to_string(), "Task queue is closed");
        assert_eq!(ConcurError::QueueFull.to_string(), "Task queue is full");
        assert_eq!(
            ConcurError::InvalidConfig("workers must be at least 1".to_string()).to_string(),
            "Invalid configuration: workers must be at least 1"
        );
        assert_eq!(
            ConcurError::RetriesExhausted {
                attempts: 3,
                last_error: "service unavailable".to_string(),
            }
            .to_string(),
            "Gave up after 3 attempts: service unavailable"
        );
    }
}
