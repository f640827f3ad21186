//! Task Module
//!
//! Units of work handed to the pool and the results it reports back.

use chrono::{DateTime, Utc};
use serde::Serialize;

// == Task ==
/// A unit of work. Moved into exactly one worker, never shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task<P> {
    /// Caller-chosen identifier, echoed back in the result
    pub id: u64,
    /// Input handed to the work function; the pool never inspects it
    pub payload: P,
}

impl<P> Task<P> {
    /// Creates a new task.
    pub fn new(id: u64, payload: P) -> Self {
        Self { id, payload }
    }
}

// == Task State ==
/// Lifecycle of a task: `Queued -> Running -> Completed | Cancelled`.
///
/// Results only ever carry a terminal state. Live counts for every state come
/// from [`PoolStats::count`](crate::pool::PoolStats::count).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Running,
    /// The work finished (successfully or not) before the deadline
    Completed,
    /// The deadline fired first
    Cancelled,
}

// == Task Outcome ==
/// What happened to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum TaskOutcome<O> {
    /// The work returned a value
    Success(O),
    /// The work returned an error; the pool does not retry it
    Failure(String),
    /// The deadline elapsed before the work finished
    TimedOut,
}

impl<O> TaskOutcome<O> {
    /// Returns true for `Success`.
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success(_))
    }

    /// Returns true for `TimedOut`.
    pub fn is_timed_out(&self) -> bool {
        matches!(self, TaskOutcome::TimedOut)
    }
}

// == Task Result ==
/// The single result the pool reports for a task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResult<O> {
    /// Id of the task this result belongs to
    pub task_id: u64,
    /// Worker that processed the task (1-based)
    pub worker_id: usize,
    /// Outcome of the work
    pub outcome: TaskOutcome<O>,
    /// Milliseconds between the work starting and the result being decided
    pub elapsed_ms: u64,
    /// Wall-clock time the result was decided
    pub finished_at: DateTime<Utc>,
}

impl<O> TaskResult<O> {
    /// Returns the terminal state this result represents.
    pub fn state(&self) -> TaskState {
        match self.outcome {
            TaskOutcome::TimedOut => TaskState::Cancelled,
            TaskOutcome::Success(_) | TaskOutcome::Failure(_) => TaskState::Completed,
        }
    }

    /// Returns a reason for anything that did not succeed.
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.outcome {
            TaskOutcome::Success(_) => None,
            TaskOutcome::Failure(reason) => Some(reason),
            TaskOutcome::TimedOut => Some("deadline exceeded"),
        }
    }
}
