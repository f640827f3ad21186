//! Pool Metrics Module
//!
//! Counters describing what the worker pool has done so far.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

use crate::pool::TaskState;

// == Pool Metrics ==
/// Live counters shared by the pool, its workers and abandoned executions.
///
/// Held in an `Arc` so callers can keep reading it after the pool has shut
/// down, e.g. to observe abandoned work finishing late.
#[derive(Debug, Default)]
pub struct PoolMetrics {
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    late_suppressed: AtomicU64,
    running: AtomicUsize,
    in_flight: AtomicUsize,
    abandoned_in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl PoolMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// A worker picked the task up.
    pub(crate) fn record_running(&self) {
        self.running.fetch_add(1, Ordering::AcqRel);
    }

    /// The worker settled the task; its terminal outcome is recorded next.
    pub(crate) fn record_settled(&self) {
        self.running.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn record_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timed_out(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts an execution as abandoned. Called before the worker tries to
    /// claim the task, so the late path can never decrement first.
    pub(crate) fn reserve_abandoned(&self) {
        self.abandoned_in_flight.fetch_add(1, Ordering::AcqRel);
    }

    /// Undoes `reserve_abandoned` when the work won the claim after all.
    pub(crate) fn release_abandoned(&self) {
        self.abandoned_in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    /// Abandoned work finished and its result was dropped.
    pub(crate) fn record_late_suppressed(&self) {
        self.late_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    /// An execution started; tracks the peak of concurrently alive executions.
    pub(crate) fn execution_started(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::AcqRel);
    }

    /// An execution's work future returned (or panicked).
    pub(crate) fn execution_finished(&self, abandoned: bool) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        if abandoned {
            self.release_abandoned();
        }
    }

    // == Snapshot ==
    /// Captures the current values.
    pub fn snapshot(&self) -> PoolStats {
        PoolStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            late_suppressed: self.late_suppressed.load(Ordering::Relaxed),
            running: self.running.load(Ordering::Acquire),
            abandoned_in_flight: self.abandoned_in_flight.load(Ordering::Acquire),
            peak_in_flight: self.peak_in_flight.load(Ordering::Acquire),
        }
    }
}

// == Pool Stats ==
/// Point-in-time view of pool activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Tasks whose deadline fired first
    pub timed_out: u64,
    /// Abandoned executions that finished later and had their result dropped
    pub late_suppressed: u64,
    /// Tasks a worker has picked up and not yet settled
    pub running: usize,
    /// Abandoned executions still running right now
    pub abandoned_in_flight: usize,
    /// Most executions (running plus abandoned) alive at the same time
    pub peak_in_flight: usize,
}

impl PoolStats {
    /// Number of tasks that reached a terminal state.
    pub fn finished(&self) -> u64 {
        self.succeeded + self.failed + self.timed_out
    }

    /// Number of tasks currently in `state`, or that ended in it.
    ///
    /// `Queued` is derived from the other counters, which are read one by one,
    /// so it is approximate while the pool is busy.
    pub fn count(&self, state: TaskState) -> u64 {
        match state {
            TaskState::Queued => self
                .submitted
                .saturating_sub(self.finished())
                .saturating_sub(self.running as u64),
            TaskState::Running => self.running as u64,
            TaskState::Completed => self.succeeded + self.failed,
            TaskState::Cancelled => self.timed_out,
        }
    }
}
