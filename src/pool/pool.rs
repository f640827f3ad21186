//! Worker Pool Module
//!
//! A fixed number of workers pull tasks from a bounded queue. Each task's work
//! runs as its own tokio task and races a deadline:
//!
//! - work first: the worker reports `Success` or `Failure`
//! - deadline first: the worker cancels the work's token, reports `TimedOut`
//!   and moves on without waiting for the work to stop
//!
//! A per-execution claim decides which side reports, so every task yields
//! exactly one result. Work that finishes after losing the claim drops its
//! output. Live executions (running plus abandoned) are capped at
//! `workers + max_abandoned` by a semaphore.

use std::fmt::Display;
use std::future::Future;
use std::mem;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::error::{ConcurError, Result};
use crate::pool::{PoolMetrics, PoolStats, Task, TaskOutcome, TaskResult};

/// Receiving end for task results. Closes once the pool has shut down and
/// every result has been read.
pub type ResultReceiver<O> = mpsc::UnboundedReceiver<TaskResult<O>>;

// == Pool Config ==
/// Worker pool parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of workers
    pub workers: usize,
    /// Maximum time a single task may run before it is abandoned
    pub deadline: Duration,
    /// Queued tasks accepted before `submit` starts waiting
    pub queue_capacity: usize,
    /// Abandoned executions tolerated on top of `workers`
    pub max_abandoned: usize,
}

impl PoolConfig {
    // == Constructor ==
    /// Creates a config with a queue of `2 * workers` and as many abandoned
    /// slots as workers.
    pub fn new(workers: usize, deadline: Duration) -> Self {
        Self {
            workers,
            deadline,
            queue_capacity: workers.saturating_mul(2).max(1),
            max_abandoned: workers,
        }
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_max_abandoned(mut self, max_abandoned: usize) -> Self {
        self.max_abandoned = max_abandoned;
        self
    }

    // == Validate ==
    /// Rejects configurations the pool cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(ConcurError::InvalidConfig(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ConcurError::InvalidConfig(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.deadline.is_zero() {
            return Err(ConcurError::InvalidConfig(
                "deadline must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Maximum number of executions alive at once, running or abandoned.
    pub fn execution_slots(&self) -> usize {
        self.workers.saturating_add(self.max_abandoned)
    }
}

// == Submitter ==
/// Cloneable handle for submitting tasks from other producers.
pub struct Submitter<P> {
    sender: mpsc::Sender<Task<P>>,
    metrics: Arc<PoolMetrics>,
}

impl<P> Clone for Submitter<P> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<P> Submitter<P> {
    // == Submit ==
    /// Enqueues a task, waiting while the queue is full.
    ///
    /// Returns `QueueClosed` once the pool is shutting down.
    pub async fn submit(&self, task: Task<P>) -> Result<()> {
        self.sender
            .send(task)
            .await
            .map_err(|_| ConcurError::QueueClosed)?;
        self.metrics.record_submitted();
        Ok(())
    }

    // == Try Submit ==
    /// Enqueues a task without waiting.
    pub fn try_submit(&self, task: Task<P>) -> Result<()> {
        match self.sender.try_send(task) {
            Ok(()) => {
                self.metrics.record_submitted();
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(ConcurError::QueueFull),
            Err(TrySendError::Closed(_)) => Err(ConcurError::QueueClosed),
        }
    }
}

// == Worker Pool ==
/// Bounded worker pool with per-task deadlines.
pub struct WorkerPool<P> {
    submitter: Submitter<P>,
    workers: Vec<JoinHandle<()>>,
    metrics: Arc<PoolMetrics>,
    closing: CancellationToken,
    config: PoolConfig,
}

impl<P> WorkerPool<P>
where
    P: Send + 'static,
{
    // == Start ==
    /// Validates `config`, spawns the workers and returns the pool together
    /// with the receiver its results are delivered to. Must be called from
    /// within a tokio runtime.
    ///
    /// # Arguments
    /// * `config` - Pool parameters
    /// * `work` - Invoked once per task with the payload and a cancellation
    ///   token the work should check at its own checkpoints
    pub fn start<O, E, F, Fut>(config: PoolConfig, work: F) -> Result<(Self, ResultReceiver<O>)>
    where
        F: Fn(P, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<O, E>> + Send + 'static,
        O: Send + 'static,
        E: Display + Send + 'static,
    {
        config.validate()?;

        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let (results, results_rx) = mpsc::unbounded_channel();
        let queue = Arc::new(Mutex::new(receiver));
        let work = Arc::new(work);
        let metrics = Arc::new(PoolMetrics::new());
        let closing = CancellationToken::new();
        let slots = Arc::new(Semaphore::new(config.execution_slots()));

        let workers = (1..=config.workers)
            .map(|id| {
                tokio::spawn(run_worker(Worker {
                    id,
                    queue: queue.clone(),
                    work: work.clone(),
                    results: results.clone(),
                    slots: slots.clone(),
                    metrics: metrics.clone(),
                    closing: closing.clone(),
                    deadline: config.deadline,
                }))
            })
            .collect();

        info!(
            "Worker pool started: workers={}, deadline={:?}, queue_capacity={}, max_abandoned={}",
            config.workers, config.deadline, config.queue_capacity, config.max_abandoned
        );

        let pool = Self {
            submitter: Submitter {
                sender,
                metrics: metrics.clone(),
            },
            workers,
            metrics,
            closing,
            config,
        };
        Ok((pool, results_rx))
    }
}

impl<P> WorkerPool<P> {
    /// See [`Submitter::submit`].
    pub async fn submit(&self, task: Task<P>) -> Result<()> {
        self.submitter.submit(task).await
    }

    /// See [`Submitter::try_submit`].
    pub fn try_submit(&self, task: Task<P>) -> Result<()> {
        self.submitter.try_submit(task)
    }

    /// Returns a handle other tasks can submit through.
    pub fn submitter(&self) -> Submitter<P> {
        self.submitter.clone()
    }

    /// Shared metrics; stays readable after shutdown.
    pub fn metrics(&self) -> Arc<PoolMetrics> {
        self.metrics.clone()
    }

    pub fn stats(&self) -> PoolStats {
        self.metrics.snapshot()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    // == Shutdown ==
    /// Stops accepting tasks, lets the workers drain everything already
    /// queued or running to a terminal state, and waits for them to exit.
    ///
    /// Abandoned executions are not waited for.
    pub async fn shutdown(mut self) -> PoolStats {
        info!("Worker pool shutting down");
        self.closing.cancel();

        for (index, worker) in mem::take(&mut self.workers).into_iter().enumerate() {
            if let Err(err) = worker.await {
                warn!("Worker {} ended abnormally: {}", index + 1, err);
            }
        }

        let stats = self.metrics.snapshot();
        info!(
            "Worker pool drained: succeeded={}, failed={}, timed_out={}, abandoned_in_flight={}",
            stats.succeeded, stats.failed, stats.timed_out, stats.abandoned_in_flight
        );
        stats
    }
}

impl<P> Drop for WorkerPool<P> {
    fn drop(&mut self) {
        // Workers drain and exit on their own; nothing new is accepted.
        self.closing.cancel();
    }
}

// == Worker ==
struct Worker<P, O, F> {
    id: usize,
    queue: Arc<Mutex<mpsc::Receiver<Task<P>>>>,
    work: Arc<F>,
    results: mpsc::UnboundedSender<TaskResult<O>>,
    slots: Arc<Semaphore>,
    metrics: Arc<PoolMetrics>,
    closing: CancellationToken,
    deadline: Duration,
}

async fn run_worker<P, O, E, F, Fut>(worker: Worker<P, O, F>)
where
    P: Send + 'static,
    F: Fn(P, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<O, E>> + Send + 'static,
    O: Send + 'static,
    E: Display + Send + 'static,
{
    debug!("Worker {} started", worker.id);

    while let Some(task) = next_task(&worker.queue, &worker.closing).await {
        debug!("Worker {} picked up task {}", worker.id, task.id);
        let result = execute(&worker, task).await;
        if worker.results.send(result).is_err() {
            debug!("Worker {}: result receiver dropped", worker.id);
        }
    }

    debug!("Worker {} exiting, queue drained", worker.id);
}

/// Takes the next queued task. Once the pool is closing, the queue is closed
/// for senders and drained; `None` means nothing is left.
async fn next_task<P>(
    queue: &Mutex<mpsc::Receiver<Task<P>>>,
    closing: &CancellationToken,
) -> Option<Task<P>> {
    let mut queue = queue.lock().await;
    let received = tokio::select! {
        biased;
        task = queue.recv() => Some(task),
        _ = closing.cancelled() => None,
    };
    match received {
        Some(task) => task,
        None => {
            queue.close();
            queue.recv().await
        }
    }
}

async fn execute<P, O, E, F, Fut>(worker: &Worker<P, O, F>, task: Task<P>) -> TaskResult<O>
where
    P: Send + 'static,
    F: Fn(P, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<O, E>> + Send + 'static,
    O: Send + 'static,
    E: Display + Send + 'static,
{
    let task_id = task.id;
    worker.metrics.record_running();

    if worker.slots.available_permits() == 0 {
        debug!(
            "Worker {} waiting for an execution slot ({} abandoned tasks still running)",
            worker.id,
            worker.metrics.snapshot().abandoned_in_flight
        );
    }
    let permit = match worker.slots.clone().acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            let outcome = TaskOutcome::Failure("execution slots closed".to_string());
            return finish(worker, task_id, Instant::now(), outcome);
        }
    };

    let token = CancellationToken::new();
    let claim = Arc::new(ResultClaim::new());
    let (tx, mut rx) = oneshot::channel();

    worker.metrics.execution_started();
    let started = Instant::now();
    let guard = ExecutionGuard {
        claim: claim.clone(),
        metrics: worker.metrics.clone(),
        _permit: permit,
    };
    let work = worker.work.clone();
    let payload = task.payload;
    let work_token = token.clone();

    // The work is invoked inside the spawned task so a panic, even one raised
    // before the future is built, only drops `tx`.
    tokio::spawn(async move {
        let output = work(payload, work_token).await;
        if guard.claim.finish() {
            let _ = tx.send(output.map_err(|err| err.to_string()));
        } else {
            guard.metrics.record_late_suppressed();
            debug!("Task {} finished after its deadline, result dropped", task_id);
        }
    });

    let raced = tokio::select! {
        received = &mut rx => Some(received),
        _ = sleep(worker.deadline) => None,
    };

    let outcome = match raced {
        Some(received) => completed(received),
        None => {
            worker.metrics.reserve_abandoned();
            if claim.abandon() {
                token.cancel();
                TaskOutcome::TimedOut
            } else {
                // The work claimed the result just before the deadline fired.
                worker.metrics.release_abandoned();
                completed(rx.await)
            }
        }
    };

    finish(worker, task_id, started, outcome)
}

fn completed<O>(
    received: std::result::Result<std::result::Result<O, String>, oneshot::error::RecvError>,
) -> TaskOutcome<O> {
    match received {
        Ok(Ok(value)) => TaskOutcome::Success(value),
        Ok(Err(reason)) => TaskOutcome::Failure(reason),
        Err(_) => TaskOutcome::Failure("work panicked".to_string()),
    }
}

fn finish<P, O, F>(
    worker: &Worker<P, O, F>,
    task_id: u64,
    started: Instant,
    outcome: TaskOutcome<O>,
) -> TaskResult<O> {
    let elapsed = started.elapsed();
    worker.metrics.record_settled();
    match &outcome {
        TaskOutcome::Success(_) => {
            worker.metrics.record_succeeded();
            debug!("Worker {} completed task {} in {:?}", worker.id, task_id, elapsed);
        }
        TaskOutcome::Failure(reason) => {
            worker.metrics.record_failed();
            warn!("Worker {} task {} failed: {}", worker.id, task_id, reason);
        }
        TaskOutcome::TimedOut => {
            worker.metrics.record_timed_out();
            info!(
                "Worker {} task {} exceeded deadline of {:?}, cancellation signalled",
                worker.id, task_id, worker.deadline
            );
        }
    }

    TaskResult {
        task_id,
        worker_id: worker.id,
        outcome,
        elapsed_ms: elapsed.as_millis() as u64,
        finished_at: Utc::now(),
    }
}

// == Result Claim ==
const RUNNING: u8 = 0;
const FINISHED: u8 = 1;
const ABANDONED: u8 = 2;

/// Decides, once, whether the work or the deadline reports a task.
#[derive(Debug)]
struct ResultClaim(AtomicU8);

impl ResultClaim {
    fn new() -> Self {
        Self(AtomicU8::new(RUNNING))
    }

    /// Claimed by the work when it finished in time.
    fn finish(&self) -> bool {
        self.0
            .compare_exchange(RUNNING, FINISHED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Claimed by the worker when the deadline fired first.
    fn abandon(&self) -> bool {
        self.0
            .compare_exchange(RUNNING, ABANDONED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn is_abandoned(&self) -> bool {
        self.0.load(Ordering::Acquire) == ABANDONED
    }
}

/// Lives as long as the spawned work. Releases the execution slot and settles
/// the metrics even if the work panics.
struct ExecutionGuard {
    claim: Arc<ResultClaim>,
    metrics: Arc<PoolMetrics>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for ExecutionGuard {
    fn drop(&mut self) {
        // Panicking work never reached `finish`; settle the claim here.
        let abandoned = !self.claim.finish() && self.claim.is_abandoned();
        self.metrics.execution_finished(abandoned);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = PoolConfig::new(3, Duration::from_millis(600));
        assert_eq!(config.queue_capacity, 6);
        assert_eq!(config.max_abandoned, 3);
        assert_eq!(config.execution_slots(), 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_zero_workers() {
        let config = PoolConfig::new(0, Duration::from_millis(10));
        assert!(matches!(config.validate(), Err(ConcurError::InvalidConfig(_))));
    }

    #[test]
    fn test_config_rejects_zero_queue() {
        let config = PoolConfig::new(2, Duration::from_millis(10)).with_queue_capacity(0);
        assert!(matches!(config.validate(), Err(ConcurError::InvalidConfig(_))));
    }

    #[test]
    fn test_config_rejects_zero_deadline() {
        let config = PoolConfig::new(2, Duration::ZERO);
        assert!(matches!(config.validate(), Err(ConcurError::InvalidConfig(_))));
    }

    #[test]
    fn test_claim_first_writer_wins() {
        let claim = ResultClaim::new();
        assert!(claim.abandon());
        assert!(!claim.finish());
        assert!(claim.is_abandoned());

        let claim = ResultClaim::new();
        assert!(claim.finish());
        assert!(!claim.abandon());
        assert!(!claim.is_abandoned());
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_config() {
        let result = WorkerPool::<u32>::start(PoolConfig::new(0, Duration::from_millis(10)), |n, _| async move {
            Ok::<_, String>(n)
        });
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_work_reports_failure() {
        let config = PoolConfig::new(1, Duration::from_secs(1));
        let (pool, mut results) = WorkerPool::start(config, |n: u32, _| async move {
            if n == 0 {
                panic!("boom");
            }
            Ok::<_, String>(n)
        })
        .unwrap();

        pool.submit(Task::new(1, 0)).await.unwrap();
        pool.submit(Task::new(2, 5)).await.unwrap();
        let stats = pool.shutdown().await;

        let first = results.recv().await.unwrap();
        assert_eq!(first.outcome, TaskOutcome::Failure("work panicked".to_string()));
        let second = results.recv().await.unwrap();
        assert_eq!(second.outcome, TaskOutcome::Success(5));
        assert!(results.recv().await.is_none());

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.succeeded, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_work_panicking_before_its_future_keeps_worker_alive() {
        let config = PoolConfig::new(1, Duration::from_secs(1));
        let (pool, mut results) = WorkerPool::start(config, |n: u32, _| {
            if n == 0 {
                panic!("bad payload");
            }
            async move { Ok::<_, String>(n) }
        })
        .unwrap();

        pool.submit(Task::new(1, 0)).await.unwrap();
        pool.submit(Task::new(2, 7)).await.unwrap();
        let stats = pool.shutdown().await;

        let first = results.recv().await.unwrap();
        assert_eq!(first.task_id, 1);
        assert_eq!(first.outcome, TaskOutcome::Failure("work panicked".to_string()));
        let second = results.recv().await.unwrap();
        assert_eq!(second.task_id, 2);
        assert_eq!(second.outcome, TaskOutcome::Success(7));
        assert!(results.recv().await.is_none());

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.succeeded, 1);
    }
}
