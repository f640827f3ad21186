//! TTL Sweeper Task
//!
//! Background task that periodically removes expired cache entries.
//! It is the only place expired entries are physically removed.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cache::TtlCache;
use crate::cancel::CancellationToken;

/// Shortest interval the sweeper runs at; shorter requests are raised to it.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

// == Sweeper Handle ==
/// Owns a running sweeper. Dropping the handle signals the sweeper to stop.
#[derive(Debug)]
pub struct SweeperHandle {
    stop: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    // == Stop ==
    /// Signals the sweeper to stop and waits for it to exit.
    ///
    /// A sweep already in progress finishes first; no sweep starts after this
    /// returns.
    pub async fn stop(mut self) {
        self.stop.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!("TTL sweeper ended abnormally: {}", err);
            }
        }
    }

    /// Returns true once the sweeper task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}

/// Spawns a background task that sweeps expired entries every `interval`.
///
/// The first sweep runs one full interval after spawning. Each sweep takes the
/// cache's write lock once. An interval below [`MIN_SWEEP_INTERVAL`] is raised
/// to it.
///
/// # Arguments
/// * `cache` - Shared reference to the cache
/// * `interval` - Time between sweeps
///
/// # Example
/// ```ignore
/// let cache = Arc::new(TtlCache::new(Duration::from_secs(300)));
/// let sweeper = spawn_sweeper(cache.clone(), Duration::from_secs(1));
/// // Later, during shutdown:
/// sweeper.stop().await;
/// ```
pub fn spawn_sweeper<K, V>(cache: Arc<TtlCache<K, V>>, interval: Duration) -> SweeperHandle
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    let interval = if interval < MIN_SWEEP_INTERVAL {
        warn!(
            "Sweep interval {:?} too short, using {:?}",
            interval, MIN_SWEEP_INTERVAL
        );
        MIN_SWEEP_INTERVAL
    } else {
        interval
    };
    let stop = CancellationToken::new();
    let stopped = stop.clone();

    let task = tokio::spawn(async move {
        info!("Starting TTL sweeper with interval of {:?}", interval);

        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = stopped.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let removed = cache.sweep_expired().await;

            if removed > 0 {
                info!("TTL sweep: removed {} expired entries", removed);
            } else {
                debug!("TTL sweep: no expired entries found");
            }
        }

        info!("TTL sweeper stopped");
    });

    SweeperHandle {
        stop,
        task: Some(task),
    }
}
