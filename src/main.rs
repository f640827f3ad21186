//! Mini Concur - demo harness
//!
//! Exercises the TTL cache and the worker pool against simulated workloads
//! and reports what happened.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rand::Rng;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mini_concur::cache::TtlCache;
use mini_concur::models::{CacheScenario, PoolRun, RetrySummary, RunReport};
use mini_concur::pool::{retry_with_timeout, PoolConfig, RetryConfig, Task, TaskResult, WorkerPool};
use mini_concur::tasks::spawn_sweeper;
use mini_concur::workload::{query_database, simulated_download, DownloadReport, RemoteFile};
use mini_concur::Config;

const FILE_NAMES: [&str; 10] = [
    "image1.jpg",
    "image2.jpg",
    "video1.mp4",
    "document.pdf",
    "music.mp3",
    "image3.png",
    "video2.mp4",
    "data.csv",
    "archive.zip",
    "report.xlsx",
];

const DB_LATENCY: Duration = Duration::from_millis(100);

/// Main entry point for the demo.
///
/// # Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Run the cache scenarios with a background sweeper
/// 4. Run the download pool and a resubmission round
/// 5. Run the retry scenario
/// 6. Log or print the run report; Ctrl+C/SIGTERM cut the run short
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mini_concur=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Mini Concur demo");

    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    info!(
        "Configuration loaded: default_ttl={}ms, sweep_interval={}ms, workers={}, deadline={}ms, queue_capacity={}, max_abandoned={}",
        config.default_ttl_ms,
        config.sweep_interval_ms,
        config.pool_workers,
        config.task_deadline_ms,
        config.queue_capacity,
        config.max_abandoned
    );

    tokio::select! {
        report = run_demo(&config) => {
            let report = report?;
            print_report(&report, config.report_json)?;
        }
        _ = shutdown_signal() => {
            warn!("Demo interrupted before completion");
        }
    }

    info!("Demo complete");
    Ok(())
}

async fn run_demo(config: &Config) -> anyhow::Result<RunReport> {
    let mut report = RunReport::start();

    let cache = Arc::new(TtlCache::<String, String>::new(config.default_ttl()));
    let sweeper = spawn_sweeper(cache.clone(), config.sweep_interval());

    report.cache_scenarios.push(basic_usage(&cache).await);
    report.cache_scenarios.push(cache_aside(&cache, config).await);
    report
        .cache_scenarios
        .push(concurrent_writers(&cache, config).await?);
    report.cache_scenarios.push(expiry(&cache, config).await);

    sweeper.stop().await;
    report.cache_stats = cache.stats().await;

    let first_round = download_round("downloads", config.pool_config(), download_tasks(config)).await?;

    // The pool never retries; resubmitting is up to the caller. Give timed-out
    // downloads a second chance with twice the deadline.
    let retry_ids = first_round.timed_out_ids();
    report.pool_runs.push(first_round.run);
    if !retry_ids.is_empty() {
        let resubmitted = download_tasks(config)
            .into_iter()
            .filter(|task| retry_ids.contains(&task.id))
            .collect();
        let mut pool_config = config.pool_config();
        pool_config.deadline *= 2;
        let second_round = download_round("resubmitted", pool_config, resubmitted).await?;
        report.pool_runs.push(second_round.run);
    }

    report.retry = flaky_requests().await;

    report.finish();
    Ok(report)
}

// == Cache Scenarios ==

async fn basic_usage(cache: &TtlCache<String, String>) -> CacheScenario {
    let started = Instant::now();

    cache
        .set("user:1".to_string(), "Alice".to_string(), Duration::from_secs(2))
        .await;
    cache
        .set("user:2".to_string(), "Bob".to_string(), Duration::from_secs(2))
        .await;

    let user = cache.get("user:1").await.unwrap_or_default();
    let count = cache.count().await;
    info!("Basic usage: user:1 = {}, {} entries", user, count);

    CacheScenario::new(
        "basic",
        format!("user:1 = {}, {} entries stored", user, count),
        started.elapsed().as_millis() as u64,
    )
}

async fn cache_aside(cache: &TtlCache<String, String>, config: &Config) -> CacheScenario {
    let key = "user:100".to_string();

    let started = Instant::now();
    cache
        .get_or_load(key.clone(), config.default_ttl(), || {
            query_database("user:100", DB_LATENCY)
        })
        .await;
    let cold = started.elapsed();

    let started = Instant::now();
    cache
        .get_or_load(key, config.default_ttl(), || query_database("user:100", DB_LATENCY))
        .await;
    let warm = started.elapsed();

    info!("Cache-aside: cold read {:?}, warm read {:?}", cold, warm);

    CacheScenario::new(
        "cache_aside",
        format!("cold read {:?}, warm read {:?}", cold, warm),
        (cold + warm).as_millis() as u64,
    )
}

async fn concurrent_writers(
    cache: &Arc<TtlCache<String, String>>,
    config: &Config,
) -> anyhow::Result<CacheScenario> {
    let started = Instant::now();

    // 10 writers over 3 keys
    let handles: Vec<JoinHandle<Option<String>>> = (1..=10)
        .map(|id| {
            let cache = cache.clone();
            let ttl = config.default_ttl() * 2;
            tokio::spawn(async move {
                let key = format!("concurrent:{}", id % 3);
                cache.set(key.clone(), format!("data{}", id), ttl).await;
                cache.get(&key).await
            })
        })
        .collect();

    let mut observed = 0;
    for handle in handles {
        if handle.await.context("concurrent writer panicked")?.is_some() {
            observed += 1;
        }
    }

    let count = cache.count().await;
    info!(
        "Concurrent writers: {}/10 read back a value, {} entries stored",
        observed, count
    );

    Ok(CacheScenario::new(
        "concurrent",
        format!("{}/10 writers read back a value, {} entries stored", observed, count),
        started.elapsed().as_millis() as u64,
    ))
}

async fn expiry(cache: &TtlCache<String, String>, config: &Config) -> CacheScenario {
    let started = Instant::now();
    let ttl = config.default_ttl();
    let key = "expire:test".to_string();

    cache.set(key.clone(), "short lived".to_string(), ttl).await;

    sleep(ttl / 2).await;
    let halfway = cache.get(&key).await.is_some();

    sleep(ttl / 2 + config.sweep_interval()).await;
    let after = cache.get(&key).await.is_some();
    let count = cache.count().await;

    info!(
        "Expiry: present at ttl/2 = {}, present after ttl = {}, {} entries left after sweep",
        halfway, after, count
    );

    CacheScenario::new(
        "expiry",
        format!(
            "present at ttl/2: {}, present after ttl: {}, entries after sweep: {}",
            halfway, after, count
        ),
        started.elapsed().as_millis() as u64,
    )
}

// == Pool Scenarios ==

type Download = (RemoteFile, Duration);

struct Round {
    run: PoolRun,
    results: Vec<TaskResult<DownloadReport>>,
}

impl Round {
    fn timed_out_ids(&self) -> Vec<u64> {
        self.results
            .iter()
            .filter(|result| result.outcome.is_timed_out())
            .map(|result| result.task_id)
            .collect()
    }
}

/// Builds the demo's download tasks: 3 to 7 steps each with a jittered step.
fn download_tasks(config: &Config) -> Vec<Task<Download>> {
    let mut rng = rand::thread_rng();
    (1..=config.demo_tasks as u64)
        .map(|id| {
            let name = FILE_NAMES[(id as usize - 1) % FILE_NAMES.len()];
            let steps = 3 + (id % 5) as u32;
            let step = Duration::from_millis(rng.gen_range(80..=120));
            Task::new(id, (RemoteFile::new(id, name, steps), step))
        })
        .collect()
}

async fn download_round(
    name: &str,
    pool_config: PoolConfig,
    tasks: Vec<Task<Download>>,
) -> anyhow::Result<Round> {
    let started = Instant::now();
    let (pool, mut results) = WorkerPool::start(pool_config, |(file, step): Download, token| {
        simulated_download(file, step, token)
    })
    .context("failed to start worker pool")?;

    let submitter = pool.submitter();
    let total = tasks.len();
    let producer = tokio::spawn(async move {
        for task in tasks {
            submitter.submit(task).await?;
        }
        Ok::<_, mini_concur::ConcurError>(())
    });

    let mut collected = Vec::with_capacity(total);
    while collected.len() < total {
        match results.recv().await {
            Some(result) => {
                log_result(&result);
                collected.push(result);
            }
            None => break,
        }
    }

    producer
        .await
        .context("producer panicked")?
        .context("submission failed")?;
    let stats = pool.shutdown().await;

    let run = PoolRun::from_results(name, &collected, started.elapsed().as_millis() as u64, stats);
    info!(
        "Round '{}': {} succeeded, {} failed, {} timed out in {}ms (serial estimate {}ms, {:.1}x)",
        run.name,
        run.succeeded,
        run.failed,
        run.timed_out,
        run.elapsed_ms,
        run.serial_estimate_ms,
        run.speedup()
    );

    Ok(Round {
        run,
        results: collected,
    })
}

fn log_result(result: &TaskResult<DownloadReport>) {
    match result.failure_reason() {
        None => info!(
            "[worker {}] task {} done in {}ms",
            result.worker_id, result.task_id, result.elapsed_ms
        ),
        Some(reason) => warn!(
            "[worker {}] task {} unsuccessful after {}ms: {}",
            result.worker_id, result.task_id, result.elapsed_ms, reason
        ),
    }
}

// == Retry Scenario ==

/// Fails 70% of the time after 50-250ms of latency.
async fn unstable_service(request_id: usize) -> Result<String, String> {
    let (delay, fails) = {
        let mut rng = rand::thread_rng();
        (rng.gen_range(50..250), rng.gen_bool(0.7))
    };
    sleep(Duration::from_millis(delay)).await;

    if fails {
        Err("service temporarily unavailable".to_string())
    } else {
        Ok(format!("request {} ok", request_id))
    }
}

async fn flaky_requests() -> RetrySummary {
    let config = RetryConfig {
        max_retries: 3,
        initial_backoff: Duration::from_millis(100),
        max_backoff: Duration::from_secs(1),
        total_timeout: Duration::from_secs(10),
        attempt_timeout: Duration::from_secs(5),
    };

    let requests = 5;
    let mut summary = RetrySummary {
        requests,
        ..RetrySummary::default()
    };
    let mut total = Duration::ZERO;

    for request_id in 1..=requests {
        let started = Instant::now();
        let result = retry_with_timeout(&config, |_| unstable_service(request_id)).await;
        total += started.elapsed();

        match result {
            Ok(body) => {
                info!("Request {}: {}", request_id, body);
                summary.succeeded += 1;
            }
            Err(err) => warn!("Request {}: {}", request_id, err),
        }
    }

    summary.average_ms = (total / requests as u32).as_millis() as u64;
    summary
}

// == Reporting ==

fn print_report(report: &RunReport, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        let json = serde_json::to_string_pretty(report).context("failed to serialize report")?;
        println!("{}", json);
        return Ok(());
    }

    for scenario in &report.cache_scenarios {
        info!("[cache:{}] {} ({}ms)", scenario.name, scenario.summary, scenario.elapsed_ms);
    }
    info!(
        "[cache] hits={}, misses={}, expired_reads={}, swept={}, hit_rate={:.2}",
        report.cache_stats.hits,
        report.cache_stats.misses,
        report.cache_stats.expired_reads,
        report.cache_stats.swept,
        report.cache_stats.hit_rate()
    );
    for run in &report.pool_runs {
        info!(
            "[pool:{}] {}/{} succeeded, {} failed, {} timed out, {} late results dropped, peak in flight {}",
            run.name,
            run.succeeded,
            run.total_tasks,
            run.failed,
            run.timed_out,
            run.stats.late_suppressed,
            run.stats.peak_in_flight
        );
    }
    info!(
        "[retry] {}/{} succeeded, average {}ms",
        report.retry.succeeded, report.retry.requests, report.retry.average_ms
    );
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, stopping...");
        }
        _ = terminate => {
            info!("Received SIGTERM, stopping...");
        }
    }
}
