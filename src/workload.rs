//! Simulated Workloads
//!
//! Stand-ins for slow external calls used by the demo binary and tests.
//! Nothing here touches the network; latency is simulated with sleeps.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::sleep;
use tracing::debug;

use crate::cancel::CancellationToken;

// == Remote File ==
/// A file to "download".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteFile {
    pub id: u64,
    pub name: String,
    pub url: String,
    /// Number of transfer steps the download takes
    pub steps: u32,
}

impl RemoteFile {
    pub fn new(id: u64, name: impl Into<String>, steps: u32) -> Self {
        let name = name.into();
        Self {
            id,
            url: format!("https://example.com/{}", name),
            name,
            steps,
        }
    }
}

// == Download Report ==
/// Output of a finished download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadReport {
    pub file_name: String,
    pub steps_completed: u32,
}

// == Download Error ==
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    #[error("network error while fetching {0}")]
    Network(String),

    #[error("download of {name} cancelled after {steps_completed} steps")]
    Cancelled { name: String, steps_completed: u32 },
}

/// Downloads `file` in `file.steps` steps of `step` each, checking `token`
/// before every step.
///
/// Files whose id is a multiple of 5 fail with a network error once all steps
/// are done.
pub async fn simulated_download(
    file: RemoteFile,
    step: Duration,
    token: CancellationToken,
) -> Result<DownloadReport, DownloadError> {
    for completed in 0..file.steps {
        if token.is_cancelled() {
            debug!("Download of {} stopping at step {}", file.name, completed);
            return Err(DownloadError::Cancelled {
                name: file.name,
                steps_completed: completed,
            });
        }
        sleep(step).await;
    }

    if file.id % 5 == 0 {
        return Err(DownloadError::Network(file.name));
    }

    Ok(DownloadReport {
        file_name: file.name,
        steps_completed: file.steps,
    })
}

/// Pretends to be a slow database lookup.
pub async fn query_database(user_id: &str, latency: Duration) -> String {
    debug!("Querying database for {} (slow...)", user_id);
    sleep(latency).await;
    format!("profile of {}", user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_download_completes() {
        let file = RemoteFile::new(1, "image1.jpg", 5);
        let started = Instant::now();

        let report = simulated_download(file, Duration::from_millis(100), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.file_name, "image1.jpg");
        assert_eq!(report.steps_completed, 5);
        assert!(started.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_network_failure() {
        let file = RemoteFile::new(5, "music.mp3", 1);

        let result = simulated_download(file, Duration::from_millis(10), CancellationToken::new()).await;

        assert_eq!(result, Err(DownloadError::Network("music.mp3".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_stops_when_cancelled() {
        let file = RemoteFile::new(2, "video1.mp4", 10);
        let token = CancellationToken::new();
        let handle = tokio::spawn(simulated_download(
            file,
            Duration::from_millis(100),
            token.clone(),
        ));

        sleep(Duration::from_millis(250)).await;
        token.cancel();

        let result = handle.await.unwrap();
        assert_eq!(
            result,
            Err(DownloadError::Cancelled {
                name: "video1.mp4".to_string(),
                steps_completed: 3,
            })
        );
    }

    #[test]
    fn test_remote_file_url() {
        let file = RemoteFile::new(4, "document.pdf", 3);
        assert_eq!(file.url, "https://example.com/document.pdf");
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_database() {
        let started = Instant::now();
        let profile = query_database("user:1", Duration::from_millis(100)).await;
        assert_eq!(profile, "profile of user:1");
        assert!(started.elapsed() >= Duration::from_millis(100));
    }
}
