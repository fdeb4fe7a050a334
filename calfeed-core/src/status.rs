//! Per-feed sync status records.

use std::future::Future;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::{CalFeedError, CalFeedResult};
use crate::feed::FeedSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Success,
    Error,
}

/// Outcome of one feed in one refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedStatus {
    pub source_name: String,
    pub source_url: String,
    pub timestamp: DateTime<Utc>,
    pub occurrence_count: usize,
    pub status: SyncState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl FeedStatus {
    pub fn success(feed: &FeedSource, timestamp: DateTime<Utc>, occurrence_count: usize) -> Self {
        FeedStatus {
            source_name: feed.name.clone(),
            source_url: feed.url.clone(),
            timestamp,
            occurrence_count,
            status: SyncState::Success,
            error_message: None,
        }
    }

    pub fn error(feed: &FeedSource, timestamp: DateTime<Utc>, message: impl Into<String>) -> Self {
        FeedStatus {
            source_name: feed.name.clone(),
            source_url: feed.url.clone(),
            timestamp,
            occurrence_count: 0,
            status: SyncState::Error,
            error_message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == SyncState::Success
    }
}

/// Receives one status record per feed per refresh.
pub trait SyncStatusReporter: Send + Sync {
    fn report(&self, status: &FeedStatus) -> impl Future<Output = CalFeedResult<()>> + Send;
}

/// Appends status records to a JSON Lines file.
#[derive(Debug, Clone)]
pub struct JsonlStatusLog {
    path: PathBuf,
}

impl JsonlStatusLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonlStatusLog { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every record, oldest first. A missing file is empty.
    pub async fn read_all(&self) -> CalFeedResult<Vec<FeedStatus>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(CalFeedError::from))
            .collect()
    }
}

impl SyncStatusReporter for JsonlStatusLog {
    async fn report(&self, status: &FeedStatus) -> CalFeedResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut line = serde_json::to_string(status)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                CalFeedError::Status(format!("cannot open {}: {}", self.path.display(), e))
            })?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::SourceKind;

    #[tokio::test]
    async fn test_records_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlStatusLog::new(dir.path().join("logs/status.jsonl"));
        let feed = FeedSource::new("School", "https://example.com/a.ics", SourceKind::Outlook);
        let now = Utc::now();

        log.report(&FeedStatus::success(&feed, now, 12)).await.unwrap();
        log.report(&FeedStatus::error(&feed, now, "HTTP 503")).await.unwrap();

        let records = log.read_all().await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].is_success());
        assert_eq!(records[0].occurrence_count, 12);
        assert_eq!(records[1].status, SyncState::Error);
        assert_eq!(records[1].error_message.as_deref(), Some("HTTP 503"));
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let feed = FeedSource::new("Perso", "webcal://example.com/b.ics", SourceKind::Icloud);
        let status = FeedStatus::success(&feed, Utc::now(), 3);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["sourceName"], "Perso");
        assert_eq!(json["occurrenceCount"], 3);
        assert_eq!(json["status"], "success");
        assert!(json.get("errorMessage").is_none());
    }

    #[tokio::test]
    async fn test_missing_log_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlStatusLog::new(dir.path().join("none.jsonl"));

        assert!(log.read_all().await.unwrap().is_empty());
    }
}
