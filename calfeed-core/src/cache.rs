//! Persistence of the last aggregated occurrence list.

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CalFeedError, CalFeedResult};
use crate::event::EventOccurrence;

/// Stores the flattened occurrence list between runs.
pub trait EventCache: Send + Sync {
    fn store(&self, events: &[EventOccurrence]) -> impl Future<Output = CalFeedResult<()>> + Send;

    /// `None` when nothing has been cached yet.
    fn load(&self) -> impl Future<Output = CalFeedResult<Option<CachedEvents>>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedEvents {
    pub cached_at: DateTime<Utc>,
    pub events: Vec<EventOccurrence>,
}

/// Drop repeated `(source_kind, id)` pairs, keeping the first.
pub fn dedup_events(events: &[EventOccurrence]) -> Vec<EventOccurrence> {
    let mut seen = HashSet::new();
    events
        .iter()
        .filter(|e| seen.insert(e.global_key()))
        .cloned()
        .collect()
}

/// Single JSON document on disk, replaced atomically on every store.
#[derive(Debug, Clone)]
pub struct JsonFileCache {
    path: PathBuf,
}

impl JsonFileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileCache { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventCache for JsonFileCache {
    async fn store(&self, events: &[EventOccurrence]) -> CalFeedResult<()> {
        let cached = CachedEvents {
            cached_at: Utc::now(),
            events: dedup_events(events),
        };
        let json = serde_json::to_vec_pretty(&cached)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp, json).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        tracing::debug!(path = %self.path.display(), count = cached.events.len(), "cache written");
        Ok(())
    }

    async fn load(&self) -> CalFeedResult<Option<CachedEvents>> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let cached = serde_json::from_slice(&content).map_err(|e| {
            CalFeedError::Cache(format!("{} is not a valid cache: {}", self.path.display(), e))
        })?;

        Ok(Some(cached))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::{CategoryKind, categorize};
    use crate::feed::SourceKind;
    use chrono::TimeZone;

    fn event(id: &str, source_kind: SourceKind) -> EventOccurrence {
        let start = Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        EventOccurrence {
            id: id.to_string(),
            title: "Réunion budget".to_string(),
            start,
            end: start + chrono::Duration::hours(1),
            description: None,
            location: Some("Salle B12".to_string()),
            source_kind,
            all_day: false,
            category: categorize("Réunion budget", None, source_kind),
            color: "#4363d8".to_string(),
        }
    }

    #[tokio::test]
    async fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::new(dir.path().join("cache/events.json"));
        let events = vec![event("E1", SourceKind::Outlook), event("E1", SourceKind::Icloud)];

        cache.store(&events).await.unwrap();
        let loaded = cache.load().await.unwrap().unwrap();

        assert_eq!(loaded.events, events);
        assert_eq!(loaded.events[0].category.id, CategoryKind::Meeting);
        assert_eq!(loaded.events[1].category.id, CategoryKind::Personal);
    }

    #[tokio::test]
    async fn test_duplicates_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::new(dir.path().join("events.json"));
        let events = vec![event("E1", SourceKind::Outlook), event("E1", SourceKind::Outlook)];

        cache.store(&events).await.unwrap();

        assert_eq!(cache.load().await.unwrap().unwrap().events.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_cache_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::new(dir.path().join("events.json"));

        assert!(cache.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_cache_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = JsonFileCache::new(path).load().await;
        assert!(matches!(result, Err(CalFeedError::Cache(_))));
    }
}
