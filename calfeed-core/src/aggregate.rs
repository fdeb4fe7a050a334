//! Multi-feed aggregation.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;

use crate::error::CalFeedResult;
use crate::event::EventOccurrence;
use crate::feed::FeedSource;
use crate::fetch::Fetcher;
use crate::pipeline::Pipeline;
use crate::status::{FeedStatus, SyncStatusReporter};
use crate::window::{TimeWindow, WindowConfig};

/// How long a single status report may take before it is abandoned.
pub const DEFAULT_REPORT_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of one refresh across all feeds.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub window: TimeWindow,
    pub refreshed_at: DateTime<Utc>,
    /// Each feed's occurrences sorted by start, concatenated in feed order
    pub occurrences: Vec<EventOccurrence>,
    /// One entry per feed, in feed order
    pub statuses: Vec<FeedStatus>,
}

impl RefreshOutcome {
    pub fn failed_feeds(&self) -> usize {
        self.statuses.iter().filter(|s| !s.is_success()).count()
    }
}

/// Runs fetch, parse, expand and decorate for every configured feed.
///
/// Feeds are processed concurrently and independently: a failing feed
/// contributes no occurrences and an error status, nothing more.
pub struct Aggregator<F, R> {
    feeds: Vec<FeedSource>,
    fetcher: F,
    reporter: R,
    pipeline: Pipeline,
    window_config: WindowConfig,
    report_timeout: Duration,
}

impl<F: Fetcher, R: SyncStatusReporter> Aggregator<F, R> {
    pub fn new(feeds: Vec<FeedSource>, fetcher: F, reporter: R, pipeline: Pipeline) -> Self {
        Aggregator {
            feeds,
            fetcher,
            reporter,
            pipeline,
            window_config: WindowConfig::default(),
            report_timeout: DEFAULT_REPORT_TIMEOUT,
        }
    }

    pub fn with_window_config(mut self, window_config: WindowConfig) -> Self {
        self.window_config = window_config;
        self
    }

    pub fn with_report_timeout(mut self, report_timeout: Duration) -> Self {
        self.report_timeout = report_timeout;
        self
    }

    pub fn feeds(&self) -> &[FeedSource] {
        &self.feeds
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        self.refresh_at(Utc::now()).await
    }

    /// Refresh with the rolling window computed around `now`.
    pub async fn refresh_at(&self, now: DateTime<Utc>) -> RefreshOutcome {
        let window = TimeWindow::rolling(now, self.window_config);
        self.refresh_window(window, now).await
    }

    pub async fn refresh_window(&self, window: TimeWindow, now: DateTime<Utc>) -> RefreshOutcome {
        tracing::debug!(start = %window.start, end = %window.end, feeds = self.feeds.len(), "refreshing");

        let results = join_all(
            self.feeds
                .iter()
                .map(|feed| self.run_feed(feed, window, now)),
        )
        .await;

        let mut occurrences = Vec::new();
        let mut statuses = Vec::with_capacity(results.len());

        for (events, status) in results {
            self.report(&status).await;
            occurrences.extend(events);
            statuses.push(status);
        }

        RefreshOutcome {
            window,
            refreshed_at: now,
            occurrences,
            statuses,
        }
    }

    /// Report one status, logging and dropping failures and timeouts.
    async fn report(&self, status: &FeedStatus) {
        match tokio::time::timeout(self.report_timeout, self.reporter.report(status)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(feed = %status.source_name, error = %e, "failed to report sync status")
            }
            Err(_) => tracing::warn!(
                feed = %status.source_name,
                timeout = ?self.report_timeout,
                "sync status report timed out"
            ),
        }
    }

    async fn run_feed(
        &self,
        feed: &FeedSource,
        window: TimeWindow,
        now: DateTime<Utc>,
    ) -> (Vec<EventOccurrence>, FeedStatus) {
        match self.fetch_and_process(feed, window).await {
            Ok(events) => {
                tracing::info!(feed = %feed.name, count = events.len(), "feed refreshed");
                let status = FeedStatus::success(feed, now, events.len());
                (events, status)
            }
            Err(e) => {
                tracing::warn!(feed = %feed.name, error = %e, "feed failed");
                (Vec::new(), FeedStatus::error(feed, now, e.to_string()))
            }
        }
    }

    async fn fetch_and_process(
        &self,
        feed: &FeedSource,
        window: TimeWindow,
    ) -> CalFeedResult<Vec<EventOccurrence>> {
        let ics = self.fetcher.fetch(&feed.url).await?;
        self.pipeline.process(&ics, feed, window)
    }
}
