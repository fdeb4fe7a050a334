pub mod config;
pub mod events;
pub mod feeds;
pub mod sync;
pub mod watch;

use anyhow::{Context, Result};
use calfeed_core::{Aggregator, CalfeedConfig, HttpFetcher, JsonlStatusLog};

pub type FeedAggregator = Aggregator<HttpFetcher, JsonlStatusLog>;

/// Aggregator over every configured feed, logging statuses next to the cache.
pub fn build_aggregator(config: &CalfeedConfig) -> Result<FeedAggregator> {
    let fetcher = HttpFetcher::new(&config.fetch).context("Failed to create HTTP client")?;
    let status_log = JsonlStatusLog::new(config.status_log_file());

    Ok(Aggregator::new(
        config.feeds.clone(),
        fetcher,
        status_log,
        config.pipeline(),
    )
    .with_window_config(config.window))
}
