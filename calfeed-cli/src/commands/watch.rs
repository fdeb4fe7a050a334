use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use calfeed_core::{CalfeedConfig, EventCache, EventStore, JsonFileCache};
use owo_colors::OwoColorize;
use tokio::task::JoinHandle;

use crate::render::{Render, pluralize};

/// Refresh every `interval` until Ctrl-C. A refresh still running when
/// the next tick fires is aborted and started over.
pub async fn run(config: &CalfeedConfig, interval: Duration) -> Result<()> {
    let aggregator = Arc::new(super::build_aggregator(config)?);
    let store = Arc::new(EventStore::new());
    let cache = JsonFileCache::new(config.cache_file());

    match cache.load().await {
        Ok(Some(cached)) => {
            let count = cached.events.len();
            store.seed(cached.events, cached.cached_at);
            tracing::info!(count, "loaded cached events");
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "ignoring unreadable cache"),
    }

    println!(
        "Watching {} {} every {} {}",
        aggregator.feeds().len(),
        pluralize("feed", aggregator.feeds().len()),
        humantime::format_duration(interval),
        "(Ctrl-C to stop)".dimmed()
    );

    let mut ticker = tokio::time::interval(interval);
    let mut updates = store.subscribe();
    let mut in_flight: Option<JoinHandle<()>> = None;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(handle) = in_flight.take() {
                    if !handle.is_finished() {
                        tracing::info!("previous refresh still running, restarting it");
                        handle.abort();
                    }
                }

                let ticket = store.begin_refresh();
                let aggregator = Arc::clone(&aggregator);
                let store = Arc::clone(&store);

                in_flight = Some(tokio::spawn(async move {
                    let outcome = aggregator.refresh().await;
                    for status in outcome.statuses.iter().filter(|s| !s.is_success()) {
                        eprintln!("{}", status.render());
                    }
                    store.publish(ticket, outcome.occurrences, outcome.refreshed_at);
                }));
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }

                let snapshot = updates.borrow_and_update().clone();
                if snapshot.generation == 0 {
                    continue;
                }

                if let Err(e) = cache.store(&snapshot.events).await {
                    tracing::warn!(error = %e, "failed to write cache");
                }

                let at = snapshot
                    .refreshed_at
                    .map(|t| t.with_timezone(&config.display_timezone()).format("%H:%M:%S").to_string())
                    .unwrap_or_default();
                println!(
                    "{} {} {}",
                    format!("[{}]", at).dimmed(),
                    snapshot.events.len().to_string().bold(),
                    pluralize("event", snapshot.events.len())
                );
            }
            _ = &mut shutdown => {
                if let Some(handle) = in_flight.take() {
                    handle.abort();
                }
                println!();
                break;
            }
        }
    }

    Ok(())
}
