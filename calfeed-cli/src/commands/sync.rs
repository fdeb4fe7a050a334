use anyhow::Result;
use calfeed_core::{CalfeedConfig, EventCache, JsonFileCache};
use owo_colors::OwoColorize;

use crate::render::{Render, pluralize};
use crate::utils::tui::create_spinner;

pub async fn run(config: &CalfeedConfig) -> Result<()> {
    let aggregator = super::build_aggregator(config)?;

    let spinner = create_spinner(format!(
        "Fetching {} {}...",
        aggregator.feeds().len(),
        pluralize("feed", aggregator.feeds().len())
    ));
    let outcome = aggregator.refresh().await;
    spinner.finish_and_clear();

    for status in &outcome.statuses {
        println!("{}", status.render());
    }
    println!();

    // Keep the previous cache when nothing could be fetched
    if outcome.failed_feeds() == outcome.statuses.len() {
        println!("{}", "All feeds failed, cache left unchanged".yellow());
        return Ok(());
    }

    let cache = JsonFileCache::new(config.cache_file());
    if let Err(e) = cache.store(&outcome.occurrences).await {
        tracing::warn!(error = %e, "failed to write cache");
    }

    println!(
        "{} {} between {} and {}",
        outcome.occurrences.len().to_string().bold(),
        pluralize("event", outcome.occurrences.len()),
        outcome.window.start.format("%Y-%m-%d"),
        outcome.window.end.format("%Y-%m-%d"),
    );

    Ok(())
}
