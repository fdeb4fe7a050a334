use std::collections::HashMap;

use anyhow::Result;
use calfeed_core::{CalfeedConfig, FeedStatus, JsonlStatusLog};
use owo_colors::OwoColorize;

use crate::render::Render;

pub async fn run(config: &CalfeedConfig) -> Result<()> {
    if config.feeds.is_empty() {
        println!("{}", "No feeds configured".dimmed());
        return Ok(());
    }

    let log = JsonlStatusLog::new(config.status_log_file());
    let history = match log.read_all().await {
        Ok(history) => history,
        Err(e) => {
            tracing::warn!(error = %e, "could not read sync status log");
            Vec::new()
        }
    };
    let latest = latest_by_feed(history);
    let tz = config.display_timezone();

    for feed in &config.feeds {
        println!("{}", feed.render());
        println!("  {}", feed.url.dimmed());

        match latest.get(&feed.name) {
            Some(status) => println!(
                "  {} {}",
                status.render(),
                format!("at {}", status.timestamp.with_timezone(&tz).format("%Y-%m-%d %H:%M"))
                    .dimmed()
            ),
            None => println!("  {}", "never synced".dimmed()),
        }
    }

    Ok(())
}

fn latest_by_feed(history: Vec<FeedStatus>) -> HashMap<String, FeedStatus> {
    let mut latest: HashMap<String, FeedStatus> = HashMap::new();
    for status in history {
        match latest.get(&status.source_name) {
            Some(existing) if existing.timestamp > status.timestamp => {}
            _ => {
                latest.insert(status.source_name.clone(), status);
            }
        }
    }
    latest
}
