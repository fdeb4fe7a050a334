use anyhow::{Context, Result};
use calfeed_core::{CalfeedConfig, EventCache, EventQuery, JsonFileCache, SourceKind};
use chrono::{NaiveDate, Utc};
use owo_colors::OwoColorize;

use crate::render::render_agenda_line;
use crate::utils::dates::AgendaRange;

pub async fn run(
    config: &CalfeedConfig,
    range: AgendaRange,
    feed: Option<&str>,
    text: Option<String>,
) -> Result<()> {
    let cache = JsonFileCache::new(config.cache_file());
    let cached = cache
        .load()
        .await
        .context("Failed to read event cache")?
        .ok_or_else(|| anyhow::anyhow!("No cached events yet. Run `calfeed sync` first."))?;

    let mut query = EventQuery::new().since(range.from).until(range.to);
    if let Some(feed) = feed {
        query = query.source_kind(resolve_feed_kind(config, feed)?);
    }
    if let Some(text) = text {
        query = query.text(text);
    }

    let events = query.apply(&cached.events);

    if events.is_empty() {
        println!("{}", "No events found".dimmed());
        return Ok(());
    }

    let tz = config.display_timezone();
    let today = Utc::now().with_timezone(&tz).date_naive();

    // Group events by day and print
    let mut current_date: Option<NaiveDate> = None;

    for event in events {
        let date = if event.all_day {
            event.start.date_naive()
        } else {
            event.start.with_timezone(&tz).date_naive()
        };

        if current_date != Some(date) {
            if current_date.is_some() {
                println!();
            }
            println!("{}", format_date_label(date, today).bold());
            current_date = Some(date);
        }

        println!("{}", render_agenda_line(event, tz));
    }

    println!();
    println!(
        "{}",
        format!("Cached {}", cached.cached_at.with_timezone(&tz).format("%Y-%m-%d %H:%M")).dimmed()
    );

    Ok(())
}

/// `--feed` takes a configured feed name or a source kind.
fn resolve_feed_kind(config: &CalfeedConfig, feed: &str) -> Result<SourceKind> {
    if let Some(source) = config
        .feeds
        .iter()
        .find(|f| f.name.eq_ignore_ascii_case(feed))
    {
        return Ok(source.source_kind);
    }

    match feed.to_lowercase().as_str() {
        "icloud" => Ok(SourceKind::Icloud),
        "outlook" => Ok(SourceKind::Outlook),
        _ => {
            let available: Vec<_> = config.feeds.iter().map(|f| f.name.as_str()).collect();
            anyhow::bail!(
                "Feed '{}' not found. Available: {}",
                feed,
                available.join(", ")
            )
        }
    }
}

/// Format a date as a human-readable label (e.g. "Today", "Tomorrow", "Wed Feb 25")
fn format_date_label(date: NaiveDate, today: NaiveDate) -> String {
    match (date - today).num_days() {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        -1 => "Yesterday".to_string(),
        _ => date.format("%a %b %-d").to_string(),
    }
}
