//! Terminal rendering for calfeed-core types.

use calfeed_core::{EventOccurrence, FeedSource, FeedStatus, SyncState};
use chrono_tz::Tz;
use owo_colors::OwoColorize;

/// Extension trait for TUI rendering with colors.
pub trait Render {
    fn render(&self) -> String;
}

impl Render for FeedStatus {
    fn render(&self) -> String {
        match self.status {
            SyncState::Success => format!(
                "{} {} {}",
                "✓".green(),
                self.source_name,
                format!("({} {})", self.occurrence_count, pluralize("event", self.occurrence_count))
                    .dimmed()
            ),
            SyncState::Error => format!(
                "{} {} {}",
                "✗".red(),
                self.source_name,
                self.error_message.as_deref().unwrap_or("failed").red()
            ),
        }
    }
}

impl Render for FeedSource {
    fn render(&self) -> String {
        format!(
            "{} {} {}",
            swatch(&self.color),
            self.name.bold(),
            format!("[{}]", self.source_kind).dimmed()
        )
    }
}

/// One agenda line: time, color swatch, title, category.
pub fn render_agenda_line(event: &EventOccurrence, tz: Tz) -> String {
    let time = if event.all_day {
        format!("{:>7}", "all-day")
    } else {
        format!("{:>7}", event.start.with_timezone(&tz).format("%H:%M"))
    };

    let mut line = format!(
        "  {} {} {} {}",
        time,
        swatch(&event.color),
        event.title,
        format!("[{}]", event.category.name).dimmed()
    );

    if let Some(location) = &event.location {
        line.push_str(&format!(" {}", location.dimmed()));
    }

    line
}

/// A colored block for a `#rrggbb` color, or a plain one if unparsable.
pub fn swatch(hex: &str) -> String {
    match parse_hex(hex) {
        Some((r, g, b)) => "●".truecolor(r, g, b).to_string(),
        None => "●".to_string(),
    }
}

fn parse_hex(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }

    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// Simple pluralization helper
pub fn pluralize(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{}s", word)
    }
}
