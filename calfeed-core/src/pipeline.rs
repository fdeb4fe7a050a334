//! Per-feed processing: parse, expand, categorize, color.

use chrono_tz::Tz;

use crate::category::categorize;
use crate::color::Colorizer;
use crate::error::CalFeedResult;
use crate::event::EventOccurrence;
use crate::feed::FeedSource;
use crate::ics::parse_calendar;
use crate::recurrence::{DEFAULT_MAX_OCCURRENCES, Expander};
use crate::window::TimeWindow;

/// Turns the raw text of one feed into decorated occurrences.
///
/// Shared read-only by every feed of a refresh.
#[derive(Debug, Clone)]
pub struct Pipeline {
    timezone: Tz,
    max_occurrences: u16,
    colorizer: Colorizer,
}

impl Pipeline {
    pub fn new(timezone: Tz, colorizer: Colorizer) -> Self {
        Pipeline {
            timezone,
            max_occurrences: DEFAULT_MAX_OCCURRENCES,
            colorizer,
        }
    }

    pub fn with_max_occurrences(mut self, max_occurrences: u16) -> Self {
        self.max_occurrences = max_occurrences;
        self
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn colorizer(&self) -> &Colorizer {
        &self.colorizer
    }

    /// Fails only when the text is not a calendar at all; individual bad
    /// events are skipped.
    pub fn process(
        &self,
        ics: &str,
        feed: &FeedSource,
        window: TimeWindow,
    ) -> CalFeedResult<Vec<EventOccurrence>> {
        let parsed = parse_calendar(ics)?;
        if parsed.skipped > 0 {
            tracing::info!(feed = %feed.name, skipped = parsed.skipped, "skipped malformed events");
        }

        let expander =
            Expander::new(window, self.timezone).with_max_occurrences(self.max_occurrences);
        let occurrences = expander.expand_feed(parsed.components);

        Ok(occurrences
            .into_iter()
            .map(|occurrence| {
                let category = categorize(
                    &occurrence.title,
                    occurrence.description.as_deref(),
                    feed.source_kind,
                );
                let color = self.colorizer.resolve(&occurrence.title);
                EventOccurrence::from_occurrence(occurrence, feed.source_kind, category, color)
            })
            .collect())
    }
}
