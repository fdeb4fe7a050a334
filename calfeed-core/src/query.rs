//! Filtering of cached occurrences for the agenda.

use chrono::{DateTime, Utc};

use crate::event::EventOccurrence;
use crate::feed::SourceKind;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub source_kind: Option<SourceKind>,
    /// Case-insensitive, searched in title, description and location
    pub text: Option<String>,
}

impl EventQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn since(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    pub fn until(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    pub fn source_kind(mut self, source_kind: SourceKind) -> Self {
        self.source_kind = Some(source_kind);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn matches(&self, event: &EventOccurrence) -> bool {
        // Feeds may hand us an end before the start
        let span_end = event.end.max(event.start);

        if self.from.is_some_and(|from| span_end < from) {
            return false;
        }
        if self.to.is_some_and(|to| event.start > to) {
            return false;
        }
        if self.source_kind.is_some_and(|kind| kind != event.source_kind) {
            return false;
        }

        match &self.text {
            Some(text) if !text.trim().is_empty() => {
                let needle = text.trim().to_lowercase();
                [
                    Some(event.title.as_str()),
                    event.description.as_deref(),
                    event.location.as_deref(),
                ]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&needle))
            }
            _ => true,
        }
    }

    /// Matching events, in start order.
    pub fn apply<'a>(&self, events: &'a [EventOccurrence]) -> Vec<&'a EventOccurrence> {
        let mut matching: Vec<_> = events.iter().filter(|e| self.matches(e)).collect();
        matching.sort_by_key(|e| e.start);
        matching
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::categorize;
    use chrono::{Duration, TimeZone};

    fn event(id: &str, title: &str, day: u32, source_kind: SourceKind) -> EventOccurrence {
        let start = Utc.with_ymd_and_hms(2025, 3, day, 9, 0, 0).unwrap();
        EventOccurrence {
            id: id.to_string(),
            title: title.to_string(),
            start,
            end: start + Duration::hours(1),
            description: Some("Salle B12".to_string()),
            location: None,
            source_kind,
            all_day: false,
            category: categorize(title, None, source_kind),
            color: "#000000".to_string(),
        }
    }

    fn events() -> Vec<EventOccurrence> {
        vec![
            event("c", "Cours [TP1]", 12, SourceKind::Outlook),
            event("a", "Réunion budget", 10, SourceKind::Outlook),
            event("b", "Dentiste", 11, SourceKind::Icloud),
        ]
    }

    fn ids(matching: Vec<&EventOccurrence>) -> Vec<&str> {
        matching.into_iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_empty_query_returns_everything_sorted() {
        let events = events();
        assert_eq!(ids(EventQuery::new().apply(&events)), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_range_filter() {
        let events = events();
        let query = EventQuery::new()
            .since(Utc.with_ymd_and_hms(2025, 3, 10, 9, 30, 0).unwrap())
            .until(Utc.with_ymd_and_hms(2025, 3, 11, 23, 0, 0).unwrap());

        // "a" is still running at 09:30
        assert_eq!(ids(query.apply(&events)), vec!["a", "b"]);
    }

    #[test]
    fn test_feed_and_text_filters() {
        let events = events();

        let outlook = EventQuery::new().source_kind(SourceKind::Outlook);
        assert_eq!(ids(outlook.apply(&events)), vec!["a", "c"]);

        let text = EventQuery::new().text("tp1");
        assert_eq!(ids(text.apply(&events)), vec!["c"]);

        let description = EventQuery::new().text("salle b12");
        assert_eq!(description.apply(&events).len(), 3);
    }
}
