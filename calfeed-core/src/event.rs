//! Event types flowing through the pipeline.
//!
//! `RawEventComponent` is what the parser produces from one VEVENT,
//! `Occurrence` is one concrete instance produced by the expander, and
//! `EventOccurrence` is the decorated record every consumer reads.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::feed::SourceKind;
use crate::timezone::resolve_tzid_or;

/// A DTSTART/DTEND/RECURRENCE-ID value as written in the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTime {
    /// All-day value (`VALUE=DATE`)
    Date(NaiveDate),
    /// UTC timestamp (`...Z`)
    DateTimeUtc(DateTime<Utc>),
    /// Wall-clock time without zone, read in the display timezone
    DateTimeFloating(NaiveDateTime),
    /// Wall-clock time with a TZID parameter
    DateTimeZoned { datetime: NaiveDateTime, tzid: String },
}

impl EventTime {
    pub fn is_date(&self) -> bool {
        matches!(self, EventTime::Date(_))
    }

    /// Resolve to an instant. All-day dates are anchored at UTC midnight;
    /// floating times and unknown TZIDs use `local`.
    pub fn to_utc(&self, local: Tz) -> Option<DateTime<Utc>> {
        match self {
            EventTime::Date(d) => Some(d.and_hms_opt(0, 0, 0)?.and_utc()),
            EventTime::DateTimeUtc(dt) => Some(*dt),
            EventTime::DateTimeFloating(naive) => localize(local, *naive),
            EventTime::DateTimeZoned { datetime, tzid } => {
                localize(resolve_tzid_or(tzid, local), *datetime)
            }
        }
    }

    /// Basic-format token identifying this instant (`20250103T090000Z`,
    /// or `20250103` for all-day values).
    pub fn to_token(&self, local: Tz) -> Option<String> {
        match self {
            EventTime::Date(d) => Some(d.format("%Y%m%d").to_string()),
            _ => self
                .to_utc(local)
                .map(|dt| dt.format("%Y%m%dT%H%M%SZ").to_string()),
        }
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EventTime::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            EventTime::DateTimeUtc(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M UTC")),
            EventTime::DateTimeFloating(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M")),
            EventTime::DateTimeZoned { datetime, tzid } => {
                write!(f, "{} ({})", datetime.format("%Y-%m-%d %H:%M"), tzid)
            }
        }
    }
}

/// Map a wall-clock time in `tz` to an instant. Times that fall into a
/// DST gap are pushed forward by an hour.
pub(crate) fn localize(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Recurrence lines of a master event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Recurrence {
    /// RRULE values (without the `RRULE:` prefix)
    pub rrules: Vec<String>,
    pub rdates: Vec<EventTime>,
    pub exdates: Vec<EventTime>,
}

/// One parsed VEVENT, before expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEventComponent {
    /// Feed-assigned UID, not unique across feeds
    pub uid: String,
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: EventTime,
    pub end: Option<EventTime>,
    /// DURATION, used when DTEND is absent
    pub duration: Option<Duration>,
    pub recurrence: Option<Recurrence>,
    /// Set when this component overrides one instance of a series
    pub recurrence_id: Option<EventTime>,
    pub cancelled: bool,
}

impl RawEventComponent {
    pub fn is_recurring(&self) -> bool {
        self.recurrence.is_some()
    }

    pub fn is_all_day(&self) -> bool {
        self.start.is_date()
    }

    pub fn start_utc(&self, local: Tz) -> Option<DateTime<Utc>> {
        self.start.to_utc(local)
    }

    /// End instant: DTEND, else start + DURATION, else start.
    pub fn end_utc(&self, local: Tz) -> Option<DateTime<Utc>> {
        let start = self.start_utc(local)?;

        match (&self.end, self.duration) {
            (Some(end), _) => end.to_utc(local),
            (None, Some(duration)) => Some(start + duration),
            (None, None) => Some(start),
        }
    }
}

/// One concrete occurrence produced by the expander.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub all_day: bool,
}

/// A categorized, colored occurrence. This is the record consumed by the
/// cache, the agenda and every other reader. Never mutated in place: each
/// refresh produces a new collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOccurrence {
    pub id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    /// Not guaranteed to be after `start`; feeds are passed through as-is
    pub end: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub source_kind: SourceKind,
    pub all_day: bool,
    pub category: Category,
    pub color: String,
}

impl EventOccurrence {
    pub fn from_occurrence(
        occurrence: Occurrence,
        source_kind: SourceKind,
        category: Category,
        color: String,
    ) -> Self {
        EventOccurrence {
            id: occurrence.id,
            title: occurrence.title,
            start: occurrence.start,
            end: occurrence.end,
            description: occurrence.description,
            location: occurrence.location,
            source_kind,
            all_day: occurrence.all_day,
            category,
            color,
        }
    }

    /// Key that is unique across feeds.
    pub fn global_key(&self) -> (SourceKind, &str) {
        (self.source_kind, &self.id)
    }
}

impl fmt::Display for EventOccurrence {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.title)
    }
}
