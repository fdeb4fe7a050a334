//! Rolling time window bounding recurrence expansion.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use serde::Deserialize;

pub const DEFAULT_PAST_MONTHS: u32 = 6;
pub const DEFAULT_FUTURE_MONTHS: u32 = 12;
/// Largest accepted offset on either side of the window.
pub const MAX_WINDOW_MONTHS: u32 = 1200;

/// Month offsets of the rolling window, as configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_past_months")]
    pub past_months: u32,
    #[serde(default = "default_future_months")]
    pub future_months: u32,
}

fn default_past_months() -> u32 {
    DEFAULT_PAST_MONTHS
}

fn default_future_months() -> u32 {
    DEFAULT_FUTURE_MONTHS
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            past_months: DEFAULT_PAST_MONTHS,
            future_months: DEFAULT_FUTURE_MONTHS,
        }
    }
}

/// Inclusive window `[start, end]`. Recomputed at the start of every
/// fetch cycle; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        TimeWindow { start, end }
    }

    /// Window starting on the first of the month `past_months` before `now`
    /// and ending on the last second of the month `future_months` after it.
    pub fn rolling(now: DateTime<Utc>, config: WindowConfig) -> Self {
        let first_of_month = first_of_month(now.date_naive());

        let start_date = first_of_month
            .checked_sub_months(Months::new(config.past_months))
            .unwrap_or(NaiveDate::MIN);
        let end_date = first_of_month
            .checked_add_months(Months::new(config.future_months.saturating_add(1)))
            .unwrap_or(NaiveDate::MAX);

        let start = start_date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        let end = end_date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc() - Duration::seconds(1));

        TimeWindow {
            start: start.unwrap_or(DateTime::<Utc>::MIN_UTC),
            end: end.unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Rolling window around the current time with the default offsets.
    pub fn current() -> Self {
        Self::rolling(Utc::now(), WindowConfig::default())
    }

    /// Whether a `[start, end]` span touches the window.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        end >= self.start && start <= self.end
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}
