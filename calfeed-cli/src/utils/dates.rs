//! Date arguments for the agenda.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Days shown when only `--from` (or nothing) is given.
pub const DEFAULT_AGENDA_DAYS: u64 = 7;

/// Inclusive agenda range, resolved in the display timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgendaRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl AgendaRange {
    /// - `from`: YYYY-MM-DD, defaults to today
    /// - `to`: YYYY-MM-DD (inclusive), defaults to a week after `from`
    pub fn from_args(from: Option<&str>, to: Option<&str>, tz: Tz) -> Result<Self> {
        let today = Utc::now().with_timezone(&tz).date_naive();
        Self::resolve(from, to, tz, today)
    }

    fn resolve(from: Option<&str>, to: Option<&str>, tz: Tz, today: NaiveDate) -> Result<Self> {
        let from_date = match from {
            Some(s) => parse_date(s)?,
            None => today,
        };

        let to_date = match to {
            Some(s) => parse_date(s)?,
            None => from_date
                .checked_add_days(Days::new(DEFAULT_AGENDA_DAYS - 1))
                .ok_or_else(|| anyhow!("Date out of range"))?,
        };

        if to_date < from_date {
            anyhow::bail!("--to ({}) is before --from ({})", to_date, from_date);
        }

        let next_day = to_date
            .succ_opt()
            .ok_or_else(|| anyhow!("Date out of range"))?;

        Ok(AgendaRange {
            from: start_of_day(from_date, tz)?,
            to: start_of_day(next_day, tz)? - chrono::Duration::seconds(1),
        })
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| anyhow!("Invalid date format '{}'. Expected YYYY-MM-DD", s))
}

fn start_of_day(date: NaiveDate, tz: Tz) -> Result<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| anyhow!("{} has no midnight in {}", date, tz.name()))
}
