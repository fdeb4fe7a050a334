//! Occurrence expansion.
//!
//! Turns parsed components into concrete occurrences clipped to a time
//! window. Recurring masters are expanded through the rrule crate,
//! honoring EXDATE/RDATE and instance overrides (components carrying a
//! RECURRENCE-ID).

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use rrule::RRuleSet;

use crate::error::{CalFeedError, CalFeedResult};
use crate::event::{EventTime, Occurrence, RawEventComponent, Recurrence, localize};
use crate::timezone::resolve_tzid_or;
use crate::window::TimeWindow;

/// Upper bound on occurrences expanded per recurring series.
pub const DEFAULT_MAX_OCCURRENCES: u16 = 1000;

/// Upper bound on instants generated per series, counting those before
/// the window.
pub const MAX_SERIES_ITERATIONS: usize = 100_000;

/// Expands the components of one feed inside a time window.
#[derive(Debug, Clone)]
pub struct Expander {
    window: TimeWindow,
    max_occurrences: u16,
    /// Zone for floating times and unknown TZIDs
    local: Tz,
}

impl Expander {
    pub fn new(window: TimeWindow, local: Tz) -> Self {
        Expander {
            window,
            max_occurrences: DEFAULT_MAX_OCCURRENCES,
            local,
        }
    }

    pub fn with_max_occurrences(mut self, max_occurrences: u16) -> Self {
        self.max_occurrences = max_occurrences;
        self
    }

    pub fn window(&self) -> &TimeWindow {
        &self.window
    }

    /// Expand every component of a feed and sort the result by start.
    ///
    /// A component that fails to expand is logged and skipped; this never
    /// fails as a whole.
    pub fn expand_feed(&self, components: Vec<RawEventComponent>) -> Vec<Occurrence> {
        let (overrides, components): (Vec<_>, Vec<_>) = components
            .into_iter()
            .partition(|c| c.recurrence_id.is_some());

        let mut overrides_by_uid: HashMap<String, Vec<RawEventComponent>> = HashMap::new();
        for instance in overrides {
            overrides_by_uid
                .entry(instance.uid.clone())
                .or_default()
                .push(instance);
        }

        let mut occurrences = Vec::new();

        for component in &components {
            if component.cancelled {
                tracing::debug!(uid = %component.uid, "skipping cancelled event");
                if component.recurrence.is_some() {
                    overrides_by_uid.remove(&component.uid);
                }
                continue;
            }

            let instances = match &component.recurrence {
                Some(recurrence) => {
                    let overrides = overrides_by_uid
                        .remove(&component.uid)
                        .unwrap_or_default();
                    self.expand_series(component, recurrence, &overrides)
                }
                None => self.expand_single(component, None).map(Vec::from_iter),
            };

            match instances {
                Ok(instances) => occurrences.extend(instances),
                Err(e) => tracing::warn!(uid = %component.uid, error = %e, "skipping event"),
            }
        }

        // Overrides whose master is not part of this feed
        for instance in overrides_by_uid.into_values().flatten() {
            if instance.cancelled {
                continue;
            }
            match self.expand_single(&instance, instance.recurrence_id.as_ref()) {
                Ok(occurrence) => occurrences.extend(occurrence),
                Err(e) => tracing::warn!(uid = %instance.uid, error = %e, "skipping instance"),
            }
        }

        occurrences.sort_by_key(|o| o.start);
        occurrences
    }

    /// A non-recurring component: one occurrence if it touches the window.
    ///
    /// `recurrence_id` is set for detached instances, whose id must stay
    /// distinct from their siblings.
    fn expand_single(
        &self,
        component: &RawEventComponent,
        recurrence_id: Option<&EventTime>,
    ) -> CalFeedResult<Option<Occurrence>> {
        let start = component
            .start_utc(self.local)
            .ok_or_else(|| CalFeedError::Recurrence("DTSTART cannot be resolved".into()))?;
        let end = component
            .end_utc(self.local)
            .ok_or_else(|| CalFeedError::Recurrence("DTEND cannot be resolved".into()))?;

        if end < start {
            tracing::debug!(uid = %component.uid, %start, %end, "event ends before it starts");
        }

        if !self.window.overlaps(start, end) {
            return Ok(None);
        }

        let id = match recurrence_id {
            Some(recurrence_id) => {
                let token = recurrence_id.to_token(self.local).ok_or_else(|| {
                    CalFeedError::Recurrence("RECURRENCE-ID cannot be resolved".into())
                })?;
                format!("{}_{}", component.uid, token)
            }
            None => component.uid.clone(),
        };

        Ok(Some(occurrence(id, component, start, end)))
    }

    /// Expand a recurring master into the occurrences starting inside the
    /// window, capped at `max_occurrences`.
    fn expand_series(
        &self,
        master: &RawEventComponent,
        recurrence: &Recurrence,
        overrides: &[RawEventComponent],
    ) -> CalFeedResult<Vec<Occurrence>> {
        let clock = SeriesClock::for_component(master, self.local)?;
        let rrule_str = build_rrule_string(master, recurrence, &clock, self.local)?;

        let rrule_set: RRuleSet = rrule_str.parse().map_err(|e| {
            CalFeedError::Recurrence(format!(
                "Failed to parse RRULE for event '{}': {}",
                master.uid, e
            ))
        })?;

        let starts = self.series_starts(&rrule_set, &master.uid);

        let mut overrides_by_token: HashMap<String, &RawEventComponent> = overrides
            .iter()
            .filter_map(|o| {
                let token = o.recurrence_id.as_ref()?.to_token(self.local)?;
                Some((token, o))
            })
            .collect();

        let mut seen = HashSet::new();
        let mut occurrences = Vec::new();

        for start in starts {
            let token = clock.token(start);
            if !seen.insert(token.clone()) {
                continue;
            }
            let id = format!("{}_{}", master.uid, token);

            match overrides_by_token.remove(&token) {
                Some(instance) => {
                    if let Some(occ) = self.resolve_override(id, instance) {
                        occurrences.push(occ);
                    }
                }
                None => {
                    let end = clock.end_for(start);
                    occurrences.push(occurrence(id, master, start, end));
                }
            }
        }

        // Overrides that were moved in from outside the window, or whose
        // RECURRENCE-ID did not line up with a generated instance
        for (token, instance) in overrides_by_token {
            if occurrences.len() >= usize::from(self.max_occurrences) {
                break;
            }
            let id = format!("{}_{}", master.uid, token);
            if let Some(occ) = self.resolve_override(id, instance) {
                occurrences.push(occ);
            }
        }

        occurrences.truncate(usize::from(self.max_occurrences));
        Ok(occurrences)
    }

    /// Generated starts inside the window, in order.
    ///
    /// Stops at the occurrence cap, past the window end, or once
    /// `MAX_SERIES_ITERATIONS` instants have been generated, whichever
    /// comes first.
    fn series_starts(&self, rrule_set: &RRuleSet, uid: &str) -> Vec<DateTime<Utc>> {
        let cap = usize::from(self.max_occurrences);
        let mut starts = Vec::new();
        let mut generated = 0usize;

        for occ_dt in rrule_set {
            if generated == MAX_SERIES_ITERATIONS {
                tracing::debug!(uid, generated, "recurrence stopped at iteration budget");
                break;
            }
            generated += 1;

            let start = occ_dt.with_timezone(&Utc);
            if start > self.window.end {
                break;
            }
            if start < self.window.start {
                continue;
            }
            if starts.len() == cap {
                tracing::debug!(uid, cap, "recurrence truncated at occurrence cap");
                break;
            }
            starts.push(start);
        }

        starts
    }

    /// Occurrence details for one overridden instance, if it is still
    /// scheduled and touches the window.
    fn resolve_override(&self, id: String, instance: &RawEventComponent) -> Option<Occurrence> {
        if instance.cancelled {
            return None;
        }

        let start = instance.start_utc(self.local)?;
        let end = instance.end_utc(self.local)?;

        self.window
            .overlaps(start, end)
            .then(|| occurrence(id, instance, start, end))
    }
}

fn occurrence(
    id: String,
    component: &RawEventComponent,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Occurrence {
    Occurrence {
        id,
        title: component.summary.clone(),
        start,
        end,
        description: component.description.clone(),
        location: component.location.clone(),
        all_day: component.is_all_day(),
    }
}

/// How a series maps an occurrence start to its end and token.
#[derive(Debug, Clone, Copy)]
enum SeriesClock {
    /// All-day series anchored at UTC midnight; length in whole days
    AllDay { days: i64 },
    /// UTC series with a fixed length
    Utc { length: Duration },
    /// Wall-clock series; the length is kept in local time so that
    /// occurrences across a DST change keep their local end time
    Zoned { tz: Tz, length: Duration },
}

impl SeriesClock {
    fn for_component(master: &RawEventComponent, local: Tz) -> CalFeedResult<Self> {
        let unresolved = || CalFeedError::Recurrence("DTSTART/DTEND cannot be resolved".into());

        let start_utc = master.start_utc(local).ok_or_else(unresolved)?;
        let end_utc = master.end_utc(local).ok_or_else(unresolved)?;

        Ok(match &master.start {
            EventTime::Date(start) => {
                let days = match &master.end {
                    Some(EventTime::Date(end)) => (*end - *start).num_days(),
                    _ => (end_utc - start_utc).num_days(),
                };
                SeriesClock::AllDay { days }
            }
            EventTime::DateTimeUtc(_) => SeriesClock::Utc {
                length: end_utc - start_utc,
            },
            EventTime::DateTimeFloating(_) | EventTime::DateTimeZoned { .. } => {
                let tz = series_zone(&master.start, local);
                let length = end_utc.with_timezone(&tz).naive_local()
                    - start_utc.with_timezone(&tz).naive_local();
                SeriesClock::Zoned { tz, length }
            }
        })
    }

    fn end_for(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        match *self {
            SeriesClock::AllDay { days } => start + Duration::days(days),
            SeriesClock::Utc { length } => start + length,
            SeriesClock::Zoned { tz, length } => {
                let local_end = start.with_timezone(&tz).naive_local() + length;
                localize(tz, local_end).unwrap_or(start + length)
            }
        }
    }

    fn token(&self, start: DateTime<Utc>) -> String {
        match self {
            SeriesClock::AllDay { .. } => start.date_naive().format("%Y%m%d").to_string(),
            _ => start.format("%Y%m%dT%H%M%SZ").to_string(),
        }
    }
}

fn series_zone(start: &EventTime, local: Tz) -> Tz {
    match start {
        EventTime::DateTimeZoned { tzid, .. } => resolve_tzid_or(tzid, local),
        _ => local,
    }
}

/// Build an iCalendar-format rule block for the rrule crate parser.
///
/// All-day dates become midnight UTC. EXDATE/RDATE and UNTIL values are
/// written in UTC so that they compare against DTSTART in any zone.
fn build_rrule_string(
    master: &RawEventComponent,
    recurrence: &Recurrence,
    clock: &SeriesClock,
    local: Tz,
) -> CalFeedResult<String> {
    let mut lines = Vec::new();

    let dtstart = match &master.start {
        EventTime::Date(d) => format!("DTSTART:{}T000000Z", d.format("%Y%m%d")),
        EventTime::DateTimeUtc(dt) => format!("DTSTART:{}", dt.format("%Y%m%dT%H%M%SZ")),
        EventTime::DateTimeFloating(datetime) | EventTime::DateTimeZoned { datetime, .. } => {
            let tz = series_zone(&master.start, local);
            format!(
                "DTSTART;TZID={}:{}",
                tz.name(),
                datetime.format("%Y%m%dT%H%M%S")
            )
        }
    };
    lines.push(dtstart);

    let rule_tz = match clock {
        SeriesClock::Zoned { tz, .. } => *tz,
        _ => Tz::UTC,
    };
    for rrule in &recurrence.rrules {
        lines.push(format!("RRULE:{}", normalize_until(rrule, rule_tz)));
    }

    // An RDATE-only series still needs its first instance
    if recurrence.rrules.is_empty() {
        if let Some(start) = master.start_utc(local) {
            lines.push(format!("RDATE:{}", start.format("%Y%m%dT%H%M%SZ")));
        }
    }

    for rdate in &recurrence.rdates {
        let utc = rdate
            .to_utc(local)
            .ok_or_else(|| CalFeedError::Recurrence(format!("invalid RDATE {}", rdate)))?;
        lines.push(format!("RDATE:{}", utc.format("%Y%m%dT%H%M%SZ")));
    }

    for exdate in &recurrence.exdates {
        let utc = exdate
            .to_utc(local)
            .ok_or_else(|| CalFeedError::Recurrence(format!("invalid EXDATE {}", exdate)))?;
        lines.push(format!("EXDATE:{}", utc.format("%Y%m%dT%H%M%SZ")));
    }

    Ok(lines.join("\n"))
}

/// Rewrite a date or floating UNTIL as a UTC timestamp.
///
/// `UNTIL=20250131` becomes the last second of that day; a floating
/// `UNTIL=20250131T100000` is read in the series zone.
fn normalize_until(rrule: &str, tz: Tz) -> String {
    rrule
        .split(';')
        .map(|part| {
            let Some(value) = part
                .strip_prefix("UNTIL=")
                .or_else(|| part.strip_prefix("until="))
            else {
                return part.to_string();
            };

            if value.ends_with('Z') {
                return part.to_string();
            }

            let utc = if value.len() == 8 {
                NaiveDate::parse_from_str(value, "%Y%m%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(23, 59, 59))
                    .map(|dt| dt.and_utc())
            } else {
                NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S")
                    .ok()
                    .and_then(|dt| localize(tz, dt))
            };

            match utc {
                Some(utc) => format!("UNTIL={}", utc.format("%Y%m%dT%H%M%SZ")),
                None => part.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(";")
}
