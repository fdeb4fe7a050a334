//! ICS feed parsing using the icalendar crate's parser.

use chrono::Duration;
use icalendar::{
    DatePerhapsTime,
    parser::{Component, Property, read_calendar, unfold},
};

use crate::error::{CalFeedError, CalFeedResult};
use crate::event::{EventTime, RawEventComponent, Recurrence};

/// The VEVENTs of one feed. Components that could not be read are
/// counted in `skipped` and otherwise dropped.
#[derive(Debug, Default)]
pub struct ParsedFeed {
    pub components: Vec<RawEventComponent>,
    pub skipped: usize,
}

/// Parse a whole feed.
///
/// Fails only when the text is not an iCalendar document at all; a
/// malformed VEVENT is skipped so that the rest of the feed survives.
pub fn parse_calendar(content: &str) -> CalFeedResult<ParsedFeed> {
    if content.trim().is_empty() {
        return Err(CalFeedError::IcsParse("feed is empty".into()));
    }

    if !content.contains("BEGIN:VCALENDAR") {
        return Err(CalFeedError::IcsParse(
            "feed is not an iCalendar document".into(),
        ));
    }

    let unfolded = unfold(content);
    let calendar =
        read_calendar(&unfolded).map_err(|e| CalFeedError::IcsParse(e.to_string()))?;

    let mut feed = ParsedFeed::default();

    for vevent in calendar.components.iter().filter(|c| c.name == "VEVENT") {
        match parse_component(vevent) {
            Ok(component) => feed.components.push(component),
            Err(reason) => {
                let uid = vevent.find_prop("UID").map(|p| p.val.to_string());
                tracing::warn!(uid = ?uid, %reason, "skipping malformed VEVENT");
                feed.skipped += 1;
            }
        }
    }

    Ok(feed)
}

/// Parse one VEVENT into a RawEventComponent
fn parse_component(vevent: &Component) -> Result<RawEventComponent, String> {
    let uid = vevent
        .find_prop("UID")
        .map(|p| p.val.to_string())
        .filter(|uid| !uid.trim().is_empty())
        .ok_or("missing UID")?;

    let summary = vevent
        .find_prop("SUMMARY")
        .map(|p| unescape_text(p.val.as_ref()))
        .unwrap_or_else(|| "(No title)".to_string());

    let start = vevent
        .find_prop("DTSTART")
        .ok_or("missing DTSTART")
        .and_then(|p| parse_time(p).ok_or("invalid DTSTART"))?;

    let end = match vevent.find_prop("DTEND") {
        Some(p) => Some(parse_time(p).ok_or("invalid DTEND")?),
        None => None,
    };

    let duration = match vevent.find_prop("DURATION") {
        Some(p) if end.is_none() => {
            Some(parse_duration(p.val.as_ref()).ok_or("invalid DURATION")?)
        }
        _ => None,
    };

    let description = vevent
        .find_prop("DESCRIPTION")
        .map(|p| unescape_text(p.val.as_ref()))
        .filter(|d| !d.is_empty());
    let location = vevent
        .find_prop("LOCATION")
        .map(|p| unescape_text(p.val.as_ref()))
        .filter(|l| !l.is_empty());

    // Recurrence (RRULE, RDATE, EXDATE)
    let rrules: Vec<String> = vevent
        .properties
        .iter()
        .filter(|p| p.name == "RRULE")
        .map(|p| p.val.to_string())
        .collect();
    let rdates: Vec<EventTime> = vevent
        .properties
        .iter()
        .filter(|p| p.name == "RDATE")
        .flat_map(parse_date_list)
        .collect();
    let exdates: Vec<EventTime> = vevent
        .properties
        .iter()
        .filter(|p| p.name == "EXDATE")
        .flat_map(parse_date_list)
        .collect();
    let recurrence = (!rrules.is_empty() || !rdates.is_empty()).then_some(Recurrence {
        rrules,
        rdates,
        exdates,
    });

    // RECURRENCE-ID for instance overrides
    let recurrence_id = match vevent.find_prop("RECURRENCE-ID") {
        Some(p) => Some(parse_time(p).ok_or("invalid RECURRENCE-ID")?),
        None => None,
    };

    let cancelled = vevent
        .find_prop("STATUS")
        .is_some_and(|p| p.val.as_ref().eq_ignore_ascii_case("CANCELLED"));

    Ok(RawEventComponent {
        uid,
        summary,
        description,
        location,
        start,
        end,
        duration,
        recurrence,
        recurrence_id,
        cancelled,
    })
}

fn parse_time(prop: &Property) -> Option<EventTime> {
    DatePerhapsTime::try_from(prop).ok().map(to_event_time)
}

/// Convert icalendar's DatePerhapsTime to our EventTime, preserving timezone info
fn to_event_time(dpt: DatePerhapsTime) -> EventTime {
    match dpt {
        DatePerhapsTime::Date(d) => EventTime::Date(d),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            icalendar::CalendarDateTime::Utc(dt) => EventTime::DateTimeUtc(dt),
            icalendar::CalendarDateTime::Floating(naive) => EventTime::DateTimeFloating(naive),
            icalendar::CalendarDateTime::WithTimezone { date_time, tzid } => {
                EventTime::DateTimeZoned {
                    datetime: date_time,
                    tzid,
                }
            }
        },
    }
}

/// Parse an EXDATE or RDATE property into a list of EventTime values.
///
/// Handles:
/// - TZID parameter: `EXDATE;TZID=Europe/Paris:20240108T100000`
/// - VALUE=DATE: `EXDATE;VALUE=DATE:20240108`
/// - UTC: `EXDATE:20240108T100000Z`
/// - Floating: `EXDATE:20240108T100000`
/// - Comma-separated values, and RDATE periods (`start/end`, start is kept)
fn parse_date_list(prop: &Property) -> Vec<EventTime> {
    let tzid = prop
        .params
        .iter()
        .find(|p| p.key == "TZID")
        .and_then(|p| p.val.as_ref().map(|v| v.to_string()));

    let is_date = prop
        .params
        .iter()
        .any(|p| p.key == "VALUE" && p.val.as_ref().map(|v| v.as_ref()) == Some("DATE"));

    prop.val
        .as_ref()
        .split(',')
        .filter_map(|s| {
            let s = s.trim().split('/').next()?;
            if s.is_empty() {
                return None;
            }
            if is_date || s.len() == 8 {
                chrono::NaiveDate::parse_from_str(s, "%Y%m%d")
                    .ok()
                    .map(EventTime::Date)
            } else if let Some(ref tz) = tzid {
                chrono::NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(|dt| EventTime::DateTimeZoned {
                        datetime: dt,
                        tzid: tz.clone(),
                    })
            } else if let Some(s) = s.strip_suffix('Z') {
                chrono::NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(|dt| EventTime::DateTimeUtc(dt.and_utc()))
            } else {
                chrono::NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(EventTime::DateTimeFloating)
            }
        })
        .collect()
}

/// Parse a DURATION value (`PT1H30M`, `P1D`, `-PT15M`)
fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let is_negative = value.starts_with('-');
    let duration_str = value.trim_start_matches(['-', '+']);

    let duration = iso8601::duration(duration_str).ok()?;
    let std_duration: std::time::Duration = duration.into();
    let duration = Duration::from_std(std_duration).ok()?;

    Some(if is_negative { -duration } else { duration })
}

/// Undo RFC 5545 TEXT escaping (`\n`, `\,`, `\;`, `\\`)
fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }

    out
}
