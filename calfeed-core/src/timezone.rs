//! TZID resolution.
//!
//! iCloud feeds use IANA names. Outlook feeds frequently use Windows zone
//! names ("Romance Standard Time") backed by an embedded VTIMEZONE, which
//! chrono-tz does not know about, so those are mapped to the IANA zone
//! covering the same region.

use std::str::FromStr;

use chrono_tz::Tz;

const WINDOWS_ZONES: &[(&str, &str)] = &[
    ("Romance Standard Time", "Europe/Paris"),
    ("W. Europe Standard Time", "Europe/Berlin"),
    ("Central Europe Standard Time", "Europe/Budapest"),
    ("Central European Standard Time", "Europe/Warsaw"),
    ("GMT Standard Time", "Europe/London"),
    ("Greenwich Standard Time", "Atlantic/Reykjavik"),
    ("E. Europe Standard Time", "Europe/Chisinau"),
    ("FLE Standard Time", "Europe/Kiev"),
    ("GTB Standard Time", "Europe/Bucharest"),
    ("Russian Standard Time", "Europe/Moscow"),
    ("Morocco Standard Time", "Africa/Casablanca"),
    ("W. Central Africa Standard Time", "Africa/Lagos"),
    ("South Africa Standard Time", "Africa/Johannesburg"),
    ("Eastern Standard Time", "America/New_York"),
    ("Central Standard Time", "America/Chicago"),
    ("Mountain Standard Time", "America/Denver"),
    ("Pacific Standard Time", "America/Los_Angeles"),
    ("Atlantic Standard Time", "America/Halifax"),
    ("Canada Central Standard Time", "America/Regina"),
    ("SA Eastern Standard Time", "America/Cayenne"),
    ("E. South America Standard Time", "America/Sao_Paulo"),
    ("Reunion Standard Time", "Indian/Reunion"),
    ("Arabian Standard Time", "Asia/Dubai"),
    ("India Standard Time", "Asia/Kolkata"),
    ("China Standard Time", "Asia/Shanghai"),
    ("Tokyo Standard Time", "Asia/Tokyo"),
    ("AUS Eastern Standard Time", "Australia/Sydney"),
    ("New Zealand Standard Time", "Pacific/Auckland"),
    ("Hawaiian Standard Time", "Pacific/Honolulu"),
    ("UTC", "UTC"),
];

/// Resolve a TZID parameter value to a chrono-tz zone.
///
/// Accepts IANA names, Windows names from the table above, and the
/// `/mozilla.org/...`-style prefixed names some exporters emit.
pub fn resolve_tzid(tzid: &str) -> Option<Tz> {
    let tzid = tzid.trim().trim_matches('"');

    if let Ok(tz) = Tz::from_str(tzid) {
        return Some(tz);
    }

    if let Some((_, iana)) = WINDOWS_ZONES
        .iter()
        .find(|(windows, _)| windows.eq_ignore_ascii_case(tzid))
    {
        return Tz::from_str(iana).ok();
    }

    // "/mozilla.org/20050126_1/Europe/Paris" and friends
    let segments: Vec<&str> = tzid.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() >= 2 {
        let tail = segments[segments.len() - 2..].join("/");
        if let Ok(tz) = Tz::from_str(&tail) {
            return Some(tz);
        }
    }

    None
}

/// Resolve a TZID, falling back to `fallback` when it is unknown.
pub fn resolve_tzid_or(tzid: &str, fallback: Tz) -> Tz {
    resolve_tzid(tzid).unwrap_or_else(|| {
        tracing::debug!(tzid, fallback = %fallback.name(), "unknown TZID, using display timezone");
        fallback
    })
}

/// Timezone of the host, used when the configuration does not name one.
pub fn system_timezone() -> Tz {
    iana_time_zone::get_timezone()
        .ok()
        .and_then(|name| Tz::from_str(&name).ok())
        .unwrap_or(Tz::UTC)
}
