//! ICS feed parsing.
//!
//! Grammar and line unfolding are handled by the icalendar crate; this
//! module maps VEVENT components onto `RawEventComponent`.

mod parse;

pub use parse::{ParsedFeed, parse_calendar};
