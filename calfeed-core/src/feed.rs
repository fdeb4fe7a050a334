//! Feed sources read from configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of calendar service a feed comes from.
///
/// The kind drives categorization: iCloud feeds are personal calendars,
/// Outlook feeds are inspected for course/exam/meeting keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Icloud,
    Outlook,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Icloud => "icloud",
            SourceKind::Outlook => "outlook",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A remote ICS feed. Built once from configuration and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    /// Display label
    pub name: String,
    /// Feed endpoint (`https://` or `webcal://`)
    pub url: String,
    #[serde(rename = "kind")]
    pub source_kind: SourceKind,
    /// Legacy tint shown next to the feed name
    #[serde(default = "default_feed_color")]
    pub color: String,
}

pub const DEFAULT_FEED_COLOR: &str = "#deb887";

fn default_feed_color() -> String {
    DEFAULT_FEED_COLOR.to_string()
}

impl FeedSource {
    pub fn new(name: &str, url: &str, source_kind: SourceKind) -> Self {
        FeedSource {
            name: name.to_string(),
            url: url.to_string(),
            source_kind,
            color: default_feed_color(),
        }
    }
}

impl fmt::Display for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.source_kind)
    }
}
