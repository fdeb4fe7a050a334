//! Global calfeed configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::color::Colorizer;
use crate::error::{CalFeedError, CalFeedResult};
use crate::feed::FeedSource;
use crate::fetch::FetchConfig;
use crate::pipeline::Pipeline;
use crate::recurrence::DEFAULT_MAX_OCCURRENCES;
use crate::timezone::{resolve_tzid, system_timezone};
use crate::window::{MAX_WINDOW_MONTHS, WindowConfig};

static DEFAULT_CACHE_PATH: &str = "~/.cache/calfeed/events.json";
static DEFAULT_STATUS_LOG_PATH: &str = "~/.cache/calfeed/status.jsonl";

fn default_cache_path() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_PATH)
}

fn default_status_log_path() -> PathBuf {
    PathBuf::from(DEFAULT_STATUS_LOG_PATH)
}

fn default_max_occurrences() -> u16 {
    DEFAULT_MAX_OCCURRENCES
}

/// Configuration at ~/.config/calfeed/config.toml
///
/// Every key can be overridden from the environment with a `CALFEED_`
/// prefix, using `__` for nesting (`CALFEED_WINDOW__PAST_MONTHS=3`).
#[derive(Debug, Clone, Deserialize)]
pub struct CalfeedConfig {
    /// Display timezone for floating times; the system zone when unset
    #[serde(default)]
    pub timezone: Option<String>,

    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    #[serde(default = "default_status_log_path")]
    pub status_log_path: PathBuf,

    #[serde(default = "default_max_occurrences")]
    pub max_occurrences: u16,

    #[serde(default)]
    pub window: WindowConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub feeds: Vec<FeedSource>,

    /// Person name -> color, matched against event titles
    #[serde(default)]
    pub person_colors: BTreeMap<String, String>,
}

impl CalfeedConfig {
    pub fn config_path() -> CalFeedResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CalFeedError::Config("Could not determine config directory".into()))?
            .join("calfeed");

        Ok(config_dir.join("config.toml"))
    }

    pub fn load() -> CalFeedResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> CalFeedResult<Self> {
        let config: CalfeedConfig = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("CALFEED")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| CalFeedError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| CalFeedError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CalFeedResult<()> {
        if self.max_occurrences == 0 {
            return Err(CalFeedError::Config(
                "max_occurrences must be at least 1".into(),
            ));
        }

        if self.window.past_months > MAX_WINDOW_MONTHS
            || self.window.future_months > MAX_WINDOW_MONTHS
        {
            return Err(CalFeedError::Config(format!(
                "window offsets must be at most {} months",
                MAX_WINDOW_MONTHS
            )));
        }

        for feed in &self.feeds {
            if feed.name.trim().is_empty() {
                return Err(CalFeedError::Config(format!(
                    "Feed with url '{}' has no name",
                    feed.url
                )));
            }
            if feed.url.trim().is_empty() {
                return Err(CalFeedError::Config(format!(
                    "Feed '{}' has no url",
                    feed.name
                )));
            }
        }

        if let Some(name) = &self.timezone {
            if resolve_tzid(name).is_none() {
                return Err(CalFeedError::Config(format!("Unknown timezone '{}'", name)));
            }
        }

        Ok(())
    }

    pub fn display_timezone(&self) -> Tz {
        self.timezone
            .as_deref()
            .and_then(resolve_tzid)
            .unwrap_or_else(system_timezone)
    }

    pub fn cache_file(&self) -> PathBuf {
        expand_path(&self.cache_path)
    }

    pub fn status_log_file(&self) -> PathBuf {
        expand_path(&self.status_log_path)
    }

    pub fn colorizer(&self) -> Colorizer {
        Colorizer::new(&self.person_colors)
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.display_timezone(), self.colorizer())
            .with_max_occurrences(self.max_occurrences)
    }

    /// Create a default config file with every option commented out.
    pub fn create_default_config(path: &Path) -> CalFeedResult<()> {
        let contents = format!(
            "\
# calfeed configuration

# Display timezone for times without a zone (defaults to the system zone):
# timezone = \"Europe/Paris\"

# Where the last aggregated events and per-feed sync results are kept:
# cache_path = \"{}\"
# status_log_path = \"{}\"

# Maximum occurrences expanded per recurring event:
# max_occurrences = {}

# Rolling window, in months around the current month:
# [window]
# past_months = 6
# future_months = 12

# [fetch]
# timeout_secs = 30
# Proxy prefixes tried in order when the direct request fails;
# the encoded feed URL is appended to each:
# proxies = [\"https://corsproxy.example/?url=\"]

# [[feeds]]
# name = \"Personal\"
# url = \"webcal://p01-caldav.icloud.com/published/2/...\"
# kind = \"icloud\"

# [[feeds]]
# name = \"University\"
# url = \"https://outlook.office365.com/owa/calendar/.../calendar.ics\"
# kind = \"outlook\"

# Titles mentioning a person get that person's color:
# [person_colors]
# alice = \"#e6194b\"
",
            DEFAULT_CACHE_PATH, DEFAULT_STATUS_LOG_PATH, DEFAULT_MAX_OCCURRENCES
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CalFeedError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| CalFeedError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::SourceKind;

    fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_full_config() {
        let (_dir, path) = write_config(
            r##"
timezone = "Europe/Paris"
max_occurrences = 200

[window]
past_months = 2

[fetch]
timeout_secs = 5
proxies = ["https://proxy.example/?url="]

[[feeds]]
name = "Perso"
url = "webcal://example.com/perso.ics"
kind = "icloud"

[[feeds]]
name = "Fac"
url = "https://example.com/fac.ics"
kind = "outlook"
color = "#112233"

[person_colors]
alice = "#e6194b"
"##,
        );

        let config = CalfeedConfig::load_from(&path).unwrap();

        assert_eq!(config.display_timezone(), chrono_tz::Europe::Paris);
        assert_eq!(config.max_occurrences, 200);
        assert_eq!(config.window.past_months, 2);
        assert_eq!(config.window.future_months, 12);
        assert_eq!(config.fetch.timeout_secs, 5);
        assert_eq!(config.fetch.proxies.len(), 1);
        assert_eq!(config.feeds.len(), 2);
        assert_eq!(config.feeds[0].source_kind, SourceKind::Icloud);
        assert_eq!(config.feeds[1].color, "#112233");
        assert_eq!(config.colorizer().resolve("Lunch with Alice"), "#e6194b");
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CalfeedConfig::load_from(&dir.path().join("none.toml")).unwrap();

        assert!(config.feeds.is_empty());
        assert_eq!(config.max_occurrences, DEFAULT_MAX_OCCURRENCES);
        assert_eq!(config.window, WindowConfig::default());
        assert_eq!(config.cache_path, PathBuf::from(DEFAULT_CACHE_PATH));
    }

    #[test]
    fn test_unknown_timezone_is_rejected() {
        let (_dir, path) = write_config("timezone = \"Mars/Olympus\"\n");

        assert!(matches!(
            CalfeedConfig::load_from(&path),
            Err(CalFeedError::Config(_))
        ));
    }

    #[test]
    fn test_oversized_window_is_rejected() {
        let (_dir, path) = write_config("[window]\npast_months = 100000\n");

        assert!(matches!(
            CalfeedConfig::load_from(&path),
            Err(CalFeedError::Config(_))
        ));
    }

    #[test]
    fn test_default_config_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calfeed/config.toml");

        CalfeedConfig::create_default_config(&path).unwrap();
        let config = CalfeedConfig::load_from(&path).unwrap();

        assert!(config.feeds.is_empty());
    }

    #[test]
    fn test_paths_expand_tilde() {
        let dir = tempfile::tempdir().unwrap();
        let config = CalfeedConfig::load_from(&dir.path().join("none.toml")).unwrap();

        assert!(!config.cache_file().to_string_lossy().starts_with('~'));
    }
}
