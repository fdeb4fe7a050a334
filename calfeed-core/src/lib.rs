//! Core of the calfeed ecosystem.
//!
//! Turns remote iCalendar feeds into a flat, categorized list of event
//! occurrences:
//! - `fetch` retrieves raw ICS text
//! - `ics` parses it into raw event components
//! - `recurrence` expands components into concrete occurrences inside a time window
//! - `category` and `color` decorate each occurrence
//! - `aggregate` runs the chain for every configured feed
//!
//! `store`, `cache` and `status` hold what a refresh produced.

pub mod aggregate;
pub mod cache;
pub mod category;
pub mod color;
pub mod config;
pub mod error;
pub mod event;
pub mod feed;
pub mod fetch;
pub mod ics;
pub mod pipeline;
pub mod query;
pub mod recurrence;
pub mod status;
pub mod store;
pub mod timezone;
pub mod window;

pub use aggregate::{Aggregator, RefreshOutcome};
pub use cache::{EventCache, JsonFileCache};
pub use category::{Category, CategoryKind};
pub use config::CalfeedConfig;
pub use error::{CalFeedError, CalFeedResult};
pub use event::{EventOccurrence, EventTime, Occurrence, RawEventComponent};
pub use feed::{FeedSource, SourceKind};
pub use fetch::{FetchError, Fetcher, HttpFetcher};
pub use pipeline::Pipeline;
pub use query::EventQuery;
pub use status::{FeedStatus, JsonlStatusLog, SyncState, SyncStatusReporter};
pub use store::EventStore;
pub use window::TimeWindow;
