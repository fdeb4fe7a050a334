use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use calfeed_core::color::{BRACKET_PALETTE, Colorizer, palette_color};
use calfeed_core::{
    Aggregator, CalFeedResult, CategoryKind, EventCache, EventStore, FeedSource, FeedStatus,
    FetchError, Fetcher, JsonFileCache, Pipeline, SourceKind, SyncState, SyncStatusReporter,
    TimeWindow,
};
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;

const SCHOOL_URL: &str = "https://outlook.example/school.ics";
const PERSONAL_URL: &str = "webcal://icloud.example/personal.ics";

const SCHOOL_ICS: &str = "BEGIN:VCALENDAR\r
VERSION:2.0\r
PRODID:-//Microsoft Corporation//Outlook 16.0 MIMEDIR//EN\r
BEGIN:VEVENT\r
UID:E1\r
SUMMARY:Réunion budget\r
DTSTART:20250310T090000Z\r
DTEND:20250310T100000Z\r
END:VEVENT\r
BEGIN:VEVENT\r
UID:E2\r
SUMMARY:Cours [TP1]\r
DESCRIPTION:Salle B12\r
DTSTART:20250311T080000Z\r
DTEND:20250311T100000Z\r
RRULE:FREQ=DAILY;COUNT=3\r
END:VEVENT\r
END:VCALENDAR\r
";

const PERSONAL_ICS: &str = "BEGIN:VCALENDAR\r
VERSION:2.0\r
PRODID:-//Apple Inc.//iCloud//EN\r
BEGIN:VEVENT\r
UID:P1\r
SUMMARY:Dentiste\r
DTSTART;TZID=Europe/Paris:20250301T103000\r
DTEND;TZID=Europe/Paris:20250301T110000\r
END:VEVENT\r
END:VCALENDAR\r
";

/// Serves canned bodies; unknown URLs fail like a dead network.
struct MockFetcher {
    bodies: HashMap<&'static str, &'static str>,
}

impl MockFetcher {
    fn new(bodies: &[(&'static str, &'static str)]) -> Self {
        MockFetcher {
            bodies: bodies.iter().copied().collect(),
        }
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.bodies
            .get(url)
            .map(|body| body.to_string())
            .ok_or_else(|| FetchError::Exhausted {
                url: url.to_string(),
                attempts: 3,
                last: "connection refused".to_string(),
            })
    }
}

#[derive(Default)]
struct RecordingReporter {
    records: Mutex<Vec<FeedStatus>>,
}

impl SyncStatusReporter for RecordingReporter {
    async fn report(&self, status: &FeedStatus) -> CalFeedResult<()> {
        self.records.lock().unwrap().push(status.clone());
        Ok(())
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 15, 12, 0, 0).unwrap()
}

fn school() -> FeedSource {
    FeedSource::new("School", SCHOOL_URL, SourceKind::Outlook)
}

fn personal() -> FeedSource {
    FeedSource::new("Personal", PERSONAL_URL, SourceKind::Icloud)
}

fn pipeline() -> Pipeline {
    Pipeline::new(Tz::UTC, Colorizer::default())
}

#[tokio::test]
async fn test_end_to_end_scenario() {
    let aggregator = Aggregator::new(
        vec![school()],
        MockFetcher::new(&[(SCHOOL_URL, SCHOOL_ICS)]),
        RecordingReporter::default(),
        pipeline(),
    );

    let outcome = aggregator.refresh_at(now()).await;
    let events = &outcome.occurrences;

    assert_eq!(events.len(), 4);

    assert_eq!(events[0].id, "E1");
    assert_eq!(events[0].category.id, CategoryKind::Meeting);

    let series = &events[1..];
    let ids: Vec<&str> = series.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "E2_20250311T080000Z",
            "E2_20250312T080000Z",
            "E2_20250313T080000Z"
        ]
    );
    assert!(series.iter().all(|e| e.category.id == CategoryKind::Course));
    assert!(
        series
            .iter()
            .all(|e| e.color == palette_color("tp1", &BRACKET_PALETTE))
    );
    assert!(series.iter().all(|e| e.description.as_deref() == Some("Salle B12")));

    assert_eq!(outcome.statuses.len(), 1);
    assert_eq!(outcome.statuses[0].status, SyncState::Success);
    assert_eq!(outcome.statuses[0].occurrence_count, 4);
}

#[tokio::test]
async fn test_failing_feed_is_isolated() {
    let aggregator = Aggregator::new(
        vec![school(), personal()],
        MockFetcher::new(&[(PERSONAL_URL, PERSONAL_ICS)]),
        RecordingReporter::default(),
        pipeline(),
    );

    let outcome = aggregator.refresh_at(now()).await;

    assert_eq!(outcome.occurrences.len(), 1);
    assert_eq!(outcome.occurrences[0].id, "P1");
    assert_eq!(outcome.occurrences[0].category.id, CategoryKind::Personal);
    assert_eq!(
        outcome.occurrences[0].start,
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap()
    );

    assert_eq!(outcome.statuses[0].status, SyncState::Error);
    assert_eq!(outcome.statuses[0].source_name, "School");
    assert!(
        outcome.statuses[0]
            .error_message
            .as_deref()
            .is_some_and(|m| m.contains("connection refused"))
    );
    assert_eq!(outcome.statuses[1].status, SyncState::Success);
}

#[tokio::test]
async fn test_garbled_feed_counts_as_failure() {
    let aggregator = Aggregator::new(
        vec![school(), personal()],
        MockFetcher::new(&[(SCHOOL_URL, "<html>Service Unavailable</html>")]),
        RecordingReporter::default(),
        pipeline(),
    );

    let outcome = aggregator.refresh_at(now()).await;

    assert!(outcome.occurrences.is_empty());
    assert_eq!(outcome.failed_feeds(), 2);

    let reported = aggregator.reporter().records.lock().unwrap();
    assert_eq!(reported.len(), 2);
    assert_eq!(reported[0].source_name, "School");
    assert_eq!(reported[1].source_name, "Personal");
}

#[tokio::test]
async fn test_feeds_are_concatenated_in_feed_order() {
    let aggregator = Aggregator::new(
        vec![school(), personal()],
        MockFetcher::new(&[(SCHOOL_URL, SCHOOL_ICS), (PERSONAL_URL, PERSONAL_ICS)]),
        RecordingReporter::default(),
        pipeline(),
    );

    let outcome = aggregator.refresh_at(now()).await;
    let kinds: Vec<SourceKind> = outcome.occurrences.iter().map(|e| e.source_kind).collect();

    // The personal event starts first but its feed is listed second
    assert_eq!(
        kinds,
        vec![
            SourceKind::Outlook,
            SourceKind::Outlook,
            SourceKind::Outlook,
            SourceKind::Outlook,
            SourceKind::Icloud
        ]
    );
}

#[tokio::test]
async fn test_runaway_rule_is_capped() {
    let endless = "BEGIN:VCALENDAR\nVERSION:2.0\nPRODID:T\nBEGIN:VEVENT\nUID:loop\nSUMMARY:Ping\nDTSTART:20250101T000000Z\nRRULE:FREQ=HOURLY\nEND:VEVENT\nEND:VCALENDAR\n";
    let aggregator = Aggregator::new(
        vec![school()],
        MockFetcher::new(&[(SCHOOL_URL, endless)]),
        RecordingReporter::default(),
        pipeline().with_max_occurrences(50),
    );

    let outcome = aggregator.refresh_at(now()).await;

    assert_eq!(outcome.occurrences.len(), 50);
    assert_eq!(outcome.statuses[0].status, SyncState::Success);
}

#[tokio::test]
async fn test_occurrences_stay_inside_window() {
    let aggregator = Aggregator::new(
        vec![school()],
        MockFetcher::new(&[(
            SCHOOL_URL,
            "BEGIN:VCALENDAR\nVERSION:2.0\nPRODID:T\nBEGIN:VEVENT\nUID:w\nSUMMARY:TD\nDTSTART;TZID=Romance Standard Time:20200106T140000\nDTEND;TZID=Romance Standard Time:20200106T160000\nRRULE:FREQ=WEEKLY;BYDAY=MO,TH\nEND:VEVENT\nEND:VCALENDAR\n",
        )]),
        RecordingReporter::default(),
        pipeline(),
    );

    let outcome = aggregator.refresh_at(now()).await;
    let window = TimeWindow::rolling(now(), Default::default());

    assert_eq!(outcome.window, window);
    assert!(!outcome.occurrences.is_empty());
    for event in &outcome.occurrences {
        assert!(event.end >= window.start && event.start <= window.end);
    }
    let ids: HashSet<&str> = outcome.occurrences.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids.len(), outcome.occurrences.len());
}

#[tokio::test]
async fn test_refresh_is_deterministic() {
    let aggregator = Aggregator::new(
        vec![school(), personal()],
        MockFetcher::new(&[(SCHOOL_URL, SCHOOL_ICS), (PERSONAL_URL, PERSONAL_ICS)]),
        RecordingReporter::default(),
        pipeline(),
    );

    let first = aggregator.refresh_at(now()).await;
    let second = aggregator.refresh_at(now()).await;

    assert_eq!(first.occurrences, second.occurrences);
}

#[tokio::test]
async fn test_published_events_round_trip_through_cache() {
    let aggregator = Aggregator::new(
        vec![school(), personal()],
        MockFetcher::new(&[(SCHOOL_URL, SCHOOL_ICS), (PERSONAL_URL, PERSONAL_ICS)]),
        RecordingReporter::default(),
        pipeline(),
    );
    let store = EventStore::new();
    let dir = tempfile::tempdir().unwrap();
    let cache = JsonFileCache::new(dir.path().join("events.json"));

    let ticket = store.begin_refresh();
    let outcome = aggregator.refresh_at(now()).await;
    assert!(store.publish(ticket, outcome.occurrences, outcome.refreshed_at));

    cache.store(&store.current().events).await.unwrap();
    let cached = cache.load().await.unwrap().unwrap();

    assert_eq!(cached.events, store.current().events);
}
