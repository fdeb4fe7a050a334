//! Published view of the aggregated occurrence list.
//!
//! Every refresh takes a ticket before it starts. Only the holder of the
//! newest ticket can publish, so a slow refresh that was overtaken by a
//! later one is dropped instead of overwriting the newer list.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::event::EventOccurrence;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// 0 until the first refresh publishes
    pub generation: u64,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub events: Vec<EventOccurrence>,
}

/// Proof that a refresh was started; see [`EventStore::begin_refresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket {
    generation: u64,
}

impl RefreshTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

pub struct EventStore {
    latest: AtomicU64,
    sender: watch::Sender<Arc<Snapshot>>,
}

impl EventStore {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(Arc::new(Snapshot::default()));
        EventStore {
            latest: AtomicU64::new(0),
            sender,
        }
    }

    pub fn begin_refresh(&self) -> RefreshTicket {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        RefreshTicket { generation }
    }

    /// Publish the result of a refresh. Returns `false`, leaving the
    /// current snapshot in place, when a newer refresh has started.
    pub fn publish(
        &self,
        ticket: RefreshTicket,
        events: Vec<EventOccurrence>,
        refreshed_at: DateTime<Utc>,
    ) -> bool {
        let published = self.sender.send_if_modified(|current| {
            let newest = self.latest.load(Ordering::SeqCst);
            if ticket.generation != newest || ticket.generation <= current.generation {
                return false;
            }

            *current = Arc::new(Snapshot {
                generation: ticket.generation,
                refreshed_at: Some(refreshed_at),
                events,
            });
            true
        });

        if !published {
            tracing::debug!(
                generation = ticket.generation,
                "discarding result of superseded refresh"
            );
        }
        published
    }

    /// Fill the store with previously cached events. Ignored once a
    /// refresh has published.
    pub fn seed(&self, events: Vec<EventOccurrence>, cached_at: DateTime<Utc>) -> bool {
        self.sender.send_if_modified(|current| {
            if current.generation != 0 {
                return false;
            }
            *current = Arc::new(Snapshot {
                generation: 0,
                refreshed_at: Some(cached_at),
                events,
            });
            true
        })
    }

    pub fn current(&self) -> Arc<Snapshot> {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.sender.subscribe()
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::categorize;
    use crate::feed::SourceKind;

    fn event(id: &str) -> EventOccurrence {
        let start = Utc::now();
        EventOccurrence {
            id: id.to_string(),
            title: id.to_string(),
            start,
            end: start,
            description: None,
            location: None,
            source_kind: SourceKind::Outlook,
            all_day: false,
            category: categorize(id, None, SourceKind::Outlook),
            color: "#000000".to_string(),
        }
    }

    #[test]
    fn test_publish_replaces_snapshot() {
        let store = EventStore::new();
        let ticket = store.begin_refresh();

        assert!(store.publish(ticket, vec![event("a")], Utc::now()));

        let snapshot = store.current();
        assert_eq!(snapshot.generation, 1);
        assert_eq!(snapshot.events.len(), 1);
    }

    #[test]
    fn test_superseded_refresh_cannot_publish() {
        let store = EventStore::new();
        let slow = store.begin_refresh();
        let fast = store.begin_refresh();

        assert!(store.publish(fast, vec![event("new")], Utc::now()));
        assert!(!store.publish(slow, vec![event("old")], Utc::now()));

        assert_eq!(store.current().events[0].id, "new");
    }

    #[test]
    fn test_seed_only_before_first_publish() {
        let store = EventStore::new();
        assert!(store.seed(vec![event("cached")], Utc::now()));
        assert_eq!(store.current().events[0].id, "cached");

        let ticket = store.begin_refresh();
        store.publish(ticket, vec![event("fresh")], Utc::now());

        assert!(!store.seed(vec![event("stale")], Utc::now()));
        assert_eq!(store.current().events[0].id, "fresh");
    }

    #[tokio::test]
    async fn test_subscribers_see_new_snapshots() {
        let store = EventStore::new();
        let mut receiver = store.subscribe();

        let ticket = store.begin_refresh();
        store.publish(ticket, vec![event("a"), event("b")], Utc::now());

        receiver.changed().await.unwrap();
        assert_eq!(receiver.borrow().events.len(), 2);
    }
}
