//! # Store Abstraction
//!
//! The remote document store is a black box: it delivers an initial
//! snapshot followed by incremental change notifications per subscription,
//! with no cross-subscription ordering guarantee. This module defines that
//! contract ([`DocumentStore`]) and ships [`MemoryStore`], an in-process
//! implementation used by the test suite and by embedders that fake the
//! remote side.

use crate::mapper::ID_FIELDS;
use crate::model::{FieldValue, RawRecord, SourceKey};
use anyhow::Result;
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// A field-equality filter pushed down to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFilter {
    /// Field name to compare
    pub field: String,
    /// Value the field must equal (string comparison on the scalar form)
    pub value: String,
}

impl FieldFilter {
    /// Create a filter
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Check a record against the filter
    pub fn matches(&self, record: &RawRecord) -> bool {
        record
            .get(&self.field)
            .and_then(FieldValue::comparable_text)
            .map(|text| text == self.value)
            .unwrap_or(false)
    }
}

/// One notification from a change-feed subscription
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// Full current result set; supersedes everything seen before on this
    /// subscription
    Snapshot(Vec<RawRecord>),
    /// A record entered the subscription's result set
    Added(RawRecord),
    /// A record in the result set changed
    Modified(RawRecord),
    /// A record left the result set, identified by its store id
    Removed(String),
    /// The subscription failed upstream; no further events will arrive
    /// until the source recovers
    Failed(String),
}

/// A live change-feed subscription: an event receiver plus a release guard.
///
/// Dropping the subscription (or calling [`SubscriptionGuard::release`])
/// releases the underlying feed exactly once.
pub struct Subscription {
    /// The source this subscription covers
    pub source: SourceKey,
    /// Event stream, initial snapshot first
    pub events: mpsc::UnboundedReceiver<StoreEvent>,
    /// Release guard
    pub guard: SubscriptionGuard,
}

/// Releases an underlying subscription exactly once, on demand or on drop.
pub struct SubscriptionGuard {
    released: AtomicBool,
    on_release: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionGuard {
    /// Create a guard around a release action
    pub fn new(on_release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            released: AtomicBool::new(false),
            on_release: Some(Box::new(on_release)),
        }
    }

    /// A guard with no release action (for stores without server-side
    /// subscription state)
    pub fn noop() -> Self {
        Self {
            released: AtomicBool::new(false),
            on_release: None,
        }
    }

    /// Release the underlying subscription. Safe to call more than once;
    /// only the first call runs the release action.
    pub fn release(&mut self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(action) = self.on_release.take() {
            action();
        }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// The remote document store contract consumed by this crate.
pub trait DocumentStore: Send + Sync + 'static {
    /// Open a change-feed subscription on a source. The first event is the
    /// current snapshot; incremental events follow until the subscription
    /// is released.
    fn subscribe(&self, source: &SourceKey, filter: Option<FieldFilter>) -> Subscription;

    /// One-shot read of the source's current records.
    fn get_once(&self, source: &SourceKey, filter: Option<FieldFilter>) -> Result<Vec<RawRecord>>;
}

struct Subscriber {
    id: u64,
    source: SourceKey,
    filter: Option<FieldFilter>,
    tx: mpsc::UnboundedSender<StoreEvent>,
}

#[derive(Default)]
struct MemoryStoreInner {
    collections: Mutex<HashMap<String, Vec<RawRecord>>>,
    subscribers: Mutex<Vec<Subscriber>>,
    next_subscription_id: AtomicU64,
    active_subscriptions: AtomicUsize,
    released_subscriptions: AtomicUsize,
}

/// In-process [`DocumentStore`]: seeded collections, change publication,
/// failure injection, and subscription accounting.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryStoreInner>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection with records (no notifications are emitted;
    /// subscribers opened later see them in their snapshot)
    pub fn seed(&self, collection: &str, records: Vec<RawRecord>) {
        self.inner
            .collections
            .lock()
            .entry(collection.to_string())
            .or_default()
            .extend(records);
    }

    /// Add a record and notify matching subscribers
    pub fn publish(&self, collection: &str, record: RawRecord) {
        self.inner
            .collections
            .lock()
            .entry(collection.to_string())
            .or_default()
            .push(record.clone());
        self.notify(collection, |_| StoreEvent::Added(record.clone()), Some(&record));
    }

    /// Replace the record with the same store id (append when no match) and
    /// notify matching subscribers
    pub fn modify(&self, collection: &str, record: RawRecord) {
        let record_id = record_store_id(&record);
        {
            let mut collections = self.inner.collections.lock();
            let records = collections.entry(collection.to_string()).or_default();
            match records
                .iter_mut()
                .find(|existing| record_store_id(existing) == record_id && record_id.is_some())
            {
                Some(existing) => *existing = record.clone(),
                None => records.push(record.clone()),
            }
        }
        self.notify(
            collection,
            |_| StoreEvent::Modified(record.clone()),
            Some(&record),
        );
    }

    /// Remove a record by store id and notify all subscribers of the
    /// collection
    pub fn remove(&self, collection: &str, store_id: &str) {
        self.inner
            .collections
            .lock()
            .entry(collection.to_string())
            .or_default()
            .retain(|record| record_store_id(record).as_deref() != Some(store_id));
        self.notify(
            collection,
            |_| StoreEvent::Removed(store_id.to_string()),
            None,
        );
    }

    /// Inject an upstream failure on one exact source
    pub fn fail_source(&self, source: &SourceKey, reason: &str) {
        let subscribers = self.inner.subscribers.lock();
        for subscriber in subscribers.iter().filter(|s| &s.source == source) {
            let _ = subscriber.tx.send(StoreEvent::Failed(reason.to_string()));
        }
    }

    /// Number of currently open subscriptions
    pub fn active_subscription_count(&self) -> usize {
        self.inner.active_subscriptions.load(Ordering::SeqCst)
    }

    /// Number of release actions that have run
    pub fn released_subscription_count(&self) -> usize {
        self.inner.released_subscriptions.load(Ordering::SeqCst)
    }

    fn matching_records(
        &self,
        collection: &str,
        filter: Option<&FieldFilter>,
    ) -> Vec<RawRecord> {
        self.inner
            .collections
            .lock()
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| filter.map(|f| f.matches(record)).unwrap_or(true))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn notify(
        &self,
        collection: &str,
        event_for: impl Fn(&Subscriber) -> StoreEvent,
        changed: Option<&RawRecord>,
    ) {
        let subscribers = self.inner.subscribers.lock();
        for subscriber in subscribers
            .iter()
            .filter(|s| s.source.collection() == collection)
        {
            // A filtered subscription only hears about records it covers;
            // removals fan out to everyone since only the id is known.
            let covered = match (changed, &subscriber.filter) {
                (Some(record), Some(filter)) => filter.matches(record),
                _ => true,
            };
            if covered {
                let _ = subscriber.tx.send(event_for(subscriber));
            }
        }
    }
}

impl DocumentStore for MemoryStore {
    fn subscribe(&self, source: &SourceKey, filter: Option<FieldFilter>) -> Subscription {
        let (tx, events) = mpsc::unbounded_channel();
        let id = self.inner.next_subscription_id.fetch_add(1, Ordering::SeqCst);

        let snapshot = self.matching_records(source.collection(), filter.as_ref());
        let _ = tx.send(StoreEvent::Snapshot(snapshot));

        self.inner.subscribers.lock().push(Subscriber {
            id,
            source: source.clone(),
            filter,
            tx,
        });
        self.inner.active_subscriptions.fetch_add(1, Ordering::SeqCst);
        debug!(source = %source, id, "subscription opened");

        let inner = Arc::clone(&self.inner);
        let guard = SubscriptionGuard::new(move || {
            inner.subscribers.lock().retain(|s| s.id != id);
            inner.active_subscriptions.fetch_sub(1, Ordering::SeqCst);
            inner.released_subscriptions.fetch_add(1, Ordering::SeqCst);
        });

        Subscription {
            source: source.clone(),
            events,
            guard,
        }
    }

    fn get_once(&self, source: &SourceKey, filter: Option<FieldFilter>) -> Result<Vec<RawRecord>> {
        Ok(self.matching_records(source.collection(), filter.as_ref()))
    }
}

/// Best-effort store id of a raw record, probing the id alias list
pub fn record_store_id(record: &RawRecord) -> Option<String> {
    ID_FIELDS
        .iter()
        .find_map(|field| record.get(field).and_then(FieldValue::comparable_text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, title: &str) -> RawRecord {
        RawRecord::new().with("id", id).with("title", title)
    }

    #[tokio::test]
    async fn test_subscribe_delivers_snapshot_first() {
        let store = MemoryStore::new();
        store.seed("tasks", vec![task("R1", "one"), task("R2", "two")]);

        let source = SourceKey::unfiltered("tasks");
        let mut subscription = store.subscribe(&source, None);

        match subscription.events.recv().await {
            Some(StoreEvent::Snapshot(records)) => assert_eq!(records.len(), 2),
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_filtered_subscription() {
        let store = MemoryStore::new();
        store.seed(
            "tasks",
            vec![
                task("R1", "mine").with("assigneeId", "U1"),
                task("R2", "theirs").with("assigneeId", "U2"),
            ],
        );

        let source = SourceKey::aliased("tasks", "assigneeId");
        let filter = FieldFilter::new("assigneeId", "U1");
        let mut subscription = store.subscribe(&source, Some(filter));

        match subscription.events.recv().await {
            Some(StoreEvent::Snapshot(records)) => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].text("id"), Some("R1"));
            }
            _ => panic!("expected snapshot"),
        }

        // A record for someone else does not reach this subscription
        store.publish("tasks", task("R3", "also theirs").with("assigneeId", "U2"));
        store.publish("tasks", task("R4", "also mine").with("assigneeId", "U1"));

        match subscription.events.recv().await {
            Some(StoreEvent::Added(record)) => assert_eq!(record.text("id"), Some("R4")),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_modify_and_remove_events() {
        let store = MemoryStore::new();
        store.seed("tasks", vec![task("R1", "one")]);

        let source = SourceKey::unfiltered("tasks");
        let mut subscription = store.subscribe(&source, None);
        let _ = subscription.events.recv().await; // snapshot

        store.modify("tasks", task("R1", "one, renamed"));
        match subscription.events.recv().await {
            Some(StoreEvent::Modified(record)) => {
                assert_eq!(record.text("title"), Some("one, renamed"))
            }
            _ => panic!("expected modification"),
        }

        store.remove("tasks", "R1");
        match subscription.events.recv().await {
            Some(StoreEvent::Removed(id)) => assert_eq!(id, "R1"),
            _ => panic!("expected removal"),
        }
        assert!(store.get_once(&source, None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_release_is_exactly_once() {
        let store = MemoryStore::new();
        let source = SourceKey::unfiltered("tasks");
        let mut subscription = store.subscribe(&source, None);
        assert_eq!(store.active_subscription_count(), 1);

        subscription.guard.release();
        subscription.guard.release();
        drop(subscription);

        assert_eq!(store.active_subscription_count(), 0);
        assert_eq!(store.released_subscription_count(), 1);
    }

    #[tokio::test]
    async fn test_failure_injection_targets_one_source() {
        let store = MemoryStore::new();
        let failing = SourceKey::aliased("tasks", "assigneeId");
        let healthy = SourceKey::unfiltered("tasks");

        let mut sub_a = store.subscribe(&failing, None);
        let mut sub_b = store.subscribe(&healthy, None);
        let _ = sub_a.events.recv().await;
        let _ = sub_b.events.recv().await;

        store.fail_source(&failing, "connection reset");

        match sub_a.events.recv().await {
            Some(StoreEvent::Failed(reason)) => assert_eq!(reason, "connection reset"),
            _ => panic!("expected failure event"),
        }
        assert!(sub_b.events.try_recv().is_err());
    }
}
