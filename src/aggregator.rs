//! # Live Query Aggregator
//!
//! Owns a set of concurrently-active change-feed subscriptions and merges
//! their contributions into one deduplicated result set, re-emitted on
//! every source notification. Each subscription forwards its events into a
//! single fan-in channel; one aggregation task is the only writer of the
//! per-source bucket map, so recomputation always reads a consistent view.

use crate::config::AggregatorTuning;
use crate::dedup;
use crate::entity::TaskEntity;
use crate::mapper::RecordMapper;
use crate::model::{ActorIdentity, EntityKind, RawRecord, SourceKey};
use crate::plan::{plan_subscriptions, SubscriptionDescriptor};
use crate::registry::RelationshipRole;
use crate::resolver::{self, ResolveOptions};
use crate::store::{self, DocumentStore, StoreEvent, Subscription, SubscriptionGuard};
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};
use uuid::Uuid;

/// Lifecycle of one aggregation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationState {
    /// Created, subscriptions not yet opened
    Idle,
    /// Subscriptions opened, no result emitted yet
    Subscribing,
    /// At least one result set has been emitted
    Active,
    /// All subscriptions released
    Cancelled,
}

/// Identifier for one aggregation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AggregationId(Uuid);

impl AggregationId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for AggregationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One recomputed, deduplicated view across all sources
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregateResultSet {
    /// Canonically ordered, deduplicated entities
    pub entities: Vec<TaskEntity>,
    /// Sources currently contributing nothing because they failed upstream
    pub degraded_sources: Vec<SourceKey>,
}

/// Merges live subscriptions for (actor, entity kind) requests against one
/// store.
pub struct LiveAggregator<S: DocumentStore> {
    store: Arc<S>,
    tuning: AggregatorTuning,
}

impl<S: DocumentStore> LiveAggregator<S> {
    /// Create an aggregator with default tuning
    pub fn new(store: Arc<S>) -> Self {
        Self::with_tuning(store, AggregatorTuning::default())
    }

    /// Create an aggregator with explicit tuning
    pub fn with_tuning(store: Arc<S>, tuning: AggregatorTuning) -> Self {
        Self { store, tuning }
    }

    /// Start aggregating with the descriptor set planned from the actor's
    /// present identity components.
    pub fn start(&self, actor: ActorIdentity, kind: EntityKind) -> AggregationHandle {
        let plan = plan_subscriptions(&actor, kind);
        self.start_with_plan(actor, kind, plan)
    }

    /// Start aggregating over a caller-supplied descriptor set.
    pub fn start_with_plan(
        &self,
        actor: ActorIdentity,
        kind: EntityKind,
        plan: Vec<SubscriptionDescriptor>,
    ) -> AggregationHandle {
        let id = AggregationId::new();
        let (state_tx, state_rx) = watch::channel(AggregationState::Idle);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (result_tx, result_rx) = mpsc::channel(self.tuning.result_capacity.max(1));
        let (event_tx, event_rx) = mpsc::channel(self.tuning.event_capacity.max(1));

        state_tx.send_replace(AggregationState::Subscribing);

        let mut guards = Vec::with_capacity(plan.len());
        for descriptor in &plan {
            let Subscription {
                source,
                mut events,
                guard,
            } = self.store.subscribe(&descriptor.source, descriptor.filter.clone());
            guards.push(guard);

            let forward = event_tx.clone();
            tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    if forward.send((source.clone(), event)).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(event_tx);

        let worker = AggregationWorker {
            id,
            actor,
            mapper: RecordMapper::new(kind),
            roles: RelationshipRole::ALL,
            resolve_options: ResolveOptions {
                deep_scan: self.tuning.deep_scan,
            },
            buckets: FxHashMap::default(),
            guards,
            state_tx,
            result_tx,
        };
        tokio::spawn(worker.run(event_rx, cancel_rx));

        debug!(aggregation = %id, sources = plan.len(), "aggregation started");
        AggregationHandle {
            id,
            results: result_rx,
            state: state_rx,
            cancel: cancel_tx,
        }
    }
}

/// Consumer-side handle to a running aggregation. Dropping the handle
/// cancels it.
pub struct AggregationHandle {
    id: AggregationId,
    results: mpsc::Receiver<AggregateResultSet>,
    state: watch::Receiver<AggregationState>,
    cancel: watch::Sender<bool>,
}

impl AggregationHandle {
    /// This aggregation's identifier
    pub fn id(&self) -> AggregationId {
        self.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> AggregationState {
        *self.state.borrow()
    }

    /// Await the next recomputed result set. Returns `None` once the
    /// aggregation has been cancelled and the last emission drained.
    pub async fn next(&mut self) -> Option<AggregateResultSet> {
        self.results.recv().await
    }

    /// Cancel the aggregation, releasing every underlying subscription
    /// exactly once. Idempotent: repeated calls (and cancelling before the
    /// first snapshot) are safe.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    /// Cancel and wait until every subscription has been released.
    pub async fn cancel_and_wait(&mut self) {
        self.cancel();
        loop {
            if *self.state.borrow() == AggregationState::Cancelled {
                return;
            }
            if self.state.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Drop for AggregationHandle {
    fn drop(&mut self) {
        let _ = self.cancel.send(true);
    }
}

/// Latest contribution of one source
#[derive(Default)]
struct SourceBucket {
    entities: Vec<TaskEntity>,
    degraded: bool,
}

struct AggregationWorker {
    id: AggregationId,
    actor: ActorIdentity,
    mapper: RecordMapper,
    roles: &'static [RelationshipRole],
    resolve_options: ResolveOptions,
    buckets: FxHashMap<SourceKey, SourceBucket>,
    guards: Vec<SubscriptionGuard>,
    state_tx: watch::Sender<AggregationState>,
    result_tx: mpsc::Sender<AggregateResultSet>,
}

impl AggregationWorker {
    async fn run(
        mut self,
        mut events: mpsc::Receiver<(SourceKey, StoreEvent)>,
        mut cancel: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                }
                maybe_event = events.recv() => {
                    let Some((source, event)) = maybe_event else { break };
                    self.apply(&source, event);
                    let result = self.recompute();
                    self.state_tx.send_replace(AggregationState::Active);
                    tokio::select! {
                        changed = cancel.changed() => {
                            if changed.is_err() || *cancel.borrow() {
                                break;
                            }
                        }
                        sent = self.result_tx.send(result) => {
                            if sent.is_err() {
                                // Consumer went away without cancelling
                                break;
                            }
                        }
                    }
                }
            }
        }

        for guard in &mut self.guards {
            guard.release();
        }
        self.state_tx.send_replace(AggregationState::Cancelled);
        debug!(aggregation = %self.id, "aggregation cancelled");
    }

    /// Apply one store notification to its source bucket. Only the most
    /// recent snapshot per source is retained; incremental events update it
    /// in place.
    fn apply(&mut self, source: &SourceKey, event: StoreEvent) {
        match event {
            StoreEvent::Snapshot(records) => {
                let entities = records
                    .iter()
                    .filter_map(|record| self.admit(record))
                    .collect();
                let bucket = self.buckets.entry(source.clone()).or_default();
                bucket.degraded = false;
                bucket.entities = entities;
            }
            StoreEvent::Added(record) | StoreEvent::Modified(record) => {
                let record_id = store::record_store_id(&record);
                let admitted = self.admit(&record);
                let bucket = self.buckets.entry(source.clone()).or_default();
                match admitted {
                    Some(entity) => upsert(&mut bucket.entities, entity),
                    // The update took the record out of the owned/mappable
                    // set; drop any copy we were holding
                    None => {
                        if let Some(record_id) = record_id {
                            bucket
                                .entities
                                .retain(|e| e.store_id.as_deref() != Some(record_id.as_str()));
                        }
                    }
                }
            }
            StoreEvent::Removed(record_id) => {
                let bucket = self.buckets.entry(source.clone()).or_default();
                bucket
                    .entities
                    .retain(|e| e.store_id.as_deref() != Some(record_id.as_str()));
            }
            StoreEvent::Failed(reason) => {
                warn!(aggregation = %self.id, source = %source, %reason, "source failed; continuing without it");
                let bucket = self.buckets.entry(source.clone()).or_default();
                bucket.entities.clear();
                bucket.degraded = true;
            }
        }
    }

    /// Ownership-filter and map one record
    fn admit(&self, record: &RawRecord) -> Option<TaskEntity> {
        if !resolver::is_owned_by_with(&self.actor, record, self.roles, self.resolve_options) {
            return None;
        }
        self.mapper.map(record)
    }

    /// Pure function of the current buckets: union, dedup, canonical order.
    fn recompute(&self) -> AggregateResultSet {
        let mut sources: Vec<&SourceKey> = self.buckets.keys().collect();
        sources.sort();

        let mut entities = Vec::new();
        let mut degraded_sources = Vec::new();
        for source in sources {
            let bucket = &self.buckets[source];
            entities.extend(bucket.entities.iter().cloned());
            if bucket.degraded {
                degraded_sources.push(source.clone());
            }
        }

        AggregateResultSet {
            entities: dedup::merge(entities),
            degraded_sources,
        }
    }
}

fn upsert(entities: &mut Vec<TaskEntity>, entity: TaskEntity) {
    match entity.store_id.as_deref() {
        Some(id) => {
            match entities
                .iter_mut()
                .find(|existing| existing.store_id.as_deref() == Some(id))
            {
                Some(existing) => *existing = entity,
                None => entities.push(entity),
            }
        }
        None => entities.push(entity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::Status;
    use crate::store::MemoryStore;

    fn task(id: &str, title: &str, assignee: &str) -> RawRecord {
        RawRecord::new()
            .with("id", id)
            .with("title", title)
            .with("assigneeId", assignee)
    }

    #[tokio::test]
    async fn test_emits_on_every_source_update() {
        let store = Arc::new(MemoryStore::new());
        store.seed("tasks", vec![task("R1", "first", "U1")]);

        let aggregator = LiveAggregator::new(Arc::clone(&store));
        let mut handle = aggregator.start(ActorIdentity::with_id("U1"), EntityKind::Task);

        // Source arrival order is not guaranteed; drain until the owned
        // record shows up
        let mut first = handle.next().await.expect("initial result");
        while first.entities.is_empty() {
            first = handle.next().await.expect("initial fill");
        }
        assert_eq!(first.entities.len(), 1);

        store.publish("tasks", task("R2", "second", "U1"));
        // One recomputation per notified subscription; the final state has
        // both records
        let mut latest = handle.next().await.expect("update result");
        while latest.entities.len() < 2 {
            latest = handle.next().await.expect("further update");
        }
        assert_eq!(latest.entities.len(), 2);

        handle.cancel_and_wait().await;
        assert_eq!(store.active_subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_modification_updates_entity_in_place() {
        let store = Arc::new(MemoryStore::new());
        store.seed("tasks", vec![task("R1", "first", "U1").with("status", "open")]);

        let aggregator = LiveAggregator::new(Arc::clone(&store));
        let mut handle = aggregator.start(ActorIdentity::with_id("U1"), EntityKind::Task);
        let _ = handle.next().await;

        store.modify("tasks", task("R1", "first", "U1").with("status", "Done"));
        let mut latest = handle.next().await.expect("update");
        while latest
            .entities
            .first()
            .map(|e| e.status != Status::Completed)
            .unwrap_or(true)
        {
            latest = handle.next().await.expect("further update");
        }
        assert_eq!(latest.entities.len(), 1);

        handle.cancel_and_wait().await;
    }

    #[tokio::test]
    async fn test_removal_shrinks_result_set() {
        let store = Arc::new(MemoryStore::new());
        store.seed(
            "tasks",
            vec![task("R1", "first", "U1"), task("R2", "second", "U1")],
        );

        let aggregator = LiveAggregator::new(Arc::clone(&store));
        let mut handle = aggregator.start(ActorIdentity::with_id("U1"), EntityKind::Task);
        let mut first = handle.next().await.expect("initial result");
        while first.entities.len() < 2 {
            first = handle.next().await.expect("initial fill");
        }

        store.remove("tasks", "R2");
        let mut latest = handle.next().await.expect("update");
        while latest.entities.len() != 1 {
            latest = handle.next().await.expect("further update");
        }
        assert_eq!(latest.entities[0].store_id.as_deref(), Some("R1"));

        handle.cancel_and_wait().await;
    }

    #[tokio::test]
    async fn test_unowned_records_are_filtered_out() {
        let store = Arc::new(MemoryStore::new());
        store.seed(
            "tasks",
            vec![task("R1", "mine", "U1"), task("R2", "theirs", "U2")],
        );

        let aggregator = LiveAggregator::new(Arc::clone(&store));
        // Unfiltered plan: ownership resolution alone must exclude R2
        let mut handle = aggregator.start_with_plan(
            ActorIdentity::with_id("U1"),
            EntityKind::Task,
            vec![SubscriptionDescriptor::unfiltered(EntityKind::Task)],
        );

        let result = handle.next().await.expect("result");
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.entities[0].store_id.as_deref(), Some("R1"));

        handle.cancel_and_wait().await;
    }

    #[tokio::test]
    async fn test_titleless_records_never_surface() {
        let store = Arc::new(MemoryStore::new());
        store.seed(
            "tasks",
            vec![
                RawRecord::new().with("id", "R1").with("assigneeId", "U1"),
                task("R2", "titled", "U1"),
            ],
        );

        let aggregator = LiveAggregator::new(Arc::clone(&store));
        let mut handle = aggregator.start(ActorIdentity::with_id("U1"), EntityKind::Task);
        let mut result = handle.next().await.expect("result");
        while result.entities.is_empty() {
            result = handle.next().await.expect("fill");
        }
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.entities[0].title, "titled");

        handle.cancel_and_wait().await;
    }

    #[tokio::test]
    async fn test_failed_source_degrades_without_terminating() {
        let store = Arc::new(MemoryStore::new());
        store.seed(
            "tasks",
            vec![task("R1", "keeps", "U1"), task("R2", "also keeps", "U1")],
        );

        let failing = SourceKey::aliased("tasks", "assigneeId");
        let healthy = SubscriptionDescriptor::unfiltered(EntityKind::Task);
        let plan = vec![
            SubscriptionDescriptor {
                source: failing.clone(),
                filter_role: Some(RelationshipRole::AssigneeById),
                filter: Some(crate::store::FieldFilter::new("assigneeId", "U1")),
            },
            healthy,
        ];

        let aggregator = LiveAggregator::new(Arc::clone(&store));
        let mut handle =
            aggregator.start_with_plan(ActorIdentity::with_id("U1"), EntityKind::Task, plan);

        // Drain until both sources have reported
        let mut latest = handle.next().await.expect("initial");
        while latest.entities.len() < 2 {
            latest = handle.next().await.expect("initial fill");
        }

        store.fail_source(&failing, "connection reset");
        let mut degraded = handle.next().await.expect("degraded emission");
        while degraded.degraded_sources.is_empty() || degraded.entities.len() < 2 {
            degraded = handle.next().await.expect("degraded emission");
        }
        // The healthy unfiltered source still contributes everything
        assert_eq!(degraded.entities.len(), 2);
        assert_eq!(degraded.degraded_sources, vec![failing]);

        handle.cancel_and_wait().await;
        assert_eq!(store.active_subscription_count(), 0);
    }

    #[tokio::test]
    async fn test_state_machine_progression() {
        let store = Arc::new(MemoryStore::new());
        store.seed("tasks", vec![task("R1", "one", "U1")]);

        let aggregator = LiveAggregator::new(Arc::clone(&store));
        let mut handle = aggregator.start(ActorIdentity::with_id("U1"), EntityKind::Task);
        assert_ne!(handle.state(), AggregationState::Cancelled);

        let _ = handle.next().await;
        assert_eq!(handle.state(), AggregationState::Active);

        handle.cancel_and_wait().await;
        assert_eq!(handle.state(), AggregationState::Cancelled);
    }
}
