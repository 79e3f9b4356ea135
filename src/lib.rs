//! # Worklens
//!
//! A record-access resolution and live-aggregation layer for task
//! management clients over schema-less document stores.
//!
//! This library decides whether loosely-structured records belong to an
//! actor (by id, email, or display name, under years of schema drift),
//! normalizes them into canonical typed entities, and merges many
//! concurrently-updating change-feed subscriptions into one deduplicated
//! result stream with defined tie-break and fallback behavior.

pub mod aggregator;
pub mod config;
pub mod dates;
pub mod dedup;
pub mod entity;
pub mod labels;
pub mod mapper;
pub mod matcher;
pub mod model;
pub mod plan;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod utils;

// Re-export main types for convenience
pub use aggregator::{
    AggregateResultSet, AggregationHandle, AggregationId, AggregationState, LiveAggregator,
};
pub use config::{AggregatorTuning, ConfigOverrides, LensConfig};
pub use entity::{DedupKey, Recurrence, SubtaskSummary, TaskEntity};
pub use labels::{Priority, Status};
pub use model::{ActorIdentity, EntityKind, FieldValue, IdentityComponent, RawRecord, SourceKey};
pub use plan::SubscriptionDescriptor;
pub use registry::{MatcherKind, RelationshipRole};
pub use store::{DocumentStore, FieldFilter, MemoryStore, StoreEvent, Subscription};

use crate::mapper::RecordMapper;
use crate::resolver::ResolveOptions;
use std::sync::Arc;

/// Main API: one instance mediates between a document store and typed
/// consumers.
pub struct Worklens<S: DocumentStore> {
    store: Arc<S>,
    config: LensConfig,
}

impl<S: DocumentStore> Worklens<S> {
    /// Create an instance with default configuration
    pub fn new(store: S) -> Self {
        Self::with_config(store, LensConfig::default())
    }

    /// Create an instance with explicit configuration
    pub fn with_config(store: S, config: LensConfig) -> Self {
        Self {
            store: Arc::new(store),
            config,
        }
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The active configuration
    pub fn config(&self) -> &LensConfig {
        &self.config
    }

    /// Start a live aggregation for the actor and entity kind. The handle
    /// delivers successive [`AggregateResultSet`]s until cancelled.
    pub fn start_aggregation(&self, actor: ActorIdentity, kind: EntityKind) -> AggregationHandle {
        self.live_aggregator().start(actor, kind)
    }

    /// Start a live aggregation over a caller-supplied descriptor set.
    pub fn start_aggregation_with_plan(
        &self,
        actor: ActorIdentity,
        kind: EntityKind,
        plan: Vec<SubscriptionDescriptor>,
    ) -> AggregationHandle {
        self.live_aggregator().start_with_plan(actor, kind, plan)
    }

    /// One-off ownership check without a live subscription.
    pub fn resolve_ownership(
        &self,
        actor: &ActorIdentity,
        record: &RawRecord,
        roles: &[RelationshipRole],
    ) -> bool {
        resolver::is_owned_by_with(
            actor,
            record,
            roles,
            ResolveOptions {
                deep_scan: self.config.aggregator.deep_scan,
            },
        )
    }

    /// One-off record projection without a live subscription.
    pub fn map_record(&self, record: &RawRecord, default_kind: EntityKind) -> Option<TaskEntity> {
        RecordMapper::new(default_kind).map(record)
    }

    fn live_aggregator(&self) -> LiveAggregator<S> {
        LiveAggregator::with_tuning(Arc::clone(&self.store), self.config.aggregator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facade_sync_utilities() {
        let lens = Worklens::new(MemoryStore::new());

        let record = RawRecord::new()
            .with("id", "R1")
            .with("title", "Fix bug")
            .with("assigneeId", "U1")
            .with("status", "In Progress");

        let actor = ActorIdentity::with_id("U1");
        assert!(lens.resolve_ownership(&actor, &record, RelationshipRole::ALL));

        let stranger = ActorIdentity::with_id("U9");
        assert!(!lens.resolve_ownership(&stranger, &record, RelationshipRole::ALL));

        let task = lens.map_record(&record, EntityKind::Task).expect("admissible");
        assert_eq!(task.store_id.as_deref(), Some("R1"));
        assert_eq!(task.status, Status::InProgress);
    }

    #[test]
    fn test_facade_drops_titleless_records() {
        let lens = Worklens::new(MemoryStore::new());
        let record = RawRecord::new().with("id", "R1");
        assert_eq!(lens.map_record(&record, EntityKind::Task), None);
    }

    #[test]
    fn test_deep_scan_toggle_flows_from_config() {
        let mut config = LensConfig::default();
        config.aggregator.deep_scan = false;
        let lens = Worklens::with_config(MemoryStore::new(), config);

        let actor = ActorIdentity::with_email("u1@x.com");
        let record = RawRecord::new().with("title", "Hidden").with(
            "history",
            FieldValue::List(vec![FieldValue::Record(
                RawRecord::new().with("actor", "u1@x.com"),
            )]),
        );

        // Structured probing misses and the fallback is disabled
        assert!(!lens.resolve_ownership(&actor, &record, RelationshipRole::ALL));

        let permissive = Worklens::new(MemoryStore::new());
        assert!(permissive.resolve_ownership(&actor, &record, RelationshipRole::ALL));
    }
}
