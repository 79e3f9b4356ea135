mod support;

use std::time::Duration;
use worklens::{
    ActorIdentity, EntityKind, FieldFilter, MemoryStore, RelationshipRole, SourceKey,
    SubscriptionDescriptor, Worklens,
};

fn three_source_plan() -> Vec<SubscriptionDescriptor> {
    vec![
        SubscriptionDescriptor {
            source: SourceKey::aliased("tasks", "assigneeId"),
            filter_role: Some(RelationshipRole::AssigneeById),
            filter: Some(FieldFilter::new("assigneeId", "U1")),
        },
        SubscriptionDescriptor {
            source: SourceKey::aliased("tasks", "assigneeEmail"),
            filter_role: Some(RelationshipRole::AssigneeByEmail),
            filter: Some(FieldFilter::new("assigneeEmail", "u1@x.com")),
        },
        SubscriptionDescriptor::unfiltered(EntityKind::Task),
    ]
}

async fn wait_until_released(store: &MemoryStore, expected: usize) {
    for _ in 0..500 {
        if store.active_subscription_count() == 0
            && store.released_subscription_count() == expected
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "subscriptions not released: {} active, {} released",
        store.active_subscription_count(),
        store.released_subscription_count()
    );
}

/// Cancelling twice releases every subscription exactly once and raises no
/// error.
#[tokio::test]
async fn double_cancel_releases_exactly_once() {
    let store = MemoryStore::new();
    store.seed("tasks", vec![support::task_record("R1", "one", "open")]);

    let lens = Worklens::new(store.clone());
    let actor = ActorIdentity::with_id("U1").and_email("u1@x.com");
    let mut handle = lens.start_aggregation_with_plan(actor, EntityKind::Task, three_source_plan());

    let _ = support::next_matching(&mut handle, |_| true).await;

    handle.cancel();
    handle.cancel();
    handle.cancel_and_wait().await;

    assert_eq!(store.active_subscription_count(), 0);
    assert_eq!(store.released_subscription_count(), 3);
}

/// Cancelling before any subscription has emitted its first snapshot still
/// tears everything down cleanly.
#[tokio::test]
async fn cancel_before_first_snapshot_leaks_nothing() {
    let store = MemoryStore::new();

    let lens = Worklens::new(store.clone());
    let actor = ActorIdentity::with_id("U1").and_email("u1@x.com");
    let mut handle = lens.start_aggregation_with_plan(actor, EntityKind::Task, three_source_plan());

    // Cancel without ever awaiting a result
    handle.cancel_and_wait().await;

    assert_eq!(store.active_subscription_count(), 0);
    assert_eq!(store.released_subscription_count(), 3);
}

/// Dropping the handle cancels the aggregation.
#[tokio::test]
async fn dropping_the_handle_cancels() {
    let store = MemoryStore::new();
    store.seed("tasks", vec![support::task_record("R1", "one", "open")]);

    let lens = Worklens::new(store.clone());
    let actor = ActorIdentity::with_id("U1").and_email("u1@x.com");
    let handle = lens.start_aggregation_with_plan(actor, EntityKind::Task, three_source_plan());
    drop(handle);

    wait_until_released(&store, 3).await;
}
