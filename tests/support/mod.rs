use std::time::Duration;
use worklens::{AggregateResultSet, AggregationHandle, RawRecord};

#[allow(dead_code)]
pub fn task_record(id: &str, title: &str, status: &str) -> RawRecord {
    RawRecord::new()
        .with("id", id)
        .with("title", title)
        .with("status", status)
}

/// Await emissions until one satisfies the predicate. Sources report in no
/// guaranteed order, so tests assert on the first emission that reflects
/// the state they arranged.
#[allow(dead_code)]
pub async fn next_matching(
    handle: &mut AggregationHandle,
    predicate: impl Fn(&AggregateResultSet) -> bool,
) -> AggregateResultSet {
    loop {
        let result = tokio::time::timeout(Duration::from_secs(5), handle.next())
            .await
            .expect("timed out waiting for an emission")
            .expect("result stream ended unexpectedly");
        if predicate(&result) {
            return result;
        }
    }
}

/// Await exactly `count` emissions and return the last one.
#[allow(dead_code)]
pub async fn nth_emission(handle: &mut AggregationHandle, count: usize) -> AggregateResultSet {
    let mut last = None;
    for _ in 0..count {
        let result = tokio::time::timeout(Duration::from_secs(5), handle.next())
            .await
            .expect("timed out waiting for an emission")
            .expect("result stream ended unexpectedly");
        last = Some(result);
    }
    last.expect("at least one emission requested")
}
