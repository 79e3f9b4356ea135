//! # Deduplicator
//!
//! Recognizes that two mapped entities arriving from different
//! subscriptions represent the same logical record and keeps one. The
//! merged set is canonically ordered so that recomputation is independent
//! of arrival order.

use crate::entity::{DedupKey, TaskEntity};
use rustc_hash::FxHashMap;

/// Merge entities from all sources into one deduplicated, canonically
/// ordered result set.
///
/// Keying: store ids are used only when every contributing entity carries
/// one; a single id-less entity degrades the whole merge to content keys so
/// that an id-bearing copy and an id-less copy of the same record still
/// collapse. Later occurrences of a key overwrite earlier ones
/// (last-writer-wins on conflicting field values).
pub fn merge(entities: Vec<TaskEntity>) -> Vec<TaskEntity> {
    let by_store_id = !entities.is_empty() && entities.iter().all(|e| e.store_id.is_some());

    let mut order: Vec<DedupKey> = Vec::with_capacity(entities.len());
    let mut kept: FxHashMap<DedupKey, TaskEntity> = FxHashMap::default();

    for entity in entities {
        let key = entity.dedup_key(by_store_id);
        if !kept.contains_key(&key) {
            order.push(key.clone());
        }
        kept.insert(key, entity);
    }

    let mut merged: Vec<TaskEntity> = order
        .into_iter()
        .filter_map(|key| kept.remove(&key))
        .collect();

    merged.sort_by(|a, b| {
        a.due_date
            .cmp(&b.due_date)
            .then_with(|| a.title.cmp(&b.title))
            .then_with(|| a.store_id.cmp(&b.store_id))
    });
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::{Priority, Status};
    use crate::model::EntityKind;

    fn entity(store_id: Option<&str>, title: &str, status: Status) -> TaskEntity {
        TaskEntity {
            store_id: store_id.map(String::from),
            kind: EntityKind::Task,
            title: title.to_string(),
            description: String::new(),
            status,
            priority: Priority::Medium,
            start_date: 0,
            due_date: 1_768_435_200,
            assignee_display_name: None,
            project_ref: None,
            recurrence: None,
            subtasks: None,
            logged_seconds: None,
        }
    }

    #[test]
    fn test_same_store_id_collapses() {
        let merged = merge(vec![
            entity(Some("R1"), "Fix bug", Status::InProgress),
            entity(Some("R1"), "Fix bug", Status::InProgress),
            entity(Some("R2"), "Other", Status::NotStarted),
        ]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_arrival_order_does_not_change_membership() {
        let forward = merge(vec![
            entity(Some("R1"), "Fix bug", Status::InProgress),
            entity(Some("R2"), "Other", Status::NotStarted),
        ]);
        let reversed = merge(vec![
            entity(Some("R2"), "Other", Status::NotStarted),
            entity(Some("R1"), "Fix bug", Status::InProgress),
        ]);
        assert_eq!(forward, reversed);
    }

    #[test]
    fn test_last_writer_wins_on_conflicting_fields() {
        let merged = merge(vec![
            entity(Some("R1"), "Fix bug", Status::NotStarted),
            entity(Some("R1"), "Fix bug", Status::Completed),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].status, Status::Completed);
    }

    #[test]
    fn test_id_less_entity_degrades_to_content_keys() {
        // One copy has a store id, its twin does not; content keying still
        // collapses them
        let merged = merge(vec![
            entity(Some("R1"), "Fix bug", Status::InProgress),
            entity(None, "fix   bug", Status::InProgress),
        ]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_empty_input() {
        assert!(merge(Vec::new()).is_empty());
    }
}
