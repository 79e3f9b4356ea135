//! # Domain Entities
//!
//! Canonical typed projections of raw records. An entity is always fully
//! populated: statuses, priorities and dates have been normalized and
//! defaulted by the mapper before one is constructed.

use crate::dates::Instant;
use crate::labels::{Priority, Status};
use crate::model::EntityKind;
use crate::utils::{day_stamp, normalize_title_key};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical projection of one task-like record.
///
/// Invariant: `title` is non-empty. Records without a usable title are
/// inadmissible and never become entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEntity {
    /// Native store id, when the source record carried one
    pub store_id: Option<String>,
    /// Business object kind
    pub kind: EntityKind,
    /// Non-empty title
    pub title: String,
    /// Free-text description (empty string when absent)
    pub description: String,
    /// Normalized status
    pub status: Status,
    /// Normalized priority
    pub priority: Priority,
    /// Start of work, epoch seconds UTC
    pub start_date: Instant,
    /// Deadline, epoch seconds UTC
    pub due_date: Instant,
    /// Assignee's display name, when recorded
    pub assignee_display_name: Option<String>,
    /// Reference to the owning project, when recorded
    pub project_ref: Option<String>,
    /// Recurrence rule, when the task repeats
    pub recurrence: Option<Recurrence>,
    /// Subtask roll-up, when subtask information was present
    pub subtasks: Option<SubtaskSummary>,
    /// Time logged against the task, in seconds
    pub logged_seconds: Option<i64>,
}

impl TaskEntity {
    /// The dedup key for this entity under the given keying mode.
    ///
    /// When every contributing entity carries a native store id the id is
    /// the key; otherwise a content key (normalized title plus
    /// day-granularity due date) recognizes logical duplicates.
    pub fn dedup_key(&self, by_store_id: bool) -> DedupKey {
        if by_store_id {
            if let Some(id) = &self.store_id {
                return DedupKey::StoreId(id.clone());
            }
        }
        DedupKey::Content(format!(
            "{}@{}",
            normalize_title_key(&self.title),
            day_stamp(self.due_date)
        ))
    }
}

/// Recurrence rule attached to a repeating task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    /// Free-text pattern label ("daily", "weekly", ...)
    pub pattern: String,
    /// Days between occurrences
    pub interval_days: u32,
    /// When the recurrence stops, if bounded
    pub end_date: Option<Instant>,
}

/// Roll-up of a task's subtasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskSummary {
    /// Total number of subtasks
    pub total: u32,
    /// Number of completed subtasks
    pub completed: u32,
}

/// Identity under which two mapped entities are recognized as the same
/// logical record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DedupKey {
    /// Native store id
    StoreId(String),
    /// Content-derived key: normalized title + day-granularity due date
    Content(String),
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DedupKey::StoreId(id) => write!(f, "id:{}", id),
            DedupKey::Content(key) => write!(f, "content:{}", key),
        }
    }
}
