//! # Record Mapper
//!
//! Converts raw records into canonical typed entities. Every projected
//! field is resolved through an explicit ordered list of candidate field
//! names: the first non-empty value wins, and the list orders encode real
//! priority decisions (which historical spelling is authoritative).
//!
//! Mapping never fails loudly: unrecognized labels and dates fall back to
//! documented defaults, and the only inadmissible record is one without a
//! usable title.

use crate::dates::{self, DateRole, Instant};
use crate::entity::{Recurrence, SubtaskSummary, TaskEntity};
use crate::labels::{self, Status};
use crate::model::{EntityKind, FieldValue, RawRecord};
use std::time::{SystemTime, UNIX_EPOCH};

/// Native id aliases
pub const ID_FIELDS: &[&str] = &[
    "id",
    "_id",
    "uid",
    "recordId",
    "record_id",
    "documentId",
    "key",
];

/// Title aliases; a record matching none of these is inadmissible
pub const TITLE_FIELDS: &[&str] = &["title", "name", "taskName", "task_name", "summary", "label"];

/// Description aliases
pub const DESCRIPTION_FIELDS: &[&str] = &["description", "details", "notes", "body", "desc"];

/// Status label aliases
pub const STATUS_FIELDS: &[&str] = &["status", "state", "progress", "column", "stage"];

/// Priority label aliases
pub const PRIORITY_FIELDS: &[&str] = &["priority", "importance", "urgency", "severity"];

/// Kind discriminator aliases
pub const KIND_FIELDS: &[&str] = &["kind", "type", "itemType", "category"];

/// Start date aliases; native timestamps are listed implicitly first within
/// each field because [`dates::instant_from_value`] prefers them
pub const START_FIELDS: &[&str] = &[
    "startDate",
    "start_date",
    "start",
    "startTime",
    "beginDate",
    "scheduledFor",
];

/// Due date aliases
pub const DUE_FIELDS: &[&str] = &[
    "dueDate",
    "due_date",
    "due",
    "deadline",
    "endDate",
    "end_date",
    "targetDate",
];

/// Assignee display-name aliases
pub const ASSIGNEE_NAME_FIELDS: &[&str] = &[
    "assigneeName",
    "assignee_name",
    "assignedToName",
    "ownerName",
    "responsible",
];

/// Project reference aliases
pub const PROJECT_FIELDS: &[&str] = &[
    "projectId",
    "project_id",
    "project",
    "projectRef",
    "boardId",
    "listId",
];

const RECURRENCE_FIELDS: &[&str] = &["recurrence", "repeat", "recurring"];
const RECURRENCE_PATTERN_FIELDS: &[&str] = &["pattern", "frequency", "rule"];
const RECURRENCE_FLAT_PATTERN_FIELDS: &[&str] = &["recurrencePattern", "repeatPattern"];
const RECURRENCE_INTERVAL_FIELDS: &[&str] = &["intervalDays", "interval", "every"];
const RECURRENCE_END_FIELDS: &[&str] = &["endDate", "until", "end"];

const SUBTASK_LIST_FIELDS: &[&str] = &["subtasks", "children", "checklist"];
const SUBTASK_TOTAL_FIELDS: &[&str] = &["subtaskCount", "subtask_count", "totalSubtasks"];
const SUBTASK_DONE_FIELDS: &[&str] = &["completedSubtasks", "subtasksCompleted", "doneCount"];
const SUBTASK_DONE_FLAGS: &[&str] = &["done", "completed", "checked"];

const LOGGED_SECONDS_FIELDS: &[&str] = &["loggedSeconds", "timeSpentSeconds", "durationSeconds"];
const LOGGED_MINUTES_FIELDS: &[&str] = &["loggedMinutes", "timeSpentMinutes", "minutesLogged"];

/// Maps raw records into [`TaskEntity`] values against a fixed reference
/// time, so that date defaulting is deterministic for one mapper instance.
#[derive(Debug, Clone)]
pub struct RecordMapper {
    default_kind: EntityKind,
    now: Instant,
}

impl RecordMapper {
    /// Create a mapper anchored at the current wall clock
    pub fn new(default_kind: EntityKind) -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs() as i64)
            .unwrap_or(0);
        Self::with_reference_time(default_kind, now)
    }

    /// Create a mapper with an explicit reference time
    pub fn with_reference_time(default_kind: EntityKind, now: Instant) -> Self {
        Self { default_kind, now }
    }

    /// The reference time used for date defaulting
    pub fn reference_time(&self) -> Instant {
        self.now
    }

    /// Project a raw record into an entity.
    ///
    /// Returns `None` for inadmissible records (no usable title). Partial
    /// entities are never produced: every other field defaults rather than
    /// failing.
    pub fn map(&self, record: &RawRecord) -> Option<TaskEntity> {
        let title = first_text(record, TITLE_FIELDS)?;

        let status = first_text(record, STATUS_FIELDS)
            .map(|label| labels::parse_status(&label))
            .unwrap_or_default();
        let priority = first_text(record, PRIORITY_FIELDS)
            .map(|label| labels::parse_priority(&label))
            .unwrap_or_default();
        let kind = first_text(record, KIND_FIELDS)
            .map(|label| parse_kind(&label, self.default_kind))
            .unwrap_or(self.default_kind);

        let start_date = self.resolve_date(record, START_FIELDS, DateRole::Start);
        let due_date = self.resolve_date(record, DUE_FIELDS, DateRole::Due);

        Some(TaskEntity {
            store_id: first_scalar(record, ID_FIELDS),
            kind,
            title,
            description: first_text(record, DESCRIPTION_FIELDS).unwrap_or_default(),
            status,
            priority,
            start_date,
            due_date,
            assignee_display_name: first_text(record, ASSIGNEE_NAME_FIELDS),
            project_ref: first_scalar(record, PROJECT_FIELDS),
            recurrence: self.map_recurrence(record),
            subtasks: map_subtasks(record),
            logged_seconds: map_logged_seconds(record),
        })
    }

    fn resolve_date(&self, record: &RawRecord, fields: &[&str], role: DateRole) -> Instant {
        first_instant(record, fields)
            .or_else(|| role.default_instant(self.now))
            .unwrap_or(self.now)
    }

    fn map_recurrence(&self, record: &RawRecord) -> Option<Recurrence> {
        if let Some(nested) = RECURRENCE_FIELDS
            .iter()
            .find_map(|field| record.nested(field))
        {
            let pattern = first_text(nested, RECURRENCE_PATTERN_FIELDS)?;
            let interval_days = first_number(nested, RECURRENCE_INTERVAL_FIELDS)
                .map(|value| value.max(1.0) as u32)
                .unwrap_or_else(|| infer_interval_days(&pattern));
            let end_date = first_instant(nested, RECURRENCE_END_FIELDS);
            return Some(Recurrence {
                pattern,
                interval_days,
                end_date,
            });
        }

        // Flat spelling: the rule lives in top-level fields
        let pattern = first_text(record, RECURRENCE_FLAT_PATTERN_FIELDS)?;
        let interval_days = infer_interval_days(&pattern);
        Some(Recurrence {
            pattern,
            interval_days,
            end_date: None,
        })
    }
}

/// Map with a throwaway mapper anchored at the current wall clock
pub fn map_record(record: &RawRecord, default_kind: EntityKind) -> Option<TaskEntity> {
    RecordMapper::new(default_kind).map(record)
}

/// First alias whose value is non-empty text, trimmed
fn first_text(record: &RawRecord, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| {
        record
            .text(field)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(String::from)
    })
}

/// First alias whose value has a scalar string form
fn first_scalar(record: &RawRecord, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| {
        record
            .get(field)
            .and_then(FieldValue::comparable_text)
            .filter(|text| !text.trim().is_empty())
    })
}

/// First alias whose value parses as an instant
fn first_instant(record: &RawRecord, fields: &[&str]) -> Option<Instant> {
    fields
        .iter()
        .find_map(|field| record.get(field).and_then(dates::instant_from_value))
}

/// First alias whose value is numeric
fn first_number(record: &RawRecord, fields: &[&str]) -> Option<f64> {
    fields.iter().find_map(|field| record.number(field))
}

fn parse_kind(label: &str, default_kind: EntityKind) -> EntityKind {
    let lowered = label.to_lowercase();
    if lowered.contains("subtask") || lowered.contains("child") {
        EntityKind::Subtask
    } else if lowered.contains("milestone") {
        EntityKind::Milestone
    } else if lowered.contains("task") {
        EntityKind::Task
    } else {
        default_kind
    }
}

fn infer_interval_days(pattern: &str) -> u32 {
    let lowered = pattern.to_lowercase();
    if lowered.contains("day") || lowered.contains("daily") {
        1
    } else if lowered.contains("week") {
        7
    } else if lowered.contains("month") {
        30
    } else {
        1
    }
}

fn map_subtasks(record: &RawRecord) -> Option<SubtaskSummary> {
    if let Some(items) = SUBTASK_LIST_FIELDS
        .iter()
        .find_map(|field| record.list(field))
    {
        let total = items.len() as u32;
        let completed = items
            .iter()
            .filter_map(FieldValue::as_record)
            .filter(|child| subtask_is_done(child))
            .count() as u32;
        return Some(SubtaskSummary { total, completed });
    }

    let total = first_number(record, SUBTASK_TOTAL_FIELDS)?;
    let completed = first_number(record, SUBTASK_DONE_FIELDS).unwrap_or(0.0);
    Some(SubtaskSummary {
        total: total.max(0.0) as u32,
        completed: completed.max(0.0) as u32,
    })
}

fn subtask_is_done(child: &RawRecord) -> bool {
    for flag in SUBTASK_DONE_FLAGS {
        if let Some(FieldValue::Bool(done)) = child.get(flag) {
            return *done;
        }
    }
    first_text(child, STATUS_FIELDS)
        .map(|label| labels::parse_status(&label) == Status::Completed)
        .unwrap_or(false)
}

fn map_logged_seconds(record: &RawRecord) -> Option<i64> {
    if let Some(seconds) = first_number(record, LOGGED_SECONDS_FIELDS) {
        return Some(seconds.max(0.0) as i64);
    }
    first_number(record, LOGGED_MINUTES_FIELDS).map(|minutes| (minutes.max(0.0) * 60.0) as i64)
}
