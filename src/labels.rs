//! # Label Normalizer
//!
//! Free-text status and priority labels collapse to small closed enums.
//! Classification is substring containment against fixed ordered rule
//! tables: rules are evaluated top to bottom and the first match wins, so
//! the table order is a contract, not an implementation detail.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical task status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    /// Work has not begun
    #[default]
    NotStarted,
    /// Actively being worked
    InProgress,
    /// Blocked on something
    Stuck,
    /// Waiting on another party
    WaitingFor,
    /// Deliberately paused
    OnHold,
    /// Assistance requested
    NeedHelp,
    /// Finished
    Completed,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::NotStarted => "not started",
            Status::InProgress => "in progress",
            Status::Stuck => "stuck",
            Status::WaitingFor => "waiting for",
            Status::OnHold => "on hold",
            Status::NeedHelp => "need help",
            Status::Completed => "completed",
        };
        write!(f, "{}", label)
    }
}

/// Canonical task priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    /// Urgent work
    High,
    /// Default band
    #[default]
    Medium,
    /// Backlog band
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        write!(f, "{}", label)
    }
}

/// Status rules in precedence order. Lower-cased substring containment;
/// first match wins.
const STATUS_RULES: &[(&[&str], Status)] = &[
    (&["done", "complete"], Status::Completed),
    (&["progress", "ongoing"], Status::InProgress),
    (&["stuck"], Status::Stuck),
    (&["wait"], Status::WaitingFor),
    (&["hold"], Status::OnHold),
    (&["help"], Status::NeedHelp),
];

/// Classify a raw status label. Unrecognized labels default to
/// [`Status::NotStarted`]; "unknown" never propagates.
pub fn parse_status(label: &str) -> Status {
    let lowered = label.to_lowercase();
    for (needles, status) in STATUS_RULES {
        if needles.iter().any(|needle| lowered.contains(needle)) {
            return *status;
        }
    }
    Status::NotStarted
}

/// Priority rules in precedence order. Upper-cased substring containment.
const PRIORITY_RULES: &[(&[&str], Priority)] = &[
    (&["HIGH", "P1", "URGENT"], Priority::High),
    (&["LOW", "P3"], Priority::Low),
    (&["MEDIUM", "P2", "NORMAL"], Priority::Medium),
];

/// Classify a raw priority label. Unrecognized labels default to
/// [`Priority::Medium`].
pub fn parse_priority(label: &str) -> Priority {
    let raised = label.to_uppercase();
    for (needles, priority) in PRIORITY_RULES {
        if needles.iter().any(|needle| raised.contains(needle)) {
            return *priority;
        }
    }
    Priority::Medium
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_superstrings_resolve() {
        assert_eq!(parse_status("Done"), Status::Completed);
        assert_eq!(parse_status("DONE AND DUSTED"), Status::Completed);
        assert_eq!(parse_status("completed yesterday"), Status::Completed);
        assert_eq!(parse_status("In Progress"), Status::InProgress);
        assert_eq!(parse_status("work ongoing"), Status::InProgress);
        assert_eq!(parse_status("stuck on review"), Status::Stuck);
        assert_eq!(parse_status("waiting for legal"), Status::WaitingFor);
        assert_eq!(parse_status("on hold"), Status::OnHold);
        assert_eq!(parse_status("need help!"), Status::NeedHelp);
    }

    #[test]
    fn test_status_rule_precedence() {
        // A label matching two rules resolves to the earlier rule: the
        // done/complete rule is listed before the stuck rule.
        assert_eq!(parse_status("stuck but done"), Status::Completed);
        // And progress is listed before stuck.
        assert_eq!(parse_status("stuck in progress"), Status::InProgress);
    }

    #[test]
    fn test_status_default() {
        assert_eq!(parse_status("TODO"), Status::NotStarted);
        assert_eq!(parse_status(""), Status::NotStarted);
        assert_eq!(parse_status("???"), Status::NotStarted);
    }

    #[test]
    fn test_priority_bands() {
        assert_eq!(parse_priority("high"), Priority::High);
        assert_eq!(parse_priority("P1"), Priority::High);
        assert_eq!(parse_priority("urgent!!"), Priority::High);
        assert_eq!(parse_priority("low"), Priority::Low);
        assert_eq!(parse_priority("p3"), Priority::Low);
        assert_eq!(parse_priority("medium"), Priority::Medium);
        assert_eq!(parse_priority("normal"), Priority::Medium);
    }

    #[test]
    fn test_priority_default_is_medium() {
        assert_eq!(parse_priority("whenever"), Priority::Medium);
        assert_eq!(parse_priority(""), Priority::Medium);
    }
}
