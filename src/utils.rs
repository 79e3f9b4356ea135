//! # Utilities Module
//!
//! Small shared helpers for value normalization and day-granularity
//! timestamps used by matching and dedup keys.

use time::OffsetDateTime;

/// Normalize a value for comparison: trim surrounding whitespace and
/// lower-case. Used wherever two loosely-entered strings must compare equal.
pub fn normalize_match_value(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Check two strings for equality after normalization
pub fn normalized_eq(left: &str, right: &str) -> bool {
    normalize_match_value(left) == normalize_match_value(right)
}

/// Collapse a title into the form used inside content-derived dedup keys:
/// normalized, with internal whitespace runs reduced to single spaces.
pub fn normalize_title_key(title: &str) -> String {
    normalize_match_value(title)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render an epoch-seconds instant as a day-granularity stamp (`YYYY-MM-DD`,
/// UTC). Instants that fall outside the representable calendar range render
/// as the raw number, which still yields a stable key.
pub fn day_stamp(instant: i64) -> String {
    match OffsetDateTime::from_unix_timestamp(instant) {
        Ok(datetime) => {
            let date = datetime.date();
            format!("{:04}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day())
        }
        Err(_) => instant.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_match_value() {
        assert_eq!(normalize_match_value("  U1@X.com "), "u1@x.com");
        assert!(normalized_eq("Alice ", " ALICE"));
        assert!(!normalized_eq("alice", "bob"));
    }

    #[test]
    fn test_normalize_title_key() {
        assert_eq!(normalize_title_key("  Fix   the  Bug "), "fix the bug");
    }

    #[test]
    fn test_day_stamp() {
        // 2026-01-15T12:30:00Z
        assert_eq!(day_stamp(1_768_480_200), "2026-01-15");
        // Same day, different time of day
        assert_eq!(day_stamp(1_768_435_200), "2026-01-15");
    }
}
