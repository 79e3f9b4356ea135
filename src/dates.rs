//! # Date Parsing
//!
//! Timestamps arrive from the store as native epoch values or as one of
//! many historical string spellings. Parsing attempts a fixed ordered list
//! of representations and the first success wins; the list order is a
//! tested contract. All instants are UTC epoch seconds.

use crate::model::FieldValue;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

/// A temporal instant as UTC epoch seconds
pub type Instant = i64;

/// Seconds in one day
pub const SECONDS_PER_DAY: Instant = 86_400;

/// Epoch values at or above this magnitude are taken to be milliseconds
const MILLIS_CUTOVER: i64 = 100_000_000_000;

/// Which date slot of an entity an instant fills. Each slot has its own
/// substitution when no representation parses: failing the whole mapping
/// over a malformed date would throw away an otherwise usable record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateRole {
    /// Start of work; defaults to the reference time
    Start,
    /// Deadline; defaults to the reference time plus seven days
    Due,
    /// Recurrence end; has no default (absence stays absent)
    RecurrenceEnd,
}

impl DateRole {
    /// The default instant substituted when nothing parses
    pub fn default_instant(&self, now: Instant) -> Option<Instant> {
        match self {
            DateRole::Start => Some(now),
            DateRole::Due => Some(now + 7 * SECONDS_PER_DAY),
            DateRole::RecurrenceEnd => None,
        }
    }
}

const YMD_HMS: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const YMD_T_HMS: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
const YMD_HM: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");
const YMD: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
const MDY_HM: &[BorrowedFormatItem<'static>] = format_description!(
    "[month padding:none]/[day padding:none]/[year] [hour padding:none]:[minute]"
);
const MDY: &[BorrowedFormatItem<'static>] =
    format_description!("[month padding:none]/[day padding:none]/[year]");
const DMY_DOTTED: &[BorrowedFormatItem<'static>] =
    format_description!("[day padding:none].[month padding:none].[year]");
const DMY_DASHED: &[BorrowedFormatItem<'static>] = format_description!("[day]-[month]-[year]");
const MON_D_Y: &[BorrowedFormatItem<'static>] =
    format_description!("[month repr:short] [day padding:none], [year]");

enum Pattern {
    DateTime(&'static [BorrowedFormatItem<'static>]),
    DateOnly(&'static [BorrowedFormatItem<'static>]),
}

/// String patterns in priority order, attempted after RFC 3339. Date-only
/// spellings resolve to midnight UTC.
const PATTERNS: &[Pattern] = &[
    Pattern::DateTime(YMD_HMS),
    Pattern::DateTime(YMD_T_HMS),
    Pattern::DateTime(YMD_HM),
    Pattern::DateOnly(YMD),
    Pattern::DateTime(MDY_HM),
    Pattern::DateOnly(MDY),
    Pattern::DateOnly(DMY_DOTTED),
    Pattern::DateOnly(DMY_DASHED),
    Pattern::DateOnly(MON_D_Y),
];

/// Parse a date/time string. Attempts RFC 3339 first, then each pattern in
/// [`PATTERNS`]; the first successful parse wins.
pub fn parse_instant_text(text: &str) -> Option<Instant> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(datetime) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Some(datetime.unix_timestamp());
    }

    for pattern in PATTERNS {
        match pattern {
            Pattern::DateTime(format) => {
                if let Ok(datetime) = PrimitiveDateTime::parse(trimmed, format) {
                    return Some(datetime.assume_utc().unix_timestamp());
                }
            }
            Pattern::DateOnly(format) => {
                if let Ok(date) = Date::parse(trimmed, format) {
                    return Some(date.midnight().assume_utc().unix_timestamp());
                }
            }
        }
    }

    None
}

/// Extract an instant from a dynamically-typed field value. Native epoch
/// values win over string spellings; millisecond epochs are detected by
/// magnitude and divided down.
pub fn instant_from_value(value: &FieldValue) -> Option<Instant> {
    match value {
        FieldValue::Timestamp(raw) => Some(scale_epoch(*raw)),
        FieldValue::Number(raw) => {
            if raw.is_finite() {
                Some(scale_epoch(*raw as i64))
            } else {
                None
            }
        }
        FieldValue::Text(text) => parse_instant_text(text),
        _ => None,
    }
}

fn scale_epoch(raw: i64) -> Instant {
    if raw.abs() >= MILLIS_CUTOVER {
        raw / 1000
    } else {
        raw
    }
}
