//! # Identity Resolver
//!
//! Decides whether a raw record belongs to an actor. Structured probing via
//! the candidate key registry runs first; when that is exhausted and the
//! actor has an email, a deep scan walks the whole record. The resolver is
//! deliberately permissive: records are frequently missing one of several
//! identifying fields, so any matching component claims ownership.

use crate::matcher;
use crate::model::{ActorIdentity, FieldValue, RawRecord};
use crate::registry::RelationshipRole;
use crate::utils::normalize_match_value;
use tracing::trace;

/// Resolution options. Deep scanning trades O(record size) cost for recall
/// and can be switched off by embedders that control their schema.
#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    /// Run the deep scan fallback when structured probing finds nothing
    pub deep_scan: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self { deep_scan: true }
    }
}

/// Check whether the record belongs to the actor, consulting the given
/// roles. Equivalent to [`is_owned_by_with`] with default options.
pub fn is_owned_by(
    actor: &ActorIdentity,
    record: &RawRecord,
    roles: &[RelationshipRole],
) -> bool {
    is_owned_by_with(actor, record, roles, ResolveOptions::default())
}

/// Check whether the record belongs to the actor.
///
/// Components are evaluated in priority order (id, email, display name) and
/// combined with OR: a record is owned if it matches any present component.
/// An identity with no components owns everything: absence of caller
/// identity means "do not filter". When structured probing finds no match
/// and the actor has an email, the deep scan fallback runs over every field
/// of the record.
pub fn is_owned_by_with(
    actor: &ActorIdentity,
    record: &RawRecord,
    roles: &[RelationshipRole],
    options: ResolveOptions,
) -> bool {
    let components = actor.components();
    if components.is_empty() {
        return true;
    }

    for (component, value) in &components {
        for role in roles {
            if !role.serves(*component) {
                continue;
            }
            if matcher::matches(*role, record, value) {
                trace!(role = %role, component = %component, "structured match");
                return true;
            }
        }
    }

    // Structured probing exhausted. Upstream schemas are not contractually
    // stable, so fall back to scanning the whole record, but only when the
    // actor has an email to anchor the search.
    if options.deep_scan && actor.email.is_some() {
        let targets: Vec<String> = components
            .iter()
            .map(|(_, value)| normalize_match_value(value))
            .collect();
        if deep_scan(record, &targets) {
            trace!("deep scan match");
            return true;
        }
    }

    false
}

/// Recursively search every field of the record for any of the normalized
/// target values. Scalars compare as case/whitespace-normalized exact
/// values; sequences and nested records are walked in full.
pub fn deep_scan(record: &RawRecord, normalized_targets: &[String]) -> bool {
    record
        .fields
        .values()
        .any(|value| value_contains(value, normalized_targets))
}

fn value_contains(value: &FieldValue, targets: &[String]) -> bool {
    match value {
        FieldValue::List(items) => items.iter().any(|item| value_contains(item, targets)),
        FieldValue::Record(nested) => deep_scan(nested, targets),
        scalar => scalar
            .comparable_text()
            .map(|text| {
                let normalized = normalize_match_value(&text);
                targets.iter().any(|target| *target == normalized)
            })
            .unwrap_or(false),
    }
}
