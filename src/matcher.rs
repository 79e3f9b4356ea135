//! # Field Matcher
//!
//! Tests one relationship role against a raw record and a target value.
//! Missing or mistyped fields are simply "no match": the store's schema is
//! not contractually stable, so nothing here raises an error.

use crate::model::{FieldValue, IdentityComponent, RawRecord};
use crate::registry::{MatcherKind, RelationshipRole, NESTED_IDENTITY_KEYS};
use crate::utils::normalized_eq;

/// Check whether any of the role's alias fields matches the actor value
/// under the role's comparison rule.
pub fn matches(role: RelationshipRole, record: &RawRecord, actor_value: &str) -> bool {
    let binding = role.binding();
    binding.aliases.iter().any(|alias| {
        record
            .get(alias)
            .map(|value| value_matches(binding.matcher, binding.component, value, actor_value))
            .unwrap_or(false)
    })
}

fn value_matches(
    kind: MatcherKind,
    component: IdentityComponent,
    value: &FieldValue,
    actor_value: &str,
) -> bool {
    match kind {
        MatcherKind::Exact => scalar_eq(value, actor_value, false),
        MatcherKind::CaseInsensitiveExact => scalar_eq(value, actor_value, true),
        MatcherKind::ArrayContains => {
            let fold_case = component != IdentityComponent::Id;
            value
                .as_list()
                .map(|items| items.iter().any(|item| scalar_eq(item, actor_value, fold_case)))
                .unwrap_or(false)
        }
        MatcherKind::ArrayOfObjectsContains => value
            .as_list()
            .map(|items| {
                items
                    .iter()
                    .filter_map(FieldValue::as_record)
                    .any(|nested| object_matches(nested, actor_value))
            })
            .unwrap_or(false),
    }
}

fn scalar_eq(value: &FieldValue, actor_value: &str, fold_case: bool) -> bool {
    match value.comparable_text() {
        Some(text) if fold_case => normalized_eq(&text, actor_value),
        Some(text) => text == actor_value,
        None => false,
    }
}

/// A nested member object matches when any of the known identity sub-keys
/// holds the actor value. Comparison is normalized: member objects mix ids
/// and emails entered by hand, so recall wins over strictness here.
fn object_matches(nested: &RawRecord, actor_value: &str) -> bool {
    NESTED_IDENTITY_KEYS.iter().any(|sub_key| {
        nested
            .get(sub_key)
            .and_then(FieldValue::comparable_text)
            .map(|text| normalized_eq(&text, actor_value))
            .unwrap_or(false)
    })
}
