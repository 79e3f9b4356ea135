//! # Data Model
//!
//! Core data structures for record-access resolution: schema-less raw
//! records as delivered by the remote store, the caller's identity, and the
//! identifiers shared across the crate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A dynamically-typed field value inside a raw record.
///
/// The remote store is schema-less: a field may hold a scalar, an ordered
/// sequence of scalars, or an ordered sequence of nested records. Arrays of
/// objects are represented as `List` of `Record`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Boolean scalar
    Bool(bool),
    /// Epoch-seconds timestamp scalar (any integral number deserializes here)
    Timestamp(i64),
    /// Numeric scalar (the store does not distinguish int from float)
    Number(f64),
    /// String scalar
    Text(String),
    /// Ordered sequence of values
    List(Vec<FieldValue>),
    /// Nested record
    Record(RawRecord),
}

impl FieldValue {
    /// Get the string content if this value is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    /// Get the numeric content if this value is a number or timestamp
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(value) => Some(*value),
            FieldValue::Timestamp(value) => Some(*value as f64),
            _ => None,
        }
    }

    /// Get the elements if this value is a sequence
    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Get the nested record if this value is one
    pub fn as_record(&self) -> Option<&RawRecord> {
        match self {
            FieldValue::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Render the scalar as a string for comparison purposes.
    ///
    /// Whole numbers render without a fractional part so that a numeric id
    /// `42` compares equal to the actor id `"42"`. Sequences and nested
    /// records have no scalar form.
    pub fn comparable_text(&self) -> Option<String> {
        match self {
            FieldValue::Text(text) => Some(text.clone()),
            FieldValue::Bool(value) => Some(value.to_string()),
            FieldValue::Timestamp(value) => Some(value.to_string()),
            FieldValue::Number(value) => {
                if value.fract() == 0.0 && value.abs() < 9e15 {
                    Some(format!("{}", *value as i64))
                } else {
                    Some(value.to_string())
                }
            }
            FieldValue::List(_) | FieldValue::Record(_) => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Timestamp(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// A schema-less record as delivered by the remote store.
///
/// Field names map to dynamically-typed values. Records are immutable for
/// the duration of one mapping pass; the builder-style `with` is only used
/// when constructing fixtures and store payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord {
    /// Field name to value
    pub fields: BTreeMap<String, FieldValue>,
}

impl RawRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field, returning self for chained construction
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Get a field value by name
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Get a field's text content, if the field exists and is text
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    /// Get a field's numeric content, if the field exists and is numeric
    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(FieldValue::as_number)
    }

    /// Get a field's elements, if the field exists and is a sequence
    pub fn list(&self, name: &str) -> Option<&[FieldValue]> {
        self.get(name).and_then(FieldValue::as_list)
    }

    /// Get a nested record, if the field exists and holds one
    pub fn nested(&self, name: &str) -> Option<&RawRecord> {
        self.get(name).and_then(FieldValue::as_record)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check whether the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// The caller's known identifying attributes.
///
/// Any subset of the components may be absent. An identity with no
/// components at all resolves every record as owned: absence of caller
/// identity means "do not filter", not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorIdentity {
    /// Internal user id
    pub id: Option<String>,
    /// Email address
    pub email: Option<String>,
    /// Display name
    pub display_name: Option<String>,
}

impl ActorIdentity {
    /// Create an identity with no components (matches everything)
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Create an identity from an internal id
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Create an identity from an email address
    pub fn with_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Self::default()
        }
    }

    /// Set the email address
    pub fn and_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the display name
    pub fn and_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Check whether no identity component is present
    pub fn is_anonymous(&self) -> bool {
        self.id.is_none() && self.email.is_none() && self.display_name.is_none()
    }

    /// Component values in priority order: id, then email, then display name
    pub fn components(&self) -> Vec<(IdentityComponent, &str)> {
        let mut present = Vec::new();
        if let Some(id) = self.id.as_deref() {
            present.push((IdentityComponent::Id, id));
        }
        if let Some(email) = self.email.as_deref() {
            present.push((IdentityComponent::Email, email));
        }
        if let Some(name) = self.display_name.as_deref() {
            present.push((IdentityComponent::DisplayName, name));
        }
        present
    }
}

/// One component of an actor identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentityComponent {
    /// Internal user id
    Id,
    /// Email address
    Email,
    /// Display name
    DisplayName,
}

impl fmt::Display for IdentityComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityComponent::Id => write!(f, "id"),
            IdentityComponent::Email => write!(f, "email"),
            IdentityComponent::DisplayName => write!(f, "display-name"),
        }
    }
}

/// The business object kind a record is projected into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    /// Standalone work item (the richest projection)
    #[default]
    Task,
    /// Child item of a task
    Subtask,
    /// Date-anchored marker item
    Milestone,
}

impl EntityKind {
    /// The store collection records of this kind live in
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Task => "tasks",
            EntityKind::Subtask => "subtasks",
            EntityKind::Milestone => "milestones",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Task => write!(f, "task"),
            EntityKind::Subtask => write!(f, "subtask"),
            EntityKind::Milestone => write!(f, "milestone"),
        }
    }
}

/// Identifies one change-feed source (collection plus alias discriminator)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceKey(pub String);

impl SourceKey {
    /// Create a source key for a filtered alias query on a collection
    pub fn aliased(collection: &str, alias: &str) -> Self {
        Self(format!("{}#{}", collection, alias))
    }

    /// Create a source key for an unfiltered collection scan
    pub fn unfiltered(collection: &str) -> Self {
        Self(format!("{}#all", collection))
    }

    /// The collection portion of the key
    pub fn collection(&self) -> &str {
        self.0.split('#').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
