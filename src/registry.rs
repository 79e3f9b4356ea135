//! # Candidate Key Registry
//!
//! Static, per-relationship ordered lists of alias field names. Years of
//! schema drift mean the same logical relationship is stored under many
//! historical key names; each [`RelationshipRole`] binds an ordered alias
//! list to the identity component it consumes and to a matcher kind.

use crate::model::IdentityComponent;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a role's alias fields are compared against an actor value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatcherKind {
    /// Exact string equality
    Exact,
    /// Case-insensitive string equality
    CaseInsensitiveExact,
    /// The field is a sequence and contains the value
    ArrayContains,
    /// The field is a sequence of nested records and any element has a
    /// sub-field (from [`NESTED_IDENTITY_KEYS`]) equal to the value
    ArrayOfObjectsContains,
}

/// A named ownership relationship bound to its historical field aliases.
///
/// The variants are a closed set: new alias spellings are added to the
/// tables below, not as new variants, unless they express a genuinely new
/// relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipRole {
    /// Record assigned to the actor, keyed by internal id
    AssigneeById,
    /// Record assigned to the actor, keyed by email
    AssigneeByEmail,
    /// Record assigned to the actor, keyed by display name
    AssigneeByName,
    /// Record created by the actor, keyed by internal id
    CreatorById,
    /// Record created by the actor, keyed by email
    CreatorByEmail,
    /// Actor appears in a member/watcher id array
    MemberArrayById,
    /// Actor appears in a member/collaborator email array
    MemberArrayByEmail,
    /// Actor appears in an array of nested member objects
    MemberObjects,
}

/// Sub-keys probed inside nested member objects, in priority order
pub const NESTED_IDENTITY_KEYS: &[&str] = &[
    "id", "uid", "userId", "user_id", "memberId", "email", "mail", "address",
];

/// The static binding of one role: component consumed, comparison rule, and
/// the ordered alias list
#[derive(Debug, Clone, Copy)]
pub struct RoleBinding {
    /// Identity component this role consumes
    pub component: IdentityComponent,
    /// Comparison rule for the aliased fields
    pub matcher: MatcherKind,
    /// Historical field-name aliases, most common first
    pub aliases: &'static [&'static str],
}

impl RelationshipRole {
    /// All roles, in evaluation order
    pub const ALL: &'static [RelationshipRole] = &[
        RelationshipRole::AssigneeById,
        RelationshipRole::AssigneeByEmail,
        RelationshipRole::AssigneeByName,
        RelationshipRole::CreatorById,
        RelationshipRole::CreatorByEmail,
        RelationshipRole::MemberArrayById,
        RelationshipRole::MemberArrayByEmail,
        RelationshipRole::MemberObjects,
    ];

    /// The static binding for this role
    pub fn binding(&self) -> RoleBinding {
        match self {
            RelationshipRole::AssigneeById => RoleBinding {
                component: IdentityComponent::Id,
                matcher: MatcherKind::Exact,
                aliases: &[
                    "assigneeId",
                    "assignee_id",
                    "assignedTo",
                    "assigned_to",
                    "assignedToId",
                    "ownerId",
                    "owner_id",
                    "userId",
                    "user_id",
                    "responsibleId",
                    "memberId",
                    "staffId",
                ],
            },
            RelationshipRole::AssigneeByEmail => RoleBinding {
                component: IdentityComponent::Email,
                matcher: MatcherKind::CaseInsensitiveExact,
                aliases: &[
                    "assigneeEmail",
                    "assignee_email",
                    "assignedEmail",
                    "assignedToEmail",
                    "ownerEmail",
                    "owner_email",
                    "userEmail",
                    "responsibleEmail",
                    "email",
                ],
            },
            RelationshipRole::AssigneeByName => RoleBinding {
                component: IdentityComponent::DisplayName,
                matcher: MatcherKind::CaseInsensitiveExact,
                aliases: &[
                    "assigneeName",
                    "assignee_name",
                    "assignedToName",
                    "ownerName",
                    "responsible",
                    "assignee",
                ],
            },
            RelationshipRole::CreatorById => RoleBinding {
                component: IdentityComponent::Id,
                matcher: MatcherKind::Exact,
                aliases: &[
                    "creatorId",
                    "creator_id",
                    "createdById",
                    "authorId",
                    "reporterId",
                ],
            },
            RelationshipRole::CreatorByEmail => RoleBinding {
                component: IdentityComponent::Email,
                matcher: MatcherKind::CaseInsensitiveExact,
                aliases: &[
                    "creatorEmail",
                    "creator_email",
                    "createdBy",
                    "created_by",
                    "authorEmail",
                    "reporterEmail",
                    "requesterEmail",
                ],
            },
            RelationshipRole::MemberArrayById => RoleBinding {
                component: IdentityComponent::Id,
                matcher: MatcherKind::ArrayContains,
                aliases: &[
                    "memberIds",
                    "member_ids",
                    "assigneeIds",
                    "watcherIds",
                    "userIds",
                    "participantIds",
                ],
            },
            RelationshipRole::MemberArrayByEmail => RoleBinding {
                component: IdentityComponent::Email,
                matcher: MatcherKind::ArrayContains,
                aliases: &[
                    "memberEmails",
                    "member_emails",
                    "assigneeEmails",
                    "watcherEmails",
                    "sharedWith",
                    "shared_with",
                    "invitees",
                ],
            },
            RelationshipRole::MemberObjects => RoleBinding {
                component: IdentityComponent::Email,
                matcher: MatcherKind::ArrayOfObjectsContains,
                aliases: &[
                    "members",
                    "assignees",
                    "watchers",
                    "collaborators",
                    "participants",
                    "team",
                ],
            },
        }
    }

    /// The identity component this role consumes
    pub fn component(&self) -> IdentityComponent {
        self.binding().component
    }

    /// The comparison rule for this role
    pub fn matcher(&self) -> MatcherKind {
        self.binding().matcher
    }

    /// The ordered alias list for this role
    pub fn aliases(&self) -> &'static [&'static str] {
        self.binding().aliases
    }

    /// The primary (most common) alias, used when a store filter needs one
    /// concrete field name
    pub fn primary_alias(&self) -> &'static str {
        self.binding().aliases[0]
    }

    /// Whether this role can match the given identity component.
    ///
    /// `MemberObjects` probes nested objects for both ids and emails, so it
    /// serves either component.
    pub fn serves(&self, component: IdentityComponent) -> bool {
        self.component() == component
            || (*self == RelationshipRole::MemberObjects && component == IdentityComponent::Id)
    }

    /// Roles that can match the given identity component, in evaluation
    /// order
    pub fn for_component(component: IdentityComponent) -> Vec<RelationshipRole> {
        Self::ALL
            .iter()
            .copied()
            .filter(|role| role.serves(component))
            .collect()
    }
}

impl fmt::Display for RelationshipRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelationshipRole::AssigneeById => "assignee-by-id",
            RelationshipRole::AssigneeByEmail => "assignee-by-email",
            RelationshipRole::AssigneeByName => "assignee-by-name",
            RelationshipRole::CreatorById => "creator-by-id",
            RelationshipRole::CreatorByEmail => "creator-by-email",
            RelationshipRole::MemberArrayById => "member-array-by-id",
            RelationshipRole::MemberArrayByEmail => "member-array-by-email",
            RelationshipRole::MemberObjects => "member-objects",
        };
        write!(f, "{}", name)
    }
}
