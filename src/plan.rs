//! # Subscription Planning
//!
//! Computes the set of change-feed subscriptions needed to cover every
//! relationship role relevant to an actor and entity kind. Only identity
//! components that are actually present root descriptors; an actor with
//! neither id nor email gets a single unfiltered scan.

use crate::model::{ActorIdentity, EntityKind, IdentityComponent, SourceKey};
use crate::registry::{MatcherKind, RelationshipRole};
use crate::store::FieldFilter;
use std::collections::HashSet;
use tracing::debug;

/// Describes one change-feed subscription the aggregator should open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionDescriptor {
    /// Bucket key for the subscription's contribution
    pub source: SourceKey,
    /// The role this subscription serves, when it serves exactly one
    pub filter_role: Option<RelationshipRole>,
    /// Server-side equality filter, when the role's matcher allows one
    pub filter: Option<FieldFilter>,
}

impl SubscriptionDescriptor {
    /// An unfiltered scan of the kind's collection
    pub fn unfiltered(kind: EntityKind) -> Self {
        Self {
            source: SourceKey::unfiltered(kind.collection()),
            filter_role: None,
            filter: None,
        }
    }
}

/// Compute the descriptors for one (actor, kind) aggregation.
///
/// Scalar-matched roles open one descriptor per alias key, each with a
/// server-side equality filter. Array-matched roles cannot be expressed as
/// a field-equality filter, so they open a single unfiltered descriptor per
/// role and rely on client-side resolution. Display names are too weak to
/// root subscriptions: an actor with neither id nor email falls back to one
/// unfiltered scan, with ownership resolved entirely client-side.
pub fn plan_subscriptions(actor: &ActorIdentity, kind: EntityKind) -> Vec<SubscriptionDescriptor> {
    let collection = kind.collection();
    let mut plan: Vec<SubscriptionDescriptor> = Vec::new();
    let mut seen: HashSet<SourceKey> = HashSet::new();

    for (component, value) in actor.components() {
        if component == IdentityComponent::DisplayName {
            continue;
        }
        for role in RelationshipRole::for_component(component) {
            match role.matcher() {
                MatcherKind::Exact | MatcherKind::CaseInsensitiveExact => {
                    for alias in role.aliases() {
                        let source = SourceKey::aliased(collection, alias);
                        if seen.insert(source.clone()) {
                            plan.push(SubscriptionDescriptor {
                                source,
                                filter_role: Some(role),
                                filter: Some(FieldFilter::new(*alias, value)),
                            });
                        }
                    }
                }
                MatcherKind::ArrayContains | MatcherKind::ArrayOfObjectsContains => {
                    let source = SourceKey::aliased(collection, role.primary_alias());
                    if seen.insert(source.clone()) {
                        plan.push(SubscriptionDescriptor {
                            source,
                            filter_role: Some(role),
                            filter: None,
                        });
                    }
                }
            }
        }
    }

    if plan.is_empty() {
        plan.push(SubscriptionDescriptor::unfiltered(kind));
    }

    debug!(
        actor_components = actor.components().len(),
        kind = %kind,
        descriptors = plan.len(),
        "subscription plan computed"
    );
    plan
}
