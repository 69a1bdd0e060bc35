//! Relation tuples and filters to match them.
use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use uuid::Uuid;

use super::Relation;
use super::Resource;
use super::ResourceKind;

/// The object side of a relation tuple.
///
/// An entity is either a plain [`Resource`] (`user:alice`) or a userset: every object
/// holding `relation` to the resource (`group:<uuid>#member`).
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Entity {
    pub resource: Resource,
    pub relation: Option<Relation>,
}

impl Entity {
    /// Userset of all assignees of a role.
    pub fn assignees(role: Uuid) -> Entity {
        Entity::userset(Resource::Role(role), Relation::Assignee)
    }

    /// Userset of all members of a group.
    pub fn members(group: Uuid) -> Entity {
        Entity::userset(Resource::Group(group), Relation::Member)
    }

    /// Userset of all objects holding `relation` to `resource`.
    pub fn userset(resource: Resource, relation: Relation) -> Entity {
        Entity {
            resource,
            relation: Some(relation),
        }
    }
}

impl From<Resource> for Entity {
    fn from(resource: Resource) -> Self {
        Entity {
            resource,
            relation: None,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.relation {
            None => write!(f, "{}", self.resource),
            Some(relation) => write!(f, "{}#{}", self.resource, relation),
        }
    }
}

impl FromStr for Entity {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.split_once('#') {
            None => Ok(Entity::from(Resource::from_str(value)?)),
            Some((resource, relation)) => Ok(Entity::userset(
                Resource::from_str(resource)?,
                Relation::from_str(relation)?,
            )),
        }
    }
}

/// A grant in the authorization graph: `object` holds `relation` to `target`.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Tuple {
    pub object: Entity,
    pub relation: Relation,
    pub target: Resource,
}

impl Tuple {
    /// Create a new tuple from any entity-like object.
    pub fn new<E>(object: E, relation: Relation, target: Resource) -> Tuple
    where
        E: Into<Entity>,
    {
        Tuple {
            object: object.into(),
            relation,
            target,
        }
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", self.object, self.relation, self.target)
    }
}

/// Partial tuple pattern to scan the authorization graph with.
///
/// The target must always be constrained, at least by kind.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TupleFilter {
    pub object: Option<Entity>,
    pub relation: Option<Relation>,
    pub target: TargetFilter,
}

impl TupleFilter {
    /// Match all tuples pointing at the exact target resource.
    pub fn target(target: Resource) -> TupleFilter {
        TupleFilter {
            object: None,
            relation: None,
            target: TargetFilter::Exact(target),
        }
    }

    /// Check if a tuple matches the filter.
    pub fn matches(&self, tuple: &Tuple) -> bool {
        if let Some(object) = &self.object {
            if object != &tuple.object {
                return false;
            }
        }
        if let Some(relation) = self.relation {
            if relation != tuple.relation {
                return false;
            }
        }
        match &self.target {
            TargetFilter::Exact(target) => target == &tuple.target,
            TargetFilter::Kind(kind) => *kind == tuple.target.kind(),
        }
    }
}

/// How the target side of a [`TupleFilter`] is constrained.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TargetFilter {
    /// Match a specific target resource.
    Exact(Resource),

    /// Match any target of the given kind.
    Kind(ResourceKind),
}
