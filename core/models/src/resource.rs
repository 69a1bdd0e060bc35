//! Resources that can be the subject or target of relations.
use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use uuid::Uuid;

use fleetcore_errors::Validation;

/// Kinds of resources known to the authorization graph.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ResourceKind {
    ApplicationOffer,
    Cloud,
    Controller,
    Group,
    Model,
    Role,
    ServiceAccount,
    User,
}

impl ResourceKind {
    /// All resource kinds, useful to scan the graph by target kind.
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::ApplicationOffer,
        ResourceKind::Cloud,
        ResourceKind::Controller,
        ResourceKind::Group,
        ResourceKind::Model,
        ResourceKind::Role,
        ResourceKind::ServiceAccount,
        ResourceKind::User,
    ];

    /// Name of the kind, as used in both tag and graph forms.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApplicationOffer => "applicationoffer",
            Self::Cloud => "cloud",
            Self::Controller => "controller",
            Self::Group => "group",
            Self::Model => "model",
            Self::Role => "role",
            Self::ServiceAccount => "serviceaccount",
            Self::User => "user",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let kind = ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value);
        match kind {
            Some(kind) => Ok(kind),
            None => anyhow::bail!(Validation::new(format!("unknown resource kind '{value}'"))),
        }
    }
}

/// A resource addressable by the authorization graph, with a kind specific identifier.
///
/// Resources have two string forms:
///
/// - The tag form (`model-<uuid>`) is stable and used in capability token claims.
/// - The graph form (`model:<uuid>`) is used by the relation store.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Resource {
    ApplicationOffer(Uuid),
    Cloud(String),
    Controller(Uuid),
    Group(Uuid),
    Model(Uuid),
    Role(Uuid),
    ServiceAccount(String),
    User(String),
}

impl Resource {
    /// Build a resource from its kind and string identifier.
    pub fn from_parts(kind: ResourceKind, id: &str) -> Result<Resource> {
        if id.is_empty() {
            anyhow::bail!(Validation::new(format!("empty {kind} identifier")));
        }
        let uuid = || {
            Uuid::parse_str(id).map_err(|_| {
                anyhow::anyhow!(Validation::new(format!("invalid {kind} identifier '{id}'")))
            })
        };
        let resource = match kind {
            ResourceKind::ApplicationOffer => Resource::ApplicationOffer(uuid()?),
            ResourceKind::Cloud => Resource::Cloud(id.to_string()),
            ResourceKind::Controller => Resource::Controller(uuid()?),
            ResourceKind::Group => Resource::Group(uuid()?),
            ResourceKind::Model => Resource::Model(uuid()?),
            ResourceKind::Role => Resource::Role(uuid()?),
            ResourceKind::ServiceAccount => Resource::ServiceAccount(id.to_string()),
            ResourceKind::User => Resource::User(id.to_string()),
        };
        Ok(resource)
    }

    /// Identifier of the resource, without the kind.
    pub fn id(&self) -> String {
        match self {
            Resource::ApplicationOffer(id)
            | Resource::Controller(id)
            | Resource::Group(id)
            | Resource::Model(id)
            | Resource::Role(id) => id.to_string(),
            Resource::Cloud(id) | Resource::ServiceAccount(id) | Resource::User(id) => id.clone(),
        }
    }

    /// Kind of the resource.
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::ApplicationOffer(_) => ResourceKind::ApplicationOffer,
            Resource::Cloud(_) => ResourceKind::Cloud,
            Resource::Controller(_) => ResourceKind::Controller,
            Resource::Group(_) => ResourceKind::Group,
            Resource::Model(_) => ResourceKind::Model,
            Resource::Role(_) => ResourceKind::Role,
            Resource::ServiceAccount(_) => ResourceKind::ServiceAccount,
            Resource::User(_) => ResourceKind::User,
        }
    }

    /// Parse a resource from its tag form (`kind-id`).
    pub fn parse_tag(tag: &str) -> Result<Resource> {
        let (kind, id) = tag
            .split_once('-')
            .ok_or_else(|| anyhow::anyhow!(Validation::new(format!("invalid tag '{tag}'"))))?;
        let kind = ResourceKind::from_str(kind)?;
        Resource::from_parts(kind, id)
    }

    /// Render the resource in its tag form (`kind-id`).
    pub fn tag(&self) -> String {
        format!("{}-{}", self.kind(), self.id())
    }
}

/// Render the resource in its graph form (`kind:id`).
impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

/// Parse a resource from its graph form (`kind:id`).
impl FromStr for Resource {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let (kind, id) = value.split_once(':').ok_or_else(|| {
            anyhow::anyhow!(Validation::new(format!("invalid resource '{value}'")))
        })?;
        let kind = ResourceKind::from_str(kind)?;
        Resource::from_parts(kind, id)
    }
}
