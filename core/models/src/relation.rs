//! Relations an object can hold towards a target.
use std::fmt;
use std::str::FromStr;

use anyhow::Result;

use fleetcore_errors::Validation;

/// Named relation between an object and a target in the authorization graph.
///
/// The graph does not imply weaker relations from stronger ones (an `administrator`
/// is not automatically a `reader`): callers encode precedence themselves.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Relation {
    Administrator,
    Assignee,
    AuditLogViewer,
    CanAddModel,
    Consumer,
    Controller,
    Member,
    Model,
    Reader,
    Writer,
}

impl Relation {
    const ALL: [Relation; 10] = [
        Relation::Administrator,
        Relation::Assignee,
        Relation::AuditLogViewer,
        Relation::CanAddModel,
        Relation::Consumer,
        Relation::Controller,
        Relation::Member,
        Relation::Model,
        Relation::Reader,
        Relation::Writer,
    ];

    /// Name of the relation in the authorization graph.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Administrator => "administrator",
            Self::Assignee => "assignee",
            Self::AuditLogViewer => "audit_log_viewer",
            Self::CanAddModel => "can_addmodel",
            Self::Consumer => "consumer",
            Self::Controller => "controller",
            Self::Member => "member",
            Self::Model => "model",
            Self::Reader => "reader",
            Self::Writer => "writer",
        }
    }

    /// Map an access level name, as requested by clients, to the relation granting it.
    ///
    /// Relation names are accepted as well so callers can ask for any relation directly.
    pub fn from_access(access: &str) -> Result<Relation> {
        let relation = match access {
            "admin" | "superuser" => Relation::Administrator,
            "add-model" => Relation::CanAddModel,
            "consume" => Relation::Consumer,
            "read" => Relation::Reader,
            "write" => Relation::Writer,
            other => Relation::from_str(other)?,
        };
        Ok(relation)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Relation {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        Relation::ALL
            .into_iter()
            .find(|relation| relation.as_str() == value)
            .ok_or_else(|| anyhow::anyhow!(Validation::new(format!("unknown relation '{value}'"))))
    }
}
