//! Principal store operations to persist new records.
use fleetcore_models::GroupEntry;
use fleetcore_models::RoleEntry;

use self::seal::SealPersistOp;

/// Internal trait to enable persist operations on the principal store.
pub trait PersistOp: Into<PersistOps> + SealPersistOp {
    /// Type returned by the matching persist operation.
    type Response: From<PersistResponses>;
}

/// List of all persist operations the principal store must implement.
///
/// Persisting a record whose name is already in use must fail with an
/// [`AlreadyExists`](fleetcore_errors::AlreadyExists) error.
pub enum PersistOps {
    /// Insert a new group record.
    Group(GroupEntry),

    /// Insert a new role record.
    Role(RoleEntry),
}

/// List of all responses from persist operations.
pub enum PersistResponses {
    /// The stored group, with its store assigned ID.
    Group(GroupEntry),

    /// The stored role, with its store assigned ID.
    Role(RoleEntry),
}

// --- Create internal implementation details follow --- //
/// Private module to seal implementation details.
mod seal {
    /// Super-trait to seal the [`PersistOp`](super::PersistOp) trait.
    pub trait SealPersistOp {}
}

// --- Implement PersistOp and super traits on types for transparent operations --- //
impl PersistOp for GroupEntry {
    type Response = GroupEntry;
}
impl SealPersistOp for GroupEntry {}
impl From<GroupEntry> for PersistOps {
    fn from(value: GroupEntry) -> Self {
        PersistOps::Group(value)
    }
}

impl PersistOp for RoleEntry {
    type Response = RoleEntry;
}
impl SealPersistOp for RoleEntry {}
impl From<RoleEntry> for PersistOps {
    fn from(value: RoleEntry) -> Self {
        PersistOps::Role(value)
    }
}

// --- Implement PersistResponses conversions on return types for transparent operations --- //
impl From<PersistResponses> for GroupEntry {
    fn from(value: PersistResponses) -> Self {
        match value {
            PersistResponses::Group(group) => group,
            _ => panic!("unexpected result type for the given persist operation"),
        }
    }
}
impl From<PersistResponses> for RoleEntry {
    fn from(value: PersistResponses) -> Self {
        match value {
            PersistResponses::Role(role) => role,
            _ => panic!("unexpected result type for the given persist operation"),
        }
    }
}
