//! Principal store operations to delete records.
use uuid::Uuid;

use fleetcore_models::GroupEntry;
use fleetcore_models::RoleEntry;

use self::seal::SealDeleteOp;

/// Internal trait to enable delete operations on the principal store.
pub trait DeleteOp: Into<DeleteOps> + SealDeleteOp {
    /// Type returned by the matching delete operation.
    type Response: From<DeleteResponses>;
}

/// List of all delete operations the principal store must implement.
pub enum DeleteOps {
    /// Delete a group by UUID.
    Group(DeleteGroup),

    /// Delete a role by UUID.
    Role(DeleteRole),
}

/// List of all responses from delete operations.
pub enum DeleteResponses {
    /// The operation completed successfully and does not return data.
    Success,
}

// --- High level delete operations --- //
/// Request deletion of a [`GroupEntry`] record.
pub struct DeleteGroup {
    /// UUID of the [`GroupEntry`] record to delete.
    pub uuid: Uuid,
}
impl From<&GroupEntry> for DeleteGroup {
    fn from(value: &GroupEntry) -> Self {
        DeleteGroup { uuid: value.uuid }
    }
}

/// Request deletion of a [`RoleEntry`] record.
pub struct DeleteRole {
    /// UUID of the [`RoleEntry`] record to delete.
    pub uuid: Uuid,
}
impl From<&RoleEntry> for DeleteRole {
    fn from(value: &RoleEntry) -> Self {
        DeleteRole { uuid: value.uuid }
    }
}

// --- Create internal implementation details follow --- //
/// Private module to seal implementation details.
mod seal {
    /// Super-trait to seal the [`DeleteOp`](super::DeleteOp) trait.
    pub trait SealDeleteOp {}
}

// --- Implement DeleteOp and super traits on types for transparent operations --- //
impl DeleteOp for DeleteGroup {
    type Response = ();
}
impl SealDeleteOp for DeleteGroup {}
impl From<DeleteGroup> for DeleteOps {
    fn from(value: DeleteGroup) -> Self {
        DeleteOps::Group(value)
    }
}

impl DeleteOp for &GroupEntry {
    type Response = ();
}
impl SealDeleteOp for &GroupEntry {}
impl From<&GroupEntry> for DeleteOps {
    fn from(value: &GroupEntry) -> Self {
        DeleteOps::Group(DeleteGroup::from(value))
    }
}

impl DeleteOp for DeleteRole {
    type Response = ();
}
impl SealDeleteOp for DeleteRole {}
impl From<DeleteRole> for DeleteOps {
    fn from(value: DeleteRole) -> Self {
        DeleteOps::Role(value)
    }
}

impl DeleteOp for &RoleEntry {
    type Response = ();
}
impl SealDeleteOp for &RoleEntry {}
impl From<&RoleEntry> for DeleteOps {
    fn from(value: &RoleEntry) -> Self {
        DeleteOps::Role(DeleteRole::from(value))
    }
}

// --- Implement DeleteResponses conversions on return types for transparent operations --- //
impl From<DeleteResponses> for () {
    fn from(value: DeleteResponses) -> Self {
        match value {
            DeleteResponses::Success => (),
        }
    }
}
