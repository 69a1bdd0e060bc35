//! Atomic multi-step operations on the principal store.
//!
//! Transactions run a synchronous callback against a [`StoreTransaction`].
//! Changes made by the callback are committed only if it returns `Ok`;
//! any error rolls back all changes made within the transaction.
use anyhow::Result;
use uuid::Uuid;

use fleetcore_models::GroupEntry;
use fleetcore_models::RoleEntry;

use crate::ids::PrincipalKey;

/// Operations available to callbacks running within a store transaction.
pub trait StoreTransaction {
    /// Delete a group by UUID, ignoring missing groups.
    fn delete_group(&mut self, uuid: &Uuid) -> Result<()>;

    /// Delete a role by UUID, ignoring missing roles.
    fn delete_role(&mut self, uuid: &Uuid) -> Result<()>;

    /// Lookup a group by name or UUID.
    fn lookup_group(&mut self, key: &PrincipalKey) -> Result<Option<GroupEntry>>;

    /// Lookup a role by name or UUID.
    fn lookup_role(&mut self, key: &PrincipalKey) -> Result<Option<RoleEntry>>;

    /// Update the name of the group with the given UUID.
    ///
    /// Names already used by another group result in an
    /// [`AlreadyExists`](fleetcore_errors::AlreadyExists) error.
    fn update_group_name(&mut self, group: &GroupEntry) -> Result<()>;

    /// Update the name of the role with the given UUID.
    ///
    /// Names already used by another role result in an
    /// [`AlreadyExists`](fleetcore_errors::AlreadyExists) error.
    fn update_role_name(&mut self, role: &RoleEntry) -> Result<()>;
}

/// Type erased transaction callback passed to [`StoreBackend`](crate::StoreBackend)s.
pub type TransactionFn = Box<dyn FnOnce(&mut dyn StoreTransaction) -> Result<()> + Send>;
