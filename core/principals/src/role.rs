//! Roles identities are assigned to.
use anyhow::Result;
use uuid::Uuid;

use fleetcore_models::Relation;
use fleetcore_models::Resource;
use fleetcore_models::RoleEntry;
use fleetcore_store::delete::DeleteRole;
use fleetcore_store::ids::PrincipalKey;
use fleetcore_store::query::CountRoles;
use fleetcore_store::query::ListPrincipals;
use fleetcore_store::query::ListRoles;
use fleetcore_store::query::LookupRole;
use fleetcore_store::transaction::StoreTransaction;

use crate::principal::seal::SealPrincipal;
use crate::Principal;
use crate::PrincipalManager;

/// Add, rename, remove and list the roles identities can be assigned to.
pub type RoleManager = PrincipalManager<RoleEntry>;

impl SealPrincipal for RoleEntry {}
impl Principal for RoleEntry {
    const KIND: &'static str = "role";
    const USERSET: Relation = Relation::Assignee;

    type Count = CountRoles;
    type Delete = DeleteRole;
    type List = ListRoles;
    type Lookup = LookupRole;

    fn create(name: &str) -> Self {
        RoleEntry::new(name)
    }

    fn count() -> CountRoles {
        CountRoles
    }

    fn delete(&self) -> DeleteRole {
        DeleteRole::from(self)
    }

    fn list(op: ListPrincipals) -> ListRoles {
        ListRoles(op)
    }

    fn lookup(key: PrincipalKey) -> LookupRole {
        LookupRole(key)
    }

    fn lookup_tx(tx: &mut dyn StoreTransaction, key: &PrincipalKey) -> Result<Option<Self>> {
        tx.lookup_role(key)
    }

    fn rename_tx(tx: &mut dyn StoreTransaction, entry: &Self) -> Result<()> {
        tx.update_role_name(entry)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn resource(&self) -> Resource {
        RoleEntry::resource(self)
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn uuid(&self) -> Uuid {
        self.uuid
    }
}
