//! Groups of identities.
use anyhow::Result;
use uuid::Uuid;

use fleetcore_models::GroupEntry;
use fleetcore_models::Relation;
use fleetcore_models::Resource;
use fleetcore_store::delete::DeleteGroup;
use fleetcore_store::ids::PrincipalKey;
use fleetcore_store::query::CountGroups;
use fleetcore_store::query::ListGroups;
use fleetcore_store::query::ListPrincipals;
use fleetcore_store::query::LookupGroup;
use fleetcore_store::transaction::StoreTransaction;

use crate::principal::seal::SealPrincipal;
use crate::Principal;
use crate::PrincipalManager;

/// Add, rename, remove and list groups of identities.
pub type GroupManager = PrincipalManager<GroupEntry>;

impl SealPrincipal for GroupEntry {}
impl Principal for GroupEntry {
    const KIND: &'static str = "group";
    const USERSET: Relation = Relation::Member;

    type Count = CountGroups;
    type Delete = DeleteGroup;
    type List = ListGroups;
    type Lookup = LookupGroup;

    fn create(name: &str) -> Self {
        GroupEntry::new(name)
    }

    fn count() -> CountGroups {
        CountGroups
    }

    fn delete(&self) -> DeleteGroup {
        DeleteGroup::from(self)
    }

    fn list(op: ListPrincipals) -> ListGroups {
        ListGroups(op)
    }

    fn lookup(key: PrincipalKey) -> LookupGroup {
        LookupGroup(key)
    }

    fn lookup_tx(tx: &mut dyn StoreTransaction, key: &PrincipalKey) -> Result<Option<Self>> {
        tx.lookup_group(key)
    }

    fn rename_tx(tx: &mut dyn StoreTransaction, entry: &Self) -> Result<()> {
        tx.update_group_name(entry)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn resource(&self) -> Resource {
        GroupEntry::resource(self)
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn uuid(&self) -> Uuid {
        self.uuid
    }
}
