//! In-memory implementation of [`StoreBackend`] for unit tests.
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use anyhow::Result;
use time::OffsetDateTime;
use uuid::Uuid;

use fleetcore_context::Context;
use fleetcore_errors::AlreadyExists;
use fleetcore_models::GroupEntry;
use fleetcore_models::RoleEntry;

use crate::delete::DeleteOps;
use crate::delete::DeleteResponses;
use crate::ids::PrincipalKey;
use crate::persist::PersistOps;
use crate::persist::PersistResponses;
use crate::query::ListPrincipals;
use crate::query::QueryOps;
use crate::query::QueryResponses;
use crate::transaction::StoreTransaction;
use crate::transaction::TransactionFn;
use crate::StoreBackend;

/// In-memory principal store for unit tests.
#[derive(Clone, Default)]
pub struct StoreFixture {
    /// Shared in-memory state to mock the store with.
    inner: Arc<Mutex<StoreFixtureState>>,
}

impl StoreFixture {
    /// Make every following operation fail, as if the database was unreachable.
    pub fn fail(&self, fail: bool) {
        self.access().fail = fail;
    }

    /// Lock and access the shared inner state.
    fn access(&self) -> MutexGuard<StoreFixtureState> {
        self.inner
            .lock()
            .expect("StoreFixture::inner state lock poisoned")
    }
}

#[async_trait::async_trait]
impl StoreBackend for StoreFixture {
    async fn delete(&self, _: &Context, op: DeleteOps) -> Result<DeleteResponses> {
        let mut state = self.access();
        state.available()?;
        match op {
            DeleteOps::Group(group) => state.groups.delete(&group.uuid),
            DeleteOps::Role(role) => state.roles.delete(&role.uuid),
        };
        Ok(DeleteResponses::Success)
    }

    async fn persist(&self, _: &Context, op: PersistOps) -> Result<PersistResponses> {
        let mut state = self.access();
        state.available()?;
        let response = match op {
            PersistOps::Group(group) => PersistResponses::Group(state.groups.insert(group)?),
            PersistOps::Role(role) => PersistResponses::Role(state.roles.insert(role)?),
        };
        Ok(response)
    }

    async fn query(&self, _: &Context, op: QueryOps) -> Result<QueryResponses> {
        let state = self.access();
        state.available()?;
        let response = match op {
            QueryOps::CountGroups => QueryResponses::Count(state.groups.rows.len() as u64),
            QueryOps::CountRoles => QueryResponses::Count(state.roles.rows.len() as u64),
            QueryOps::Group(key) => QueryResponses::Group(state.groups.lookup(&key)),
            QueryOps::ListGroups(list) => {
                let items: Vec<Result<GroupEntry>> =
                    state.groups.list(&list).into_iter().map(Ok).collect();
                QueryResponses::GroupEntries(Box::pin(futures::stream::iter(items)))
            }
            QueryOps::ListRoles(list) => {
                let items: Vec<Result<RoleEntry>> =
                    state.roles.list(&list).into_iter().map(Ok).collect();
                QueryResponses::RoleEntries(Box::pin(futures::stream::iter(items)))
            }
            QueryOps::Role(key) => QueryResponses::Role(state.roles.lookup(&key)),
        };
        Ok(response)
    }

    async fn transaction(&self, _: &Context, op: TransactionFn) -> Result<()> {
        let mut state = self.access();
        state.available()?;
        let mut staged = state.clone();
        op(&mut staged)?;
        *state = staged;
        Ok(())
    }
}

/// Inner state of the [`StoreFixture`].
#[derive(Clone, Default)]
struct StoreFixtureState {
    fail: bool,
    groups: Table<GroupEntry>,
    roles: Table<RoleEntry>,
}

impl StoreFixtureState {
    fn available(&self) -> Result<()> {
        if self.fail {
            anyhow::bail!("store fixture configured to fail");
        }
        Ok(())
    }
}

impl StoreTransaction for StoreFixtureState {
    fn delete_group(&mut self, uuid: &Uuid) -> Result<()> {
        self.groups.delete(uuid);
        Ok(())
    }

    fn delete_role(&mut self, uuid: &Uuid) -> Result<()> {
        self.roles.delete(uuid);
        Ok(())
    }

    fn lookup_group(&mut self, key: &PrincipalKey) -> Result<Option<GroupEntry>> {
        Ok(self.groups.lookup(key))
    }

    fn lookup_role(&mut self, key: &PrincipalKey) -> Result<Option<RoleEntry>> {
        Ok(self.roles.lookup(key))
    }

    fn update_group_name(&mut self, group: &GroupEntry) -> Result<()> {
        self.groups.rename(&group.uuid, &group.name)
    }

    fn update_role_name(&mut self, role: &RoleEntry) -> Result<()> {
        self.roles.rename(&role.uuid, &role.name)
    }
}

/// Access to the common attributes of principal records.
trait Record: Clone {
    const KIND: &'static str;
    fn id_mut(&mut self) -> &mut i64;
    fn matches(&self, needle: &str) -> bool;
    fn name(&self) -> &str;
    fn name_mut(&mut self) -> &mut String;
    fn touch(&mut self);
    fn uuid(&self) -> Uuid;
}

impl Record for GroupEntry {
    const KIND: &'static str = "group";
    fn id_mut(&mut self) -> &mut i64 {
        &mut self.id
    }
    fn matches(&self, needle: &str) -> bool {
        GroupEntry::matches(self, needle)
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn name_mut(&mut self) -> &mut String {
        &mut self.name
    }
    fn touch(&mut self) {
        self.updated_at = OffsetDateTime::now_utc();
    }
    fn uuid(&self) -> Uuid {
        self.uuid
    }
}

impl Record for RoleEntry {
    const KIND: &'static str = "role";
    fn id_mut(&mut self) -> &mut i64 {
        &mut self.id
    }
    fn matches(&self, needle: &str) -> bool {
        RoleEntry::matches(self, needle)
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn name_mut(&mut self) -> &mut String {
        &mut self.name
    }
    fn touch(&mut self) {
        self.updated_at = OffsetDateTime::now_utc();
    }
    fn uuid(&self) -> Uuid {
        self.uuid
    }
}

/// In-memory table of principal records with unique names and UUIDs.
#[derive(Clone)]
struct Table<T> {
    next_id: i64,
    rows: BTreeMap<Uuid, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Table {
            next_id: 1,
            rows: BTreeMap::new(),
        }
    }
}

impl<T: Record> Table<T> {
    fn delete(&mut self, uuid: &Uuid) {
        self.rows.remove(uuid);
    }

    fn insert(&mut self, mut record: T) -> Result<T> {
        let duplicate = self
            .rows
            .values()
            .any(|row| row.name() == record.name() || row.uuid() == record.uuid());
        if duplicate {
            anyhow::bail!(AlreadyExists::new(T::KIND, record.name()));
        }
        *record.id_mut() = self.next_id;
        self.next_id += 1;
        self.rows.insert(record.uuid(), record.clone());
        Ok(record)
    }

    fn list(&self, list: &ListPrincipals) -> Vec<T> {
        let filter = list.filter.as_deref().unwrap_or_default();
        let mut rows: Vec<T> = self
            .rows
            .values()
            .filter(|row| row.matches(filter))
            .cloned()
            .collect();
        rows.sort_by(|left, right| left.name().cmp(right.name()));
        let rows = rows.into_iter().skip(list.pagination.offset);
        match list.pagination.limit {
            0 => rows.collect(),
            limit => rows.take(limit).collect(),
        }
    }

    fn lookup(&self, key: &PrincipalKey) -> Option<T> {
        self.rows
            .values()
            .find(|row| key.matches(row.name(), &row.uuid()))
            .cloned()
    }

    fn rename(&mut self, uuid: &Uuid, name: &str) -> Result<()> {
        let conflict = self
            .rows
            .values()
            .any(|row| row.name() == name && row.uuid() != *uuid);
        if conflict {
            anyhow::bail!(AlreadyExists::new(T::KIND, name));
        }
        if let Some(row) = self.rows.get_mut(uuid) {
            *row.name_mut() = name.to_string();
            row.touch();
        }
        Ok(())
    }
}
