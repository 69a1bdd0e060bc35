//! SQL statements to implement the [`StoreBackend`] with SQLite.
use std::sync::Arc;
use std::sync::Mutex;

use anyhow::Result;
use opentelemetry_api::trace::FutureExt;
use tokio_rusqlite::Connection;
use uuid::Uuid;

use replisdk::utils::metrics::CountFutureErrExt;
use replisdk::utils::trace::TraceFutureStdErrExt;

use fleetcore_context::Context;
use fleetcore_models::GroupEntry;
use fleetcore_models::RoleEntry;
use fleetcore_store::delete::DeleteOps;
use fleetcore_store::delete::DeleteResponses;
use fleetcore_store::ids::PrincipalKey;
use fleetcore_store::persist::PersistOps;
use fleetcore_store::persist::PersistResponses;
use fleetcore_store::query::QueryOps;
use fleetcore_store::query::QueryResponses;
use fleetcore_store::transaction::StoreTransaction;
use fleetcore_store::transaction::TransactionFn;
use fleetcore_store::StoreBackend;

mod principal;

use self::principal::Principal;

/// Implementation of the [`StoreBackend`] interface using SQLite.
pub struct SQLiteStore {
    /// Connection to the SQLite DB persisting data.
    connection: Connection,
}

impl SQLiteStore {
    /// Initialise a new SQLite backed [`StoreBackend`].
    pub fn new(connection: Connection) -> Self {
        SQLiteStore { connection }
    }
}

#[async_trait::async_trait]
impl StoreBackend for SQLiteStore {
    async fn delete(&self, _: &Context, op: DeleteOps) -> Result<DeleteResponses> {
        match op {
            DeleteOps::Group(group) => {
                principal::delete::<GroupEntry>(&self.connection, group.uuid).await?
            }
            DeleteOps::Role(role) => {
                principal::delete::<RoleEntry>(&self.connection, role.uuid).await?
            }
        };
        Ok(DeleteResponses::Success)
    }

    async fn persist(&self, _: &Context, op: PersistOps) -> Result<PersistResponses> {
        match op {
            PersistOps::Group(group) => principal::persist(&self.connection, group)
                .await
                .map(PersistResponses::Group),
            PersistOps::Role(role) => principal::persist(&self.connection, role)
                .await
                .map(PersistResponses::Role),
        }
    }

    async fn query(&self, _: &Context, op: QueryOps) -> Result<QueryResponses> {
        match op {
            QueryOps::CountGroups => principal::count::<GroupEntry>(&self.connection)
                .await
                .map(QueryResponses::Count),
            QueryOps::CountRoles => principal::count::<RoleEntry>(&self.connection)
                .await
                .map(QueryResponses::Count),
            QueryOps::Group(key) => principal::lookup(&self.connection, key)
                .await
                .map(QueryResponses::Group),
            QueryOps::ListGroups(list) => principal::list(&self.connection, list)
                .await
                .map(QueryResponses::GroupEntries),
            QueryOps::ListRoles(list) => principal::list(&self.connection, list)
                .await
                .map(QueryResponses::RoleEntries),
            QueryOps::Role(key) => principal::lookup(&self.connection, key)
                .await
                .map(QueryResponses::Role),
        }
    }

    async fn transaction(&self, _: &Context, op: TransactionFn) -> Result<()> {
        let (err_count, _timer) = crate::telemetry::observe_op("transaction");
        let trace = crate::telemetry::trace_op("transaction");

        // Errors from the callback roll back the transaction and are returned as is.
        let failure: Arc<Mutex<Option<anyhow::Error>>> = Default::default();
        let failure_inner = Arc::clone(&failure);
        self.connection
            .call(move |connection| {
                let tx = connection.transaction()?;
                let mut scope = SQLiteTransaction { connection: &tx };
                match op(&mut scope) {
                    Ok(()) => tx.commit()?,
                    Err(error) => {
                        failure_inner
                            .lock()
                            .expect("SQLiteStore transaction error lock poisoned")
                            .replace(error);
                    }
                };
                Ok(())
            })
            .count_on_err(err_count.clone())
            .trace_on_err_with_status()
            .with_context(trace)
            .await?;

        let error = failure
            .lock()
            .expect("SQLiteStore transaction error lock poisoned")
            .take();
        match error {
            None => Ok(()),
            Some(error) => {
                err_count.inc();
                Err(error)
            }
        }
    }
}

/// Operations on an open SQLite transaction.
struct SQLiteTransaction<'a> {
    connection: &'a rusqlite::Connection,
}

impl<'a> SQLiteTransaction<'a> {
    fn lookup<P: Principal>(&self, key: &PrincipalKey) -> Result<Option<P>> {
        let row = principal::lookup_row(self.connection, P::TABLE, key)?;
        row.map(P::decode).transpose()
    }
}

impl<'a> StoreTransaction for SQLiteTransaction<'a> {
    fn delete_group(&mut self, uuid: &Uuid) -> Result<()> {
        principal::delete_row(self.connection, &principal::GROUPS, uuid)?;
        Ok(())
    }

    fn delete_role(&mut self, uuid: &Uuid) -> Result<()> {
        principal::delete_row(self.connection, &principal::ROLES, uuid)?;
        Ok(())
    }

    fn lookup_group(&mut self, key: &PrincipalKey) -> Result<Option<GroupEntry>> {
        self.lookup(key)
    }

    fn lookup_role(&mut self, key: &PrincipalKey) -> Result<Option<RoleEntry>> {
        self.lookup(key)
    }

    fn update_group_name(&mut self, group: &GroupEntry) -> Result<()> {
        principal::rename_row(
            self.connection,
            &principal::GROUPS,
            &group.uuid,
            &group.name,
        )
    }

    fn update_role_name(&mut self, role: &RoleEntry) -> Result<()> {
        principal::rename_row(self.connection, &principal::ROLES, &role.uuid, &role.name)
    }
}

#[cfg(test)]
mod tests {
    use fleetcore_context::Context;
    use fleetcore_errors::AlreadyExists;
    use fleetcore_models::GroupEntry;
    use fleetcore_store::ids::PrincipalKey;
    use fleetcore_store::query::CountGroups;
    use fleetcore_store::query::LookupGroup;
    use fleetcore_store::Store;

    use super::SQLiteStore;
    use crate::factory::create_client;

    /// Initialise an [`SQLiteStore`] instance for unit tests.
    pub async fn sqlite_store() -> SQLiteStore {
        let context = Context::fixture();
        let connection = create_client(&context, crate::factory::MEMORY_PATH)
            .await
            .unwrap();
        crate::factory::migrate(&connection).await.unwrap();
        SQLiteStore { connection }
    }

    /// Same as [`sqlite_store`] but returns a user facing [`Store`] object instead.
    pub async fn store() -> Store {
        let store = sqlite_store().await;
        Store::from(store)
    }

    #[tokio::test]
    async fn transaction_renames() {
        let context = Context::fixture();
        let store = store().await;
        let group = store
            .persist(&context, GroupEntry::new("ops"))
            .await
            .unwrap();

        let renamed = store
            .transaction(&context, |tx| {
                let mut group = tx
                    .lookup_group(&PrincipalKey::from("ops"))?
                    .expect("group to exist");
                group.name = "sre".into();
                tx.update_group_name(&group)?;
                Ok(group)
            })
            .await
            .unwrap();
        assert_eq!(renamed.uuid, group.uuid);

        let record = store
            .query(&context, LookupGroup::from("sre"))
            .await
            .unwrap()
            .expect("renamed group not in store");
        assert_eq!(record.uuid, group.uuid);
        assert_eq!(record.created_at, group.created_at);
    }

    #[tokio::test]
    async fn transaction_rolls_back() {
        let context = Context::fixture();
        let store = store().await;
        let ops = store
            .persist(&context, GroupEntry::new("ops"))
            .await
            .unwrap();
        let mut dev = store
            .persist(&context, GroupEntry::new("dev"))
            .await
            .unwrap();

        dev.name = "ops".into();
        let error = store
            .transaction(&context, move |tx| {
                tx.delete_group(&ops.uuid)?;
                tx.update_group_name(&dev)?;
                anyhow::bail!("abort")
            })
            .await
            .map(|_: ()| ())
            .unwrap_err();
        assert_eq!(error.to_string(), "abort");
        assert_eq!(store.query(&context, CountGroups).await.unwrap(), 2);
        let record = store
            .query(&context, LookupGroup::from("dev"))
            .await
            .unwrap();
        assert!(record.is_some());
    }

    #[tokio::test]
    async fn transaction_rename_conflict() {
        let context = Context::fixture();
        let store = store().await;
        store
            .persist(&context, GroupEntry::new("ops"))
            .await
            .unwrap();
        let mut dev = store
            .persist(&context, GroupEntry::new("dev"))
            .await
            .unwrap();

        dev.name = "ops".into();
        let error = store
            .transaction(&context, move |tx| tx.update_group_name(&dev))
            .await
            .unwrap_err();
        assert!(error.is::<AlreadyExists>());
    }
}
