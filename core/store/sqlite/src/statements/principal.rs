//! Principal store operations on groups and roles.
//!
//! Groups and roles share the same shape so both tables are driven by the same statements.
use anyhow::Result;
use futures::stream::BoxStream;
use futures::StreamExt;
use opentelemetry_api::trace::FutureExt;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio_rusqlite::Connection;
use uuid::Uuid;

use replisdk::utils::metrics::CountFutureErrExt;
use replisdk::utils::trace::TraceFutureStdErrExt;

use fleetcore_errors::AlreadyExists;
use fleetcore_models::GroupEntry;
use fleetcore_models::RoleEntry;
use fleetcore_store::ids::PrincipalKey;
use fleetcore_store::query::ListPrincipals;

/// SQL statements for one principal table.
pub struct Table {
    pub kind: &'static str,
    count: &'static str,
    delete: &'static str,
    insert: &'static str,
    list: &'static str,
    lookup_name: &'static str,
    lookup_uuid: &'static str,
    rename: &'static str,
}

pub const GROUPS: Table = Table {
    kind: "group",
    count: "SELECT COUNT(*) FROM store_group;",
    delete: "DELETE FROM store_group WHERE uuid = ?1;",
    insert: r#"
INSERT INTO store_group (uuid, name, created_at, updated_at)
VALUES (?1, ?2, ?3, ?4);
"#,
    list: r#"
SELECT id, uuid, name, created_at, updated_at
FROM store_group
WHERE ?1 = '' OR instr(lower(name), lower(?1)) > 0 OR instr(uuid, lower(?1)) > 0
ORDER BY name ASC
LIMIT ?2 OFFSET ?3;
"#,
    lookup_name: r#"
SELECT id, uuid, name, created_at, updated_at
FROM store_group
WHERE name = ?1;
"#,
    lookup_uuid: r#"
SELECT id, uuid, name, created_at, updated_at
FROM store_group
WHERE uuid = ?1;
"#,
    rename: "UPDATE store_group SET name = ?2, updated_at = ?3 WHERE uuid = ?1;",
};

pub const ROLES: Table = Table {
    kind: "role",
    count: "SELECT COUNT(*) FROM store_role;",
    delete: "DELETE FROM store_role WHERE uuid = ?1;",
    insert: r#"
INSERT INTO store_role (uuid, name, created_at, updated_at)
VALUES (?1, ?2, ?3, ?4);
"#,
    list: r#"
SELECT id, uuid, name, created_at, updated_at
FROM store_role
WHERE ?1 = '' OR instr(lower(name), lower(?1)) > 0 OR instr(uuid, lower(?1)) > 0
ORDER BY name ASC
LIMIT ?2 OFFSET ?3;
"#,
    lookup_name: r#"
SELECT id, uuid, name, created_at, updated_at
FROM store_role
WHERE name = ?1;
"#,
    lookup_uuid: r#"
SELECT id, uuid, name, created_at, updated_at
FROM store_role
WHERE uuid = ?1;
"#,
    rename: "UPDATE store_role SET name = ?2, updated_at = ?3 WHERE uuid = ?1;",
};

/// A principal row as stored in SQLite.
#[derive(Clone, Debug)]
pub struct PrincipalRow {
    id: i64,
    uuid: String,
    name: String,
    created_at: String,
    updated_at: String,
}

impl PrincipalRow {
    fn decode(self) -> Result<(i64, Uuid, String, OffsetDateTime, OffsetDateTime)> {
        let uuid = Uuid::parse_str(&self.uuid)?;
        let created_at = OffsetDateTime::parse(&self.created_at, &Rfc3339)?;
        let updated_at = OffsetDateTime::parse(&self.updated_at, &Rfc3339)?;
        Ok((self.id, uuid, self.name, created_at, updated_at))
    }

    fn read(row: &rusqlite::Row) -> rusqlite::Result<PrincipalRow> {
        Ok(PrincipalRow {
            id: row.get("id")?,
            uuid: row.get("uuid")?,
            name: row.get("name")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Conversion between principal models and their rows.
pub trait Principal: Sized + Send + 'static {
    const TABLE: &'static Table;
    fn decode(row: PrincipalRow) -> Result<Self>;
    fn encode(&self) -> Result<PrincipalRow>;
}

impl Principal for GroupEntry {
    const TABLE: &'static Table = &GROUPS;

    fn decode(row: PrincipalRow) -> Result<Self> {
        let (id, uuid, name, created_at, updated_at) = row.decode()?;
        Ok(GroupEntry {
            id,
            name,
            uuid,
            created_at,
            updated_at,
        })
    }

    fn encode(&self) -> Result<PrincipalRow> {
        Ok(PrincipalRow {
            id: self.id,
            uuid: self.uuid.to_string(),
            name: self.name.clone(),
            created_at: self.created_at.format(&Rfc3339)?,
            updated_at: self.updated_at.format(&Rfc3339)?,
        })
    }
}

impl Principal for RoleEntry {
    const TABLE: &'static Table = &ROLES;

    fn decode(row: PrincipalRow) -> Result<Self> {
        let (id, uuid, name, created_at, updated_at) = row.decode()?;
        Ok(RoleEntry {
            id,
            name,
            uuid,
            created_at,
            updated_at,
        })
    }

    fn encode(&self) -> Result<PrincipalRow> {
        Ok(PrincipalRow {
            id: self.id,
            uuid: self.uuid.to_string(),
            name: self.name.clone(),
            created_at: self.created_at.format(&Rfc3339)?,
            updated_at: self.updated_at.format(&Rfc3339)?,
        })
    }
}

/// Count all principals in the table.
pub async fn count<P: Principal>(connection: &Connection) -> Result<u64> {
    let op = format!("{}.count", P::TABLE.kind);
    let (err_count, _timer) = crate::telemetry::observe_op(&op);
    let trace = crate::telemetry::trace_op(&op);
    let count = connection
        .call(move |connection| {
            let count: i64 = connection.query_row(P::TABLE.count, [], |row| row.get(0))?;
            Ok(count)
        })
        .count_on_err(err_count)
        .trace_on_err_with_status()
        .with_context(trace)
        .await?;
    Ok(u64::try_from(count)?)
}

/// Delete a principal from the store, ignoring missing principals.
pub async fn delete<P: Principal>(connection: &Connection, uuid: Uuid) -> Result<()> {
    let op = format!("{}.delete", P::TABLE.kind);
    let (err_count, _timer) = crate::telemetry::observe_op(&op);
    let trace = crate::telemetry::trace_op(&op);
    connection
        .call(move |connection| {
            delete_row(connection, P::TABLE, &uuid)?;
            Ok(())
        })
        .count_on_err(err_count)
        .trace_on_err_with_status()
        .with_context(trace)
        .await?;
    Ok(())
}

/// Return the principals matching the filter, sorted by name.
pub async fn list<P: Principal>(
    connection: &Connection,
    list: ListPrincipals,
) -> Result<BoxStream<'static, Result<P>>> {
    let op = format!("{}.list", P::TABLE.kind);
    let (err_count, _timer) = crate::telemetry::observe_op(&op);
    let trace = crate::telemetry::trace_op(&op);
    let filter = list.filter.unwrap_or_default();
    let limit = match list.pagination.limit {
        0 => -1,
        limit => i64::try_from(limit)?,
    };
    let offset = i64::try_from(list.pagination.offset)?;
    let rows = connection
        .call(move |connection| {
            let mut statement = connection.prepare_cached(P::TABLE.list)?;
            let mut rows = statement.query(rusqlite::params![filter, limit, offset])?;
            let mut principals = Vec::new();
            while let Some(row) = rows.next()? {
                principals.push(PrincipalRow::read(row)?);
            }
            Ok(principals)
        })
        .count_on_err(err_count)
        .trace_on_err_with_status()
        .with_context(trace)
        .await?;

    let principals = futures::stream::iter(rows).map(P::decode).boxed();
    Ok(principals)
}

/// Lookup a principal by name or UUID, if one is available.
pub async fn lookup<P: Principal>(connection: &Connection, key: PrincipalKey) -> Result<Option<P>> {
    let op = format!("{}.lookup", P::TABLE.kind);
    let (err_count, timer) = crate::telemetry::observe_op(&op);
    let trace = crate::telemetry::trace_op(&op);
    let row = connection
        .call(move |connection| {
            let row = lookup_row(connection, P::TABLE, &key)?;
            Ok(row)
        })
        .count_on_err(err_count)
        .trace_on_err_with_status()
        .with_context(trace)
        .await?;

    drop(timer);
    row.map(P::decode).transpose()
}

/// Insert a new principal and return it with the store assigned ID.
pub async fn persist<P: Principal>(connection: &Connection, principal: P) -> Result<P> {
    let op = format!("{}.persist", P::TABLE.kind);
    let mut row = principal.encode()?;
    let (err_count, _timer) = crate::telemetry::observe_op(&op);
    let trace = crate::telemetry::trace_op(&op);
    let insert = row.clone();
    let result = connection
        .call(move |connection| {
            connection.execute(
                P::TABLE.insert,
                rusqlite::params![
                    insert.uuid,
                    insert.name,
                    insert.created_at,
                    insert.updated_at,
                ],
            )?;
            Ok(connection.last_insert_rowid())
        })
        .count_on_err(err_count)
        .trace_on_err_with_status()
        .with_context(trace)
        .await;

    row.id = match result {
        Ok(id) => id,
        Err(tokio_rusqlite::Error::Rusqlite(error)) if is_conflict(&error) => {
            anyhow::bail!(AlreadyExists::new(P::TABLE.kind, row.name))
        }
        Err(error) => return Err(error.into()),
    };
    P::decode(row)
}

/// Delete a principal row by UUID.
pub fn delete_row(
    connection: &rusqlite::Connection,
    table: &Table,
    uuid: &Uuid,
) -> rusqlite::Result<()> {
    connection.execute(table.delete, [uuid.to_string()])?;
    Ok(())
}

/// Lookup a principal row by name or UUID.
pub fn lookup_row(
    connection: &rusqlite::Connection,
    table: &Table,
    key: &PrincipalKey,
) -> rusqlite::Result<Option<PrincipalRow>> {
    let (sql, value) = match key {
        PrincipalKey::Name(name) => (table.lookup_name, name.clone()),
        PrincipalKey::Uuid(uuid) => (table.lookup_uuid, uuid.to_string()),
    };
    let mut statement = connection.prepare_cached(sql)?;
    let mut rows = statement.query([value])?;
    match rows.next()? {
        None => Ok(None),
        Some(row) => PrincipalRow::read(row).map(Some),
    }
}

/// Rename a principal, failing with [`AlreadyExists`] if the name is taken.
pub fn rename_row(
    connection: &rusqlite::Connection,
    table: &Table,
    uuid: &Uuid,
    name: &str,
) -> Result<()> {
    let updated_at = OffsetDateTime::now_utc().format(&Rfc3339)?;
    let result = connection.execute(
        table.rename,
        rusqlite::params![uuid.to_string(), name, updated_at],
    );
    match result {
        Ok(_) => Ok(()),
        Err(error) if is_conflict(&error) => anyhow::bail!(AlreadyExists::new(table.kind, name)),
        Err(error) => Err(error.into()),
    }
}

/// Check if an SQLite error is caused by a uniqueness constraint.
fn is_conflict(error: &rusqlite::Error) -> bool {
    matches!(
        error.sqlite_error_code(),
        Some(rusqlite::ErrorCode::ConstraintViolation)
    )
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;

    use fleetcore_context::Context;
    use fleetcore_errors::AlreadyExists;
    use fleetcore_models::GroupEntry;
    use fleetcore_models::Pagination;
    use fleetcore_models::RoleEntry;
    use fleetcore_store::delete::DeleteRole;
    use fleetcore_store::query::CountGroups;
    use fleetcore_store::query::CountRoles;
    use fleetcore_store::query::ListGroups;
    use fleetcore_store::query::ListPrincipals;
    use fleetcore_store::query::LookupGroup;
    use fleetcore_store::query::LookupRole;

    #[tokio::test]
    async fn group_operations() {
        let context = Context::fixture();
        let store = crate::statements::tests::store().await;

        // Check lookup without record.
        let record = store
            .query(&context, LookupGroup::from("ops"))
            .await
            .unwrap();
        assert!(record.is_none());

        // Check persisting (and looking up) a record.
        let group = GroupEntry::new("ops");
        let stored = store.persist(&context, group.clone()).await.unwrap();
        assert_eq!(stored.id, 1);
        let record = store
            .query(&context, LookupGroup::from(group.uuid))
            .await
            .unwrap()
            .expect("group record not in store");
        assert_eq!(record.name, "ops");
        assert_eq!(record.uuid, group.uuid);
        assert_eq!(store.query(&context, CountGroups).await.unwrap(), 1);

        // Check deleting a record, twice.
        store.delete(&context, &stored).await.unwrap();
        store.delete(&context, &stored).await.unwrap();
        let record = store
            .query(&context, LookupGroup::from("ops"))
            .await
            .unwrap();
        assert!(record.is_none());
    }

    #[tokio::test]
    async fn role_operations() {
        let context = Context::fixture();
        let store = crate::statements::tests::store().await;
        let role = store
            .persist(&context, RoleEntry::new("auditor"))
            .await
            .unwrap();
        let record = store
            .query(&context, LookupRole::from("auditor"))
            .await
            .unwrap()
            .expect("role record not in store");
        assert_eq!(record.uuid, role.uuid);
        assert_eq!(store.query(&context, CountRoles).await.unwrap(), 1);

        store
            .delete(&context, DeleteRole { uuid: role.uuid })
            .await
            .unwrap();
        assert_eq!(store.query(&context, CountRoles).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn persist_duplicate_name() {
        let context = Context::fixture();
        let store = crate::statements::tests::store().await;
        store
            .persist(&context, GroupEntry::new("ops"))
            .await
            .unwrap();
        let error = store
            .persist(&context, GroupEntry::new("ops"))
            .await
            .unwrap_err();
        assert!(error.is::<AlreadyExists>());
        assert_eq!(store.query(&context, CountGroups).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn list_sorted_filtered_and_paged() {
        let context = Context::fixture();
        let store = crate::statements::tests::store().await;
        for name in ["zeta", "Alpha", "beta-team", "gamma", "TEAM-delta"] {
            store
                .persist(&context, GroupEntry::new(name))
                .await
                .unwrap();
        }

        let all: Vec<GroupEntry> = store
            .query(&context, ListGroups::default())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        let names: Vec<&str> = all.iter().map(|group| group.name.as_str()).collect();
        assert_eq!(names, ["Alpha", "TEAM-delta", "beta-team", "gamma", "zeta"]);

        let list = ListPrincipals {
            filter: Some("team".into()),
            pagination: Pagination::new(1, 1),
        };
        let page: Vec<GroupEntry> = store
            .query(&context, ListGroups(list))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "beta-team");

        let needle = all[4].uuid.to_string()[..8].to_uppercase();
        let list = ListPrincipals {
            filter: Some(needle),
            pagination: Pagination::default(),
        };
        let found: Vec<GroupEntry> = store
            .query(&context, ListGroups(list))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert!(found.iter().any(|group| group.uuid == all[4].uuid));
    }
}
