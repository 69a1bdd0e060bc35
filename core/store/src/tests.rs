//! Unit tests for the [`Store`] interface, running against the in-memory fixture.
use futures::TryStreamExt;

use fleetcore_context::Context;
use fleetcore_errors::AlreadyExists;
use fleetcore_models::GroupEntry;
use fleetcore_models::Pagination;
use fleetcore_models::RoleEntry;

use super::Store;
use crate::delete::DeleteGroup;
use crate::ids::PrincipalKey;
use crate::query::CountGroups;
use crate::query::CountRoles;
use crate::query::ListGroups;
use crate::query::ListPrincipals;
use crate::query::ListRoles;
use crate::query::LookupGroup;
use crate::query::LookupRole;

#[tokio::test]
async fn persist_assigns_ids() {
    let context = Context::fixture();
    let store = Store::fixture();
    let first = store
        .persist(&context, GroupEntry::new("ops"))
        .await
        .unwrap();
    let second = store
        .persist(&context, GroupEntry::new("dev"))
        .await
        .unwrap();
    assert_eq!(first.id, 1);
    assert_eq!(second.id, 2);

    let found = store
        .query(&context, LookupGroup::from(first.uuid))
        .await
        .unwrap();
    assert_eq!(found, Some(first));
}

#[tokio::test]
async fn persist_duplicate_name() {
    let context = Context::fixture();
    let store = Store::fixture();
    store
        .persist(&context, RoleEntry::new("auditor"))
        .await
        .unwrap();
    let error = store
        .persist(&context, RoleEntry::new("auditor"))
        .await
        .unwrap_err();
    assert!(error.is::<AlreadyExists>());
}

#[tokio::test]
async fn groups_and_roles_have_separate_names() {
    let context = Context::fixture();
    let store = Store::fixture();
    store
        .persist(&context, GroupEntry::new("ops"))
        .await
        .unwrap();
    store
        .persist(&context, RoleEntry::new("ops"))
        .await
        .unwrap();
    assert_eq!(store.query(&context, CountGroups).await.unwrap(), 1);
    assert_eq!(store.query(&context, CountRoles).await.unwrap(), 1);
}

#[tokio::test]
async fn delete_group() {
    let context = Context::fixture();
    let store = Store::fixture();
    let group = store
        .persist(&context, GroupEntry::new("ops"))
        .await
        .unwrap();
    store.delete(&context, &group).await.unwrap();
    store
        .delete(&context, DeleteGroup { uuid: group.uuid })
        .await
        .unwrap();

    let found = store
        .query(&context, LookupGroup::from("ops"))
        .await
        .unwrap();
    assert_eq!(found, None);
}

#[tokio::test]
async fn list_sorted_filtered_and_paged() {
    let context = Context::fixture();
    let store = Store::fixture();
    for name in ["zeta", "Alpha", "beta-team", "gamma", "team-delta"] {
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
    assert_eq!(names, ["Alpha", "beta-team", "gamma", "team-delta", "zeta"]);

    let list = ListPrincipals {
        filter: Some("TEAM".into()),
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
    assert_eq!(page[0].name, "team-delta");
}

#[tokio::test]
async fn list_roles_past_the_end() {
    let context = Context::fixture();
    let store = Store::fixture();
    store
        .persist(&context, RoleEntry::new("auditor"))
        .await
        .unwrap();
    let list = ListPrincipals {
        filter: None,
        pagination: Pagination::new(10, 5),
    };
    let roles: Vec<RoleEntry> = store
        .query(&context, ListRoles(list))
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert!(roles.is_empty());
}

#[tokio::test]
async fn transaction_commits_on_success() {
    let context = Context::fixture();
    let store = Store::fixture();
    let role = store
        .persist(&context, RoleEntry::new("auditor"))
        .await
        .unwrap();

    let renamed = store
        .transaction(&context, move |tx| {
            let mut role = tx
                .lookup_role(&PrincipalKey::from("auditor"))?
                .expect("role to exist");
            role.name = "reviewer".into();
            tx.update_role_name(&role)?;
            Ok(role)
        })
        .await
        .unwrap();
    assert_eq!(renamed.uuid, role.uuid);

    let found = store
        .query(&context, LookupRole::from("reviewer"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.uuid, role.uuid);
    assert!(found.updated_at >= role.updated_at);
}

#[tokio::test]
async fn transaction_rolls_back_on_error() {
    let context = Context::fixture();
    let store = Store::fixture();
    let ops = store
        .persist(&context, GroupEntry::new("ops"))
        .await
        .unwrap();
    store
        .persist(&context, GroupEntry::new("dev"))
        .await
        .unwrap();

    let error = store
        .transaction(&context, move |tx| {
            tx.delete_group(&ops.uuid)?;
            let mut dev = tx
                .lookup_group(&PrincipalKey::from("dev"))?
                .expect("group to exist");
            dev.name = "ops".into();
            anyhow::bail!("abort after {}", dev.name)
        })
        .await
        .map(|_: ()| ())
        .unwrap_err();
    assert_eq!(error.to_string(), "abort after ops");
    assert_eq!(store.query(&context, CountGroups).await.unwrap(), 2);
}

#[tokio::test]
async fn transaction_rename_conflict() {
    let context = Context::fixture();
    let store = Store::fixture();
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
    let found = store
        .query(&context, LookupGroup::from("dev"))
        .await
        .unwrap();
    assert!(found.is_some());
}
