use uuid::Uuid;

use fleetcore_auth::AuthorisedUser;
use fleetcore_context::Context;
use anyhow::Result;

use fleetcore_errors::AlreadyExists;
use fleetcore_errors::NotFound;
use fleetcore_errors::Unauthorized;
use fleetcore_errors::Upstream;
use fleetcore_errors::Validation;
use fleetcore_models::AccessLevel;
use fleetcore_models::Entity;
use fleetcore_models::GroupEntry;
use fleetcore_models::Identity;
use fleetcore_models::Pagination;
use fleetcore_models::Relation;
use fleetcore_models::Resource;
use fleetcore_models::RoleEntry;
use fleetcore_models::Tuple;
use fleetcore_relations::Relations;
use fleetcore_relations::RelationsFixture;
use fleetcore_store::Store;

use super::GroupManager;
use super::RoleManager;

struct Fixture {
    admin: AuthorisedUser,
    graph: RelationsFixture,
    groups: GroupManager,
    relations: Relations,
    roles: RoleManager,
}

impl Fixture {
    fn new() -> Fixture {
        let store = Store::fixture();
        let (relations, graph) = Relations::fixture();
        Fixture {
            admin: AuthorisedUser::new(Identity::new("admin"), true, relations.clone()),
            graph,
            groups: GroupManager::new(store.clone(), relations.clone()),
            relations: relations.clone(),
            roles: RoleManager::new(store, relations),
        }
    }

    async fn add_group(&self, name: &str) -> GroupEntry {
        let context = Context::fixture();
        self.groups.add(&context, &self.admin, name).await.unwrap()
    }

    async fn add_role(&self, name: &str) -> RoleEntry {
        let context = Context::fixture();
        self.roles.add(&context, &self.admin, name).await.unwrap()
    }

    async fn count_groups(&self) -> u64 {
        let context = Context::fixture();
        self.groups.count(&context, &self.admin).await.unwrap()
    }

    async fn count_roles(&self) -> u64 {
        let context = Context::fixture();
        self.roles.count(&context, &self.admin).await.unwrap()
    }

    async fn grant(&self, tuples: &[Tuple]) {
        let context = Context::fixture();
        self.relations.add_relation(&context, tuples).await.unwrap();
    }

    fn user(&self, name: &str) -> AuthorisedUser {
        AuthorisedUser::new(Identity::new(name), false, self.relations.clone())
    }
}

fn assert_unauthorized<T>(result: Result<T>) {
    let error = result.err().expect("operation to be denied");
    assert!(error.is::<Unauthorized>(), "unexpected error: {error}");
}

fn user(name: &str) -> Resource {
    Resource::User(name.to_string())
}

#[tokio::test]
async fn non_admin_is_unauthorized() {
    let context = Context::fixture();
    let fixture = Fixture::new();
    fixture.add_group("ops").await;
    fixture.add_role("auditor").await;
    let alice = fixture.user("alice");
    let page = Pagination::default();

    let groups = &fixture.groups;
    assert_unauthorized(groups.add(&context, &alice, "dev").await);
    assert_unauthorized(groups.count(&context, &alice).await);
    assert_unauthorized(groups.get_by_name(&context, &alice, "ops").await);
    assert_unauthorized(groups.get_by_uuid(&context, &alice, Uuid::new_v4()).await);
    assert_unauthorized(groups.list(&context, &alice, page, "").await);
    assert_unauthorized(groups.rename(&context, &alice, "ops", "sre").await);
    assert_unauthorized(groups.remove(&context, &alice, "ops").await);

    let roles = &fixture.roles;
    assert_unauthorized(roles.add(&context, &alice, "reviewer").await);
    assert_unauthorized(roles.count(&context, &alice).await);
    assert_unauthorized(roles.get_by_name(&context, &alice, "auditor").await);
    assert_unauthorized(roles.get_by_uuid(&context, &alice, Uuid::new_v4()).await);
    assert_unauthorized(roles.list(&context, &alice, page, "").await);
    assert_unauthorized(roles.rename(&context, &alice, "auditor", "x").await);
    assert_unauthorized(roles.remove(&context, &alice, "auditor").await);

    assert_eq!(fixture.count_groups().await, 1);
    assert_eq!(fixture.count_roles().await, 1);
}

#[tokio::test]
async fn add_group() {
    let context = Context::fixture();
    let fixture = Fixture::new();
    let group = fixture.add_group("ops").await;
    assert_eq!(group.name, "ops");
    assert!(!group.uuid.is_nil());

    let error = fixture
        .groups
        .add(&context, &fixture.admin, "ops")
        .await
        .unwrap_err();
    assert!(error.is::<AlreadyExists>());

    let found = fixture
        .groups
        .get_by_uuid(&context, &fixture.admin, group.uuid)
        .await
        .unwrap();
    assert_eq!(found.name, "ops");
}

#[tokio::test]
async fn add_empty_name() {
    let context = Context::fixture();
    let fixture = Fixture::new();
    let error = fixture
        .roles
        .add(&context, &fixture.admin, "  ")
        .await
        .unwrap_err();
    assert!(error.is::<Validation>());
}

#[tokio::test]
async fn get_missing_group() {
    let context = Context::fixture();
    let fixture = Fixture::new();
    let error = fixture
        .groups
        .get_by_name(&context, &fixture.admin, "ops")
        .await
        .unwrap_err();
    assert!(error.is::<NotFound>());
}

#[tokio::test]
async fn remove_group_cleans_up_tuples() {
    let context = Context::fixture();
    let fixture = Fixture::new();
    let group_a = fixture.add_group("a").await;
    let group_b = fixture.add_group("b").await;
    let tuples = [
        Tuple::new(user("alice"), Relation::Member, group_a.resource()),
        Tuple::new(user("bob"), Relation::Member, group_b.resource()),
        Tuple::new(user("carol"), Relation::Member, group_b.resource()),
        Tuple::new(
            group_b.members(),
            Relation::Reader,
            Resource::Model(Uuid::new_v4()),
        ),
        Tuple::new(
            group_b.members(),
            Relation::Administrator,
            Resource::Controller(Uuid::new_v4()),
        ),
    ];
    fixture.grant(&tuples).await;

    let groups = &fixture.groups;
    groups.remove(&context, &fixture.admin, "b").await.unwrap();
    assert_eq!(fixture.graph.tuples(), vec![tuples[0].clone()]);
    assert_eq!(fixture.count_groups().await, 1);

    groups.remove(&context, &fixture.admin, "a").await.unwrap();
    assert!(fixture.graph.tuples().is_empty());
    assert_eq!(fixture.count_groups().await, 0);

    let error = groups
        .remove(&context, &fixture.admin, "a")
        .await
        .unwrap_err();
    assert!(error.is::<NotFound>());
}

#[tokio::test]
async fn remove_group_keeps_record_on_cleanup_failure() {
    let context = Context::fixture();
    let fixture = Fixture::new();
    fixture.add_group("ops").await;
    let failures = crate::telemetry::CLEANUP_FAILURES.with_label_values(&["group"]);
    let before = failures.get();

    fixture.graph.fail(true);
    let error = fixture
        .groups
        .remove(&context, &fixture.admin, "ops")
        .await
        .unwrap_err();
    assert!(error.is::<Upstream>());
    assert!(failures.get() > before);

    fixture.graph.fail(false);
    fixture
        .groups
        .get_by_name(&context, &fixture.admin, "ops")
        .await
        .unwrap();
    fixture
        .groups
        .remove(&context, &fixture.admin, "ops")
        .await
        .unwrap();
}

#[tokio::test]
async fn rename_group_preserves_access() {
    let context = Context::fixture();
    let fixture = Fixture::new();
    let alice = fixture.user("alice");
    let model = Uuid::new_v4();
    let controller = Uuid::new_v4();
    let group = fixture.add_group("ops").await;
    let tuples = [
        Tuple::new(group.members(), Relation::Writer, Resource::Model(model)),
        Tuple::new(
            group.members(),
            Relation::Administrator,
            Resource::Controller(controller),
        ),
    ];
    fixture.grant(&tuples).await;
    alice.add_to_group(&context, group.uuid).await.unwrap();
    assert_eq!(
        alice.model_access(&context, model).await,
        AccessLevel::Write
    );
    let graph_before = fixture.graph.tuples();

    let renamed = fixture
        .groups
        .rename(&context, &fixture.admin, "ops", "sre")
        .await
        .unwrap();
    assert_eq!(renamed.uuid, group.uuid);
    assert_eq!(renamed.name, "sre");
    assert_eq!(fixture.graph.tuples(), graph_before);
    assert_eq!(
        alice.model_access(&context, model).await,
        AccessLevel::Write
    );
    assert_eq!(
        alice.controller_access(&context, controller).await,
        AccessLevel::Superuser,
    );

    let error = fixture
        .groups
        .get_by_name(&context, &fixture.admin, "ops")
        .await
        .unwrap_err();
    assert!(error.is::<NotFound>());
}

#[tokio::test]
async fn rename_group_errors() {
    let context = Context::fixture();
    let fixture = Fixture::new();
    fixture.add_group("ops").await;
    fixture.add_group("dev").await;

    let error = fixture
        .groups
        .rename(&context, &fixture.admin, "dev", "ops")
        .await
        .unwrap_err();
    assert!(error.is::<AlreadyExists>());

    let error = fixture
        .groups
        .rename(&context, &fixture.admin, "missing", "new")
        .await
        .unwrap_err();
    assert!(error.is::<NotFound>());

    let error = fixture
        .groups
        .rename(&context, &fixture.admin, "dev", "")
        .await
        .unwrap_err();
    assert!(error.is::<Validation>());
}

#[tokio::test]
async fn list_groups() {
    let context = Context::fixture();
    let fixture = Fixture::new();
    for name in ["delta", "alpha", "Charlie-team", "bravo-team", "echo"] {
        fixture.add_group(name).await;
    }

    let all = fixture
        .groups
        .list(&context, &fixture.admin, Pagination::default(), "")
        .await
        .unwrap();
    let names: Vec<&str> = all.iter().map(|group| group.name.as_str()).collect();
    assert_eq!(
        names,
        ["Charlie-team", "alpha", "bravo-team", "delta", "echo"]
    );

    let page = fixture
        .groups
        .list(&context, &fixture.admin, Pagination::new(2, 1), "")
        .await
        .unwrap();
    let names: Vec<&str> = page.iter().map(|group| group.name.as_str()).collect();
    assert_eq!(names, ["alpha", "bravo-team"]);

    let teams = fixture
        .groups
        .list(&context, &fixture.admin, Pagination::default(), "TEAM")
        .await
        .unwrap();
    let names: Vec<&str> = teams.iter().map(|group| group.name.as_str()).collect();
    assert_eq!(names, ["Charlie-team", "bravo-team"]);

    let uuid = all[3].uuid.to_string();
    let by_uuid = fixture
        .groups
        .list(&context, &fixture.admin, Pagination::default(), &uuid)
        .await
        .unwrap();
    assert_eq!(by_uuid.len(), 1);
    assert_eq!(by_uuid[0].name, "delta");
}

#[tokio::test]
async fn remove_role_cleans_up_assignments() {
    let context = Context::fixture();
    let fixture = Fixture::new();
    let alice = fixture.user("alice");
    let model = Uuid::new_v4();
    let auditor = fixture.add_role("auditor").await;
    let other = fixture.add_role("other").await;
    let target = Resource::Model(model);
    let grant = Tuple::new(auditor.assignees(), Relation::Reader, target);
    let bob = Entity::from(user("bob"));
    let unrelated = Tuple::new(bob, Relation::Assignee, other.resource());
    fixture.grant(&[grant, unrelated.clone()]).await;
    alice.assign_role(&context, auditor.uuid).await.unwrap();
    assert_eq!(alice.model_access(&context, model).await, AccessLevel::Read);

    fixture
        .roles
        .remove(&context, &fixture.admin, "auditor")
        .await
        .unwrap();
    assert_eq!(alice.model_access(&context, model).await, AccessLevel::None);
    assert_eq!(fixture.graph.tuples(), vec![unrelated]);
    assert_eq!(fixture.count_roles().await, 1);
}

#[tokio::test]
async fn remove_role_keeps_record_on_cleanup_failure() {
    let context = Context::fixture();
    let fixture = Fixture::new();
    fixture.add_role("auditor").await;
    let failures = crate::telemetry::CLEANUP_FAILURES.with_label_values(&["role"]);
    let before = failures.get();

    fixture.graph.fail(true);
    let error = fixture
        .roles
        .remove(&context, &fixture.admin, "auditor")
        .await
        .unwrap_err();
    assert!(error.is::<Upstream>());
    assert!(failures.get() > before);

    fixture.graph.fail(false);
    assert_eq!(fixture.count_roles().await, 1);
    let error = fixture
        .groups
        .get_by_name(&context, &fixture.admin, "auditor")
        .await
        .unwrap_err();
    assert_eq!(error.downcast_ref::<NotFound>().unwrap().kind, "group");
}

#[tokio::test]
async fn get_missing_role() {
    let context = Context::fixture();
    let fixture = Fixture::new();
    let uuid = Uuid::new_v4();
    let error = fixture
        .roles
        .get_by_uuid(&context, &fixture.admin, uuid)
        .await
        .unwrap_err();
    let error = error.downcast_ref::<NotFound>().unwrap();
    assert_eq!(error.kind, "role");
    assert_eq!(error.id, uuid.to_string());
}

#[tokio::test]
async fn rename_role() {
    let context = Context::fixture();
    let fixture = Fixture::new();
    let role = fixture.add_role("auditor").await;
    fixture.add_role("reviewer").await;

    let error = fixture
        .roles
        .rename(&context, &fixture.admin, "auditor", "reviewer")
        .await
        .unwrap_err();
    assert!(error.is::<AlreadyExists>());

    let renamed = fixture
        .roles
        .rename(&context, &fixture.admin, "auditor", "inspector")
        .await
        .unwrap();
    assert_eq!(renamed.uuid, role.uuid);
    let found = fixture
        .roles
        .get_by_uuid(&context, &fixture.admin, role.uuid)
        .await
        .unwrap();
    assert_eq!(found.name, "inspector");
}

#[tokio::test]
async fn list_roles() {
    let context = Context::fixture();
    let fixture = Fixture::new();
    for name in ["viewer", "auditor", "operator"] {
        fixture.add_role(name).await;
    }
    let roles = fixture
        .roles
        .list(&context, &fixture.admin, Pagination::new(0, 1), "")
        .await
        .unwrap();
    let names: Vec<&str> = roles.iter().map(|role| role.name.as_str()).collect();
    assert_eq!(names, ["operator", "viewer"]);
}
