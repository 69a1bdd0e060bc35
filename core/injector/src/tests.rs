use std::sync::Arc;

use uuid::Uuid;

use fleetcore_conf::BackendConf;
use fleetcore_conf::Conf;
use fleetcore_context::Context;
use fleetcore_errors::Unauthorized;
use fleetcore_models::Identity;
use fleetcore_models::Relation;
use fleetcore_models::Resource;
use fleetcore_models::Tuple;
use fleetcore_models::TupleFilter;
use fleetcore_relations::RelationsConf;
use fleetcore_relations::RelationsFixture;
use fleetcore_tokens::ControllersFixture;
use fleetcore_tokens::SignerFixture;

use super::BackendNotFound;
use super::Backends;
use super::Injector;

fn sqlite_conf() -> Conf {
    Conf {
        admins: vec!["root".into()],
        relations: Default::default(),
        store: BackendConf {
            backend: "sqlite".into(),
            options: serde_json::json!({"path": ":memory:"}),
        },
    }
}

#[tokio::test]
async fn configure_sqlite_store() {
    let context = Context::fixture();
    let injector = Injector::configure(&context, sqlite_conf(), RelationsFixture::default())
        .await
        .unwrap();

    let root = injector.authorised_user(Identity::new("root"));
    let group = injector.groups.add(&context, &root, "ops").await.unwrap();
    let found = injector
        .groups
        .get_by_uuid(&context, &root, group.uuid)
        .await
        .unwrap();
    assert_eq!(found.name, "ops");
    assert_eq!(injector.roles.count(&context, &root).await.unwrap(), 0);
}

#[tokio::test]
async fn configure_unknown_backend() {
    let context = Context::fixture();
    let mut conf = sqlite_conf();
    conf.store.backend = "postgres".into();
    let error = Injector::configure(&context, conf, RelationsFixture::default())
        .await
        .err()
        .expect("configuration to fail");
    assert!(error.is::<BackendNotFound>());
}

#[tokio::test]
async fn configure_invalid_options() {
    let context = Context::fixture();
    let mut conf = sqlite_conf();
    conf.store.options = serde_json::json!({"file": "fleet.db"});
    let result = Injector::configure(&context, conf, RelationsFixture::default()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn configure_relations_client() {
    let context = Context::fixture();
    let graph = RelationsFixture::default();
    let mut conf = sqlite_conf();
    conf.relations = RelationsConf {
        page_size: 1,
        trace_checks: true,
    };
    let injector = Injector::configure(&context, conf, graph.clone())
        .await
        .unwrap();
    assert_eq!(injector.relations.conf().page_size, 1);
    assert!(injector.relations.conf().trace_checks);

    let model = Resource::Model(Uuid::new_v4());
    let tuples = [
        Tuple::new(
            Resource::User("alice".into()),
            Relation::Reader,
            model.clone(),
        ),
        Tuple::new(
            Resource::User("bob".into()),
            Relation::Reader,
            model.clone(),
        ),
    ];
    injector
        .relations
        .add_relation(&context, &tuples)
        .await
        .unwrap();
    let found = injector
        .relations
        .find_all_tuples(&context, &TupleFilter::target(model))
        .await
        .unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(graph.reads(), vec![1, 1]);
}

#[tokio::test]
async fn sync_sqlite_store() {
    let context = Context::fixture();
    Injector::sync(&context, &Backends::builtin(), &sqlite_conf())
        .await
        .unwrap();
}

#[test]
#[should_panic(expected = "a StoreBackend with id 'sqlite' is already registered")]
fn register_duplicate_backend() {
    let mut backends = Backends::builtin();
    backends.register_store("sqlite", fleetcore_store_sqlite::SQLiteFactory);
}

#[test]
fn admin_flag_from_conf() {
    let (injector, _) = Injector::fixture(&["root"]);
    assert!(injector.authorised_user(Identity::new("root")).is_admin());
    assert!(!injector.authorised_user(Identity::new("alice")).is_admin());
}

#[test]
fn context_user_requires_identity() {
    let (injector, _) = Injector::fixture(&[]);
    let context = Context::fixture();
    let error = injector
        .context_user(&context)
        .err()
        .expect("anonymous user");
    assert!(error.is::<Unauthorized>());

    let context = context.derive_with(|builder| builder.authenticated(Identity::new("alice")));
    let user = injector.context_user(&context).unwrap();
    assert_eq!(user.identity().name, "alice");
}

#[tokio::test]
async fn token_generator_session() {
    let context = Context::fixture();
    let (injector, _) = Injector::fixture(&[]);
    let alice = injector.authorised_user(Identity::new("alice"));
    let model = Uuid::new_v4();
    let controller = Uuid::new_v4();
    alice
        .set_model_access(&context, model, Relation::Writer)
        .await
        .unwrap();

    let controllers = ControllersFixture::default();
    controllers.insert(controller, ["aws"]);
    let generator =
        injector.token_generator(Arc::new(controllers), Arc::new(SignerFixture::default()));
    generator.set_tags(Some(model), Some(controller)).await;
    let token = generator
        .make_login_token(&context, Some(&alice))
        .await
        .unwrap();
    let claims = SignerFixture::decode(&token);
    assert_eq!(
        claims.access.get(&format!("model-{model}")),
        Some(&"write".to_string())
    );
}
