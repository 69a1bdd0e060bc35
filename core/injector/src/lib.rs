//! Explicit dependency container for the fleet control plane.
//!
//! The [`Injector`] is built once from the process [`Conf`] and handed to the components
//! that need it. There are no process global instances: every collaborator is injected
//! through constructors, which keeps tests free to build their own.
use std::sync::Arc;

use anyhow::Result;

use fleetcore_auth::AuthorisedUser;
use fleetcore_conf::Conf;
use fleetcore_context::Context;
use fleetcore_errors::Unauthorized;
use fleetcore_models::Identity;
use fleetcore_principals::GroupManager;
use fleetcore_principals::RoleManager;
use fleetcore_relations::RelationBackend;
use fleetcore_relations::Relations;
use fleetcore_store::Store;
use fleetcore_store::StoreFactoryArgs;
use fleetcore_store::StoreFactorySyncArgs;
use fleetcore_tokens::ControllerLookup;
use fleetcore_tokens::TokenGenerator;
use fleetcore_tokens::TokenSigner;

mod backends;

#[cfg(test)]
mod tests;

pub use self::backends::BackendNotFound;
pub use self::backends::Backends;

/// Container for the dependencies of control plane operations.
#[derive(Clone)]
pub struct Injector {
    /// Process global configuration.
    pub conf: Conf,

    /// Management of groups of identities.
    pub groups: GroupManager,

    /// Client to the authorization graph.
    pub relations: Relations,

    /// Management of roles identities are assigned to.
    pub roles: RoleManager,

    /// Principal store the managers operate on.
    pub store: Store,
}

impl Injector {
    /// Build an [`Injector`] with the backends built into the control plane.
    pub async fn configure<T>(context: &Context, conf: Conf, graph: T) -> Result<Self>
    where
        T: RelationBackend + 'static,
    {
        Self::configure_with(context, &Backends::builtin(), conf, graph).await
    }

    /// Build an [`Injector`] selecting backends from the given registry.
    ///
    /// The graph transport is provided by the caller as it is not selected through
    /// configuration, but the graph client is configured from [`Conf::relations`].
    pub async fn configure_with<T>(
        context: &Context,
        backends: &Backends,
        conf: Conf,
        graph: T,
    ) -> Result<Self>
    where
        T: RelationBackend + 'static,
    {
        let relations = Relations::new(graph, conf.relations.clone());
        let factory = backends.store(&conf.store.backend)?;
        factory.conf_check(context, &conf.store.options)?;
        let args = StoreFactoryArgs {
            conf: &conf.store.options,
            context,
        };
        let store = factory.store(args).await?;
        slog::debug!(
            context.logger, "Principal store client initialised";
            "backend" => &conf.store.backend,
        );
        Ok(Self::assemble(conf, relations, store))
    }

    /// Register metrics for the control plane and the selected backends.
    pub fn register_metrics(
        backends: &Backends,
        conf: &Conf,
        registry: &prometheus::Registry,
    ) -> Result<()> {
        backends
            .store(&conf.store.backend)?
            .register_metrics(registry)?;
        fleetcore_relations::register_metrics(registry)?;
        fleetcore_principals::register_metrics(registry)?;
        fleetcore_tokens::register_metrics(registry)?;
        Ok(())
    }

    /// Initialise or migrate the selected principal store backend.
    pub async fn sync(context: &Context, backends: &Backends, conf: &Conf) -> Result<()> {
        let factory = backends.store(&conf.store.backend)?;
        factory.conf_check(context, &conf.store.options)?;
        let args = StoreFactorySyncArgs {
            conf: &conf.store.options,
            context,
        };
        factory.sync(args).await?;
        slog::info!(
            context.logger, "Principal store synchronised";
            "backend" => &conf.store.backend,
        );
        Ok(())
    }
}

impl Injector {
    /// Wrap an identity for authorisation checks.
    ///
    /// The authorization admin flag is granted to identities listed in the configuration.
    pub fn authorised_user(&self, identity: Identity) -> AuthorisedUser {
        let admin = self.conf.is_admin(&identity.name);
        AuthorisedUser::new(identity, admin, self.relations.clone())
    }

    /// Wrap the identity authenticated for the [`Context`] for authorisation checks.
    pub fn context_user(&self, context: &Context) -> Result<AuthorisedUser> {
        let identity = context
            .identity
            .clone()
            .ok_or_else(|| Unauthorized::new("authentication required"))?;
        Ok(self.authorised_user(identity))
    }

    /// Create a capability token generator for a new client session.
    pub fn token_generator(
        &self,
        controllers: Arc<dyn ControllerLookup>,
        signer: Arc<dyn TokenSigner>,
    ) -> TokenGenerator {
        TokenGenerator::new(controllers, signer)
    }

    fn assemble(conf: Conf, relations: Relations, store: Store) -> Injector {
        let groups = GroupManager::new(store.clone(), relations.clone());
        let roles = RoleManager::new(store.clone(), relations.clone());
        Injector {
            conf,
            groups,
            relations,
            roles,
            store,
        }
    }
}

#[cfg(any(test, feature = "test-fixture"))]
impl Injector {
    /// [`Injector`] instance to be used with unit tests.
    ///
    /// Stores and the authorization graph are in-memory fixtures.
    pub fn fixture(admins: &[&str]) -> (Injector, fleetcore_relations::RelationsFixture) {
        let conf = Conf {
            admins: admins.iter().map(|admin| admin.to_string()).collect(),
            relations: Default::default(),
            store: fleetcore_conf::BackendConf {
                backend: "fixture".into(),
                options: Default::default(),
            },
        };
        let graph = fleetcore_relations::RelationsFixture::default();
        let relations = Relations::new(graph.clone(), conf.relations.clone());
        let injector = Self::assemble(conf, relations, Store::fixture());
        (injector, graph)
    }
}
