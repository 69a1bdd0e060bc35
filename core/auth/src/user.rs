//! Capability predicates and access aggregation for an authenticated identity.
use anyhow::Result;
use uuid::Uuid;

use replisdk::utils::error::slog::ErrorAttributes;

use fleetcore_context::Context;
use fleetcore_errors::Unauthorized;
use fleetcore_models::AccessLevel;
use fleetcore_models::Entity;
use fleetcore_models::Identity;
use fleetcore_models::Relation;
use fleetcore_models::Resource;
use fleetcore_models::ResourceKind;
use fleetcore_relations::Relations;

/// An authenticated identity able to answer authorisation questions about itself.
///
/// Instances are never mutated after construction and can be cloned freely.
#[derive(Clone)]
pub struct AuthorisedUser {
    admin: bool,
    identity: Identity,
    pub(crate) relations: Relations,
}

impl AuthorisedUser {
    /// Wrap an authenticated identity for authorisation checks.
    ///
    /// The `admin` flag marks authorization administrators (superusers) and is
    /// determined outside of the authorization graph.
    pub fn new(identity: Identity, admin: bool, relations: Relations) -> AuthorisedUser {
        AuthorisedUser {
            admin,
            identity,
            relations,
        }
    }

    /// The user as a subject of relation tuples.
    pub fn entity(&self) -> Entity {
        Entity::from(self.identity.resource())
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Whether the user is an authorization administrator.
    pub fn is_admin(&self) -> bool {
        self.admin
    }

    /// Fail with [`Unauthorized`] unless the user is an authorization administrator.
    ///
    /// Denials are logged as audit records naming the attempted action.
    pub fn require_admin(&self, context: &Context, action: &str) -> Result<()> {
        if self.admin {
            return Ok(());
        }
        slog::warn!(
            context.logger, "Denied administrative operation to non-admin user";
            "audit" => true,
            "action" => action.to_string(),
            "subject" => self.identity.tag(),
        );
        let error = Unauthorized::new(format!("{} requires administrator access", action));
        Err(error.into())
    }
}

// --- Capability predicates --- //
impl AuthorisedUser {
    /// Check the user holds the relation to the resource, propagating check errors.
    pub async fn check_relation(
        &self,
        context: &Context,
        relation: Relation,
        resource: &Resource,
    ) -> Result<bool> {
        self.relations
            .check(context, &self.entity(), relation, resource, false)
            .await
    }

    /// Check the user holds the relation to the resource, denying on errors.
    pub async fn has_relation(
        &self,
        context: &Context,
        relation: Relation,
        resource: &Resource,
    ) -> bool {
        match self.check_relation(context, relation, resource).await {
            Ok(allowed) => allowed,
            Err(error) => {
                self.log_check_failure(context, relation, resource, &error);
                false
            }
        }
    }

    /// The user can consume the application offer.
    pub async fn is_application_offer_consumer(&self, context: &Context, offer: Uuid) -> bool {
        let offer = Resource::ApplicationOffer(offer);
        self.has_relation(context, Relation::Consumer, &offer).await
    }

    /// The user can read the application offer.
    pub async fn is_application_offer_reader(&self, context: &Context, offer: Uuid) -> bool {
        let offer = Resource::ApplicationOffer(offer);
        self.has_relation(context, Relation::Reader, &offer).await
    }

    /// The user can add models to the cloud.
    pub async fn is_allowed_add_model(&self, context: &Context, cloud: &str) -> bool {
        let cloud = Resource::Cloud(cloud.to_string());
        self.has_relation(context, Relation::CanAddModel, &cloud)
            .await
    }

    /// The user can read the model.
    pub async fn is_model_reader(&self, context: &Context, model: Uuid) -> bool {
        let model = Resource::Model(model);
        self.has_relation(context, Relation::Reader, &model).await
    }

    /// The user can write to the model.
    pub async fn is_model_writer(&self, context: &Context, model: Uuid) -> bool {
        let model = Resource::Model(model);
        self.has_relation(context, Relation::Writer, &model).await
    }

    /// The user administers the service account.
    pub async fn is_service_account_admin(&self, context: &Context, account: &str) -> bool {
        let account = Resource::ServiceAccount(account.to_string());
        self.has_relation(context, Relation::Administrator, &account)
            .await
    }
}

// --- Access level aggregation --- //
impl AuthorisedUser {
    /// Effective access of the user to an application offer.
    pub async fn application_offer_access(&self, context: &Context, offer: Uuid) -> AccessLevel {
        let offer = Resource::ApplicationOffer(offer);
        let ladder = [
            (Relation::Administrator, AccessLevel::Admin),
            (Relation::Consumer, AccessLevel::Consume),
            (Relation::Reader, AccessLevel::Read),
        ];
        self.first_granted(context, &offer, &ladder, AccessLevel::None)
            .await
    }

    /// Effective access of the user to a cloud.
    pub async fn cloud_access(&self, context: &Context, cloud: &str) -> AccessLevel {
        let cloud = Resource::Cloud(cloud.to_string());
        let ladder = [
            (Relation::Administrator, AccessLevel::Admin),
            (Relation::CanAddModel, AccessLevel::AddModel),
        ];
        self.first_granted(context, &cloud, &ladder, AccessLevel::None)
            .await
    }

    /// Effective access of the user to a controller.
    ///
    /// Authorization administrators and controller administrators are superusers,
    /// everyone else can only login.
    pub async fn controller_access(&self, context: &Context, controller: Uuid) -> AccessLevel {
        if self.admin {
            return AccessLevel::Superuser;
        }
        let controller = Resource::Controller(controller);
        let ladder = [(Relation::Administrator, AccessLevel::Superuser)];
        self.first_granted(context, &controller, &ladder, AccessLevel::Login)
            .await
    }

    /// Effective access of the user to a model.
    pub async fn model_access(&self, context: &Context, model: Uuid) -> AccessLevel {
        let model = Resource::Model(model);
        let ladder = [
            (Relation::Administrator, AccessLevel::Admin),
            (Relation::Writer, AccessLevel::Write),
            (Relation::Reader, AccessLevel::Read),
        ];
        self.first_granted(context, &model, &ladder, AccessLevel::None)
            .await
    }

    /// List the UUIDs of all models the user holds the relation to.
    pub async fn list_models(&self, context: &Context, relation: Relation) -> Result<Vec<Uuid>> {
        let models = self
            .relations
            .list_objects(context, &self.entity(), relation, ResourceKind::Model, &[])
            .await?;
        let models = models
            .into_iter()
            .filter_map(|model| match model {
                Resource::Model(uuid) => Some(uuid),
                _ => None,
            })
            .collect();
        Ok(models)
    }

    /// Return the access level of the first granted relation in the ladder.
    ///
    /// A failed check stops the walk and returns the `denied` level.
    async fn first_granted(
        &self,
        context: &Context,
        resource: &Resource,
        ladder: &[(Relation, AccessLevel)],
        denied: AccessLevel,
    ) -> AccessLevel {
        for (relation, access) in ladder {
            match self.check_relation(context, *relation, resource).await {
                Ok(true) => return *access,
                Ok(false) => continue,
                Err(error) => {
                    self.log_check_failure(context, *relation, resource, &error);
                    return denied;
                }
            }
        }
        denied
    }

    fn log_check_failure(
        &self,
        context: &Context,
        relation: Relation,
        resource: &Resource,
        error: &anyhow::Error,
    ) {
        slog::warn!(
            context.logger, "Relation check failed, denying access";
            "subject" => self.identity.tag(),
            "relation" => relation.as_str(),
            "resource" => resource.to_string(),
            ErrorAttributes::from(error),
        );
    }
}
