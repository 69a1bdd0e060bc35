//! Grant and revoke relations for an [`AuthorisedUser`].
//!
//! All operations are idempotent: granting an existing relation or revoking a
//! missing one is not an error. Graph errors are propagated to the caller.
use anyhow::Result;
use uuid::Uuid;

use fleetcore_context::Context;
use fleetcore_errors::Validation;
use fleetcore_models::Relation;
use fleetcore_models::Resource;
use fleetcore_models::ResourceKind;
use fleetcore_models::Tuple;

use crate::AuthorisedUser;

impl AuthorisedUser {
    /// Make the user a member of the group.
    pub async fn add_to_group(&self, context: &Context, group: Uuid) -> Result<()> {
        self.set_access(context, Resource::Group(group), Relation::Member)
            .await
    }

    /// Assign the role to the user.
    pub async fn assign_role(&self, context: &Context, role: Uuid) -> Result<()> {
        self.set_access(context, Resource::Role(role), Relation::Assignee)
            .await
    }

    /// Remove the user from the group.
    pub async fn remove_from_group(&self, context: &Context, group: Uuid) -> Result<()> {
        self.unset_access(context, Resource::Group(group), &[Relation::Member])
            .await
    }

    /// Remove the role assignment from the user.
    pub async fn unassign_role(&self, context: &Context, role: Uuid) -> Result<()> {
        self.unset_access(context, Resource::Role(role), &[Relation::Assignee])
            .await
    }

    pub async fn set_application_offer_access(
        &self,
        context: &Context,
        offer: Uuid,
        relation: Relation,
    ) -> Result<()> {
        self.set_access(context, Resource::ApplicationOffer(offer), relation)
            .await
    }

    pub async fn set_cloud_access(
        &self,
        context: &Context,
        cloud: &str,
        relation: Relation,
    ) -> Result<()> {
        self.set_access(context, Resource::Cloud(cloud.to_string()), relation)
            .await
    }

    pub async fn set_controller_access(
        &self,
        context: &Context,
        controller: Uuid,
        relation: Relation,
    ) -> Result<()> {
        self.set_access(context, Resource::Controller(controller), relation)
            .await
    }

    pub async fn set_model_access(
        &self,
        context: &Context,
        model: Uuid,
        relation: Relation,
    ) -> Result<()> {
        self.set_access(context, Resource::Model(model), relation)
            .await
    }

    pub async fn set_service_account_access(
        &self,
        context: &Context,
        account: &str,
        relation: Relation,
    ) -> Result<()> {
        let account = Resource::ServiceAccount(account.to_string());
        self.set_access(context, account, relation).await
    }

    pub async fn unset_application_offer_access(
        &self,
        context: &Context,
        offer: Uuid,
        relations: &[Relation],
    ) -> Result<()> {
        self.unset_access(context, Resource::ApplicationOffer(offer), relations)
            .await
    }

    pub async fn unset_cloud_access(
        &self,
        context: &Context,
        cloud: &str,
        relations: &[Relation],
    ) -> Result<()> {
        self.unset_access(context, Resource::Cloud(cloud.to_string()), relations)
            .await
    }

    pub async fn unset_controller_access(
        &self,
        context: &Context,
        controller: Uuid,
        relations: &[Relation],
    ) -> Result<()> {
        self.unset_access(context, Resource::Controller(controller), relations)
            .await
    }

    pub async fn unset_model_access(
        &self,
        context: &Context,
        model: Uuid,
        relations: &[Relation],
    ) -> Result<()> {
        self.unset_access(context, Resource::Model(model), relations)
            .await
    }

    pub async fn unset_service_account_access(
        &self,
        context: &Context,
        account: &str,
        relations: &[Relation],
    ) -> Result<()> {
        let account = Resource::ServiceAccount(account.to_string());
        self.unset_access(context, account, relations).await
    }
}

impl AuthorisedUser {
    async fn set_access(
        &self,
        context: &Context,
        target: Resource,
        relation: Relation,
    ) -> Result<()> {
        check_applicable(&target, relation)?;
        let tuple = Tuple::new(self.entity(), relation, target);
        self.relations.add_relation(context, &[tuple]).await
    }

    async fn unset_access(
        &self,
        context: &Context,
        target: Resource,
        relations: &[Relation],
    ) -> Result<()> {
        for relation in relations {
            check_applicable(&target, *relation)?;
        }
        self.relations
            .unset_multiple_resource_accesses(context, &self.entity(), &target, relations)
            .await
    }
}

/// Relations users can directly hold to each kind of resource.
fn applicable_relations(kind: ResourceKind) -> &'static [Relation] {
    match kind {
        ResourceKind::ApplicationOffer => &[
            Relation::Administrator,
            Relation::Consumer,
            Relation::Reader,
        ],
        ResourceKind::Cloud => &[Relation::Administrator, Relation::CanAddModel],
        ResourceKind::Controller => &[Relation::Administrator, Relation::AuditLogViewer],
        ResourceKind::Group => &[Relation::Member],
        ResourceKind::Model => &[Relation::Administrator, Relation::Writer, Relation::Reader],
        ResourceKind::Role => &[Relation::Assignee],
        ResourceKind::ServiceAccount => &[Relation::Administrator],
        ResourceKind::User => &[],
    }
}

fn check_applicable(target: &Resource, relation: Relation) -> Result<()> {
    let kind = target.kind();
    if applicable_relations(kind).contains(&relation) {
        return Ok(());
    }
    let reason = format!("relation '{relation}' does not apply to {kind} resources");
    Err(Validation::new(reason).into())
}
