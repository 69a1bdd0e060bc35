//! Orchestrate the principal store and the authorization graph to manage principals.
use std::marker::PhantomData;
use std::pin::Pin;

use anyhow::Result;
use futures::Stream;
use futures::TryStreamExt;
use uuid::Uuid;

use replisdk::utils::error::slog::ErrorAttributes;

use fleetcore_auth::AuthorisedUser;
use fleetcore_context::Context;
use fleetcore_errors::NotFound;
use fleetcore_models::Pagination;
use fleetcore_models::Relation;
use fleetcore_models::Resource;
use fleetcore_relations::Relations;
use fleetcore_store::delete::DeleteOp;
use fleetcore_store::ids::PrincipalKey;
use fleetcore_store::persist::PersistOp;
use fleetcore_store::query::ListPrincipals;
use fleetcore_store::query::QueryOp;
use fleetcore_store::transaction::StoreTransaction;
use fleetcore_store::Store;

use crate::telemetry::CLEANUP_FAILURES;

/// Stream of principal records returned by list queries.
pub type PrincipalStream<P> = Pin<Box<dyn Stream<Item = Result<P>> + Send>>;

/// Kinds of principals managed by a [`PrincipalManager`].
///
/// Binds a principal record to the store operations and graph relations for its kind.
pub trait Principal:
    PersistOp<Response = Self> + self::seal::SealPrincipal + Send + Sized + 'static
{
    /// Name of the principal kind in logs, errors and metrics.
    const KIND: &'static str;

    /// Relation that makes a subject part of the principal, such as group membership.
    const USERSET: Relation;

    type Count: QueryOp<Response = u64>;
    type Delete: DeleteOp<Response = ()>;
    type List: QueryOp<Response = PrincipalStream<Self>>;
    type Lookup: QueryOp<Response = Option<Self>>;

    /// Create a new record with a freshly generated UUID.
    fn create(name: &str) -> Self;

    fn count() -> Self::Count;
    fn delete(&self) -> Self::Delete;
    fn list(op: ListPrincipals) -> Self::List;
    fn lookup(key: PrincipalKey) -> Self::Lookup;

    /// Lookup the record within a store transaction.
    fn lookup_tx(tx: &mut dyn StoreTransaction, key: &PrincipalKey) -> Result<Option<Self>>;

    /// Store the record's updated name within a store transaction.
    fn rename_tx(tx: &mut dyn StoreTransaction, entry: &Self) -> Result<()>;

    fn name(&self) -> &str;
    fn resource(&self) -> Resource;
    fn set_name(&mut self, name: String);
    fn uuid(&self) -> Uuid;
}

/// Add, rename, remove and list principals of one kind.
pub struct PrincipalManager<P> {
    kind: PhantomData<fn() -> P>,
    relations: Relations,
    store: Store,
}

impl<P> Clone for PrincipalManager<P> {
    fn clone(&self) -> Self {
        PrincipalManager {
            kind: PhantomData,
            relations: self.relations.clone(),
            store: self.store.clone(),
        }
    }
}

impl<P: Principal> PrincipalManager<P> {
    pub fn new(store: Store, relations: Relations) -> PrincipalManager<P> {
        PrincipalManager {
            kind: PhantomData,
            relations,
            store,
        }
    }

    /// Create a new principal with a freshly generated UUID.
    ///
    /// Names already in use result in an [`AlreadyExists`](fleetcore_errors::AlreadyExists) error.
    pub async fn add(&self, context: &Context, user: &AuthorisedUser, name: &str) -> Result<P> {
        let op = format!("{}.add", P::KIND);
        user.require_admin(context, &op)?;
        crate::validate_name(P::KIND, name)?;
        let entry = self
            .store
            .persist(context, P::create(name))
            .await
            .map_err(crate::upstream(op))?;
        slog::info!(
            context.logger, "Added principal";
            "kind" => P::KIND,
            "name" => entry.name(),
            "uuid" => entry.uuid().to_string(),
        );
        Ok(entry)
    }

    /// Count all principals.
    pub async fn count(&self, context: &Context, user: &AuthorisedUser) -> Result<u64> {
        let op = format!("{}.count", P::KIND);
        user.require_admin(context, &op)?;
        self.store
            .query(context, P::count())
            .await
            .map_err(crate::upstream(op))
    }

    /// Lookup a principal by name.
    pub async fn get_by_name(
        &self,
        context: &Context,
        user: &AuthorisedUser,
        name: &str,
    ) -> Result<P> {
        user.require_admin(context, &format!("{}.get", P::KIND))?;
        self.lookup(context, PrincipalKey::from(name)).await
    }

    /// Lookup a principal by UUID.
    pub async fn get_by_uuid(
        &self,
        context: &Context,
        user: &AuthorisedUser,
        uuid: Uuid,
    ) -> Result<P> {
        user.require_admin(context, &format!("{}.get", P::KIND))?;
        self.lookup(context, PrincipalKey::from(uuid)).await
    }

    /// List principals sorted by name, optionally filtered by a substring of their name or UUID.
    pub async fn list(
        &self,
        context: &Context,
        user: &AuthorisedUser,
        pagination: Pagination,
        filter: &str,
    ) -> Result<Vec<P>> {
        let op = format!("{}.list", P::KIND);
        user.require_admin(context, &op)?;
        let filter = match filter {
            "" => None,
            filter => Some(filter.to_string()),
        };
        let query = P::list(ListPrincipals { filter, pagination });
        let entries = self
            .store
            .query(context, query)
            .await
            .map_err(crate::upstream(op.clone()))?;
        entries
            .try_collect::<Vec<_>>()
            .await
            .map_err(crate::upstream(op))
    }

    /// Remove a principal and every relation referencing it.
    ///
    /// The authorization graph is cleaned up before the record is deleted
    /// so a failed cleanup leaves the principal in place for the removal to be retried.
    pub async fn remove(&self, context: &Context, user: &AuthorisedUser, name: &str) -> Result<()> {
        let op = format!("{}.remove", P::KIND);
        user.require_admin(context, &op)?;
        let entry = self.lookup(context, PrincipalKey::from(name)).await?;

        let cleanup = self
            .relations
            .remove_principal(context, entry.resource(), P::USERSET)
            .await;
        if let Err(error) = cleanup {
            CLEANUP_FAILURES.with_label_values(&[P::KIND]).inc();
            slog::error!(
                context.logger, "Failed to remove principal relations, principal is kept";
                "kind" => P::KIND,
                "name" => entry.name(),
                "uuid" => entry.uuid().to_string(),
                ErrorAttributes::from(&error),
            );
            return Err(error);
        }

        self.store
            .delete(context, entry.delete())
            .await
            .map_err(crate::upstream(op))?;
        slog::info!(
            context.logger, "Removed principal";
            "kind" => P::KIND,
            "name" => entry.name(),
            "uuid" => entry.uuid().to_string(),
        );
        Ok(())
    }

    /// Change the name of a principal.
    ///
    /// Relations reference principals by UUID so memberships, assignments
    /// and grants are not affected.
    pub async fn rename(
        &self,
        context: &Context,
        user: &AuthorisedUser,
        name: &str,
        new_name: &str,
    ) -> Result<P> {
        let op = format!("{}.rename", P::KIND);
        user.require_admin(context, &op)?;
        crate::validate_name(P::KIND, new_name)?;
        let key = PrincipalKey::from(name);
        let new_name = new_name.to_string();
        let entry = self
            .store
            .transaction(context, move |tx| {
                let mut entry = P::lookup_tx(tx, &key)?
                    .ok_or_else(|| NotFound::new(P::KIND, key.to_string()))?;
                entry.set_name(new_name);
                P::rename_tx(tx, &entry)?;
                Ok(entry)
            })
            .await
            .map_err(crate::upstream(op))?;
        slog::info!(
            context.logger, "Renamed principal";
            "kind" => P::KIND,
            "name" => entry.name(),
            "previous" => name.to_string(),
            "uuid" => entry.uuid().to_string(),
        );
        Ok(entry)
    }

    async fn lookup(&self, context: &Context, key: PrincipalKey) -> Result<P> {
        let id = key.to_string();
        self.store
            .query(context, P::lookup(key))
            .await
            .map_err(crate::upstream(format!("{}.get", P::KIND)))?
            .ok_or_else(|| NotFound::new(P::KIND, id).into())
    }
}

/// Private module to seal implementation details.
pub(crate) mod seal {
    /// Super-trait to seal the [`Principal`](super::Principal) trait.
    pub trait SealPrincipal {}
}
