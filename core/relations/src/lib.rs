//! Interface to the external relationship based authorization graph.
//!
//! The graph is the only persistent record of who can do what: a set of [`Tuple`]s,
//! each recording that an object holds a relation to a target.
//! This crate defines the operations the control plane needs from the graph
//! ([`RelationBackend`]) and wraps them in the [`Relations`] handle, which adds
//! telemetry, error context and the multi-step helpers built on top of the primitives.
//!
//! ## Idempotent mutations
//!
//! Adding a tuple that already exists or removing a tuple that does not exist is not an error.
//! Removal in the graph is exact-match only, so revoking "whatever subset of these relations
//! the object currently holds" is implemented by scanning for the tuples that actually exist
//! and removing the matching ones with a single batched call
//! (see [`Relations::unset_multiple_resource_accesses`]).
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use opentelemetry_api::trace::FutureExt;
use uuid::Uuid;

use fleetcore_context::Context;
use fleetcore_errors::Upstream;
use fleetcore_models::Entity;
use fleetcore_models::Relation;
use fleetcore_models::Resource;
use fleetcore_models::ResourceKind;
use fleetcore_models::TargetFilter;
use fleetcore_models::Tuple;
use fleetcore_models::TupleFilter;

mod conf;
mod telemetry;

#[cfg(any(test, feature = "test-fixture"))]
mod fixture;
#[cfg(any(test, feature = "test-fixture"))]
pub use self::fixture::RelationsFixture;


pub use self::conf::RelationsConf;
pub use self::telemetry::register_metrics;

/// Result of a relation check.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CheckResponse {
    /// The object holds the relation to the target.
    pub allowed: bool,

    /// Diagnostic explanation of the decision, if one was requested and is available.
    pub resolution: Option<String>,
}

/// A page of tuples returned by a graph scan.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TuplePage {
    /// Cursor to request the next page with, `None` once the scan is complete.
    pub continuation_token: Option<String>,

    /// Tuples matching the scan filter.
    pub tuples: Vec<Tuple>,
}

/// Operations implemented by authorization graph engines supported by the control plane.
///
/// Implementations must honour the idempotence contract of the mutations:
/// writing existing tuples and deleting missing tuples succeed without changes.
#[async_trait::async_trait]
pub trait RelationBackend: Send + Sync {
    /// Check if the tuple object holds the relation to the tuple target.
    async fn check(&self, context: &Context, tuple: &Tuple, trace: bool) -> Result<CheckResponse>;

    /// Delete a batch of tuples from the graph.
    async fn delete(&self, context: &Context, tuples: &[Tuple]) -> Result<()>;

    /// List all targets of the given kind the subject holds the relation to.
    ///
    /// The `contextual` tuples are considered part of the graph for this request only.
    async fn list_objects(
        &self,
        context: &Context,
        subject: &Entity,
        relation: Relation,
        kind: ResourceKind,
        contextual: &[Tuple],
    ) -> Result<Vec<Resource>>;

    /// Read a page of tuples matching the filter.
    async fn read(
        &self,
        context: &Context,
        filter: &TupleFilter,
        page_size: u32,
        continuation_token: Option<String>,
    ) -> Result<TuplePage>;

    /// Write a batch of tuples to the graph.
    async fn write(&self, context: &Context, tuples: &[Tuple]) -> Result<()>;
}

/// Access the authorization graph.
#[derive(Clone)]
pub struct Relations {
    conf: RelationsConf,
    inner: Arc<dyn RelationBackend>,
}

impl Relations {
    /// Wrap a [`RelationBackend`] for use by the system.
    pub fn new<T>(backend: T, conf: RelationsConf) -> Self
    where
        T: RelationBackend + 'static,
    {
        let inner = Arc::new(backend);
        Relations { conf, inner }
    }

    /// Configuration the graph client was created with.
    pub fn conf(&self) -> &RelationsConf {
        &self.conf
    }

    /// Add a batch of tuples to the graph, ignoring tuples that already exist.
    pub async fn add_relation(&self, context: &Context, tuples: &[Tuple]) -> Result<()> {
        if tuples.is_empty() {
            return Ok(());
        }
        observe("write", self.inner.write(context, tuples)).await
    }

    /// Check if the object holds the relation to the target.
    ///
    /// When `trace` is set (or checks are traced by configuration) the diagnostic
    /// explanation returned by the backend is logged.
    pub async fn check(
        &self,
        context: &Context,
        object: &Entity,
        relation: Relation,
        target: &Resource,
        trace: bool,
    ) -> Result<bool> {
        let trace = trace || self.conf.trace_checks;
        let tuple = Tuple::new(object.clone(), relation, target.clone());
        let response = observe("check", self.inner.check(context, &tuple, trace)).await?;
        if let Some(resolution) = response.resolution {
            slog::debug!(
                context.logger, "Relation check resolved";
                "tuple" => tuple.to_string(),
                "allowed" => response.allowed,
                "resolution" => resolution,
            );
        }
        Ok(response.allowed)
    }

    /// Scan the graph for all tuples matching the filter, following continuation tokens.
    pub async fn find_all_tuples(
        &self,
        context: &Context,
        filter: &TupleFilter,
    ) -> Result<Vec<Tuple>> {
        let mut tuples = Vec::new();
        let mut continuation_token = None;
        loop {
            let page = self
                .find_matching_tuples(context, filter, 0, continuation_token)
                .await?;
            tuples.extend(page.tuples);
            match page.continuation_token {
                None => return Ok(tuples),
                Some(token) => continuation_token = Some(token),
            }
        }
    }

    /// Read one page of tuples matching the filter.
    ///
    /// A `page_size` of `0` uses the configured default.
    pub async fn find_matching_tuples(
        &self,
        context: &Context,
        filter: &TupleFilter,
        page_size: u32,
        continuation_token: Option<String>,
    ) -> Result<TuplePage> {
        let page_size = if page_size == 0 {
            self.conf.page_size
        } else {
            page_size
        };
        let read = self
            .inner
            .read(context, filter, page_size, continuation_token);
        let mut page = observe("read", read).await?;

        // Normalise empty tokens some engines use to signal the end of a scan.
        if matches!(page.continuation_token.as_deref(), Some("")) {
            page.continuation_token = None;
        }
        Ok(page)
    }

    /// List all targets of the given kind the subject holds the relation to.
    pub async fn list_objects(
        &self,
        context: &Context,
        subject: &Entity,
        relation: Relation,
        kind: ResourceKind,
        contextual: &[Tuple],
    ) -> Result<Vec<Resource>> {
        let list = self
            .inner
            .list_objects(context, subject, relation, kind, contextual);
        observe("list_objects", list).await
    }

    /// Remove a batch of tuples from the graph, ignoring tuples that do not exist.
    pub async fn remove_relation(&self, context: &Context, tuples: &[Tuple]) -> Result<()> {
        if tuples.is_empty() {
            return Ok(());
        }
        observe("delete", self.inner.delete(context, tuples)).await
    }

    /// Remove every tuple referencing the group, as target or as (member) object.
    pub async fn remove_group(&self, context: &Context, group: Uuid) -> Result<()> {
        self.remove_principal(context, Resource::Group(group), Relation::Member)
            .await
    }

    /// Remove every tuple referencing the role, as target or as (assignee) object.
    pub async fn remove_role(&self, context: &Context, role: Uuid) -> Result<()> {
        self.remove_principal(context, Resource::Role(role), Relation::Assignee)
            .await
    }

    /// Revoke any of the given relations the object currently holds to the target.
    ///
    /// The tuples that actually exist are discovered first and removed with one batched call.
    /// Relations the object does not hold are ignored, so the operation is idempotent.
    pub async fn unset_multiple_resource_accesses(
        &self,
        context: &Context,
        object: &Entity,
        target: &Resource,
        relations: &[Relation],
    ) -> Result<()> {
        let filter = TupleFilter {
            object: Some(object.clone()),
            relation: None,
            target: TargetFilter::Exact(target.clone()),
        };
        let existing = self.find_all_tuples(context, &filter).await?;
        let revoke: Vec<Tuple> = existing
            .into_iter()
            .filter(|tuple| relations.contains(&tuple.relation))
            .collect();
        self.remove_relation(context, &revoke).await
    }

    /// Remove every tuple referencing the principal in one batch.
    ///
    /// Tuples are matched with the principal as target, as object and as the
    /// `userset` subject (such as `group:<uuid>#member`) across all target kinds.
    pub async fn remove_principal(
        &self,
        context: &Context,
        principal: Resource,
        userset: Relation,
    ) -> Result<()> {
        let mut doomed = BTreeSet::new();
        let targeting = TupleFilter::target(principal.clone());
        doomed.extend(self.find_all_tuples(context, &targeting).await?);

        // Tuple scans need a target kind, so look for the principal as object in each.
        let objects = [
            Entity::from(principal.clone()),
            Entity::userset(principal.clone(), userset),
        ];
        for object in objects {
            for kind in ResourceKind::ALL {
                let filter = TupleFilter {
                    object: Some(object.clone()),
                    relation: None,
                    target: TargetFilter::Kind(kind),
                };
                doomed.extend(self.find_all_tuples(context, &filter).await?);
            }
        }

        let doomed: Vec<Tuple> = doomed.into_iter().collect();
        slog::debug!(
            context.logger, "Removing principal relations from the authorization graph";
            "principal" => principal.to_string(),
            "tuples" => doomed.len(),
        );
        self.remove_relation(context, &doomed).await
    }
}

#[cfg(any(test, feature = "test-fixture"))]
impl Relations {
    /// Initialise an in-memory graph fixture for unit tests.
    pub fn fixture() -> (Self, RelationsFixture) {
        let fixture = RelationsFixture::default();
        let relations = Relations::new(fixture.clone(), RelationsConf::default());
        (relations, fixture)
    }
}

/// Observe an operation against the backend and attach upstream error context.
async fn observe<F, T>(op: &'static str, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let (err_count, timer) = self::telemetry::observe_op(op);
    let trace = self::telemetry::trace_op(op);
    let result = FutureExt::with_context(future, trace).await;
    drop(timer);
    result.map_err(|error| {
        err_count.inc();
        error.context(Upstream::new(format!("relations.{op}")))
    })
}
