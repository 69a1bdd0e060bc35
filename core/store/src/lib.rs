//! Relational store interface for the principals (groups and roles) of the control plane.
//!
//! ## An ergonomic interface
//!
//! The [`Store`] interface focuses on high level operations grouped into a small set of
//! methods that accept different data and return different data.
//! This is implemented with a combination of an internal (sealed) `trait` and enums.
//!
//! For example to delete a group.
//!
//! ```ignore
//! use fleetcore_store::delete::DeleteGroup;
//!
//! // Delete a group for which you have a record.
//! store.delete(context, &group).await?;
//!
//! // Delete a group for which you have the UUID.
//! store.delete(context, DeleteGroup { uuid }).await?;
//! ```
//!
//! Operations that must observe and change records atomically use [`Store::transaction`].
//!
//! ### Backend implementations
//!
//! Backend implementations receive a wrapping `enum` type for the operation group to implement.
//! This makes adding new operations a simpler, with less files needing to change.
//!
//! The cost of this approach is that backend implementation need to deal with these type enums
//! and ensure the returned type matches what the requested operation expects.
//! If you fail to properly do this the [`Store`] interface will panic while converting types.
use std::sync::Arc;
use std::sync::Mutex;

use anyhow::Result;
use serde_json::Value as Json;

use fleetcore_context::Context;

pub mod delete;
pub mod ids;
pub mod persist;
pub mod query;
pub mod transaction;

#[cfg(any(test, feature = "test-fixture"))]
mod fixture;
#[cfg(any(test, feature = "test-fixture"))]
pub use self::fixture::StoreFixture;

#[cfg(test)]
mod tests;

use self::delete::DeleteOp;
use self::delete::DeleteOps;
use self::delete::DeleteResponses;
use self::persist::PersistOp;
use self::persist::PersistOps;
use self::persist::PersistResponses;
use self::query::QueryOp;
use self::query::QueryOps;
use self::query::QueryResponses;
use self::transaction::StoreTransaction;
use self::transaction::TransactionFn;

/// Query, persist and manipulate principal records with a relational database.
#[derive(Clone)]
pub struct Store {
    /// Runtime configured implementation of the principal store.
    inner: Arc<dyn StoreBackend>,
}

impl Store {
    /// Delete individual records from the principal store.
    pub async fn delete<O>(&self, context: &Context, op: O) -> Result<O::Response>
    where
        O: DeleteOp,
    {
        let op: DeleteOps = op.into();
        let response = self.inner.delete(context, op).await;
        response.map(O::Response::from)
    }

    /// Persist new records into the principal store.
    pub async fn persist<O>(&self, context: &Context, op: O) -> Result<O::Response>
    where
        O: PersistOp,
    {
        let op: PersistOps = op.into();
        let response = self.inner.persist(context, op).await;
        response.map(O::Response::from)
    }

    /// Query records from the principal store.
    pub async fn query<O>(&self, context: &Context, op: O) -> Result<O::Response>
    where
        O: QueryOp,
    {
        let op: QueryOps = op.into();
        let response = self.inner.query(context, op).await;
        response.map(O::Response::from)
    }

    /// Run the callback within a transaction and return its result.
    ///
    /// Changes are committed only if the callback returns `Ok`.
    pub async fn transaction<F, T>(&self, context: &Context, callback: F) -> Result<T>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let output: Arc<Mutex<Option<T>>> = Default::default();
        let output_inner = Arc::clone(&output);
        let op: TransactionFn = Box::new(move |tx| {
            let value = callback(tx)?;
            output_inner
                .lock()
                .expect("Store::transaction output lock poisoned")
                .replace(value);
            Ok(())
        });
        self.inner.transaction(context, op).await?;

        let value = output
            .lock()
            .expect("Store::transaction output lock poisoned")
            .take();
        value.ok_or_else(|| anyhow::anyhow!("store transaction committed without running"))
    }
}

impl<T> From<T> for Store
where
    T: StoreBackend + 'static,
{
    fn from(value: T) -> Self {
        Store {
            inner: Arc::new(value),
        }
    }
}

#[cfg(any(test, feature = "test-fixture"))]
impl Store {
    /// Initialise a new store backend fixture for unit tests.
    pub fn fixture() -> Self {
        let inner = StoreFixture::default();
        Self::from(inner)
    }
}

/// Operations implemented by principal stores supported by the control plane.
#[async_trait::async_trait]
pub trait StoreBackend: Send + Sync {
    /// Delete individual records from the principal store.
    async fn delete(&self, context: &Context, op: DeleteOps) -> Result<DeleteResponses>;

    /// Persist new records into the principal store.
    async fn persist(&self, context: &Context, op: PersistOps) -> Result<PersistResponses>;

    /// Query records from the principal store.
    async fn query(&self, context: &Context, op: QueryOps) -> Result<QueryResponses>;

    /// Run the callback in a transaction, committing only if it returns `Ok`.
    async fn transaction(&self, context: &Context, op: TransactionFn) -> Result<()>;
}

/// Initialisation logic for the principal store and the client to access it.
#[async_trait::async_trait]
pub trait StoreFactory: Send + Sync {
    /// Validate the user provided configuration for the backend.
    fn conf_check(&self, context: &Context, conf: &Json) -> Result<()>;

    /// Register backend specific metrics.
    fn register_metrics(&self, registry: &prometheus::Registry) -> Result<()>;

    /// Instantiate a [`Store`] object to access persistent state.
    async fn store<'a>(&self, args: StoreFactoryArgs<'a>) -> Result<Store>;

    /// Synchronise (initialise or migrate) the principal store to handle [`Store`] operations.
    async fn sync<'a>(&self, args: StoreFactorySyncArgs<'a>) -> Result<()>;
}

/// Arguments passed to the [`StoreFactory`] client initialisation method.
pub struct StoreFactoryArgs<'a> {
    /// The configuration block for the backend to initialise.
    pub conf: &'a Json,

    /// Container for operation scoped values.
    pub context: &'a Context,
}

/// Arguments passed to the [`StoreFactory`] client synchronisation method.
pub struct StoreFactorySyncArgs<'a> {
    /// The configuration block for the backend to synchronise.
    pub conf: &'a Json,

    /// Container for operation scoped values.
    pub context: &'a Context,
}
