//! Session scoped capability tokens for downstream controllers.
//!
//! A [`TokenGenerator`] is created for each client session (connection) and is never
//! shared across sessions. It turns authorization graph lookups into a set of access
//! claims, embedded in a token signed by an external [`TokenSigner`].
//! Controllers receiving the token can authorise calls without querying the graph again.
//!
//! The generator works in two steps:
//!
//! 1. [`TokenGenerator::make_login_token`] computes the base claims for the session:
//!    access to the model, the controller and every cloud the controller has regions in.
//! 2. [`TokenGenerator::make_token`] extends the claims with additional permissions,
//!    checked on demand, up to [`MAX_TOKEN_CALLS`] times per login.
use std::collections::BTreeMap;

use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use fleetcore_context::Context;

mod generator;
mod telemetry;

#[cfg(any(test, feature = "test-fixture"))]
mod fixture;
#[cfg(any(test, feature = "test-fixture"))]
pub use self::fixture::ControllersFixture;
#[cfg(any(test, feature = "test-fixture"))]
pub use self::fixture::SignerFixture;


pub use self::generator::TokenGenerator;
pub use self::generator::MAX_TOKEN_CALLS;
pub use self::telemetry::register_metrics;

/// Claims embedded in a capability token.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Tag of the controller the token is issued for.
    pub controller: String,

    /// Tag of the user the token is issued to.
    pub user: String,

    /// Access level granted to the user, keyed by resource tag.
    pub access: BTreeMap<String, String>,
}

/// Sign capability token claims.
///
/// Key management and the token format are up to the implementation.
#[async_trait::async_trait]
pub trait TokenSigner: Send + Sync {
    /// Sign the claims and return the encoded token.
    async fn sign(&self, context: &Context, claims: &Claims) -> Result<Vec<u8>>;
}

/// Read-only access to the controllers known to the control plane.
#[async_trait::async_trait]
pub trait ControllerLookup: Send + Sync {
    /// Names of the clouds the controller has regions in.
    ///
    /// The same cloud may be returned more than once if the controller has several
    /// regions in it.
    async fn controller_clouds(&self, context: &Context, controller: Uuid) -> Result<Vec<String>>;
}
