//! Management of the named principals (groups and roles) of the fleet control plane.
//!
//! Principals live in two places:
//!
//! - The relational [`Store`](fleetcore_store::Store) records their UUID and human facing name.
//! - The authorization graph records memberships, assignments and grants, keyed by UUID only.
//!
//! Because the graph never references names, renaming a principal never touches the graph
//! and all existing grants survive a rename.
//!
//! ## Removal ordering
//!
//! The two stores fail independently and there is no distributed transaction between them.
//! Both managers remove a principal by cleaning up the authorization graph first and
//! deleting the relational record second:
//!
//! - If the graph cleanup fails the record is kept and the removal can simply be retried.
//!   Failed cleanups are counted by the `fleetcore_principals_cleanup_failures` metric.
//! - If the process stops between the two steps the principal is left with no grants
//!   (it can no longer grant access to anyone) until the removal is retried.
//!
//! Grants can never outlive the record that makes them visible to administrators.
//!
//! All operations require the caller to be an authorization administrator.
use anyhow::Result;

use fleetcore_errors::ErrorKind;
use fleetcore_errors::Upstream;
use fleetcore_errors::Validation;

mod group;
mod principal;
mod role;
mod telemetry;

#[cfg(test)]
mod tests;

pub use self::group::GroupManager;
pub use self::principal::Principal;
pub use self::principal::PrincipalManager;
pub use self::principal::PrincipalStream;
pub use self::role::RoleManager;
pub use self::telemetry::register_metrics;

/// Reject empty (or blank) principal names.
fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        let error = Validation::new(format!("{} name must not be empty", kind));
        return Err(error.into());
    }
    Ok(())
}

/// Attach [`Upstream`] context to store errors that are not already classified.
fn upstream(op: String) -> impl FnOnce(anyhow::Error) -> anyhow::Error {
    move |error| match ErrorKind::of(&error) {
        ErrorKind::Unknown => error.context(Upstream::new(op)),
        _ => error,
    }
}
