//! Authorisation decisions for authenticated users of the fleet control plane.
//!
//! An [`AuthorisedUser`] wraps an authenticated [`Identity`](fleetcore_models::Identity)
//! together with the authorization-admin flag and a handle to the authorization graph.
//! It exposes:
//!
//! - Narrow capability predicates, each backed by a single relation check.
//! - Access level aggregators that check relations in descending precedence.
//! - Grant and revoke helpers that write to the graph on behalf of the user.
//!
//! ## Fail-closed checks
//!
//! Predicates and aggregators never return errors: a failed relation check is logged
//! and treated as a denial.
//! This means a transient graph failure and a genuine denial look the same to callers.
//! Grant and revoke helpers, on the other hand, propagate all errors.
//!
//! The graph is not assumed to imply weaker relations from stronger ones
//! (a `writer` is not automatically a `reader`), so aggregators encode precedence
//! by probing the strongest relation first.
mod grants;
mod user;


pub use self::user::AuthorisedUser;
