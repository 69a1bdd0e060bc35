//! Authenticated identities.
use serde::Deserialize;
use serde::Serialize;

use super::Resource;

/// An authenticated principal, as determined by the external identity provider.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable, unique, name of the identity.
    pub name: String,
}

impl Identity {
    pub fn new<S: Into<String>>(name: S) -> Identity {
        Identity { name: name.into() }
    }

    /// The identity as a resource in the authorization graph.
    pub fn resource(&self) -> Resource {
        Resource::User(self.name.clone())
    }

    /// Stable tag form of the identity (`user-<name>`).
    pub fn tag(&self) -> String {
        self.resource().tag()
    }
}
