//! Reusable containers for principal IDs.
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Unique key to look a principal up by.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum PrincipalKey {
    /// Lookup by the human facing, unique, name.
    Name(String),

    /// Lookup by the immutable UUID.
    Uuid(Uuid),
}

impl PrincipalKey {
    /// Check if the key identifies a principal with the given name and UUID.
    pub fn matches(&self, name: &str, uuid: &Uuid) -> bool {
        match self {
            PrincipalKey::Name(key) => key == name,
            PrincipalKey::Uuid(key) => key == uuid,
        }
    }
}

impl std::fmt::Display for PrincipalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            PrincipalKey::Name(name) => write!(f, "{}", name),
            PrincipalKey::Uuid(uuid) => write!(f, "{}", uuid),
        }
    }
}

impl From<&str> for PrincipalKey {
    fn from(value: &str) -> Self {
        PrincipalKey::Name(value.to_string())
    }
}

impl From<String> for PrincipalKey {
    fn from(value: String) -> Self {
        PrincipalKey::Name(value)
    }
}

impl From<Uuid> for PrincipalKey {
    fn from(value: Uuid) -> Self {
        PrincipalKey::Uuid(value)
    }
}
