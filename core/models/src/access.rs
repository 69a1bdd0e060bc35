//! Access levels reported to clients and embedded in capability tokens.
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Effective access an identity has on a resource.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum AccessLevel {
    #[serde(rename = "add-model")]
    AddModel,

    #[serde(rename = "admin")]
    Admin,

    #[serde(rename = "consume")]
    Consume,

    #[serde(rename = "login")]
    Login,

    #[serde(rename = "none")]
    None,

    #[serde(rename = "read")]
    Read,

    #[serde(rename = "superuser")]
    Superuser,

    #[serde(rename = "write")]
    Write,
}

impl AccessLevel {
    /// Name of the access level as embedded in capability token claims.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddModel => "add-model",
            Self::Admin => "admin",
            Self::Consume => "consume",
            Self::Login => "login",
            Self::None => "none",
            Self::Read => "read",
            Self::Superuser => "superuser",
            Self::Write => "write",
        }
    }

    /// True for any level other than [`AccessLevel::None`].
    pub fn is_granted(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
