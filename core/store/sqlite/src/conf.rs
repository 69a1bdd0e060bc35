//! Configuration for the SQLite principal store backend.
use serde::Deserialize;
use serde::Serialize;

/// SQLite specific configuration for the principal store interface.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Conf {
    /// Path to the SQLite DB file, or `:memory:` for a throw-away store.
    pub path: String,
}

/// The SQLite principal store backend configuration is not valid.
#[derive(Debug, thiserror::Error)]
#[error("the SQLite principal store backend configuration is not valid")]
pub struct ConfError;
