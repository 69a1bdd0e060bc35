//! Common errors from and for the fleet control plane implementation.
//!
//! Errors are plain [`thiserror`] structs attached to [`anyhow::Error`]s, either directly
//! or as context around a lower level cause.
//! Callers can test for a specific error with `error.is::<NotFound>()`, or collapse any
//! error into the coarse [`ErrorKind`] taxonomy with [`ErrorKind::of`].

/// The caller is not allowed to perform the requested operation.
#[derive(Debug, thiserror::Error)]
#[error("unauthorized: {reason}")]
pub struct Unauthorized {
    pub reason: String,
}

impl Unauthorized {
    /// The caller is not allowed to perform the requested operation.
    pub fn new<S: Into<String>>(reason: S) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// The requested record was not found.
#[derive(Debug, thiserror::Error)]
#[error("{kind} '{id}' not found")]
pub struct NotFound {
    pub id: String,
    pub kind: &'static str,
}

impl NotFound {
    /// The requested record of the given kind was not found.
    pub fn new<S: Into<String>>(kind: &'static str, id: S) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

/// A record with the same unique key already exists.
#[derive(Debug, thiserror::Error)]
#[error("{kind} '{id}' already exists")]
pub struct AlreadyExists {
    pub id: String,
    pub kind: &'static str,
}

impl AlreadyExists {
    /// A record of the given kind already exists.
    pub fn new<S: Into<String>>(kind: &'static str, id: S) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

/// The request is invalid or required state is missing.
#[derive(Debug, thiserror::Error)]
#[error("validation failed: {reason}")]
pub struct Validation {
    pub reason: String,
}

impl Validation {
    /// The request is invalid or required state is missing.
    pub fn new<S: Into<String>>(reason: S) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// The caller exceeded the number of allowed operations.
#[derive(Debug, thiserror::Error)]
#[error("{limit} exceeded")]
pub struct RateLimited {
    pub limit: String,
}

impl RateLimited {
    /// The caller exceeded the named limit.
    pub fn new<S: Into<String>>(limit: S) -> Self {
        Self {
            limit: limit.into(),
        }
    }
}

/// An upstream dependency (relational store, authorization graph, signer) failed.
#[derive(Debug, thiserror::Error)]
#[error("upstream dependency failed during '{op}'")]
pub struct Upstream {
    pub op: String,
}

impl Upstream {
    /// An upstream dependency failed while performing the named operation.
    pub fn new<S: Into<String>>(op: S) -> Self {
        Self { op: op.into() }
    }
}

/// Coarse classification of errors for outer surfaces to map onto their own codes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    AlreadyExists,
    NotFound,
    RateLimited,
    Unauthorized,
    Upstream,
    Validation,

    /// The error does not carry any of the known error types.
    Unknown,
}

impl ErrorKind {
    /// Classify an error by looking for known error types along its chain.
    ///
    /// Domain errors take precedence over [`Upstream`], so a [`NotFound`] wrapped in an
    /// [`Upstream`] context is reported as [`ErrorKind::NotFound`].
    pub fn of(error: &anyhow::Error) -> ErrorKind {
        if has::<AlreadyExists>(error) {
            return ErrorKind::AlreadyExists;
        }
        if has::<NotFound>(error) {
            return ErrorKind::NotFound;
        }
        if has::<RateLimited>(error) {
            return ErrorKind::RateLimited;
        }
        if has::<Unauthorized>(error) {
            return ErrorKind::Unauthorized;
        }
        if has::<Validation>(error) {
            return ErrorKind::Validation;
        }
        if has::<Upstream>(error) {
            return ErrorKind::Upstream;
        }
        ErrorKind::Unknown
    }
}

/// Check if an error of type `T` is attached to the error as context or cause.
fn has<T>(error: &anyhow::Error) -> bool
where
    T: std::error::Error + Send + Sync + 'static,
{
    // Context values are only visible through anyhow's downcasting.
    error.is::<T>() || error.chain().any(|cause| cause.is::<T>())
}
