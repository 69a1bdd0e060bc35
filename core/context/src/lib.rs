//! The [`Context`] is a general purpose immutable container to carry scoped values around.
//!
//! Every operation of the control plane receives a [`Context`] from its caller.
//! Contexts are organised into a tree structure:
//!
//! - A root context represents the general process wide scope.
//! - Derived contexts represents a narrower scope within their parent with additional
//!   or updated information attached to them.
//!
//! For example: [`Context`]s provide access to the current [`Logger`].
//! For the root context this is the process-wide logger with no additional attributes.
//! But for individual sessions a derived context can be provided with a [`Logger`] decorated
//! with the authenticated identity or the operation trace ID.
//!
//! Cancellation follows the async model: dropping an operation future aborts it,
//! and deadlines are applied by callers wrapping the future in a timeout.
use opentelemetry_api::trace::TraceContextExt;
use opentelemetry_api::trace::TraceId;
use opentelemetry_api::Context as OtelContext;
use slog::Logger;
use slog::OwnedKV;
use slog::SendSyncRefUnwindSafeKV;

use fleetcore_models::Identity;

/// The [`Context`] is a general purpose container to carry scoped values around.
///
/// Refer to the [crate level docs](crate) for details.
#[derive(Clone, Debug)]
pub struct Context {
    /// Identity authenticated for the current session.
    ///
    /// The initial value of `None` indicates no authentication process was performed.
    pub identity: Option<Identity>,

    /// Logger with contextual attributes attached to it.
    pub logger: Logger,
}

impl Context {
    /// Derive a new [`Context`] by making changes to the current one.
    pub fn derive(&self) -> ContextBuilder {
        ContextBuilder {
            identity: self.identity.clone(),
            logger: self.logger.clone(),
        }
    }

    /// Derive a new [`Context`] by making changes to the current one using the provided callback.
    pub fn derive_with<F>(&self, callback: F) -> Context
    where
        F: FnOnce(ContextBuilder) -> ContextBuilder,
    {
        let builder = callback(self.derive());
        builder.build()
    }

    /// Initialise a new root context with no values attached.
    pub fn root(logger: Logger) -> ContextBuilder {
        ContextBuilder {
            identity: None,
            logger,
        }
    }
}

/// A builder for root and derived contexts.
pub struct ContextBuilder {
    identity: Option<Identity>,
    logger: Logger,
}

impl ContextBuilder {
    /// Mark the context to be created as authenticated as the given identity.
    ///
    /// The identity name is also attached to the logger.
    pub fn authenticated(mut self, identity: Identity) -> Self {
        self.logger = self.logger.new(slog::o!("user" => identity.name.clone()));
        self.identity = Some(identity);
        self
    }

    /// Finalise the build process and return a new [`Context`].
    pub fn build(self) -> Context {
        Context {
            identity: self.identity,
            logger: self.logger,
        }
    }

    /// Decorate the [`Context`]'s logger with the trace ID of the current OpenTelemetry span.
    pub fn log_trace(self) -> Self {
        let context = OtelContext::current();
        let span = context.span();
        let trace_id = span.span_context().trace_id();
        if trace_id == TraceId::INVALID {
            self
        } else {
            let trace_id = trace_id.to_string();
            self.log_values(slog::o!("trace_id" => trace_id))
        }
    }

    /// Update the [`Context`] logger to attach new log key/pair values.
    pub fn log_values<T>(mut self, entries: OwnedKV<T>) -> Self
    where
        T: SendSyncRefUnwindSafeKV + 'static,
    {
        self.logger = self.logger.new(entries);
        self
    }
}

#[cfg(any(test, feature = "test-fixture"))]
impl Context {
    /// Create an empty context useful for test.
    pub fn fixture() -> Context {
        let logger = Logger::root(slog::Discard, slog::o!());
        Context {
            identity: None,
            logger,
        }
    }
}
