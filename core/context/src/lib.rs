//! The [`Context`] is a general purpose immutable container to carry scoped values around.
//!
//! Code executed as part of clustermap processes can access operation scoped values.
//!
//! Contexts are organised into a tree structure:
//!
//! - A root context represents the general process wide scope.
//! - Derived contexts represents a narrower scope within their parent with additional
//!   or updated information attached to them.
//!
//! For example: [`Context`]s provide access to the current [`Logger`].
//! For the root context this is the process-wide logger with no additional attributes.
//! But for individual operations a derived context can be provided with a [`Logger`] decorated
//! with the cluster or source the operation works on.
//!
//! [`Context`]s also carry the process cancellation token.
//! Every suspension point (cluster API calls, registry fetches, file reads, timers)
//! observes the token so process shutdown interrupts in-flight work promptly.
use slog::Logger;
use slog::OwnedKV;
use slog::SendSyncRefUnwindSafeKV;
use tokio_util::sync::CancellationToken;

/// Error returned by operations interrupted by process shutdown.
#[derive(Debug, thiserror::Error)]
#[error("operation interrupted by process shutdown")]
pub struct ShutdownInterrupt;

/// The [`Context`] is a general purpose container to carry scoped values around.
///
/// Refer to the [crate level docs](crate) for details.
#[derive(Clone, Debug)]
pub struct Context {
    /// Cancellation token signalled when the process begins shutdown.
    pub cancel: CancellationToken,

    /// Logger with contextual attributes attached to it.
    pub logger: Logger,
}

impl Context {
    /// Derive a new [`Context`] by making changes to the current one.
    pub fn derive(&self) -> ContextBuilder {
        ContextBuilder {
            cancel: self.cancel.clone(),
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

    /// Initialise a new root context with the process logger and cancellation token.
    pub fn root(logger: Logger, cancel: CancellationToken) -> ContextBuilder {
        ContextBuilder { cancel, logger }
    }

    /// Check for process shutdown, returning a [`ShutdownInterrupt`] error once signalled.
    pub fn check_shutdown(&self) -> Result<(), ShutdownInterrupt> {
        if self.cancel.is_cancelled() {
            return Err(ShutdownInterrupt);
        }
        Ok(())
    }
}

/// A builder for root and derived contexts.
pub struct ContextBuilder {
    cancel: CancellationToken,
    logger: Logger,
}

impl ContextBuilder {
    /// Finalise the build process and return a new [`Context`].
    pub fn build(self) -> Context {
        Context {
            cancel: self.cancel,
            logger: self.logger,
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
            cancel: CancellationToken::new(),
            logger,
        }
    }
}
