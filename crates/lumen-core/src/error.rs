//! Engine error taxonomy.
//!
//! Expected failures are surfaced as [`EngineError`] results. Programming
//! errors - an id collision outside of project load, mismatched buffer
//! lengths - panic instead.

use thiserror::Error;

/// Errors produced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A command referenced a handle that no longer resolves, or a command
    /// precondition was violated.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Adding a modulation or trigger mapping would introduce a cycle in the
    /// modulation graph.
    #[error("modulation would create a cycle")]
    Cycle,

    /// A serialized document referenced a class the runtime cannot construct.
    #[error("cannot instantiate class '{0}'")]
    Instantiation(String),

    /// A document was structurally invalid.
    #[error("serialization: {0}")]
    Serialization(String),

    /// A user-supplied device panicked; the device has been marked crashed
    /// and will be skipped. Reported through the error sink, never returned
    /// from `tick`.
    #[error("device '{device}' crashed: {message}")]
    CrashedDevice {
        /// Label of the crashed device.
        device: String,
        /// Panic payload, if it carried one.
        message: String,
    },

    /// An engine thread operation was requested while not permitted.
    #[error("not permitted: {0}")]
    Concurrency(String),
}

impl EngineError {
    /// Shorthand for an [`EngineError::InvalidCommand`].
    pub fn invalid(message: impl Into<String>) -> EngineError {
        EngineError::InvalidCommand(message.into())
    }
}

/// Host-supplied sink for errors the engine reports but does not propagate:
/// crashed devices, failed inbound control messages.
///
/// Implementations must not block; the engine calls this from the tick path.
pub trait ErrorSink: Send {
    /// Reports one error.
    fn report(&self, error: &EngineError);
}

/// An [`ErrorSink`] that forwards to `tracing::error!`.
#[derive(Debug, Default)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn report(&self, error: &EngineError) {
        tracing::error!(%error, "engine error");
    }
}
