//! Actor Error Types
//!
//! Error handling for the actor runtime, worker resolution and the
//! completion bridge. Every variant stays local to the request flow that
//! produced it.

use thiserror::Error;

/// Main actor error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActorError {
    /// A worker received a message it has no arm for
    #[error("Unhandled message: {actor} cannot handle {message_type}")]
    UnhandledMessage { actor: String, message_type: String },

    /// The component registry could not produce the requested worker
    #[error("Resolution error: {identity}: {message}")]
    Resolution { identity: String, message: String },

    /// Uncaught failure while a worker processed a message
    #[error("Worker failure: {actor}: {message}")]
    WorkerFailure { actor: String, message: String },

    /// Deadline elapsed before a result arrived
    #[error("Timeout error: {operation} exceeded {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// The target mailbox no longer accepts messages
    #[error("Mailbox closed: {actor}")]
    MailboxClosed { actor: String },

    /// No live actor with this id or name
    #[error("Actor not found: {actor}")]
    ActorNotFound { actor: String },

    /// Second completion attempt on a single-assignment promise
    #[error("Promise already completed")]
    AlreadyCompleted,

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },
}

/// Result type alias for actor operations
pub type Result<T> = std::result::Result<T, ActorError>;

impl ActorError {
    /// Create an unhandled message error
    pub fn unhandled(actor: impl Into<String>, message_type: impl Into<String>) -> Self {
        Self::UnhandledMessage {
            actor: actor.into(),
            message_type: message_type.into(),
        }
    }

    /// Create a resolution error
    pub fn resolution(identity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolution {
            identity: identity.into(),
            message: message.into(),
        }
    }

    /// Create a worker failure
    pub fn worker_failure(actor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WorkerFailure {
            actor: actor.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Create a mailbox closed error
    pub fn mailbox_closed(actor: impl Into<String>) -> Self {
        Self::MailboxClosed {
            actor: actor.into(),
        }
    }

    /// Create an actor not found error
    pub fn not_found(actor: impl Into<String>) -> Self {
        Self::ActorNotFound {
            actor: actor.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: field.map(|s| s.to_string()),
        }
    }

    /// Short category name for structured logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnhandledMessage { .. } => "unhandled",
            Self::Resolution { .. } => "resolution",
            Self::WorkerFailure { .. } => "worker_failure",
            Self::Timeout { .. } => "timeout",
            Self::MailboxClosed { .. } => "mailbox_closed",
            Self::ActorNotFound { .. } => "not_found",
            Self::AlreadyCompleted => "already_completed",
            Self::Configuration { .. } => "configuration",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution { .. })
    }
}
