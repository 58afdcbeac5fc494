//! Error types for notify-relay, one enum per component.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors raised by the log substrate (reads and writes).
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The read was abandoned because the cancellation signal fired.
    #[error("Read cancelled")]
    Cancelled,

    #[error("Log is closed")]
    Closed,

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Envelope encode/decode errors.
///
/// The variants follow the order in which the consumer checks a record:
/// `Malformed`, then `MissingFields`, then `TypedDecode` / `InvalidField`.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Invalid message format: missing {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Failed to decode envelope: {0}")]
    TypedDecode(#[source] serde_json::Error),

    #[error("Invalid envelope field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),
}

/// A registered handler failed to process a recognized message.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("Payload does not match the {kind} shape: {source}")]
    PayloadShape {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Delivery failed: {0}")]
    Delivery(#[from] NotifyError),

    #[error("Handler timed out after {0:?}")]
    TimedOut(Duration),
}

/// Why the consumer gave up on a record. Every variant is dead-lettered.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Empty message value")]
    EmptyValue,

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Handler(#[from] HandlerError),
}

/// Failure to write a record to the dead-letter topic.
#[derive(Debug, thiserror::Error)]
pub enum DeadLetterError {
    #[error("Dead-letter write to {topic} failed: {source}")]
    Write {
        topic: String,
        #[source]
        source: LogError,
    },
}

/// Errors surfaced to callers of the create-message operation.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Invalid message request: {0}")]
    InvalidRequest(String),

    #[error("Failed to serialize message: {0}")]
    Serialize(#[from] CodecError),

    #[error("Failed to send message: {0}")]
    Write(#[from] LogError),
}

/// Notification sink errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notifier {name} is not configured: {reason}")]
    NotConfigured { name: String, reason: String },

    #[error("Failed to send notification via {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(String),
}

/// Shutdown coordination errors.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Server forced to shutdown: still running after {grace:?}")]
    ForcedShutdown { grace: Duration },

    #[error("Task {name} panicked: {reason}")]
    TaskPanicked { name: &'static str, reason: String },

    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error("Server stopped before shutdown was requested")]
    ServerStopped,
}
