use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the permit pool, the submission client and the queue.
#[derive(Debug, Error)]
pub enum ThrottlerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Permit pool is closed")]
    PoolClosed,

    #[error("Timed out after {0:?} waiting for a permit")]
    AcquireTimeout(Duration),

    #[error("Submission queue is closed")]
    QueueClosed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// The document could not be turned into a wire payload.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("failed to encode document as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document failed validation: {0}")]
    Invalid(String),
}

/// The payload was encoded but the endpoint did not accept it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("endpoint responded with status {0}")]
    Status(u16),

    #[error("network failure: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,
}

pub type ThrottlerResult<T> = Result<T, ThrottlerError>;

impl ThrottlerError {
    /// Short machine-readable label, used as a log field and a metrics key.
    pub fn kind(&self) -> &'static str {
        match self {
            ThrottlerError::Config(_) => "config",
            ThrottlerError::PoolClosed => "pool_closed",
            ThrottlerError::AcquireTimeout(_) => "acquire_timeout",
            ThrottlerError::QueueClosed => "queue_closed",
            ThrottlerError::Serialization(_) => "serialization",
            ThrottlerError::Transport(_) => "transport",
        }
    }

    /// Whether the caller may reasonably try the same operation again later.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ThrottlerError::Config(_))
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorReport {
    pub error: String,
    pub message: String,
    pub recoverable: bool,
}

impl ErrorReport {
    pub fn from_error(err: &ThrottlerError) -> Self {
        Self {
            error: err.kind().to_string(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
        }
    }
}
