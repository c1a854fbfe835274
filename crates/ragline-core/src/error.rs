// Error taxonomy for the relay pipeline

use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

/// Errors that can occur while relaying a message
#[derive(Debug, Error)]
pub enum RelayError {
    /// Webhook signature verification failed; the whole delivery is rejected
    #[error("signature verification failed")]
    Authentication,

    /// Non-text event content; answered with a canned reply, never escalated
    #[error("unsupported content type: {0}")]
    UnsupportedContent(String),

    /// Timeout / rate limit / 5xx from an external call
    #[error("transient external error: {0}")]
    Transient(String),

    /// Generation call failed in a non-retryable way
    #[error("generation error: {0}")]
    Generation(String),

    /// Reply delivery failed after exhausting retries
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Session store read or write failed; never swallowed
    #[error("session store error: {0}")]
    Persistence(String),

    /// The gateway could not hand an event to the orchestrator
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// The execution deadline elapsed before both fan-out branches finished
    #[error("execution deadline exceeded after {0} seconds")]
    DeadlineExceeded(u64),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl RelayError {
    /// Create a transient external error
    pub fn transient(msg: impl Into<String>) -> Self {
        RelayError::Transient(msg.into())
    }

    /// Create a generation error
    pub fn generation(msg: impl Into<String>) -> Self {
        RelayError::Generation(msg.into())
    }

    /// Create a delivery error
    pub fn delivery(msg: impl Into<String>) -> Self {
        RelayError::Delivery(msg.into())
    }

    /// Create a session store error
    pub fn persistence(msg: impl Into<String>) -> Self {
        RelayError::Persistence(msg.into())
    }

    /// Create a dispatch error
    pub fn dispatch(msg: impl Into<String>) -> Self {
        RelayError::Dispatch(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        RelayError::Configuration(msg.into())
    }

    /// True for errors worth retrying when the wrapped call is idempotent
    pub fn is_transient(&self) -> bool {
        matches!(self, RelayError::Transient(_))
    }
}
