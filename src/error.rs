//! Error types for hubrelay.

use thiserror::Error;

/// Common error type for hubrelay.
#[derive(Error, Debug)]
pub enum RelayError {
    /// The channel is already in the monitored list.
    #[error("channel {0} already monitored")]
    AlreadyMonitored(String),

    /// The channel is not in the monitored list.
    #[error("channel {0} not found")]
    NotMonitored(String),

    /// Only one platform kind is supported.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// A single hub request failed (transport error or non-accepted status).
    #[error("hub error: {0}")]
    Hub(String),

    /// Every handshake attempt against the hub failed.
    #[error("subscription for {channel_id} failed after {attempts} attempt(s): {last_error}")]
    SubscriptionFailed {
        /// Channel the handshake was issued for.
        channel_id: String,
        /// Number of attempts made.
        attempts: u32,
        /// Error reported by the last attempt.
        last_error: String,
    },

    /// Malformed or incomplete callback payload.
    #[error("parse error: {0}")]
    Parse(String),

    /// The chat system rejected a message.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Store document (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl RelayError {
    /// Whether this is a hard validation error that must not be retried.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RelayError::AlreadyMonitored(_)
                | RelayError::NotMonitored(_)
                | RelayError::UnsupportedPlatform(_)
                | RelayError::Validation(_)
        )
    }
}

impl From<quick_xml::Error> for RelayError {
    fn from(e: quick_xml::Error) -> Self {
        RelayError::Parse(e.to_string())
    }
}

/// Result type alias for hubrelay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
