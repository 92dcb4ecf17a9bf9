//! Error types for text generation.

use thiserror::Error;

/// Result type alias for generation calls.
pub type LlmResult<T> = Result<T, LlmError>;

/// Classified failures of a text-generation call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("No text-generation provider is configured")]
    NotConfigured,

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Invalid JSON response: {0}")]
    InvalidJson(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
}

impl LlmError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let message = body.into();
        match status {
            401 | 403 => Self::Auth(message),
            429 => Self::RateLimited(message),
            _ => Self::Api { status, message },
        }
    }

    /// Whether the call may succeed if repeated.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited(_) | Self::Connection(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
