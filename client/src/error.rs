//! Error types for the payment API client.

use thiserror::Error;

/// Errors that can occur when talking to the payment service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// `404`: unknown session, event or category
    #[error("Not found: {0}")]
    NotFound(String),

    /// `422`: the request was rejected as invalid
    #[error("Validation error: {0}")]
    Validation(String),

    /// The request never produced a usable response (connect, timeout, decode)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Any other non-success status
    #[error("Server error (status {status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Error message from the response body
        message: String,
    },
}

impl ClientError {
    /// Whether retrying later could succeed.
    ///
    /// Transport failures, `5xx`, `408` and `429` are transient.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Server { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::NotFound(_) | Self::Validation(_) => false,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
