//! Error types for the RecallAI client.

use thiserror::Error;

/// Client error type shared by the remote services and the conversation view.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Transport-level HTTP failure (connect, timeout, body read).
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The backend answered with a non-success status.
    #[error("backend returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated for display.
        body: String,
    },
    /// A response or cached file did not match the expected shape.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A turn was submitted with neither prompt text nor attachments.
    #[error("a turn needs prompt text or at least one attachment")]
    EmptyTurn,
    /// The conversation is not known to the view.
    #[error("unknown conversation: {0}")]
    UnknownConversation(String),
    /// The message is not in the active window.
    #[error("unknown message: {0}")]
    UnknownMessage(String),
    /// A caller-supplied value was rejected before any call was made.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The message has no server id yet and cannot be addressed remotely.
    #[error("message {0} has not been confirmed by the server yet")]
    UnconfirmedMessage(String),
    /// The backend acknowledged the call negatively or returned `null`.
    #[error("backend rejected {0}")]
    Rejected(String),
    /// No identity is cached and no credentials were supplied.
    #[error("not signed in")]
    NotSignedIn,
}

impl ClientError {
    /// Check if retrying the same call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(err) => err.is_timeout() || err.is_connect(),
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Convenience result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
