//! Error types for the Cadenza server client.

use cadenza_core::CoreError;
use thiserror::Error;

/// Errors that can occur when talking to a Cadenza server.
#[derive(Error, Debug)]
pub enum ServerClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error response
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Credentials missing or rejected
    #[error("Authentication required")]
    AuthRequired,

    /// Collection or stream does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid server or stream URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to parse server response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Server is offline or unreachable
    #[error("Server unreachable: {0}")]
    ServerUnreachable(String),
}

/// Result type for server client operations.
pub type Result<T> = std::result::Result<T, ServerClientError>;

impl ServerClientError {
    /// Classify a transport error
    pub(crate) fn from_transport(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            Self::ServerUnreachable(e.to_string())
        } else {
            Self::Request(e)
        }
    }
}

impl From<ServerClientError> for CoreError {
    fn from(err: ServerClientError) -> Self {
        match err {
            ServerClientError::Request(e) => CoreError::network(e.to_string()),
            ServerClientError::ServerUnreachable(msg) => CoreError::network(msg),
            ServerClientError::ServerError { status, message } => {
                CoreError::Remote { status, message }
            }
            ServerClientError::AuthRequired => CoreError::AuthRequired,
            ServerClientError::NotFound(what) => CoreError::not_found("Resource", what),
            ServerClientError::InvalidUrl(msg) => CoreError::invalid_input(msg),
            ServerClientError::ParseError(msg) => CoreError::Parse(msg),
        }
    }
}
