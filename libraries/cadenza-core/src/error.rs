/// Core error types for Cadenza
use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors surfaced by catalog and stream collaborators
///
/// The playback core treats every variant as a generic "fetch failed" signal;
/// the detail is only carried for logging.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The remote service could not be reached
    #[error("Network error: {0}")]
    Network(String),

    /// The remote service answered with an error status
    #[error("Remote error ({status}): {message}")]
    Remote {
        /// HTTP-like status code
        status: u16,
        /// Error body or reason
        message: String,
    },

    /// The credentials were rejected or are missing
    #[error("Authentication required")]
    AuthRequired,

    /// Collection or stream not found
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity
        entity: String,
        /// Identifier that was looked up
        id: String,
    },

    /// Response could not be decoded
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether retrying the same request later could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Io(_) => true,
            Self::Remote { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
