//! Error types for playback management

use cadenza_core::CoreError;
use thiserror::Error;

/// Playback errors
///
/// None of these escape the controller loop; handlers log them and degrade
/// to stopped or skipped.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// No track is currently loaded
    #[error("No track loaded")]
    NoTrackLoaded,

    /// Queue is empty
    #[error("Queue is empty")]
    QueueEmpty,

    /// Index out of bounds
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    /// Output resource rejected an operation
    #[error("Output error: {0}")]
    Output(String),

    /// The OS refused the audio focus request
    #[error("Audio focus denied")]
    FocusDenied,

    /// Catalog collaborator failed
    #[error("Catalog error: {0}")]
    Catalog(#[from] CoreError),

    /// Prefetch cache failure
    #[error("Cache error: {0}")]
    Cache(String),

    /// Controller loop is gone
    #[error("Playback controller closed")]
    ControllerClosed,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
