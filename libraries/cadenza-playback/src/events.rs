//! Playback events
//!
//! Everything the host media-session layer and UI learn about playback
//! arrives as a `PlaybackEvent` on the channel returned by
//! `PlaybackController::new`. A full `SessionSnapshot` follows every state
//! change so hosts never have to stitch partial updates together.

use crate::focus::AudioFocusState;
use crate::types::{PlaybackState, RepeatMode};
use cadenza_core::Track;
use serde::{Deserialize, Serialize};

/// Read-only view of the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Track loaded into the output, if any
    pub current_track: Option<Track>,
    /// Controller state
    pub state: PlaybackState,
    /// Whether the listener hears (or is about to hear) audio
    pub is_playing: bool,
    /// Last sampled position
    pub position_ms: u64,
    /// Duration of the current track
    pub duration_ms: u64,
    pub shuffle_enabled: bool,
    pub repeat_mode: RepeatMode,
    /// Starred flag of the current track
    pub starred: bool,
    /// User volume (0-100)
    pub volume: u8,
}

/// Events emitted by the playback controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// Fresh session snapshot, sent after every state change
    Snapshot(SessionSnapshot),

    /// The queue changed; carries the full ordered list
    QueueChanged {
        /// Tracks in queue order
        tracks: Vec<Track>,
    },

    /// A different track was loaded
    TrackChanged {
        /// ID of the new (current) track
        track_id: String,
        /// ID of the previous track (if any)
        previous_track_id: Option<String>,
    },

    /// A track could not be played and was skipped
    TrackFailed {
        /// ID of the failed track
        track_id: String,
        /// What went wrong
        message: String,
    },

    /// Periodic position sample while playing
    PositionUpdate {
        /// Current playback position
        position_ms: u64,
        /// Total track duration
        duration_ms: u64,
    },

    /// Audio focus changed
    FocusChanged {
        /// New focus state
        state: AudioFocusState,
    },

    /// A recoverable error the host may want to show
    Error {
        /// Error message
        message: String,
    },
}
