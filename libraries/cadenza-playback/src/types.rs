//! Core types for playback management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Nothing is playing
    Stopped,

    /// Output resource is loading the current track
    Loading,

    /// Output resource is rebuffering mid-track
    Buffering,

    /// Currently playing
    Playing,

    /// Paused mid-track
    Paused,
}

impl PlaybackState {
    /// Whether the listener expects audio right now
    pub fn is_active(self) -> bool {
        matches!(self, Self::Loading | Self::Buffering | Self::Playing)
    }
}

/// Repeat mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RepeatMode {
    /// Stop when queue ends
    #[default]
    None,

    /// Loop current track only
    One,

    /// Loop entire queue
    All,
}

impl RepeatMode {
    /// Next mode in the None → All → One → None cycle
    #[must_use]
    pub fn cycle(self) -> Self {
        match self {
            Self::None => Self::All,
            Self::All => Self::One,
            Self::One => Self::None,
        }
    }
}

/// Configuration for the prefetch cache
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamCacheConfig {
    /// Directory holding cached stream heads
    pub directory: PathBuf,

    /// Upper bound on cached bytes (default: 200 MiB)
    pub max_bytes: u64,

    /// Bytes fetched from the start of each upcoming stream (default: 1 MiB)
    pub head_bytes: u64,
}

impl Default for StreamCacheConfig {
    fn default() -> Self {
        Self {
            directory: std::env::temp_dir().join("cadenza-stream-cache"),
            max_bytes: 200 * 1024 * 1024,
            head_bytes: 1024 * 1024,
        }
    }
}

/// Configuration for the playback controller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Maximum history size (default: 50)
    pub history_size: usize,

    /// Remaining tracks at which the next page is requested (default: 3)
    pub look_ahead_threshold: usize,

    /// Upcoming queue positions whose stream heads are prefetched (default: 2)
    pub prefetch_ahead: usize,

    /// Delay before each focus reacquisition attempt; its length is the attempt budget
    pub focus_retry_delays_ms: Vec<u64>,

    /// Output level while another app ducks us (0-100, default: 20)
    pub duck_volume: u8,

    /// Initial user volume (0-100, default: 100)
    pub initial_volume: u8,

    /// Position sampling period while playing (default: 1000 ms)
    pub position_sample_interval_ms: u64,

    /// Past this position, "previous" restarts the current track (default: 3000 ms)
    pub restart_threshold_ms: u64,

    /// Prefetch cache settings
    pub cache: StreamCacheConfig,
}

impl PlaybackConfig {
    /// Focus retry ladder as durations
    pub fn focus_retry_delays(&self) -> Vec<Duration> {
        self.focus_retry_delays_ms
            .iter()
            .copied()
            .map(Duration::from_millis)
            .collect()
    }

    /// Position sampling period
    pub fn position_sample_interval(&self) -> Duration {
        Duration::from_millis(self.position_sample_interval_ms.max(1))
    }

    /// Restart-instead-of-previous threshold
    pub fn restart_threshold(&self) -> Duration {
        Duration::from_millis(self.restart_threshold_ms)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            history_size: 50,
            look_ahead_threshold: 3,
            prefetch_ahead: 2,
            focus_retry_delays_ms: vec![100, 250, 500, 1000, 1000],
            duck_volume: 20,
            initial_volume: 100,
            position_sample_interval_ms: 1000,
            restart_threshold_ms: 3000,
            cache: StreamCacheConfig::default(),
        }
    }
}
