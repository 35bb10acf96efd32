//! Playback history tracking
//!
//! Keeps a bounded, duplicate-free log of recently played tracks.

use cadenza_core::Track;
use std::collections::VecDeque;
use std::sync::Arc;

/// Default number of remembered tracks
pub const DEFAULT_HISTORY_SIZE: usize = 50;

/// Most-recently-played log
///
/// Most recent entry sits at the front. A track that is played again is moved
/// to the front instead of being duplicated.
#[derive(Debug, Clone)]
pub struct HistoryTracker {
    tracks: VecDeque<Arc<Track>>,
    max_size: usize,
}

impl HistoryTracker {
    /// Create new history with specified maximum size
    pub fn new(max_size: usize) -> Self {
        Self {
            tracks: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// Record a played track
    ///
    /// Removes any existing entry with the same id, inserts at the front and
    /// truncates to capacity.
    pub fn record(&mut self, track: Arc<Track>) {
        if self.max_size == 0 {
            return;
        }
        self.tracks.retain(|t| t.id != track.id);
        self.tracks.push_front(track);
        self.tracks.truncate(self.max_size);
    }

    /// Most recently played track
    pub fn most_recent(&self) -> Option<&Arc<Track>> {
        self.tracks.front()
    }

    /// All entries, most recent first
    pub fn entries(&self) -> impl Iterator<Item = &Arc<Track>> {
        self.tracks.iter()
    }

    /// Get number of tracks in history
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Check if history is empty
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    /// Get maximum history size
    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

impl Default for HistoryTracker {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}
