//! Play queue
//!
//! One ordered list of tracks plus the pointer to the track loaded into the
//! output resource. Out-of-range input from external commands is clamped or
//! ignored, never allowed to corrupt the pointer.

use cadenza_core::{PlaybackContext, Track, TrackId};
use std::ops::Range;
use std::sync::Arc;
use tracing::warn;

/// How a removal affected the current pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentChange {
    /// Same track, same position
    Unchanged,
    /// Same track, its position shifted down by one
    Shifted,
    /// The current track was removed; the following track is now current
    Replaced,
    /// The current track was removed and the queue is now empty
    Cleared,
}

/// Result of removing a track
#[derive(Debug, Clone)]
pub struct Removal {
    /// The removed track
    pub track: Arc<Track>,
    /// Effect on the current pointer
    pub current: CurrentChange,
}

/// Ordered track list with a current pointer
#[derive(Debug, Clone, Default)]
pub struct QueueStore {
    tracks: Vec<Arc<Track>>,
    current: Option<usize>,
    context: PlaybackContext,
}

impl QueueStore {
    /// Create new empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the queue wholesale
    ///
    /// An out-of-range `start_index` defaults to 0. Returns the new current
    /// track, `None` if `tracks` is empty.
    pub fn set(
        &mut self,
        tracks: Vec<Arc<Track>>,
        start_index: usize,
        context: PlaybackContext,
    ) -> Option<&Arc<Track>> {
        self.tracks = tracks;
        self.context = context;
        self.current = if self.tracks.is_empty() {
            None
        } else if start_index < self.tracks.len() {
            Some(start_index)
        } else {
            warn!(
                start_index,
                len = self.tracks.len(),
                "Start index out of range, starting from the top"
            );
            Some(0)
        };
        self.current()
    }

    /// Append tracks to the tail
    ///
    /// The current pointer is untouched. Returns the positions of the new
    /// tracks.
    pub fn append(&mut self, tracks: Vec<Arc<Track>>) -> Range<usize> {
        let start = self.tracks.len();
        self.tracks.extend(tracks);
        start..self.tracks.len()
    }

    /// Remove the track at `index`
    ///
    /// Returns `None` (and leaves the queue untouched) if `index` is out of range.
    pub fn remove_at(&mut self, index: usize) -> Option<Removal> {
        if index >= self.tracks.len() {
            warn!(index, len = self.tracks.len(), "Ignoring removal of out-of-range index");
            return None;
        }

        let track = self.tracks.remove(index);
        let current = match self.current {
            Some(current) if index < current => {
                self.current = Some(current - 1);
                CurrentChange::Shifted
            }
            Some(current) if index == current => {
                if self.tracks.is_empty() {
                    self.current = None;
                    CurrentChange::Cleared
                } else {
                    // Following track slid into this slot; wrap past the end
                    self.current = Some(if index < self.tracks.len() { index } else { 0 });
                    CurrentChange::Replaced
                }
            }
            _ => CurrentChange::Unchanged,
        };

        Some(Removal { track, current })
    }

    /// Remove the first track with the given id
    pub fn remove_track(&mut self, id: &TrackId) -> Option<Removal> {
        let index = self.index_of(id)?;
        self.remove_at(index)
    }

    /// Move the track at `from` to position `to`
    ///
    /// `to` is clamped into the queue; an out-of-range `from` is ignored.
    /// Returns whether the queue changed.
    pub fn move_to(&mut self, from: usize, to: usize) -> bool {
        let len = self.tracks.len();
        if from >= len {
            warn!(from, len, "Ignoring move of out-of-range index");
            return false;
        }
        let to = to.min(len - 1);
        if from == to {
            return false;
        }

        let track = self.tracks.remove(from);
        self.tracks.insert(to, track);

        if let Some(current) = self.current {
            self.current = Some(if current == from {
                to
            } else if from < current && to >= current {
                current - 1
            } else if from > current && to <= current {
                current + 1
            } else {
                current
            });
        }
        true
    }

    /// Point at `index`, clamped into the queue
    pub fn select(&mut self, index: usize) -> Option<&Arc<Track>> {
        if self.tracks.is_empty() {
            self.current = None;
        } else {
            self.current = Some(index.min(self.tracks.len() - 1));
        }
        self.current()
    }

    /// Clear entire queue
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.current = None;
        self.context = PlaybackContext::Single;
    }

    /// Position of the current track
    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// The current track
    pub fn current(&self) -> Option<&Arc<Track>> {
        self.current.and_then(|i| self.tracks.get(i))
    }

    /// Track at `index`
    pub fn get(&self, index: usize) -> Option<&Arc<Track>> {
        self.tracks.get(index)
    }

    /// All tracks in queue order
    pub fn tracks(&self) -> &[Arc<Track>] {
        &self.tracks
    }

    /// Position of the first track with the given id
    pub fn index_of(&self, id: &TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| &t.id == id)
    }

    /// Why this queue is playing
    pub fn context(&self) -> &PlaybackContext {
        &self.context
    }

    /// Tracks left after the current one (`len - current - 1`)
    pub fn remaining(&self) -> usize {
        match self.current {
            Some(current) => self.tracks.len().saturating_sub(current + 1),
            None => self.tracks.len(),
        }
    }

    /// Set the starred flag on every entry of a track
    ///
    /// Returns whether any entry matched.
    pub fn set_starred(&self, id: &TrackId, starred: bool) -> bool {
        let mut found = false;
        for track in self.tracks.iter().filter(|t| &t.id == id) {
            track.set_starred(starred);
            found = true;
        }
        found
    }

    /// Total number of tracks in queue
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Check if queue is empty
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}
