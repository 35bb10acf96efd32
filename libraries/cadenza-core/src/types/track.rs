/// Track domain type
use crate::types::TrackId;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// A playable item
///
/// Tracks are created by the catalog and shared (`Arc<Track>`) between the
/// queue and the history. Everything is immutable except the starred flag,
/// which can be flipped through a shared reference.
#[derive(Debug, Serialize, Deserialize)]
pub struct Track {
    /// Unique track identifier
    pub id: TrackId,

    /// Stream locator (URI) handed to the output resource
    pub locator: String,

    /// Track title
    pub title: String,

    /// Artist name
    pub artist: Option<String>,

    /// Album name
    pub album: Option<String>,

    /// Track duration
    pub duration: Duration,

    #[serde(default)]
    starred: AtomicBool,
}

impl Track {
    /// Create a new track with minimal metadata
    pub fn new(id: TrackId, locator: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id,
            locator: locator.into(),
            title: title.into(),
            artist: None,
            album: None,
            duration: Duration::ZERO,
            starred: AtomicBool::new(false),
        }
    }

    /// Set the artist name
    #[must_use]
    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    /// Set the album name
    #[must_use]
    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    /// Set the duration
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set the initial starred flag
    #[must_use]
    pub fn with_starred(self, starred: bool) -> Self {
        self.starred.store(starred, Ordering::Relaxed);
        self
    }

    /// Whether the listener starred this track
    pub fn is_starred(&self) -> bool {
        self.starred.load(Ordering::Relaxed)
    }

    /// Flip the starred flag; visible to every holder of this track
    pub fn set_starred(&self, starred: bool) {
        self.starred.store(starred, Ordering::Relaxed);
    }

    /// Duration in whole milliseconds
    pub fn duration_ms(&self) -> u64 {
        u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX)
    }
}

impl Clone for Track {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            locator: self.locator.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
            duration: self.duration,
            starred: AtomicBool::new(self.is_starred()),
        }
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.locator == other.locator
            && self.title == other.title
            && self.artist == other.artist
            && self.album == other.album
            && self.duration == other.duration
            && self.is_starred() == other.is_starred()
    }
}

impl Eq for Track {}
