//! Types for Cadenza server API requests and responses.

use cadenza_core::{Track, TrackId, TrackPage};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for connecting to a Cadenza server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Base URL of the server (e.g., "https://music.example.com")
    pub url: String,
    /// Bearer token sent with every request, if any
    pub access_token: Option<String>,
}

impl ServerConfig {
    /// Create a new server config with just the URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            access_token: None,
        }
    }

    /// Create a config with an access token.
    pub fn with_token(url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            access_token: Some(access_token.into()),
        }
    }
}

/// Track as returned by the collection endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerTrack {
    pub id: String,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Duration in milliseconds
    #[serde(default)]
    pub duration_ms: u64,
    /// Absolute URL or server-relative path of the audio stream
    pub stream_url: String,
    #[serde(default)]
    pub starred: bool,
}

impl ServerTrack {
    /// Convert into the playback track model, resolving the stream URL
    pub fn into_track(self, stream_url: String) -> Track {
        let mut track = Track::new(TrackId::new(self.id), stream_url, self.title)
            .with_duration(Duration::from_millis(self.duration_ms))
            .with_starred(self.starred);
        if let Some(artist) = self.artist {
            track = track.with_artist(artist);
        }
        if let Some(album) = self.album {
            track = track.with_album(album);
        }
        track
    }
}

/// Response from `GET /api/collections/{id}/tracks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionPageResponse {
    pub tracks: Vec<ServerTrack>,
    #[serde(default)]
    pub has_more: bool,
    /// Page to request next; defaults to the following page
    pub next_page: Option<u32>,
}

impl CollectionPageResponse {
    /// Convert into a `TrackPage`, resolving stream URLs with `resolve`
    pub fn into_page(self, page: u32, mut resolve: impl FnMut(&str) -> String) -> TrackPage {
        let tracks = self
            .tracks
            .into_iter()
            .map(|t| {
                let stream_url = resolve(&t.stream_url);
                t.into_track(stream_url)
            })
            .collect();
        TrackPage {
            tracks,
            has_more: self.has_more,
            next_page: self.next_page.unwrap_or(page + 1),
        }
    }
}
