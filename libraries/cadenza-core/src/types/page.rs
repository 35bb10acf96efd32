/// A page of a remote collection
use crate::types::Track;
use serde::{Deserialize, Serialize};

/// One page of tracks returned by the catalog, with its continuation cursor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackPage {
    /// Tracks on this page, in collection order
    pub tracks: Vec<Track>,

    /// Whether further pages exist
    pub has_more: bool,

    /// Page number to request next
    pub next_page: u32,
}

impl TrackPage {
    /// Final page of a collection
    pub fn last(tracks: Vec<Track>, page: u32) -> Self {
        Self {
            tracks,
            has_more: false,
            next_page: page + 1,
        }
    }
}
