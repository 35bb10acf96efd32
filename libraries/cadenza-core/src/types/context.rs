/// Playback context: why the current queue is playing
use crate::types::CollectionId;
use serde::{Deserialize, Serialize};

/// Source context for a queue
///
/// Decides whether reaching the end of the queue always stops playback
/// (single item) or is left to the repeat policy, and whether the queue is
/// backed by a remote paged collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlaybackContext {
    /// Individual track (no context)
    #[default]
    Single,

    /// Tracks from a (possibly paged) remote playlist
    Playlist {
        /// Collection the tracks come from
        collection_id: CollectionId,
        /// Display name
        name: String,
    },

    /// Tracks from a search result listing
    SearchResult {
        /// Query that produced the results
        query: String,
    },
}

impl PlaybackContext {
    /// Collection backing this context, if it is a paged collection
    pub fn collection_id(&self) -> Option<&CollectionId> {
        match self {
            Self::Playlist { collection_id, .. } => Some(collection_id),
            Self::Single | Self::SearchResult { .. } => None,
        }
    }

    /// Whether this context can grow through pagination
    pub fn is_paged(&self) -> bool {
        self.collection_id().is_some()
    }

    /// Whether "repeat all" may wrap around at the end of the queue
    ///
    /// A single playback always stops at the end.
    pub fn allows_wrap(&self) -> bool {
        !matches!(self, Self::Single)
    }
}
