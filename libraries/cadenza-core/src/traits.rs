/// Collaborator contracts consumed by the playback core
use crate::error::Result;
use crate::types::{CollectionId, TrackPage};
use async_trait::async_trait;

/// Remote catalog of paged collections
///
/// Implementations must not apply partial results: a failed fetch returns an
/// error and nothing else.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Fetch one page of a collection
    ///
    /// # Errors
    /// Returns an error on any network or catalog failure
    async fn fetch_page(&self, collection_id: &CollectionId, page: u32) -> Result<TrackPage>;
}

/// Downloads the beginning of a stream for the prefetch cache
#[async_trait]
pub trait StreamFetcher: Send + Sync {
    /// Fetch at most `max_bytes` from the start of the stream at `locator`
    ///
    /// # Errors
    /// Returns an error if the stream is unreachable
    async fn fetch_head(&self, locator: &str, max_bytes: u64) -> Result<Vec<u8>>;
}
