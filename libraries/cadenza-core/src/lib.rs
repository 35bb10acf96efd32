//! Cadenza Core
//!
//! Platform-agnostic value types and collaborator contracts shared by the
//! Cadenza playback core and the clients that feed it.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Track`, `PlaybackContext`, `TrackPage`
//! - **Collaborator Traits**: `Catalog` (paged collections), `StreamFetcher` (stream heads)
//! - **Error Handling**: Unified `CoreError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use cadenza_core::{PlaybackContext, Track, TrackId};
//! use std::time::Duration;
//!
//! let track = Track::new(
//!     TrackId::new("t-1"),
//!     "https://cdn.example.com/t-1.mp3",
//!     "My Favorite Song",
//! )
//! .with_artist("Artist Name")
//! .with_duration(Duration::from_secs(215));
//!
//! assert!(!track.is_starred());
//! track.set_starred(true);
//! assert!(track.is_starred());
//!
//! let context = PlaybackContext::Single;
//! assert!(!context.is_paged());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{CoreError, Result};
pub use traits::{Catalog, StreamFetcher};
pub use types::{CollectionId, PlaybackContext, Track, TrackId, TrackPage};
