//! Domain types shared across the workspace

mod context;
mod ids;
mod page;
mod track;

pub use context::PlaybackContext;
pub use ids::{CollectionId, TrackId};
pub use page::TrackPage;
pub use track::Track;
