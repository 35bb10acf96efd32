//! Cadenza Playback - queue, traversal and audio-focus core
//!
//! Platform-agnostic playback management for a streaming client:
//! - Play queue with a stable current pointer ([`QueueStore`])
//! - Shuffle and repeat ([`ShuffleEngine`], [`RepeatPolicy`])
//! - Recently played log ([`HistoryTracker`])
//! - Look-ahead paging of remote collections ([`PaginationPrefetcher`])
//! - On-disk prefetch of upcoming stream heads ([`StreamPrefetchCache`])
//! - Audio focus arbitration with bounded retries ([`AudioResourceArbiter`])
//!
//! [`PlaybackController`] ties them together behind a single-writer message
//! loop. The host supplies an [`OutputResource`] and an
//! [`AudioFocusPlatform`]; everything else runs on tokio.
//!
//! # Example
//!
//! ```rust,no_run
//! use cadenza_playback::{
//!     Command, PlaybackConfig, PlaybackController, PlayerServices, QueueRequest,
//! };
//! # use cadenza_playback::{AudioFocusPlatform, OutputResource, OutputSink};
//! # fn services() -> PlayerServices { unimplemented!() }
//! # fn output(_: OutputSink) -> Box<dyn OutputResource> { unimplemented!() }
//! # fn focus() -> Box<dyn AudioFocusPlatform> { unimplemented!() }
//! # async fn example(tracks: Vec<cadenza_core::Track>) -> cadenza_playback::Result<()> {
//! let (controller, mut events) =
//!     PlaybackController::new(PlaybackConfig::default(), services(), output, focus());
//! let handle = controller.handle();
//! tokio::spawn(controller.run());
//!
//! handle.set_queue(QueueRequest::new(tracks, 0, Default::default()))?;
//! handle.send(Command::ToggleShuffle)?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod controller;
pub mod error;
pub mod events;
pub mod focus;
pub mod history;
pub mod message;
pub mod output;
pub mod pagination;
pub mod queue;
pub mod repeat;
pub mod scheduler;
pub mod shuffle;
pub mod types;
pub mod volume;

pub use cache::StreamPrefetchCache;
pub use controller::{ControllerHandle, PlaybackController, PlayerServices};
pub use error::{PlaybackError, Result};
pub use events::{PlaybackEvent, SessionSnapshot};
pub use focus::{AudioFocusPlatform, AudioFocusState, AudioResourceArbiter, FocusAction, FocusSignal};
pub use history::HistoryTracker;
pub use message::{Command, ControlMessage, QueueRequest, TimerTick};
pub use output::{LoadToken, OutputEvent, OutputEventKind, OutputResource, OutputSink, StreamSource};
pub use pagination::{FetchTicket, PageOutcome, PaginationCursor, PaginationPrefetcher};
pub use queue::{CurrentChange, QueueStore, Removal};
pub use repeat::{Direction, RepeatPolicy};
pub use scheduler::{ManualScheduler, ScheduledTick, Scheduler, TaskGuard, TokioScheduler};
pub use shuffle::{ShuffleEngine, ShuffleOrder};
pub use types::{PlaybackConfig, PlaybackState, RepeatMode, StreamCacheConfig};
pub use volume::OutputVolume;
