//! Messages drained by the controller loop
//!
//! Commands, output lifecycle events, OS focus signals, page results and
//! timer ticks all travel through one channel, so every mutation happens on
//! the controller's single control sequence.

use crate::focus::FocusSignal;
use crate::output::OutputEvent;
use crate::pagination::{FetchTicket, PaginationCursor};
use cadenza_core::{CoreError, PlaybackContext, Track, TrackId, TrackPage};

/// A queue replacement
#[derive(Debug, Clone)]
pub struct QueueRequest {
    /// New queue contents
    pub tracks: Vec<Track>,
    /// Position to start from; out-of-range values start from 0
    pub start_index: usize,
    /// Why the queue is playing
    pub context: PlaybackContext,
    /// Whether the collection has pages beyond `tracks`
    pub has_more: bool,
}

impl QueueRequest {
    /// Queue with no further pages
    pub fn new(tracks: Vec<Track>, start_index: usize, context: PlaybackContext) -> Self {
        Self {
            tracks,
            start_index,
            context,
            has_more: false,
        }
    }

    /// Queue built from the first page of a paged collection
    pub fn from_first_page(page: TrackPage, start_index: usize, context: PlaybackContext) -> Self {
        Self {
            tracks: page.tracks,
            start_index,
            context,
            has_more: page.has_more,
        }
    }

    /// Pagination cursor for this queue, if its context is paged
    pub fn cursor(&self) -> Option<PaginationCursor> {
        self.context
            .collection_id()
            .map(|id| PaginationCursor::after_first_page(id.clone(), self.has_more))
    }
}

/// Command surface shared by the UI and the host media session
#[derive(Debug, Clone)]
pub enum Command {
    /// Replace the queue with a single track and play it
    Play(Track),
    Pause,
    Resume,
    /// Stop playback and release audio focus
    Stop,
    SkipNext,
    /// Restart the current track or go back one
    SkipPrevious,
    /// Seek within the current track (milliseconds)
    SeekTo(u64),
    /// Replace the queue and play from the start index
    SetQueue(QueueRequest),
    /// Add tracks to the tail of the queue
    Append(Vec<Track>),
    /// Remove the track at a queue position
    RemoveAt(usize),
    /// Remove the first queue entry of a track
    RemoveTrack(TrackId),
    /// Reorder the queue
    Move {
        /// Current position
        from: usize,
        /// Target position
        to: usize,
    },
    /// Play the track at a queue position
    SkipTo(usize),
    ToggleShuffle,
    CycleRepeatMode,
    ClearQueue,
    /// Star or unstar a track everywhere it is queued
    SetStarred {
        /// Track to update
        track_id: TrackId,
        /// New flag
        starred: bool,
    },
    /// User volume (0-100)
    SetVolume(u8),
    ToggleMute,
    /// Purge the prefetch cache (sign-out)
    ClearCache,
}

/// Timer deliveries; each carries the generation it was scheduled under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTick {
    /// Run the next focus reacquisition attempt
    FocusRetry {
        /// Ladder generation
        generation: u64,
    },
    /// Sample the output position
    SamplePosition {
        /// Sampler generation
        generation: u64,
    },
}

/// Everything the controller loop reacts to
#[derive(Debug)]
pub enum ControlMessage {
    /// Command from the UI or host layer
    Command(Command),
    /// Lifecycle event from the output resource
    Output(OutputEvent),
    /// Push signal from the OS focus service
    Focus(FocusSignal),
    /// A page fetch finished
    PageLoaded {
        /// Fetch this result belongs to
        ticket: FetchTicket,
        /// Page or failure
        result: Result<TrackPage, CoreError>,
    },
    /// A scheduled timer fired
    Timer(TimerTick),
    /// Tear down and leave the loop
    Shutdown,
}

impl From<Command> for ControlMessage {
    fn from(command: Command) -> Self {
        Self::Command(command)
    }
}
