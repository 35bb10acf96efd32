//! Platform-agnostic output resource
//!
//! Abstracts the decoder/output device that actually renders audio. Loading
//! and starting are asynchronous on the platform side: the implementation
//! reports lifecycle changes back as `OutputEvent`s tagged with the
//! `LoadToken` of the load they belong to.

use crate::error::Result;
use crate::message::ControlMessage;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// Identifies one `load` call; events from older loads are ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadToken(pub u64);

/// Where the output should read the stream from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSource {
    /// Stream directly from the network
    Network {
        /// Stream locator
        locator: String,
    },
    /// Start from the cached head, continue from the network
    ///
    /// If the cached file cannot be read the output reports `Error` before
    /// `Ready`; the controller then reloads from `locator`.
    Cached {
        /// Cached head of the stream
        path: PathBuf,
        /// Stream locator for the remainder and for fallback
        locator: String,
    },
}

impl StreamSource {
    /// Network locator of the stream
    pub fn locator(&self) -> &str {
        match self {
            Self::Network { locator } | Self::Cached { locator, .. } => locator,
        }
    }

    /// Whether this source is served from the prefetch cache
    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cached { .. })
    }
}

/// Lifecycle notifications from the output resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEventKind {
    /// Track loaded and ready to start
    Ready,
    /// Playback stalled waiting for data
    Buffering,
    /// Track played to its end
    Ended,
    /// Track could not be played (unreachable stream, decode failure, ...)
    Error(String),
}

/// An output notification for a specific load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputEvent {
    /// Load this event belongs to
    pub token: LoadToken,
    /// What happened
    pub kind: OutputEventKind,
}

/// Decoder/output device driven by the controller
///
/// Calls are made from the controller's single control sequence.
/// Implementations push `OutputEvent`s back through the sender they were
/// given at construction (see `ControllerHandle::output_sink`).
pub trait OutputResource: Send {
    /// Start loading a track; completion is reported with `Ready` or `Error`
    ///
    /// # Errors
    /// Returns an error if the load could not even be started
    fn load(&mut self, token: LoadToken, source: &StreamSource) -> Result<()>;

    /// Start or resume rendering the loaded track
    fn play(&mut self) -> Result<()>;

    /// Pause rendering
    fn pause(&mut self) -> Result<()>;

    /// Stop and unload
    fn stop(&mut self);

    /// Seek within the loaded track
    ///
    /// # Errors
    /// Returns an error if the position cannot be reached
    fn seek(&mut self, position: Duration) -> Result<()>;

    /// Set output level (0.0 - 1.0)
    fn set_volume(&mut self, gain: f32);

    /// Current playback position
    fn position(&self) -> Duration;

    /// Duration of the loaded track, if known
    fn duration(&self) -> Option<Duration>;
}

/// Channel an output resource reports its events through
///
/// Obtained from `ControllerHandle::output_sink`.
#[derive(Debug, Clone)]
pub struct OutputSink {
    tx: UnboundedSender<ControlMessage>,
}

impl OutputSink {
    pub(crate) fn new(tx: UnboundedSender<ControlMessage>) -> Self {
        Self { tx }
    }

    /// Report an event for the load identified by `token`
    ///
    /// Returns `false` if the controller is gone.
    pub fn emit(&self, token: LoadToken, kind: OutputEventKind) -> bool {
        self.tx
            .send(ControlMessage::Output(OutputEvent { token, kind }))
            .is_ok()
    }
}

impl<T: OutputResource + ?Sized> OutputResource for Box<T> {
    fn load(&mut self, token: LoadToken, source: &StreamSource) -> Result<()> {
        (**self).load(token, source)
    }

    fn play(&mut self) -> Result<()> {
        (**self).play()
    }

    fn pause(&mut self) -> Result<()> {
        (**self).pause()
    }

    fn stop(&mut self) {
        (**self).stop();
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        (**self).seek(position)
    }

    fn set_volume(&mut self, gain: f32) {
        (**self).set_volume(gain);
    }

    fn position(&self) -> Duration {
        (**self).position()
    }

    fn duration(&self) -> Option<Duration> {
        (**self).duration()
    }
}
