//! Simulated platform collaborators
//!
//! Stand-ins for a real audio device: the output "plays" each track for a
//! fixed wall-clock length and reports lifecycle events through the sink,
//! and the focus platform always grants.

use cadenza_playback::{
    AudioFocusPlatform, LoadToken, OutputEventKind, OutputResource, OutputSink, PlaybackError,
    StreamSource,
};
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// Output resource that renders silence in real time
pub struct SimulatedOutput {
    sink: OutputSink,
    track_length: Duration,
    token: Option<LoadToken>,
    locator: Option<String>,
    /// Position accumulated before the current play span
    elapsed: Duration,
    playing_since: Option<Instant>,
    end_timer: Option<AbortHandle>,
    gain: f32,
}

impl SimulatedOutput {
    pub fn new(sink: OutputSink, track_length: Duration) -> Self {
        Self {
            sink,
            track_length,
            token: None,
            locator: None,
            elapsed: Duration::ZERO,
            playing_since: None,
            end_timer: None,
            gain: 1.0,
        }
    }

    /// Last gain the controller applied
    pub fn gain(&self) -> f32 {
        self.gain
    }

    fn cancel_end_timer(&mut self) {
        if let Some(timer) = self.end_timer.take() {
            timer.abort();
        }
    }

    fn arm_end_timer(&mut self) {
        self.cancel_end_timer();
        let Some(token) = self.token else {
            return;
        };
        let remaining = self.track_length.saturating_sub(self.elapsed);
        let sink = self.sink.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(remaining).await;
            sink.emit(token, OutputEventKind::Ended);
        });
        self.end_timer = Some(task.abort_handle());
    }

    fn freeze_position(&mut self) {
        if let Some(since) = self.playing_since.take() {
            self.elapsed = (self.elapsed + since.elapsed()).min(self.track_length);
        }
    }
}

impl OutputResource for SimulatedOutput {
    fn load(&mut self, token: LoadToken, source: &StreamSource) -> cadenza_playback::Result<()> {
        self.cancel_end_timer();
        self.token = Some(token);
        self.locator = Some(source.locator().to_string());
        self.elapsed = Duration::ZERO;
        self.playing_since = None;

        info!(
            locator = %source.locator(),
            cached = source.is_cached(),
            "Simulated output loaded stream"
        );
        if self.sink.emit(token, OutputEventKind::Ready) {
            Ok(())
        } else {
            Err(PlaybackError::ControllerClosed)
        }
    }

    fn play(&mut self) -> cadenza_playback::Result<()> {
        if self.token.is_none() {
            return Err(PlaybackError::NoTrackLoaded);
        }
        if self.playing_since.is_none() {
            self.playing_since = Some(Instant::now());
            self.arm_end_timer();
        }
        Ok(())
    }

    fn pause(&mut self) -> cadenza_playback::Result<()> {
        self.freeze_position();
        self.cancel_end_timer();
        Ok(())
    }

    fn stop(&mut self) {
        self.cancel_end_timer();
        self.token = None;
        self.locator = None;
        self.elapsed = Duration::ZERO;
        self.playing_since = None;
    }

    fn seek(&mut self, position: Duration) -> cadenza_playback::Result<()> {
        if self.token.is_none() {
            return Err(PlaybackError::NoTrackLoaded);
        }
        self.elapsed = position.min(self.track_length);
        if self.playing_since.is_some() {
            self.playing_since = Some(Instant::now());
            self.arm_end_timer();
        }
        Ok(())
    }

    fn set_volume(&mut self, gain: f32) {
        debug!(gain, "Simulated output volume");
        self.gain = gain;
    }

    fn position(&self) -> Duration {
        let running = self.playing_since.map_or(Duration::ZERO, |since| since.elapsed());
        (self.elapsed + running).min(self.track_length)
    }

    fn duration(&self) -> Option<Duration> {
        self.token.map(|_| self.track_length)
    }
}

/// Focus platform with no competing applications
#[derive(Debug, Default)]
pub struct AlwaysGrantFocus;

impl AudioFocusPlatform for AlwaysGrantFocus {
    fn request_focus(&mut self) -> bool {
        debug!("Audio focus granted");
        true
    }

    fn abandon_focus(&mut self) {
        debug!("Audio focus abandoned");
    }
}
