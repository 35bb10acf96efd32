//! Playback controller
//!
//! The controller owns every piece of playback state and is the only thing
//! that mutates it. Commands, output events, focus signals, page results and
//! timer ticks arrive as `ControlMessage`s and are applied one at a time by
//! `run`. Slow work (page fetches, stream prefetches, timers) runs in
//! background tasks that report back through the same channel.
//!
//! ```text
//!  ControllerHandle ─┐
//!  OutputSink ───────┼──▶ mpsc ──▶ PlaybackController ──▶ PlaybackEvent
//!  Scheduler ticks ──┤                │   │   │
//!  page fetch tasks ─┘          output  focus  cache
//! ```

use crate::cache::StreamPrefetchCache;
use crate::error::{PlaybackError, Result};
use crate::events::{PlaybackEvent, SessionSnapshot};
use crate::focus::{AudioFocusPlatform, AudioFocusState, AudioResourceArbiter, FocusAction, FocusSignal};
use crate::history::HistoryTracker;
use crate::message::{Command, ControlMessage, QueueRequest, TimerTick};
use crate::output::{LoadToken, OutputEvent, OutputEventKind, OutputResource, OutputSink, StreamSource};
use crate::pagination::{FetchTicket, PageOutcome, PaginationPrefetcher};
use crate::queue::{CurrentChange, QueueStore};
use crate::repeat::{Direction, RepeatPolicy};
use crate::scheduler::{Scheduler, TaskGuard};
use crate::shuffle::ShuffleEngine;
use crate::types::{PlaybackConfig, PlaybackState, RepeatMode};
use crate::volume::OutputVolume;
use cadenza_core::{Catalog, CoreError, PlaybackContext, Track, TrackId, TrackPage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

/// Collaborators the controller is constructed with
///
/// Created once at startup and torn down with `PlaybackController::shutdown`.
#[derive(Clone)]
pub struct PlayerServices {
    /// Remote collection pages
    pub catalog: Arc<dyn Catalog>,
    /// Prefetch cache for upcoming stream heads
    pub cache: StreamPrefetchCache,
    /// Timer source
    pub scheduler: Arc<dyn Scheduler>,
}

/// Cloneable sender side of a controller
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: UnboundedSender<ControlMessage>,
}

impl ControllerHandle {
    /// Queue a command
    ///
    /// # Errors
    /// Returns `ControllerClosed` if the controller loop has exited
    pub fn send(&self, command: Command) -> Result<()> {
        self.tx
            .send(ControlMessage::Command(command))
            .map_err(|_| PlaybackError::ControllerClosed)
    }

    /// Forward an OS focus signal
    ///
    /// # Errors
    /// Returns `ControllerClosed` if the controller loop has exited
    pub fn focus_changed(&self, signal: FocusSignal) -> Result<()> {
        self.tx
            .send(ControlMessage::Focus(signal))
            .map_err(|_| PlaybackError::ControllerClosed)
    }

    /// Sink an output resource reports lifecycle events through
    pub fn output_sink(&self) -> OutputSink {
        OutputSink::new(self.tx.clone())
    }

    /// Ask the loop to tear down and exit
    ///
    /// # Errors
    /// Returns `ControllerClosed` if the controller loop has already exited
    pub fn shutdown(&self) -> Result<()> {
        self.tx
            .send(ControlMessage::Shutdown)
            .map_err(|_| PlaybackError::ControllerClosed)
    }

    pub fn play(&self, track: Track) -> Result<()> {
        self.send(Command::Play(track))
    }

    pub fn pause(&self) -> Result<()> {
        self.send(Command::Pause)
    }

    pub fn resume(&self) -> Result<()> {
        self.send(Command::Resume)
    }

    pub fn stop(&self) -> Result<()> {
        self.send(Command::Stop)
    }

    pub fn skip_next(&self) -> Result<()> {
        self.send(Command::SkipNext)
    }

    pub fn skip_previous(&self) -> Result<()> {
        self.send(Command::SkipPrevious)
    }

    pub fn seek_to(&self, position_ms: u64) -> Result<()> {
        self.send(Command::SeekTo(position_ms))
    }

    pub fn set_queue(&self, request: QueueRequest) -> Result<()> {
        self.send(Command::SetQueue(request))
    }

    pub fn append(&self, tracks: Vec<Track>) -> Result<()> {
        self.send(Command::Append(tracks))
    }

    pub fn toggle_shuffle(&self) -> Result<()> {
        self.send(Command::ToggleShuffle)
    }

    pub fn cycle_repeat_mode(&self) -> Result<()> {
        self.send(Command::CycleRepeatMode)
    }

    pub fn clear_queue(&self) -> Result<()> {
        self.send(Command::ClearQueue)
    }

    /// Purge the prefetch cache, e.g. when the user signs out
    pub fn clear_on_logout(&self) -> Result<()> {
        self.send(Command::ClearCache)
    }
}

/// Top-level playback orchestrator
pub struct PlaybackController {
    config: PlaybackConfig,
    services: PlayerServices,
    output: Box<dyn OutputResource>,
    focus: Box<dyn AudioFocusPlatform>,

    queue: QueueStore,
    shuffle: ShuffleEngine,
    repeat_mode: RepeatMode,
    history: HistoryTracker,
    pagination: PaginationPrefetcher,
    arbiter: AudioResourceArbiter,
    volume: OutputVolume,

    state: PlaybackState,
    now_playing: Option<Arc<Track>>,
    load_token: LoadToken,
    /// Output reported `Ready` for the current load
    ready: bool,
    /// Start the output as soon as it is ready
    play_when_ready: bool,
    /// Last sampled position
    position: Duration,
    /// Consecutive tracks that failed without reaching `Ready`
    failure_streak: usize,
    /// Current load reads a cached stream head
    loaded_from_cache: bool,
    /// Reached the end of loaded material and waiting for the next page
    awaiting_page: bool,

    focus_retry: Option<TaskGuard>,
    sampler: Option<TaskGuard>,
    sampler_generation: u64,

    snapshot_dirty: bool,
    queue_dirty: bool,
    reported_focus: AudioFocusState,

    tx: UnboundedSender<ControlMessage>,
    rx: UnboundedReceiver<ControlMessage>,
    events: UnboundedSender<PlaybackEvent>,
}

impl PlaybackController {
    /// Create a controller and the receiver its events are delivered to
    ///
    /// `make_output` receives the sink the output resource must report its
    /// lifecycle events through.
    pub fn new<O, F>(
        config: PlaybackConfig,
        services: PlayerServices,
        make_output: F,
        focus: Box<dyn AudioFocusPlatform>,
    ) -> (Self, UnboundedReceiver<PlaybackEvent>)
    where
        O: OutputResource + 'static,
        F: FnOnce(OutputSink) -> O,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();
        let output = make_output(OutputSink::new(tx.clone()));

        let controller = Self {
            queue: QueueStore::new(),
            shuffle: ShuffleEngine::new(),
            repeat_mode: RepeatMode::None,
            history: HistoryTracker::new(config.history_size),
            pagination: PaginationPrefetcher::new(config.look_ahead_threshold),
            arbiter: AudioResourceArbiter::new(config.focus_retry_delays()),
            volume: OutputVolume::new(config.initial_volume, config.duck_volume),
            config,
            services,
            output: Box::new(output),
            focus,
            state: PlaybackState::Stopped,
            now_playing: None,
            load_token: LoadToken(0),
            ready: false,
            play_when_ready: false,
            position: Duration::ZERO,
            failure_streak: 0,
            loaded_from_cache: false,
            awaiting_page: false,
            focus_retry: None,
            sampler: None,
            sampler_generation: 0,
            snapshot_dirty: false,
            queue_dirty: false,
            reported_focus: AudioFocusState::None,
            tx,
            rx,
            events,
        };
        (controller, events_rx)
    }

    /// Use a deterministic shuffle order
    #[must_use]
    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle = ShuffleEngine::with_seed(seed);
        self
    }

    /// Sender side for commands and platform signals
    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            tx: self.tx.clone(),
        }
    }

    /// Drain messages until `Shutdown` arrives, then tear down
    pub async fn run(mut self) {
        info!("Playback controller started");
        // The controller holds a sender itself, so only `Shutdown` ends this
        while let Some(message) = self.rx.recv().await {
            if !self.handle_message(message) {
                break;
            }
        }
        info!("Playback controller stopped");
    }

    /// Wait for and apply a single message
    ///
    /// Returns `false` once `Shutdown` has been processed.
    pub async fn process_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(message) => self.handle_message(message),
            None => false,
        }
    }

    /// Apply every message already queued, without waiting
    ///
    /// Returns how many were applied.
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(message) = self.rx.try_recv() {
            applied += 1;
            if !self.handle_message(message) {
                break;
            }
        }
        applied
    }

    /// Apply a command directly, bypassing the channel
    pub fn apply(&mut self, command: Command) {
        self.handle_message(ControlMessage::Command(command));
    }

    /// Cancel background work, stop the output and release focus
    ///
    /// Idempotent.
    pub fn shutdown(&mut self) {
        self.pagination.reset(None);
        self.services.cache.cancel_downloads();
        self.focus_retry = None;
        self.awaiting_page = false;
        self.stop_output();
        self.arbiter.release(self.focus.as_mut());
        self.flush();
    }

    // ===== Read access =====

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn queue(&self) -> &QueueStore {
        &self.queue
    }

    pub fn history(&self) -> &HistoryTracker {
        &self.history
    }

    pub fn shuffle(&self) -> &ShuffleEngine {
        &self.shuffle
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    pub fn pagination(&self) -> &PaginationPrefetcher {
        &self.pagination
    }

    pub fn focus_state(&self) -> AudioFocusState {
        self.arbiter.state()
    }

    pub fn volume(&self) -> &OutputVolume {
        &self.volume
    }

    /// Track loaded into the output
    pub fn now_playing(&self) -> Option<&Arc<Track>> {
        self.now_playing.as_ref()
    }

    /// Token of the most recent load
    pub fn load_token(&self) -> LoadToken {
        self.load_token
    }

    /// Whether the controller is waiting on a page to continue playback
    pub fn is_awaiting_page(&self) -> bool {
        self.awaiting_page
    }

    /// Current session snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        let current_track = self.now_playing.as_deref().cloned();
        let position = if self.now_playing.is_some() && self.ready {
            self.output.position()
        } else {
            self.position
        };
        SessionSnapshot {
            starred: current_track.as_ref().is_some_and(Track::is_starred),
            duration_ms: self.duration_ms(),
            current_track,
            state: self.state,
            is_playing: self.state.is_active(),
            position_ms: millis(position),
            shuffle_enabled: self.shuffle.is_enabled(),
            repeat_mode: self.repeat_mode,
            volume: self.volume.level(),
        }
    }

    fn duration_ms(&self) -> u64 {
        if !self.ready {
            return self.now_playing.as_ref().map_or(0, |t| t.duration_ms());
        }
        self.output
            .duration()
            .map(millis)
            .or_else(|| self.now_playing.as_ref().map(|t| t.duration_ms()))
            .unwrap_or(0)
    }

    // ===== Dispatch =====

    fn handle_message(&mut self, message: ControlMessage) -> bool {
        match message {
            ControlMessage::Command(command) => self.handle_command(command),
            ControlMessage::Output(event) => self.handle_output_event(event),
            ControlMessage::Focus(signal) => self.handle_focus_signal(signal),
            ControlMessage::PageLoaded { ticket, result } => self.handle_page(&ticket, result),
            ControlMessage::Timer(tick) => self.handle_timer(tick),
            ControlMessage::Shutdown => {
                info!("Shutdown requested");
                self.shutdown();
                return false;
            }
        }
        self.flush();
        true
    }

    fn handle_command(&mut self, command: Command) {
        debug!(?command, "Command");
        match command {
            Command::Play(track) => {
                self.set_queue(QueueRequest::new(vec![track], 0, PlaybackContext::Single));
            }
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
            Command::Stop => self.stop(),
            Command::SkipNext => self.skip_next(),
            Command::SkipPrevious => self.skip_previous(),
            Command::SeekTo(position_ms) => self.seek_to(position_ms),
            Command::SetQueue(request) => self.set_queue(request),
            Command::Append(tracks) => {
                self.append(tracks);
                self.maybe_fetch_page();
            }
            Command::RemoveAt(index) => self.remove_at(index),
            Command::RemoveTrack(id) => self.remove_track(&id),
            Command::Move { from, to } => self.move_track(from, to),
            Command::SkipTo(index) => self.skip_to(index),
            Command::ToggleShuffle => self.toggle_shuffle(),
            Command::CycleRepeatMode => {
                self.repeat_mode = self.repeat_mode.cycle();
                info!(mode = ?self.repeat_mode, "Repeat mode changed");
                self.snapshot_dirty = true;
            }
            Command::ClearQueue => self.clear_queue(),
            Command::SetStarred { track_id, starred } => self.set_starred(&track_id, starred),
            Command::SetVolume(level) => {
                self.volume.set_level(level);
                self.apply_volume();
            }
            Command::ToggleMute => {
                self.volume.toggle_mute();
                self.apply_volume();
            }
            Command::ClearCache => {
                info!("Clearing prefetch cache");
                self.services.cache.clear_on_logout();
            }
        }
    }

    fn flush(&mut self) {
        if !self.arbiter.is_retrying() {
            self.focus_retry = None;
        }
        if std::mem::take(&mut self.queue_dirty) {
            let tracks = self.queue.tracks().iter().map(|t| (**t).clone()).collect();
            self.emit(PlaybackEvent::QueueChanged { tracks });
        }
        let focus = self.arbiter.state();
        if focus != self.reported_focus {
            self.reported_focus = focus;
            self.emit(PlaybackEvent::FocusChanged { state: focus });
            self.snapshot_dirty = true;
        }
        if std::mem::take(&mut self.snapshot_dirty) {
            self.emit(PlaybackEvent::Snapshot(self.snapshot()));
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }

    fn emit_error(&self, error: &PlaybackError) {
        self.emit(PlaybackEvent::Error {
            message: error.to_string(),
        });
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "Playback state changed");
            self.state = state;
            self.snapshot_dirty = true;
        }
    }

    // ===== Transport =====

    fn pause(&mut self) {
        // Also cancels a pending resume after focus loss
        self.arbiter.user_paused();
        if self.state.is_active() {
            self.pause_output();
        }
    }

    fn resume(&mut self) {
        if self.now_playing.is_none() {
            if self.queue.is_empty() {
                debug!("Resume with empty queue ignored");
                return;
            }
            if self.queue.current_index().is_none() {
                self.select_first();
            }
            self.load_current(true);
            self.maybe_fetch_page();
            return;
        }
        if self.state == PlaybackState::Paused {
            self.play_when_ready = true;
            if self.ready {
                self.start_output();
            } else {
                self.set_state(PlaybackState::Loading);
            }
        }
    }

    fn stop(&mut self) {
        info!("Playback stopped by user");
        self.awaiting_page = false;
        self.stop_output();
        self.focus_retry = None;
        self.arbiter.release(self.focus.as_mut());
    }

    fn skip_next(&mut self) {
        let autoplay = self.state != PlaybackState::Paused;
        self.advance(Direction::Forward, false, autoplay);
    }

    fn skip_previous(&mut self) {
        if self.now_playing.is_some() && self.ready {
            let position = self.output.position();
            if position > self.config.restart_threshold() {
                debug!(?position, "Restarting current track");
                self.restart_current();
                return;
            }
        }
        let autoplay = self.state != PlaybackState::Paused;
        if !self.advance(Direction::Backward, false, autoplay) && self.now_playing.is_some() {
            self.restart_current();
        }
    }

    fn restart_current(&mut self) {
        if let Err(e) = self.output.seek(Duration::ZERO) {
            warn!(error = %e, "Restart failed");
            self.emit_error(&e);
            return;
        }
        self.position = Duration::ZERO;
        self.snapshot_dirty = true;
    }

    fn seek_to(&mut self, position_ms: u64) {
        if self.now_playing.is_none() {
            warn!(position_ms, "{}", PlaybackError::NoTrackLoaded);
            return;
        }
        let mut position = Duration::from_millis(position_ms);
        let duration = self.duration_ms();
        if duration > 0 {
            position = position.min(Duration::from_millis(duration));
        }
        match self.output.seek(position) {
            Ok(()) => {
                self.position = position;
                self.snapshot_dirty = true;
            }
            Err(e) => {
                warn!(position_ms, error = %e, "Seek failed");
                self.emit_error(&e);
            }
        }
    }

    /// Resolve and load the next or previous track
    ///
    /// Returns whether a track resolved. With `skip_failed` set, repeat-one
    /// does not pin playback to the current (failing) track.
    fn advance(&mut self, direction: Direction, skip_failed: bool, autoplay: bool) -> bool {
        match self.resolve(direction, skip_failed) {
            Some(index) => {
                self.queue.select(index);
                self.load_current(autoplay);
                self.maybe_fetch_page();
                true
            }
            None if direction == Direction::Forward => {
                self.end_of_queue();
                false
            }
            None => false,
        }
    }

    fn resolve(&mut self, direction: Direction, skip_failed: bool) -> Option<usize> {
        let len = self.queue.len();
        if len == 0 {
            return None;
        }
        let Some(cursor) = self.queue.current_index() else {
            return (direction == Direction::Forward).then(|| self.select_first());
        };

        let mode = match self.repeat_mode {
            RepeatMode::One if skip_failed => RepeatMode::None,
            mode => mode,
        };
        // Never wrap while the collection still has unloaded pages
        let wrap = self.queue.context().allows_wrap() && !self.pagination.has_more();
        let policy = RepeatPolicy::new(mode).with_wrap(wrap);

        if self.shuffle.is_enabled() {
            match direction {
                Direction::Forward => self.shuffle.next(&policy),
                Direction::Backward => self.shuffle.previous(&policy),
            }
        } else {
            policy.resolve(direction, cursor, len)
        }
    }

    /// Point at the first track of the traversal order
    fn select_first(&mut self) -> usize {
        self.queue.select(0);
        self.shuffle.regenerate(Some(0), self.queue.len());
        0
    }

    fn end_of_queue(&mut self) {
        if self.pagination.has_more() {
            info!("End of loaded tracks, waiting for next page");
            self.awaiting_page = true;
            self.set_state(PlaybackState::Loading);
            if let Some(ticket) = self.pagination.force() {
                self.spawn_fetch(ticket);
            }
            return;
        }
        info!("End of queue");
        self.stop_output();
    }

    // ===== Output =====

    fn load_current(&mut self, autoplay: bool) {
        let Some(track) = self.queue.current().cloned() else {
            self.stop_output();
            return;
        };

        let previous = self.now_playing.replace(Arc::clone(&track));
        self.history.record(Arc::clone(&track));
        self.load_token = LoadToken(self.load_token.0 + 1);
        self.ready = false;
        self.play_when_ready = autoplay;
        self.position = Duration::ZERO;
        self.stop_sampler();

        info!(track_id = %track.id, title = %track.title, "Loading track");
        self.emit(PlaybackEvent::TrackChanged {
            track_id: track.id.to_string(),
            previous_track_id: previous.map(|t| t.id.to_string()),
        });

        let source = self.services.cache.source_for(&track.locator);
        self.set_state(if autoplay {
            PlaybackState::Loading
        } else {
            PlaybackState::Paused
        });
        self.snapshot_dirty = true;
        if self.open_source(source) {
            self.prefetch_upcoming();
        }
    }

    /// Hand `source` to the output under the current load token
    ///
    /// A synchronous rejection is queued as an `Error` event so the skip runs
    /// as its own message. Returns whether the output accepted the load.
    fn open_source(&mut self, source: StreamSource) -> bool {
        self.loaded_from_cache = source.is_cached();
        match self.output.load(self.load_token, &source) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "Output rejected load");
                let _ = self.tx.send(ControlMessage::Output(OutputEvent {
                    token: self.load_token,
                    kind: OutputEventKind::Error(e.to_string()),
                }));
                false
            }
        }
    }

    /// Reload the current track from the network after its cached head failed
    fn retry_from_network(&mut self, message: &str) {
        let Some(track) = self.now_playing.clone() else {
            return;
        };
        warn!(track_id = %track.id, error = message, "Cached stream head unusable, streaming instead");
        self.services.cache.evict(&track.locator);
        self.output.stop();
        self.load_token = LoadToken(self.load_token.0 + 1);
        self.ready = false;
        self.open_source(StreamSource::Network {
            locator: track.locator.clone(),
        });
    }

    fn start_output(&mut self) {
        if !self.arbiter.acquire(self.focus.as_mut()) {
            self.play_when_ready = false;
            self.set_state(PlaybackState::Paused);
            self.emit_error(&PlaybackError::FocusDenied);
            return;
        }
        if let Err(e) = self.output.play() {
            self.track_failed(&e.to_string());
            return;
        }
        self.apply_volume();
        self.set_state(PlaybackState::Playing);
        self.start_sampler();
    }

    fn pause_output(&mut self) {
        self.play_when_ready = false;
        if self.ready {
            self.position = self.output.position();
            if let Err(e) = self.output.pause() {
                warn!(error = %e, "Output refused to pause");
            }
        }
        self.stop_sampler();
        self.set_state(PlaybackState::Paused);
    }

    /// Stop the output and clear "now playing"; the queue pointer is kept
    fn stop_output(&mut self) {
        if self.now_playing.is_some() || self.state != PlaybackState::Stopped {
            self.output.stop();
        }
        self.now_playing = None;
        self.ready = false;
        self.play_when_ready = false;
        self.position = Duration::ZERO;
        self.stop_sampler();
        self.set_state(PlaybackState::Stopped);
        self.snapshot_dirty = true;
    }

    fn apply_volume(&mut self) {
        self.output.set_volume(self.volume.gain());
        self.snapshot_dirty = true;
    }

    fn handle_output_event(&mut self, event: OutputEvent) {
        if event.token != self.load_token || self.now_playing.is_none() {
            debug!(token = ?event.token, current = ?self.load_token, "Ignoring stale output event");
            return;
        }
        match event.kind {
            OutputEventKind::Ready => {
                if self.ready {
                    // Recovered from buffering
                    if self.state == PlaybackState::Buffering {
                        self.set_state(PlaybackState::Playing);
                    }
                    return;
                }
                self.ready = true;
                self.failure_streak = 0;
                self.snapshot_dirty = true;
                if self.play_when_ready {
                    self.start_output();
                } else {
                    self.set_state(PlaybackState::Paused);
                }
                self.prefetch_upcoming();
                self.maybe_fetch_page();
            }
            OutputEventKind::Buffering => {
                if self.state == PlaybackState::Playing {
                    self.set_state(PlaybackState::Buffering);
                }
            }
            OutputEventKind::Ended => {
                if let Some(track) = &self.now_playing {
                    debug!(track_id = %track.id, "Track finished");
                }
                self.advance(Direction::Forward, false, true);
            }
            OutputEventKind::Error(message) if self.loaded_from_cache && !self.ready => {
                self.retry_from_network(&message);
            }
            OutputEventKind::Error(message) => self.track_failed(&message),
        }
    }

    /// The current track cannot be played: report it and move on once
    fn track_failed(&mut self, message: &str) {
        let Some(track) = self.now_playing.clone() else {
            return;
        };
        warn!(track_id = %track.id, error = message, "Track failed");
        self.emit(PlaybackEvent::TrackFailed {
            track_id: track.id.to_string(),
            message: message.to_string(),
        });

        self.failure_streak += 1;
        if self.failure_streak >= self.queue.len().max(1) {
            warn!(failures = self.failure_streak, "Every queued track failed, stopping");
            self.failure_streak = 0;
            self.stop_output();
            return;
        }
        self.output.stop();
        self.ready = false;
        self.advance(Direction::Forward, true, true);
    }

    // ===== Queue =====

    fn set_queue(&mut self, request: QueueRequest) {
        let cursor = request.cursor();
        let QueueRequest {
            tracks,
            start_index,
            context,
            ..
        } = request;
        info!(tracks = tracks.len(), start_index, ?context, "Queue replaced");

        self.pagination.reset(cursor);
        self.services.cache.cancel_downloads();
        self.awaiting_page = false;
        self.failure_streak = 0;

        let tracks = tracks.into_iter().map(Arc::new).collect();
        self.queue.set(tracks, start_index, context);
        self.shuffle.regenerate(self.queue.current_index(), self.queue.len());
        self.queue_dirty = true;

        if self.queue.current().is_some() {
            self.load_current(true);
        } else {
            self.stop_output();
        }
        self.maybe_fetch_page();
    }

    fn append(&mut self, tracks: Vec<Track>) {
        if tracks.is_empty() {
            return;
        }
        let tracks = tracks.into_iter().map(Arc::new).collect();
        let added = self.queue.append(tracks);
        self.shuffle.on_append(added.len());
        self.queue_dirty = true;
        debug!(added = added.len(), len = self.queue.len(), "Tracks appended");
        self.prefetch_upcoming();
    }

    fn remove_at(&mut self, index: usize) {
        let Some(removal) = self.queue.remove_at(index) else {
            return;
        };
        debug!(index, track_id = %removal.track.id, "Track removed");
        self.after_removal(removal.current);
    }

    fn remove_track(&mut self, id: &TrackId) {
        let Some(removal) = self.queue.remove_track(id) else {
            debug!(track_id = %id, "Track not in queue");
            return;
        };
        debug!(track_id = %id, "Track removed");
        self.after_removal(removal.current);
    }

    fn after_removal(&mut self, change: CurrentChange) {
        self.queue_dirty = true;
        self.shuffle.regenerate(self.queue.current_index(), self.queue.len());
        match change {
            CurrentChange::Unchanged | CurrentChange::Shifted => {}
            CurrentChange::Replaced if self.state.is_active() => self.load_current(true),
            CurrentChange::Replaced | CurrentChange::Cleared => self.stop_output(),
        }
        self.maybe_fetch_page();
    }

    fn move_track(&mut self, from: usize, to: usize) {
        if self.queue.move_to(from, to) {
            self.shuffle.regenerate(self.queue.current_index(), self.queue.len());
            self.queue_dirty = true;
            self.maybe_fetch_page();
        }
    }

    fn skip_to(&mut self, index: usize) {
        if self.queue.is_empty() {
            debug!(index, "{}", PlaybackError::QueueEmpty);
            return;
        }
        if index >= self.queue.len() {
            warn!(index, len = self.queue.len(), "Skip target out of range, clamping");
        }
        let index = index.min(self.queue.len() - 1);
        self.queue.select(index);
        self.shuffle.point_at(index);
        self.load_current(true);
        self.maybe_fetch_page();
    }

    fn toggle_shuffle(&mut self) {
        if self.shuffle.is_enabled() {
            self.shuffle.disable();
            info!("Shuffle disabled");
        } else {
            let anchor = self.queue.current_index().unwrap_or(0);
            self.shuffle.enable(anchor, self.queue.len());
            info!(anchor, "Shuffle enabled");
        }
        self.snapshot_dirty = true;
        self.prefetch_upcoming();
    }

    fn clear_queue(&mut self) {
        info!("Queue cleared");
        self.pagination.reset(None);
        self.services.cache.cancel_downloads();
        self.awaiting_page = false;
        self.stop_output();
        self.queue.clear();
        self.shuffle.regenerate(None, 0);
        self.queue_dirty = true;
    }

    fn set_starred(&mut self, id: &TrackId, starred: bool) {
        let in_queue = self.queue.set_starred(id, starred);
        let mut found = in_queue;
        if let Some(track) = self.now_playing.as_ref().filter(|t| &t.id == id) {
            track.set_starred(starred);
            found = true;
        }
        if found {
            self.snapshot_dirty = true;
            self.queue_dirty |= in_queue;
        } else {
            debug!(track_id = %id, "Starred track not queued");
        }
    }

    // ===== Pagination =====

    fn maybe_fetch_page(&mut self) {
        if let Some(ticket) = self.pagination.evaluate(self.queue.remaining()) {
            self.spawn_fetch(ticket);
        }
    }

    fn spawn_fetch(&mut self, ticket: FetchTicket) {
        debug!(collection_id = %ticket.collection_id, page = ticket.page, "Fetching page");
        let catalog = Arc::clone(&self.services.catalog);
        let tx = self.tx.clone();
        let task_ticket = ticket.clone();
        let handle = tokio::spawn(async move {
            let result = catalog
                .fetch_page(&task_ticket.collection_id, task_ticket.page)
                .await;
            let _ = tx.send(ControlMessage::PageLoaded {
                ticket: task_ticket,
                result,
            });
        });
        self.pagination.attach(&ticket, handle.abort_handle());
    }

    fn handle_page(
        &mut self,
        ticket: &FetchTicket,
        result: std::result::Result<TrackPage, CoreError>,
    ) {
        match self.pagination.complete(ticket, result) {
            PageOutcome::Apply(tracks) => {
                info!(page = ticket.page, tracks = tracks.len(), "Page appended");
                self.append(tracks);
                if std::mem::take(&mut self.awaiting_page) {
                    let autoplay = self.state != PlaybackState::Paused;
                    self.advance(Direction::Forward, false, autoplay);
                } else {
                    self.maybe_fetch_page();
                }
            }
            PageOutcome::Failed => {
                if std::mem::take(&mut self.awaiting_page) {
                    warn!("Next page unavailable, stopping at end of queue");
                    self.stop_output();
                }
            }
            PageOutcome::Discarded => {}
        }
    }

    // ===== Prefetch =====

    fn prefetch_upcoming(&self) {
        let count = self.config.prefetch_ahead;
        if count == 0 {
            return;
        }
        let upcoming: Vec<usize> = if self.shuffle.is_enabled() {
            self.shuffle.upcoming(count)
        } else {
            let start = self.queue.current_index().map_or(0, |i| i + 1);
            (start..self.queue.len()).take(count).collect()
        };
        for index in upcoming {
            if let Some(track) = self.queue.get(index) {
                self.services.cache.prefetch(&track.locator);
            }
        }
    }

    // ===== Focus =====

    fn handle_focus_signal(&mut self, signal: FocusSignal) {
        debug!(?signal, state = ?self.arbiter.state(), "Focus signal");
        let actions = self.arbiter.on_signal(signal, self.state);
        self.apply_focus_actions(actions);
    }

    fn apply_focus_actions(&mut self, actions: Vec<FocusAction>) {
        for action in actions {
            match action {
                FocusAction::Pause => {
                    if self.state.is_active() {
                        self.pause_output();
                    }
                }
                FocusAction::Resume => {
                    if self.now_playing.is_some() && self.state == PlaybackState::Paused {
                        info!("Resuming after focus regained");
                        self.resume();
                    }
                }
                FocusAction::Duck => {
                    self.volume.duck();
                    self.apply_volume();
                }
                FocusAction::Unduck => {
                    self.volume.unduck();
                    self.apply_volume();
                }
                FocusAction::ScheduleRetry {
                    attempt,
                    delay,
                    generation,
                } => {
                    debug!(attempt, ?delay, "Scheduling focus retry");
                    self.focus_retry = Some(self.services.scheduler.schedule_once(
                        delay,
                        TimerTick::FocusRetry { generation },
                        &self.tx,
                    ));
                }
                FocusAction::StayPaused => {
                    self.focus_retry = None;
                    if self.state.is_active() {
                        self.pause_output();
                    }
                    warn!("Audio focus could not be reacquired, staying paused");
                    self.emit(PlaybackEvent::Error {
                        message: "Audio focus lost".to_string(),
                    });
                }
            }
        }
    }

    // ===== Timers =====

    fn handle_timer(&mut self, tick: TimerTick) {
        match tick {
            TimerTick::FocusRetry { generation } => {
                self.focus_retry = None;
                let actions = self.arbiter.on_retry_tick(generation, self.focus.as_mut());
                self.apply_focus_actions(actions);
            }
            TimerTick::SamplePosition { generation } => {
                if generation != self.sampler_generation || self.state != PlaybackState::Playing {
                    return;
                }
                self.position = self.output.position();
                self.emit(PlaybackEvent::PositionUpdate {
                    position_ms: millis(self.position),
                    duration_ms: self.duration_ms(),
                });
            }
        }
    }

    fn start_sampler(&mut self) {
        self.stop_sampler();
        self.sampler = Some(self.services.scheduler.schedule_repeating(
            self.config.position_sample_interval(),
            TimerTick::SamplePosition {
                generation: self.sampler_generation,
            },
            &self.tx,
        ));
    }

    fn stop_sampler(&mut self) {
        self.sampler = None;
        self.sampler_generation += 1;
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
