//! Shared fakes for controller integration tests
//!
//! Output, focus, catalog and stream fetcher are in-memory; timers go
//! through `ManualScheduler` so retry ladders run without sleeping.

#![allow(dead_code)]

use async_trait::async_trait;
use cadenza_core::{Catalog, CollectionId, CoreError, StreamFetcher, Track, TrackId, TrackPage};
use cadenza_playback::{
    AudioFocusPlatform, LoadToken, ManualScheduler, OutputEventKind, OutputResource, OutputSink,
    PlaybackConfig, PlaybackController, PlaybackEvent, PlayerServices, StreamPrefetchCache,
    StreamSource,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Notify;

// ===== Tracks =====

pub fn track(id: &str) -> Track {
    Track::new(
        TrackId::new(id),
        format!("https://cdn.test/{id}.mp3"),
        format!("Track {id}"),
    )
    .with_artist("Test Artist")
    .with_duration(Duration::from_secs(180))
}

pub fn tracks(ids: &[&str]) -> Vec<Track> {
    ids.iter().map(|id| track(id)).collect()
}

/// Tracks `prefix-0 .. prefix-(count-1)`
pub fn numbered(prefix: &str, count: usize) -> Vec<Track> {
    (0..count).map(|i| track(&format!("{prefix}-{i}"))).collect()
}

// ===== Output =====

#[derive(Debug, Clone, PartialEq)]
pub enum OutputCall {
    Load { token: LoadToken, source: StreamSource },
    Play,
    Pause,
    Stop,
    Seek(Duration),
    Volume(f32),
}

#[derive(Debug, Default)]
pub struct OutputLog {
    pub calls: Vec<OutputCall>,
    pub position: Duration,
    pub playing: bool,
    /// Locators whose load reports an error instead of `Ready`
    pub broken: Vec<String>,
    /// Report `Ready` right after `load`
    pub manual_ready: bool,
    /// Fail every `load` synchronously
    pub reject_loads: bool,
}

impl OutputLog {
    pub fn loads(&self) -> Vec<StreamSource> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                OutputCall::Load { source, .. } => Some(source.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_volume(&self) -> Option<f32> {
        self.calls.iter().rev().find_map(|c| match c {
            OutputCall::Volume(v) => Some(*v),
            _ => None,
        })
    }
}

pub struct FakeOutput {
    log: Arc<Mutex<OutputLog>>,
    sink: OutputSink,
}

impl OutputResource for FakeOutput {
    fn load(&mut self, token: LoadToken, source: &StreamSource) -> cadenza_playback::Result<()> {
        let mut log = self.log.lock().unwrap();
        log.calls.push(OutputCall::Load {
            token,
            source: source.clone(),
        });
        log.position = Duration::ZERO;
        log.playing = false;
        if log.reject_loads {
            return Err(cadenza_playback::PlaybackError::Output(
                "unsupported stream".to_string(),
            ));
        }
        let unreadable = match source {
            StreamSource::Cached { path, .. } => !path.is_file(),
            StreamSource::Network { .. } => false,
        };
        if unreadable {
            self.sink
                .emit(token, OutputEventKind::Error("cached head unreadable".to_string()));
        } else if log.broken.iter().any(|b| b == source.locator()) {
            self.sink
                .emit(token, OutputEventKind::Error("stream unreachable".to_string()));
        } else if !log.manual_ready {
            self.sink.emit(token, OutputEventKind::Ready);
        }
        Ok(())
    }

    fn play(&mut self) -> cadenza_playback::Result<()> {
        let mut log = self.log.lock().unwrap();
        log.calls.push(OutputCall::Play);
        log.playing = true;
        Ok(())
    }

    fn pause(&mut self) -> cadenza_playback::Result<()> {
        let mut log = self.log.lock().unwrap();
        log.calls.push(OutputCall::Pause);
        log.playing = false;
        Ok(())
    }

    fn stop(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.calls.push(OutputCall::Stop);
        log.playing = false;
    }

    fn seek(&mut self, position: Duration) -> cadenza_playback::Result<()> {
        let mut log = self.log.lock().unwrap();
        log.calls.push(OutputCall::Seek(position));
        log.position = position;
        Ok(())
    }

    fn set_volume(&mut self, gain: f32) {
        self.log.lock().unwrap().calls.push(OutputCall::Volume(gain));
    }

    fn position(&self) -> Duration {
        self.log.lock().unwrap().position
    }

    fn duration(&self) -> Option<Duration> {
        Some(Duration::from_secs(180))
    }
}

// ===== Focus =====

#[derive(Debug)]
pub struct FocusScript {
    /// Answers for the next requests; `default` once exhausted
    pub answers: VecDeque<bool>,
    pub default: bool,
    pub requests: usize,
    pub abandoned: usize,
}

impl Default for FocusScript {
    fn default() -> Self {
        Self {
            answers: VecDeque::new(),
            default: true,
            requests: 0,
            abandoned: 0,
        }
    }
}

pub struct FakeFocus(Arc<Mutex<FocusScript>>);

impl AudioFocusPlatform for FakeFocus {
    fn request_focus(&mut self) -> bool {
        let mut script = self.0.lock().unwrap();
        script.requests += 1;
        let default = script.default;
        script.answers.pop_front().unwrap_or(default)
    }

    fn abandon_focus(&mut self) {
        self.0.lock().unwrap().abandoned += 1;
    }
}

// ===== Catalog =====

/// Catalog serving `pages_per_collection` pages of `page_size` tracks
pub struct FakeCatalog {
    pub page_size: usize,
    pub total_pages: u32,
    pub calls: AtomicUsize,
    /// Fail this many calls before succeeding
    pub failures: AtomicUsize,
    /// When set, each fetch waits for a permit
    pub gate: Option<Arc<Notify>>,
    pub requested: Mutex<Vec<(String, u32)>>,
}

impl FakeCatalog {
    pub fn new(page_size: usize, total_pages: u32) -> Self {
        Self {
            page_size,
            total_pages,
            calls: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
            gate: None,
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn failing(self, count: usize) -> Self {
        self.failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Page as the server would return it
    pub fn page(&self, collection_id: &CollectionId, page: u32) -> TrackPage {
        let tracks = numbered(&format!("{collection_id}-p{page}"), self.page_size);
        TrackPage {
            tracks,
            has_more: page + 1 < self.total_pages,
            next_page: page + 1,
        }
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn fetch_page(&self, collection_id: &CollectionId, page: u32) -> cadenza_core::Result<TrackPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested
            .lock()
            .unwrap()
            .push((collection_id.to_string(), page));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(CoreError::network("connection reset"));
        }
        Ok(self.page(collection_id, page))
    }
}

// ===== Stream fetcher =====

#[derive(Default)]
pub struct FakeFetcher {
    pub requested: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl StreamFetcher for FakeFetcher {
    async fn fetch_head(&self, locator: &str, max_bytes: u64) -> cadenza_core::Result<Vec<u8>> {
        self.requested.lock().unwrap().push(locator.to_string());
        Ok(vec![1u8; usize::try_from(max_bytes.min(256)).unwrap()])
    }
}

// ===== Harness =====

pub struct Harness {
    pub controller: PlaybackController,
    pub events: UnboundedReceiver<PlaybackEvent>,
    pub output: Arc<Mutex<OutputLog>>,
    pub focus: Arc<Mutex<FocusScript>>,
    pub catalog: Arc<FakeCatalog>,
    pub fetcher: Arc<FakeFetcher>,
    pub scheduler: Arc<ManualScheduler>,
    pub cache: StreamPrefetchCache,
    pub cache_dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(PlaybackConfig::default(), FakeCatalog::new(5, 3))
    }

    pub fn with_config(config: PlaybackConfig) -> Self {
        Self::build(config, FakeCatalog::new(5, 3))
    }

    pub fn with_catalog(catalog: FakeCatalog) -> Self {
        Self::build(PlaybackConfig::default(), catalog)
    }

    pub fn build(mut config: PlaybackConfig, catalog: FakeCatalog) -> Self {
        let cache_dir = tempfile::tempdir().unwrap();
        config.cache.directory = cache_dir.path().to_path_buf();

        let output = Arc::new(Mutex::new(OutputLog::default()));
        let focus = Arc::new(Mutex::new(FocusScript::default()));
        let catalog = Arc::new(catalog);
        let fetcher = Arc::new(FakeFetcher::default());
        let scheduler = Arc::new(ManualScheduler::new());
        let cache = StreamPrefetchCache::new(config.cache.clone(), fetcher.clone());

        let services = PlayerServices {
            catalog: catalog.clone(),
            cache: cache.clone(),
            scheduler: scheduler.clone(),
        };
        let output_log = Arc::clone(&output);
        let (controller, events) = PlaybackController::new(
            config,
            services,
            move |sink| FakeOutput {
                log: output_log,
                sink,
            },
            Box::new(FakeFocus(Arc::clone(&focus))),
        );

        Self {
            controller: controller.with_shuffle_seed(42),
            events,
            output,
            focus,
            catalog,
            fetcher,
            scheduler,
            cache,
            cache_dir,
        }
    }

    /// Apply a command and everything it queued
    pub fn send(&mut self, command: cadenza_playback::Command) {
        self.controller.apply(command);
        self.pump();
    }

    /// Apply queued messages until the channel is empty
    pub fn pump(&mut self) {
        while self.controller.process_pending() > 0 {}
    }

    /// Let background tasks run, then apply what they delivered
    pub async fn settle(&mut self) {
        for _ in 0..20 {
            tokio::task::yield_now().await;
            self.pump();
        }
    }

    /// Report an output event for the current load
    pub fn output_event(&mut self, kind: OutputEventKind) {
        let token = self.controller.load_token();
        self.controller.handle().output_sink().emit(token, kind);
        self.pump();
    }

    pub fn set_position(&self, position: Duration) {
        self.output.lock().unwrap().position = position;
    }

    pub fn current_id(&self) -> Option<String> {
        self.controller.now_playing().map(|t| t.id.to_string())
    }

    pub fn queue_ids(&self) -> Vec<String> {
        self.controller
            .queue()
            .tracks()
            .iter()
            .map(|t| t.id.to_string())
            .collect()
    }

    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn output_playing(&self) -> bool {
        self.output.lock().unwrap().playing
    }
}

/// Map of track id to how often it appears in `events` as `TrackChanged`
pub fn track_changes(events: &[PlaybackEvent]) -> HashMap<String, usize> {
    let mut changes = HashMap::new();
    for event in events {
        if let PlaybackEvent::TrackChanged { track_id, .. } = event {
            *changes.entry(track_id.clone()).or_insert(0) += 1;
        }
    }
    changes
}
