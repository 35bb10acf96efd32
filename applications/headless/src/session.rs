//! Playback session wiring
//!
//! Builds the explicit service context, starts the controller loop and
//! turns its events into terminal output.

use crate::config::HeadlessConfig;
use crate::error::{HeadlessError, Result};
use crate::simulated::{AlwaysGrantFocus, SimulatedOutput};
use cadenza_core::{Catalog, CollectionId, PlaybackContext, StreamFetcher};
use cadenza_playback::{
    ControllerHandle, PlaybackController, PlaybackEvent, PlaybackState, PlayerServices,
    QueueRequest, RepeatMode, StreamPrefetchCache, TokioScheduler,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::info;

/// Options for playing one collection
#[derive(Debug, Clone)]
pub struct PlayOptions {
    pub collection_id: CollectionId,
    pub name: String,
    pub start_index: usize,
    pub shuffle: bool,
    pub repeat: RepeatMode,
}

/// A running controller plus its event stream
pub struct Session {
    catalog: Arc<dyn Catalog>,
    handle: ControllerHandle,
    events: UnboundedReceiver<PlaybackEvent>,
    task: JoinHandle<()>,
}

impl Session {
    /// Start the controller loop on the current runtime
    pub fn start(
        config: &HeadlessConfig,
        catalog: Arc<dyn Catalog>,
        fetcher: Arc<dyn StreamFetcher>,
    ) -> Self {
        let services = PlayerServices {
            catalog: Arc::clone(&catalog),
            cache: StreamPrefetchCache::new(config.playback.cache.clone(), fetcher),
            scheduler: Arc::new(TokioScheduler),
        };
        let track_length = Duration::from_secs(config.output.track_secs);

        let (controller, events) = PlaybackController::new(
            config.playback.clone(),
            services,
            |sink| SimulatedOutput::new(sink, track_length),
            Box::new(AlwaysGrantFocus),
        );
        let handle = controller.handle();
        let task = tokio::spawn(controller.run());

        Self {
            catalog,
            handle,
            events,
            task,
        }
    }

    /// Command sender for the running controller
    pub fn handle(&self) -> &ControllerHandle {
        &self.handle
    }

    /// Fetch the first page of a collection and start playing it
    ///
    /// Returns the number of tracks on the first page.
    pub async fn play_collection(&self, options: PlayOptions) -> Result<usize> {
        let page = self.catalog.fetch_page(&options.collection_id, 0).await?;
        if page.tracks.is_empty() {
            return Err(HeadlessError::EmptyCollection(
                options.collection_id.to_string(),
            ));
        }
        let count = page.tracks.len();
        info!(
            collection_id = %options.collection_id,
            tracks = count,
            has_more = page.has_more,
            "Loaded first page"
        );

        let context = PlaybackContext::Playlist {
            collection_id: options.collection_id,
            name: options.name,
        };
        self.handle.set_queue(QueueRequest::from_first_page(
            page,
            options.start_index,
            context,
        ))?;
        if options.shuffle {
            self.handle.toggle_shuffle()?;
        }
        let mut mode = RepeatMode::None;
        while mode != options.repeat {
            self.handle.cycle_repeat_mode()?;
            mode = mode.cycle();
        }
        Ok(count)
    }

    /// Next controller event; `None` once the controller is gone
    pub async fn next_event(&mut self) -> Option<PlaybackEvent> {
        self.events.recv().await
    }

    /// Stop the controller and wait for its loop to finish
    pub async fn shutdown(self) -> Result<()> {
        // Already gone if the loop ended on its own
        let _ = self.handle.shutdown();
        self.task
            .await
            .map_err(|e| HeadlessError::Task(e.to_string()))
    }
}

/// Whether playback has run off the end of the queue
pub fn is_finished(event: &PlaybackEvent) -> bool {
    matches!(
        event,
        PlaybackEvent::Snapshot(snapshot)
            if snapshot.state == PlaybackState::Stopped && snapshot.current_track.is_none()
    )
}

/// One terminal line for an event, `None` for events not worth printing
pub fn describe(event: &PlaybackEvent) -> Option<String> {
    match event {
        PlaybackEvent::Snapshot(snapshot) => {
            let track = snapshot.current_track.as_ref()?;
            let artist = track.artist.as_deref().unwrap_or("Unknown artist");
            Some(format!(
                "[{:?}] {} - {} ({}s / {}s)",
                snapshot.state,
                artist,
                track.title,
                snapshot.position_ms / 1000,
                snapshot.duration_ms / 1000
            ))
        }
        PlaybackEvent::QueueChanged { tracks } => Some(format!("Queue: {} tracks", tracks.len())),
        PlaybackEvent::TrackChanged { track_id, .. } => Some(format!("Now playing {track_id}")),
        PlaybackEvent::TrackFailed { track_id, message } => {
            Some(format!("Skipped {track_id}: {message}"))
        }
        PlaybackEvent::PositionUpdate { .. } => None,
        PlaybackEvent::FocusChanged { state } => Some(format!("Audio focus: {state:?}")),
        PlaybackEvent::Error { message } => Some(format!("Error: {message}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadenza_playback::SessionSnapshot;

    fn snapshot(state: PlaybackState, track: Option<cadenza_core::Track>) -> PlaybackEvent {
        PlaybackEvent::Snapshot(SessionSnapshot {
            current_track: track,
            state,
            is_playing: state.is_active(),
            position_ms: 61_000,
            duration_ms: 180_000,
            shuffle_enabled: false,
            repeat_mode: RepeatMode::None,
            starred: false,
            volume: 100,
        })
    }

    #[test]
    fn test_finished_only_when_stopped_without_track() {
        let track = cadenza_core::Track::new(cadenza_core::TrackId::new("t1"), "loc", "Song");

        assert!(is_finished(&snapshot(PlaybackState::Stopped, None)));
        assert!(!is_finished(&snapshot(PlaybackState::Stopped, Some(track))));
        assert!(!is_finished(&snapshot(PlaybackState::Loading, None)));
    }

    #[test]
    fn test_describe_snapshot_and_skips_positions() {
        let track = cadenza_core::Track::new(cadenza_core::TrackId::new("t1"), "loc", "Song")
            .with_artist("Band");

        let line = describe(&snapshot(PlaybackState::Playing, Some(track))).unwrap();
        assert_eq!(line, "[Playing] Band - Song (61s / 180s)");

        let position = PlaybackEvent::PositionUpdate {
            position_ms: 1,
            duration_ms: 2,
        };
        assert!(describe(&position).is_none());
        assert!(describe(&snapshot(PlaybackState::Stopped, None)).is_none());
    }
}
