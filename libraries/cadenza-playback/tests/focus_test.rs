//! Audio focus integration tests
//!
//! OS focus signals delivered through the controller handle, with the
//! reacquisition ladder driven by `ManualScheduler`.

mod common;

use cadenza_core::{CollectionId, PlaybackContext};
use cadenza_playback::{
    AudioFocusState, Command, FocusSignal, PlaybackEvent, PlaybackState, QueueRequest,
};
use common::{tracks, Harness};
use std::time::Duration;

// ===== Test Helpers =====

fn playing(ids: &[&str]) -> Harness {
    let mut h = Harness::new();
    h.send(Command::SetQueue(QueueRequest::new(
        tracks(ids),
        0,
        PlaybackContext::Playlist {
            collection_id: CollectionId::new("pl-focus"),
            name: "Focus".to_string(),
        },
    )));
    assert_eq!(h.controller.state(), PlaybackState::Playing);
    h
}

fn signal(h: &mut Harness, signal: FocusSignal) {
    h.controller.handle().focus_changed(signal).unwrap();
    h.pump();
}

fn fire_retry(h: &mut Harness) -> Option<Duration> {
    let fired = h.scheduler.fire_next()?;
    h.pump();
    Some(fired.delay)
}

// ===== Transient Loss =====

#[tokio::test]
async fn test_transient_loss_pauses_and_schedules_retry() {
    let mut h = playing(&["a", "b"]);

    signal(&mut h, FocusSignal::LossTransient);

    assert_eq!(h.controller.state(), PlaybackState::Paused);
    assert_eq!(h.controller.focus_state(), AudioFocusState::LostTransient);
    assert!(!h.output_playing());

    let pending = h.scheduler.pending_once();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].delay, Duration::from_millis(100));
}

#[tokio::test]
async fn test_retry_success_resumes_loaded_track() {
    let mut h = playing(&["a", "b"]);
    signal(&mut h, FocusSignal::LossTransient);
    h.focus.lock().unwrap().answers.push_back(false);

    assert_eq!(fire_retry(&mut h), Some(Duration::from_millis(100)));
    assert_eq!(h.controller.state(), PlaybackState::Paused);

    assert_eq!(fire_retry(&mut h), Some(Duration::from_millis(250)));
    assert_eq!(h.controller.focus_state(), AudioFocusState::Granted);
    assert_eq!(h.controller.state(), PlaybackState::Playing);
    assert!(h.output_playing());
    assert_eq!(h.current_id().as_deref(), Some("a"));
    assert!(h.scheduler.pending_once().is_empty());
}

#[tokio::test]
async fn test_os_regrant_cancels_ladder() {
    let mut h = playing(&["a"]);
    signal(&mut h, FocusSignal::LossTransient);

    signal(&mut h, FocusSignal::Gained);

    assert_eq!(h.controller.state(), PlaybackState::Playing);
    assert!(h.scheduler.pending_once().is_empty());
}

#[tokio::test]
async fn test_user_pause_during_loss_is_respected() {
    let mut h = playing(&["a"]);
    signal(&mut h, FocusSignal::LossTransient);

    h.send(Command::Pause);
    signal(&mut h, FocusSignal::Gained);

    assert_eq!(h.controller.focus_state(), AudioFocusState::Granted);
    assert_eq!(h.controller.state(), PlaybackState::Paused);
    assert!(!h.output_playing());
}

#[tokio::test]
async fn test_user_resume_during_loss_reacquires() {
    let mut h = playing(&["a"]);
    signal(&mut h, FocusSignal::LossTransient);

    h.send(Command::Resume);

    assert_eq!(h.controller.focus_state(), AudioFocusState::Granted);
    assert_eq!(h.controller.state(), PlaybackState::Playing);
    assert!(h.scheduler.pending_once().is_empty());
}

// ===== Permanent Loss =====

#[tokio::test]
async fn test_permanent_loss_retries_are_bounded() {
    let mut h = playing(&["a", "b"]);
    h.focus.lock().unwrap().default = false;

    signal(&mut h, FocusSignal::Loss);

    let mut delays = Vec::new();
    while let Some(delay) = fire_retry(&mut h) {
        delays.push(delay);
        assert!(delays.len() <= 5, "ladder did not terminate");
    }

    assert_eq!(delays.len(), 5);
    assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(h.controller.state(), PlaybackState::Paused);
    assert_eq!(h.controller.focus_state(), AudioFocusState::LostPermanent);
    assert!(!h.output_playing());
    // Initial grant plus five reacquisition attempts
    assert_eq!(h.focus.lock().unwrap().requests, 6);

    let events = h.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        PlaybackEvent::Error { message } if message.contains("focus")
    )));
}

#[tokio::test]
async fn test_permanent_loss_while_paused_does_not_retry() {
    let mut h = playing(&["a"]);
    h.send(Command::Pause);

    signal(&mut h, FocusSignal::Loss);

    assert_eq!(h.controller.focus_state(), AudioFocusState::LostPermanent);
    assert!(h.scheduler.pending_once().is_empty());
}

#[tokio::test]
async fn test_play_after_exhaustion_requests_again() {
    let mut h = playing(&["a"]);
    h.focus.lock().unwrap().default = false;
    signal(&mut h, FocusSignal::Loss);
    while fire_retry(&mut h).is_some() {}

    h.focus.lock().unwrap().default = true;
    h.send(Command::Resume);

    assert_eq!(h.controller.state(), PlaybackState::Playing);
    assert_eq!(h.controller.focus_state(), AudioFocusState::Granted);
}

// ===== Ducking =====

#[tokio::test]
async fn test_duck_lowers_volume_without_pausing() {
    let mut h = playing(&["a"]);

    signal(&mut h, FocusSignal::LossTransientCanDuck);

    assert_eq!(h.controller.state(), PlaybackState::Playing);
    assert_eq!(h.controller.focus_state(), AudioFocusState::DuckedByOther);
    let ducked = h.output.lock().unwrap().last_volume().unwrap();
    assert!(ducked < 0.01);

    signal(&mut h, FocusSignal::Gained);

    assert_eq!(h.controller.focus_state(), AudioFocusState::Granted);
    let restored = h.output.lock().unwrap().last_volume().unwrap();
    assert!((restored - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_loss_while_ducked_restores_level_and_pauses() {
    let mut h = playing(&["a"]);
    signal(&mut h, FocusSignal::LossTransientCanDuck);

    signal(&mut h, FocusSignal::LossTransient);

    assert_eq!(h.controller.state(), PlaybackState::Paused);
    assert!(!h.controller.volume().is_ducked());
    assert!(!h.output_playing());
}

// ===== User Stop =====

#[tokio::test]
async fn test_stop_cancels_retry_ladder() {
    let mut h = playing(&["a"]);
    signal(&mut h, FocusSignal::LossTransient);
    assert_eq!(h.scheduler.pending_once().len(), 1);

    h.send(Command::Stop);

    assert!(h.scheduler.pending_once().is_empty());
    assert_eq!(h.controller.focus_state(), AudioFocusState::None);
    let requests = h.focus.lock().unwrap().requests;
    assert!(fire_retry(&mut h).is_none());
    assert_eq!(h.focus.lock().unwrap().requests, requests);
}

#[tokio::test]
async fn test_focus_changes_are_reported() {
    let mut h = playing(&["a"]);
    h.drain_events();

    signal(&mut h, FocusSignal::LossTransient);

    let events = h.drain_events();
    assert!(events.contains(&PlaybackEvent::FocusChanged {
        state: AudioFocusState::LostTransient
    }));
}
