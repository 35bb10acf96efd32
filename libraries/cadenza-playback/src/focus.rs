//! Audio focus arbitration
//!
//! `AudioResourceArbiter` is a pure state machine over the OS's exclusive
//! audio-output grant. It never touches the output resource itself: every
//! transition returns a list of `FocusAction`s for the controller to apply,
//! and reacquisition retries are requested as `ScheduleRetry` actions that
//! come back later as ticks tagged with a generation.
//!
//! ```text
//!            acquire ok                 LossTransientCanDuck
//!   None ──────────────▶ Granted ◀──────────────────────▶ DuckedByOther
//!    ▲                    │   ▲  Gained
//!    │ release            │   │ (retry ok)
//!    │                    ▼   │
//!    └──────────── LostTransient ──(ladder exhausted)──▶ LostPermanent
//! ```

use crate::types::PlaybackState;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where the grant currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AudioFocusState {
    /// Not requested, or released by the user
    #[default]
    None,
    /// Exclusive output granted
    Granted,
    /// Another app is talking over us; output is lowered
    DuckedByOther,
    /// Temporarily claimed by someone else; reacquisition in progress
    LostTransient,
    /// Claimed for good, or reacquisition gave up
    LostPermanent,
}

impl AudioFocusState {
    /// Whether the output may render in this state
    pub fn allows_output(self) -> bool {
        matches!(self, Self::Granted | Self::DuckedByOther)
    }
}

/// Push notification from the OS focus service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FocusSignal {
    /// Focus (re)granted or a ducking claim ended
    Gained,
    /// Someone claimed the output for a short while
    LossTransient,
    /// Someone claimed the output but we may keep playing quietly
    LossTransientCanDuck,
    /// Someone took the output without transience
    Loss,
}

/// What the controller has to do after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusAction {
    /// Pause the output, keep the track loaded
    Pause,
    /// Restart the output where it was paused
    Resume,
    /// Lower the output level
    Duck,
    /// Restore the output level
    Unduck,
    /// Ask for a `FocusRetry` tick after `delay`
    ScheduleRetry {
        /// 1-based attempt number this tick will run
        attempt: usize,
        /// Delay before the attempt
        delay: Duration,
        /// Ladder generation the tick belongs to
        generation: u64,
    },
    /// Retries are exhausted; stay paused until the user acts
    StayPaused,
}

/// OS-side focus service
///
/// Requests are synchronous; later changes arrive as `FocusSignal`s through
/// `ControllerHandle::focus_changed`.
pub trait AudioFocusPlatform: Send {
    /// Ask for exclusive output; `true` when granted
    fn request_focus(&mut self) -> bool;

    /// Give the grant back
    fn abandon_focus(&mut self);
}

/// Focus state machine with a bounded reacquisition ladder
#[derive(Debug)]
pub struct AudioResourceArbiter {
    state: AudioFocusState,
    retry_delays: Vec<Duration>,
    /// Attempt the pending retry tick will run (0 when no ladder)
    attempt: usize,
    /// Bumped whenever a ladder starts or is cancelled
    generation: u64,
    resume_on_regain: bool,
}

impl AudioResourceArbiter {
    /// Create an arbiter whose ladder waits `retry_delays` between attempts
    ///
    /// The number of delays is the attempt budget.
    pub fn new(retry_delays: Vec<Duration>) -> Self {
        Self {
            state: AudioFocusState::None,
            retry_delays,
            attempt: 0,
            generation: 0,
            resume_on_regain: false,
        }
    }

    pub fn state(&self) -> AudioFocusState {
        self.state
    }

    /// Whether a reacquisition ladder is running
    pub fn is_retrying(&self) -> bool {
        self.attempt > 0
    }

    /// Generation of the current ladder
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether regaining focus will resume playback
    pub fn resume_on_regain(&self) -> bool {
        self.resume_on_regain
    }

    /// Make sure we hold the grant before the output starts
    ///
    /// Cancels any running ladder when the request succeeds. Returns `false`
    /// if the platform refused, leaving the state untouched.
    pub fn acquire(&mut self, platform: &mut dyn AudioFocusPlatform) -> bool {
        if self.state.allows_output() {
            return true;
        }
        if !platform.request_focus() {
            warn!(state = ?self.state, "Audio focus request denied");
            return false;
        }
        info!(from = ?self.state, "Audio focus granted");
        self.cancel_ladder();
        self.state = AudioFocusState::Granted;
        self.resume_on_regain = false;
        true
    }

    /// Give focus back after an explicit user stop
    ///
    /// Stops any ladder; pending ticks become stale.
    pub fn release(&mut self, platform: &mut dyn AudioFocusPlatform) {
        if self.state != AudioFocusState::None {
            platform.abandon_focus();
            debug!(from = ?self.state, "Audio focus released");
        }
        self.cancel_ladder();
        self.state = AudioFocusState::None;
        self.resume_on_regain = false;
    }

    /// The user paused; regaining focus must not restart playback
    pub fn user_paused(&mut self) {
        self.resume_on_regain = false;
    }

    /// Apply an OS focus signal
    ///
    /// `playback` is the controller state at the moment the signal arrived.
    pub fn on_signal(&mut self, signal: FocusSignal, playback: PlaybackState) -> Vec<FocusAction> {
        let playing = playback.is_active();
        match (signal, self.state) {
            (FocusSignal::Gained, AudioFocusState::DuckedByOther) => {
                self.state = AudioFocusState::Granted;
                vec![FocusAction::Unduck]
            }
            (
                FocusSignal::Gained,
                AudioFocusState::LostTransient | AudioFocusState::LostPermanent,
            ) => self.regained(),
            (FocusSignal::Gained, _) => {
                self.state = AudioFocusState::Granted;
                Vec::new()
            }

            (FocusSignal::LossTransientCanDuck, AudioFocusState::Granted) => {
                self.state = AudioFocusState::DuckedByOther;
                vec![FocusAction::Duck]
            }

            (
                FocusSignal::LossTransient,
                state @ (AudioFocusState::Granted | AudioFocusState::DuckedByOther),
            ) => {
                self.state = AudioFocusState::LostTransient;
                self.resume_on_regain = playing;
                let mut actions = Self::leave_output(state);
                actions.extend(self.start_ladder());
                actions
            }

            (
                FocusSignal::Loss,
                state @ (AudioFocusState::Granted | AudioFocusState::DuckedByOther),
            ) => {
                self.state = AudioFocusState::LostPermanent;
                self.resume_on_regain = playing;
                let mut actions = Self::leave_output(state);
                if playing {
                    actions.extend(self.start_ladder());
                } else {
                    debug!("Focus lost while idle, not retrying");
                }
                actions
            }
            (FocusSignal::Loss, AudioFocusState::LostTransient) => {
                // Ladder, if any, keeps running
                self.state = AudioFocusState::LostPermanent;
                Vec::new()
            }

            (signal, state) => {
                debug!(?signal, ?state, "Focus signal ignored");
                Vec::new()
            }
        }
    }

    /// Run one reacquisition attempt for a `FocusRetry` tick
    ///
    /// Ticks from a cancelled or finished ladder are ignored.
    pub fn on_retry_tick(
        &mut self,
        generation: u64,
        platform: &mut dyn AudioFocusPlatform,
    ) -> Vec<FocusAction> {
        if generation != self.generation || self.attempt == 0 {
            debug!(generation, current = self.generation, "Stale focus retry ignored");
            return Vec::new();
        }

        if platform.request_focus() {
            info!(attempt = self.attempt, "Audio focus reacquired");
            return self.regained();
        }

        if self.attempt < self.retry_delays.len() {
            self.attempt += 1;
            let delay = self.retry_delays[self.attempt - 1];
            debug!(attempt = self.attempt, ?delay, "Focus retry scheduled");
            return vec![FocusAction::ScheduleRetry {
                attempt: self.attempt,
                delay,
                generation: self.generation,
            }];
        }

        warn!(attempts = self.retry_delays.len(), "Audio focus retries exhausted");
        self.exhausted()
    }

    fn regained(&mut self) -> Vec<FocusAction> {
        self.cancel_ladder();
        self.state = AudioFocusState::Granted;
        let resume = std::mem::take(&mut self.resume_on_regain);
        if resume {
            vec![FocusAction::Resume]
        } else {
            Vec::new()
        }
    }

    fn leave_output(from: AudioFocusState) -> Vec<FocusAction> {
        if from == AudioFocusState::DuckedByOther {
            vec![FocusAction::Unduck, FocusAction::Pause]
        } else {
            vec![FocusAction::Pause]
        }
    }

    fn start_ladder(&mut self) -> Vec<FocusAction> {
        self.generation += 1;
        match self.retry_delays.first() {
            Some(&delay) => {
                self.attempt = 1;
                debug!(attempt = 1, ?delay, "Focus retry scheduled");
                vec![FocusAction::ScheduleRetry {
                    attempt: 1,
                    delay,
                    generation: self.generation,
                }]
            }
            None => self.exhausted(),
        }
    }

    fn exhausted(&mut self) -> Vec<FocusAction> {
        self.cancel_ladder();
        self.state = AudioFocusState::LostPermanent;
        self.resume_on_regain = false;
        vec![FocusAction::StayPaused]
    }

    fn cancel_ladder(&mut self) {
        if self.attempt > 0 {
            self.generation += 1;
        }
        self.attempt = 0;
    }
}
