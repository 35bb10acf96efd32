//! Timer scheduling
//!
//! Retry ladders and position sampling never sleep inline; they ask a
//! `Scheduler` to deliver a `TimerTick` into the controller's message queue
//! later. Production code uses tokio timers, tests use `ManualScheduler` and
//! fire ticks by hand.

use crate::message::{ControlMessage, TimerTick};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;

/// Handle to a scheduled tick; cancelling or dropping it stops delivery
#[derive(Debug)]
pub struct TaskGuard(GuardInner);

#[derive(Debug)]
enum GuardInner {
    Task(AbortHandle),
    Flag(Arc<AtomicBool>),
    Done,
}

impl TaskGuard {
    /// Guard over a spawned tokio task
    pub fn from_task(handle: AbortHandle) -> Self {
        Self(GuardInner::Task(handle))
    }

    /// Guard over a cancellation flag
    pub fn from_flag(flag: Arc<AtomicBool>) -> Self {
        Self(GuardInner::Flag(flag))
    }

    /// Stop delivery; idempotent
    pub fn cancel(&mut self) {
        match std::mem::replace(&mut self.0, GuardInner::Done) {
            GuardInner::Task(handle) => handle.abort(),
            GuardInner::Flag(flag) => flag.store(true, Ordering::SeqCst),
            GuardInner::Done => {}
        }
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Source of delayed and periodic ticks
pub trait Scheduler: Send + Sync {
    /// Deliver `tick` once after `delay`
    fn schedule_once(
        &self,
        delay: Duration,
        tick: TimerTick,
        tx: &UnboundedSender<ControlMessage>,
    ) -> TaskGuard;

    /// Deliver `tick` every `period`, first delivery after one period
    fn schedule_repeating(
        &self,
        period: Duration,
        tick: TimerTick,
        tx: &UnboundedSender<ControlMessage>,
    ) -> TaskGuard;
}

/// Scheduler backed by the tokio timer wheel
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule_once(
        &self,
        delay: Duration,
        tick: TimerTick,
        tx: &UnboundedSender<ControlMessage>,
    ) -> TaskGuard {
        let tx = tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(ControlMessage::Timer(tick));
        });
        TaskGuard::from_task(handle.abort_handle())
    }

    fn schedule_repeating(
        &self,
        period: Duration,
        tick: TimerTick,
        tx: &UnboundedSender<ControlMessage>,
    ) -> TaskGuard {
        let tx = tx.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // First tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                if tx.send(ControlMessage::Timer(tick)).is_err() {
                    break;
                }
            }
        });
        TaskGuard::from_task(handle.abort_handle())
    }
}

/// A tick recorded by `ManualScheduler`
#[derive(Debug, Clone)]
pub struct ScheduledTick {
    /// Requested delay or period
    pub delay: Duration,
    /// Tick to deliver
    pub tick: TimerTick,
    /// Whether this is a periodic tick
    pub repeating: bool,
    cancelled: Arc<AtomicBool>,
    tx: UnboundedSender<ControlMessage>,
}

impl ScheduledTick {
    /// Whether the owner cancelled this tick
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Scheduler that records requests and fires them on demand
///
/// Lets retry ladders be exercised without real timers.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    entries: Mutex<Vec<ScheduledTick>>,
}

impl ManualScheduler {
    /// Create an empty scheduler
    pub fn new() -> Self {
        Self::default()
    }

    fn record(
        &self,
        delay: Duration,
        tick: TimerTick,
        repeating: bool,
        tx: &UnboundedSender<ControlMessage>,
    ) -> TaskGuard {
        let cancelled = Arc::new(AtomicBool::new(false));
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(ScheduledTick {
                delay,
                tick,
                repeating,
                cancelled: Arc::clone(&cancelled),
                tx: tx.clone(),
            });
        }
        TaskGuard::from_flag(cancelled)
    }

    /// Every request seen so far, in order
    pub fn history(&self) -> Vec<ScheduledTick> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// One-shot ticks that are still pending
    pub fn pending_once(&self) -> Vec<ScheduledTick> {
        self.history()
            .into_iter()
            .filter(|e| !e.repeating && !e.is_cancelled())
            .collect()
    }

    /// Periodic ticks that are still active
    pub fn active_repeating(&self) -> Vec<ScheduledTick> {
        self.history()
            .into_iter()
            .filter(|e| e.repeating && !e.is_cancelled())
            .collect()
    }

    /// Deliver the oldest pending one-shot tick
    ///
    /// Returns the fired entry, or `None` if nothing is pending.
    pub fn fire_next(&self) -> Option<ScheduledTick> {
        let mut entries = self.entries.lock().ok()?;
        let index = entries
            .iter()
            .position(|e| !e.repeating && !e.is_cancelled())?;
        let entry = entries.remove(index);
        drop(entries);
        let _ = entry.tx.send(ControlMessage::Timer(entry.tick));
        Some(entry)
    }

    /// Deliver one round of every active periodic tick
    pub fn fire_repeating(&self) -> usize {
        let active = self.active_repeating();
        for entry in &active {
            let _ = entry.tx.send(ControlMessage::Timer(entry.tick));
        }
        active.len()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_once(
        &self,
        delay: Duration,
        tick: TimerTick,
        tx: &UnboundedSender<ControlMessage>,
    ) -> TaskGuard {
        self.record(delay, tick, false, tx)
    }

    fn schedule_repeating(
        &self,
        period: Duration,
        tick: TimerTick,
        tx: &UnboundedSender<ControlMessage>,
    ) -> TaskGuard {
        self.record(period, tick, true, tx)
    }
}
