//! # Reminder Scheduler
//!
//! Drives the engine's poll pass on a fixed cadence. At most one pass runs
//! at a time: a firing that lands while the previous pass is still running
//! is skipped, not queued.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use crate::features::reminders::engine::ReminderEngine;
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;

/// Default poll cadence.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

pub struct ReminderScheduler {
    engine: ReminderEngine,
    poll_interval: Duration,
    busy: AtomicBool,
    stopped: AtomicBool,
    shutdown: Notify,
}

impl ReminderScheduler {
    pub fn new(engine: ReminderEngine) -> Self {
        Self {
            engine,
            poll_interval: DEFAULT_POLL_INTERVAL,
            busy: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            shutdown: Notify::new(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn engine(&self) -> &ReminderEngine {
        &self.engine
    }

    /// Poll forever, until [`stop`](Self::stop) is called. The first pass
    /// runs immediately.
    pub async fn run(&self) {
        info!(
            "Starting reminder scheduler (poll every {:?})",
            self.poll_interval
        );
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if self.stopped.load(Ordering::SeqCst) {
                break;
            }
            tokio::select! {
                _ = interval.tick() => {
                    if self.stopped.load(Ordering::SeqCst) {
                        break;
                    }
                    self.try_tick().await;
                }
                _ = self.shutdown.notified() => break,
            }
        }
        info!("Reminder scheduler stopped");
    }

    /// Run one poll pass unless one is already in flight.
    ///
    /// Returns false when the pass was skipped because the previous one is
    /// still running. Non-reentrant regardless of how many callers share
    /// the scheduler.
    pub async fn try_tick(&self) -> bool {
        if self.busy.swap(true, Ordering::SeqCst) {
            debug!("Skipping reminder poll: previous pass still running");
            return false;
        }
        self.engine.tick().await;
        self.busy.store(false, Ordering::SeqCst);
        true
    }

    /// Request shutdown. Idempotent; an in-flight pass is allowed to
    /// finish, and no further passes start afterwards.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            info!("Stopping reminder scheduler");
        }
        self.shutdown.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}
