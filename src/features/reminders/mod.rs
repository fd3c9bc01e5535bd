//! # Reminders Feature
//!
//! Calendar-driven reminder dispatch with durable de-duplication.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: true

pub mod engine;
pub mod scheduler;
pub mod state;

pub use engine::{default_schedule, ReminderEngine, ReminderOffset};
pub use scheduler::ReminderScheduler;
pub use state::{ReminderRecord, ReminderStateStore};

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for the engine and scheduler tests.

    use crate::calendar::{CalendarError, CalendarSource, Event};
    use crate::notify::{Notifier, NotifyError};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Calendar source that serves a fixed event list, with switchable
    /// failure mode and an optional artificial fetch delay.
    pub struct FixedCalendar {
        pub events: Mutex<Vec<Event>>,
        pub fail: AtomicBool,
        pub calls: AtomicUsize,
        pub delay: Option<std::time::Duration>,
    }

    impl FixedCalendar {
        pub fn with_events(events: Vec<Event>) -> Self {
            Self {
                events: Mutex::new(events),
                fail: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
                delay: None,
            }
        }

        pub fn failing() -> Self {
            let calendar = Self::with_events(vec![]);
            calendar.fail.store(true, Ordering::SeqCst);
            calendar
        }
    }

    #[async_trait]
    impl CalendarSource for FixedCalendar {
        async fn list_upcoming(
            &self,
            _window_start: DateTime<Utc>,
            _window_end: DateTime<Utc>,
        ) -> Result<Vec<Event>, CalendarError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(CalendarError::Transport("connection refused".to_string()));
            }
            Ok(self.events.lock().unwrap().clone())
        }
    }

    /// Notifier that records every body it was asked to deliver. Can fail
    /// wholesale, or only for bodies containing a needle.
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<String>>,
        pub fail: AtomicBool,
        pub fail_containing: Mutex<Option<String>>,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
                fail_containing: Mutex::new(None),
            }
        }

        pub fn bodies(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, body: &str) -> Result<(), NotifyError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(NotifyError::Transport("unreachable".to_string()));
            }
            if let Some(needle) = self.fail_containing.lock().unwrap().as_deref() {
                if body.contains(needle) {
                    return Err(NotifyError::Api {
                        status: 400,
                        message: "rejected".to_string(),
                    });
                }
            }
            self.sent.lock().unwrap().push(body.to_string());
            Ok(())
        }
    }

    /// Build an event starting at `start` with a one-hour duration.
    pub fn event_at(id: &str, summary: &str, start: DateTime<Utc>) -> Event {
        Event {
            id: id.to_string(),
            summary: summary.to_string(),
            description: None,
            start_time: start,
            end_time: start + Duration::hours(1),
            timezone: None,
            status: "confirmed".to_string(),
            updated_at: None,
            etag: None,
        }
    }
}
