//! # Reminder Engine
//!
//! One poll pass: fetch upcoming events, work out which reminders are due,
//! send them, and record each delivery only after the send succeeded.
//! Delivery is at-most-once per event content version on success and
//! at-least-once across transient send failures: an unrecorded send is
//! simply retried on the next pass.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use crate::calendar::{CalendarSource, Event};
use crate::features::reminders::state::ReminderStateStore;
use crate::notify::Notifier;
use chrono::{DateTime, Duration, Utc};
use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// A reminder kind: a named lead time before the event start, with the
/// message template rendered when it fires.
#[derive(Debug, Clone)]
pub struct ReminderOffset {
    pub kind: &'static str,
    /// Lead time before the event start at which this kind fires.
    pub lead: Duration,
    /// Message template with a `{title}` placeholder.
    pub template: &'static str,
}

impl ReminderOffset {
    pub fn render(&self, title: &str) -> String {
        self.template.replace("{title}", title)
    }
}

/// The stock two-step schedule.
pub fn default_schedule() -> Vec<ReminderOffset> {
    vec![
        ReminderOffset {
            kind: "2h",
            lead: Duration::hours(2),
            template: "⏰ Heads up! '{title}' starts in ~2 hours.",
        },
        ReminderOffset {
            kind: "10m",
            lead: Duration::minutes(10),
            template: "🚀 Almost go time! '{title}' kicks off in 10 minutes.",
        },
    ]
}

/// Poll upcoming events and push due reminders through the notifier.
pub struct ReminderEngine {
    calendar: Arc<dyn CalendarSource>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<ReminderStateStore>,
    schedule: Vec<ReminderOffset>,
    /// How far ahead each poll looks for events.
    window: Duration,
    /// How long after an event ends before its delivery record is purged.
    retention: Duration,
}

impl ReminderEngine {
    pub fn new(
        calendar: Arc<dyn CalendarSource>,
        notifier: Arc<dyn Notifier>,
        state: ReminderStateStore,
    ) -> Self {
        Self::with_schedule(calendar, notifier, state, default_schedule())
    }

    pub fn with_schedule(
        calendar: Arc<dyn CalendarSource>,
        notifier: Arc<dyn Notifier>,
        state: ReminderStateStore,
        mut schedule: Vec<ReminderOffset>,
    ) -> Self {
        // Evaluate earliest-firing kinds first: longest lead time first.
        schedule.sort_by(|a, b| b.lead.cmp(&a.lead));
        Self {
            calendar,
            notifier,
            state: Mutex::new(state),
            schedule,
            window: Duration::hours(24),
            retention: Duration::hours(1),
        }
    }

    /// Override the poll lookahead window.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Lock the underlying delivery-state store, e.g. for a status surface.
    pub async fn state(&self) -> MutexGuard<'_, ReminderStateStore> {
        self.state.lock().await
    }

    /// Run one poll pass at the current time.
    pub async fn tick(&self) {
        self.tick_at(Utc::now()).await;
    }

    /// Run one poll pass as of `now`.
    ///
    /// Never propagates an error: a fetch failure aborts the pass with no
    /// side effects and is retried on the next one; send and persistence
    /// failures are contained per event and kind.
    pub async fn tick_at(&self, now: DateTime<Utc>) {
        let events = match self.calendar.list_upcoming(now, now + self.window).await {
            Ok(events) => events,
            Err(e) => {
                error!("Unable to fetch events for reminders: {e}");
                return;
            }
        };

        for event in &events {
            self.process_event(event, now).await;
        }

        // Drop delivery records for events that concluded a while ago, so
        // the snapshot does not grow without bound. Only events visible in
        // this poll's window are considered.
        let horizon = now - self.retention;
        for event in &events {
            if event.end_time < horizon {
                if let Err(e) = self.state.lock().await.clear_event(&event.id) {
                    warn!("Failed to clear reminder state for event {}: {e}", event.id);
                }
            }
        }
    }

    /// Evaluate every scheduled kind for one event. Failures here never
    /// abort the rest of the pass.
    async fn process_event(&self, event: &Event, now: DateTime<Utc>) {
        let version = event.version_key();

        for entry in &self.schedule {
            let trigger_at = event.start_time - entry.lead;
            if now < trigger_at {
                continue;
            }
            if self
                .state
                .lock()
                .await
                .has_sent(&event.id, entry.kind, &version)
            {
                continue;
            }

            let body = entry.render(&event.summary);
            match self.notifier.send(&body).await {
                Ok(()) => {
                    info!("Sent {} reminder for '{}'", entry.kind, event.summary);
                    // Send-then-record: an unrecorded send gets retried,
                    // a recorded non-send must never happen.
                    if let Err(e) = self
                        .state
                        .lock()
                        .await
                        .mark_sent(&event.id, entry.kind, &version)
                    {
                        error!(
                            "Failed to record {} reminder for event {}: {e}",
                            entry.kind, event.id
                        );
                    }
                }
                Err(e) => {
                    warn!(
                        "Failed to send {} reminder for event {}: {e}",
                        entry.kind, event.id
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::reminders::testing::{event_at, FixedCalendar, RecordingNotifier};
    use chrono::TimeZone;
    use std::sync::atomic::Ordering;
    use tempfile::tempdir;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 14, 0, 0).unwrap()
    }

    fn engine_with(
        dir: &tempfile::TempDir,
        calendar: Arc<FixedCalendar>,
        notifier: Arc<RecordingNotifier>,
    ) -> ReminderEngine {
        let store = ReminderStateStore::load(dir.path().join("reminder_state.json")).unwrap();
        ReminderEngine::new(calendar, notifier, store)
    }

    #[tokio::test]
    async fn test_only_earliest_kind_fires_two_hours_out() {
        let dir = tempdir().unwrap();
        let calendar = Arc::new(FixedCalendar::with_events(vec![event_at(
            "evt-1", "Standup", start(),
        )]));
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = engine_with(&dir, calendar, notifier.clone());

        let now = start() - Duration::hours(2);
        engine.tick_at(now).await;

        assert_eq!(
            notifier.bodies(),
            vec!["⏰ Heads up! 'Standup' starts in ~2 hours.".to_string()]
        );

        // Same instant again: nothing further goes out.
        engine.tick_at(now).await;
        assert_eq!(notifier.bodies().len(), 1);
    }

    #[tokio::test]
    async fn test_both_kinds_fire_in_order_when_overdue() {
        let dir = tempdir().unwrap();
        let calendar = Arc::new(FixedCalendar::with_events(vec![event_at(
            "evt-1", "Standup", start(),
        )]));
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = engine_with(&dir, calendar, notifier.clone());

        engine.tick_at(start() - Duration::minutes(5)).await;

        assert_eq!(
            notifier.bodies(),
            vec![
                "⏰ Heads up! 'Standup' starts in ~2 hours.".to_string(),
                "🚀 Almost go time! 'Standup' kicks off in 10 minutes.".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_version_change_invalidates_sent_reminders() {
        let dir = tempdir().unwrap();
        let mut event = event_at("evt-1", "Standup", start());
        event.updated_at = Some(Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap());
        let calendar = Arc::new(FixedCalendar::with_events(vec![event.clone()]));
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = engine_with(&dir, calendar.clone(), notifier.clone());

        engine.tick_at(start() - Duration::minutes(90)).await;
        assert_eq!(notifier.bodies().len(), 1);

        // The event gets rescheduled content-wise: new version token.
        event.updated_at = Some(Utc.with_ymd_and_hms(2025, 6, 2, 13, 0, 0).unwrap());
        *calendar.events.lock().unwrap() = vec![event];

        engine.tick_at(start() - Duration::minutes(5)).await;

        // Both kinds fire again under the new version, earliest first.
        let bodies = notifier.bodies();
        assert_eq!(bodies.len(), 3);
        assert!(bodies[1].contains("~2 hours"));
        assert!(bodies[2].contains("10 minutes"));
    }

    #[tokio::test]
    async fn test_concluded_event_state_is_purged() {
        let dir = tempdir().unwrap();
        let now = start();
        let event = event_at("evt-1", "Standup", now - Duration::hours(3));
        let version = event.version_key();

        let mut store = ReminderStateStore::load(dir.path().join("reminder_state.json")).unwrap();
        store.mark_sent("evt-1", "2h", &version).unwrap();
        store.mark_sent("evt-1", "10m", &version).unwrap();

        let calendar = Arc::new(FixedCalendar::with_events(vec![event]));
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = ReminderEngine::new(calendar, notifier.clone(), store);

        // Ended two hours ago: past the retention horizon.
        engine.tick_at(now).await;

        assert!(notifier.bodies().is_empty());
        let reloaded = ReminderStateStore::load(dir.path().join("reminder_state.json")).unwrap();
        assert!(reloaded.is_empty());
    }

    #[tokio::test]
    async fn test_recently_concluded_event_state_is_kept() {
        let dir = tempdir().unwrap();
        let now = start();
        // Ends half an hour before now: inside the retention horizon.
        let event = event_at("evt-1", "Standup", now - Duration::minutes(90));
        let version = event.version_key();

        let mut store = ReminderStateStore::load(dir.path().join("reminder_state.json")).unwrap();
        store.mark_sent("evt-1", "2h", &version).unwrap();
        store.mark_sent("evt-1", "10m", &version).unwrap();

        let calendar = Arc::new(FixedCalendar::with_events(vec![event]));
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = ReminderEngine::new(calendar, notifier, store);

        engine.tick_at(now).await;

        assert_eq!(engine.state().await.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_everything_untouched() {
        let dir = tempdir().unwrap();
        let calendar = Arc::new(FixedCalendar::failing());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = engine_with(&dir, calendar, notifier.clone());

        engine.tick_at(start()).await;

        assert!(notifier.bodies().is_empty());
        // No snapshot was ever written.
        assert!(!dir.path().join("reminder_state.json").exists());
    }

    #[tokio::test]
    async fn test_send_failure_is_retried_next_tick() {
        let dir = tempdir().unwrap();
        let calendar = Arc::new(FixedCalendar::with_events(vec![event_at(
            "evt-1", "Standup", start(),
        )]));
        let notifier = Arc::new(RecordingNotifier::new());
        notifier.fail.store(true, Ordering::SeqCst);
        let engine = engine_with(&dir, calendar, notifier.clone());

        let now = start() - Duration::hours(2);
        engine.tick_at(now).await;
        assert!(notifier.bodies().is_empty());
        assert!(engine.state().await.is_empty());

        notifier.fail.store(false, Ordering::SeqCst);
        engine.tick_at(now).await;
        assert_eq!(notifier.bodies().len(), 1);
    }

    #[tokio::test]
    async fn test_one_event_failure_does_not_block_others() {
        let dir = tempdir().unwrap();
        let calendar = Arc::new(FixedCalendar::with_events(vec![
            event_at("evt-1", "First", start()),
            event_at("evt-2", "Second", start()),
        ]));
        let notifier = Arc::new(RecordingNotifier::new());
        // Sends for the first event are rejected; the second event must
        // still be processed in the same pass.
        *notifier.fail_containing.lock().unwrap() = Some("First".to_string());
        let engine = engine_with(&dir, calendar, notifier.clone());

        engine.tick_at(start() - Duration::hours(2)).await;

        let bodies = notifier.bodies();
        assert_eq!(bodies.len(), 1);
        assert!(bodies[0].contains("Second"));

        // The failed event was never recorded, so it retries next pass.
        *notifier.fail_containing.lock().unwrap() = None;
        engine.tick_at(start() - Duration::hours(2)).await;
        assert_eq!(notifier.bodies().len(), 2);
    }

    #[tokio::test]
    async fn test_persist_failure_does_not_abort_tick() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reminder_state.json");
        let store = ReminderStateStore::load(&path).unwrap();
        // Make every persist fail.
        std::fs::create_dir(&path).unwrap();

        let calendar = Arc::new(FixedCalendar::with_events(vec![
            event_at("evt-1", "First", start()),
            event_at("evt-2", "Second", start()),
        ]));
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = ReminderEngine::new(calendar, notifier.clone(), store);

        engine.tick_at(start() - Duration::hours(2)).await;

        // Both sends happened even though neither could be recorded.
        assert_eq!(notifier.bodies().len(), 2);
    }

    #[tokio::test]
    async fn test_custom_schedule_is_sorted_by_lead() {
        let dir = tempdir().unwrap();
        let calendar = Arc::new(FixedCalendar::with_events(vec![event_at(
            "evt-1", "Standup", start(),
        )]));
        let notifier = Arc::new(RecordingNotifier::new());
        let store = ReminderStateStore::load(dir.path().join("reminder_state.json")).unwrap();

        // Deliberately listed latest-first; the engine must still evaluate
        // the day-before kind ahead of the hour-before kind.
        let engine = ReminderEngine::with_schedule(
            calendar,
            notifier.clone(),
            store,
            vec![
                ReminderOffset {
                    kind: "1h",
                    lead: Duration::hours(1),
                    template: "soon: {title}",
                },
                ReminderOffset {
                    kind: "1d",
                    lead: Duration::days(1),
                    template: "tomorrow: {title}",
                },
            ],
        );

        engine.tick_at(start() - Duration::minutes(30)).await;

        assert_eq!(
            notifier.bodies(),
            vec!["tomorrow: Standup".to_string(), "soon: Standup".to_string()]
        );
    }

    #[test]
    fn test_template_rendering() {
        let schedule = default_schedule();
        assert_eq!(
            schedule[0].render("Demo"),
            "⏰ Heads up! 'Demo' starts in ~2 hours."
        );
        assert_eq!(
            schedule[1].render("Demo"),
            "🚀 Almost go time! 'Demo' kicks off in 10 minutes."
        );
    }
}
