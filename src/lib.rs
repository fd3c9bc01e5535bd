// Core layer - shared configuration
pub mod core;

// Collaborator adapters - calendar source and outbound messaging
pub mod calendar;
pub mod notify;

// Features layer - reminder dispatch
pub mod features;

// Re-export core config for convenience
pub use core::Config;

// Re-export commonly used items
pub use calendar::{CalendarError, CalendarSource, Event, GoogleCalendarClient};
pub use features::{
    default_schedule, ReminderEngine, ReminderOffset, ReminderRecord, ReminderScheduler,
    ReminderStateStore,
};
pub use notify::{Notifier, NotifyError, TwilioSmsNotifier};
