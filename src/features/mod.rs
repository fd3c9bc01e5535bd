//! # Features
//!
//! Feature modules for the nudge service.

pub mod reminders;

// Re-export feature items
pub use reminders::{
    default_schedule, ReminderEngine, ReminderOffset, ReminderRecord, ReminderScheduler,
    ReminderStateStore,
};
