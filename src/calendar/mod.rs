//! # Calendar Collaborator
//!
//! Event model and the capability trait the reminder engine consumes, plus
//! the Google Calendar REST adapter and its OAuth session plumbing.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

pub mod auth;
pub mod google;

// Re-export commonly used items
pub use auth::{AuthError, Session, SessionProvider, TokenStore};
pub use google::{EventCreate, EventPatch, GoogleCalendarClient};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A calendar event, normalized from the provider payload.
///
/// Start and end are timezone-aware instants; naive provider timestamps are
/// resolved against the configured default offset before they get here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Opaque, stable identifier assigned by the calendar provider.
    pub id: String,

    /// Human friendly title.
    pub summary: String,

    pub description: Option<String>,

    pub start_time: DateTime<Utc>,

    pub end_time: DateTime<Utc>,

    /// The event's declared timezone name, when the provider sent one.
    /// Informational; the instants above are already resolved.
    pub timezone: Option<String>,

    /// Provider status, e.g. "confirmed" or "cancelled".
    pub status: String,

    /// Last-modified timestamp, used as a change-detection token.
    pub updated_at: Option<DateTime<Utc>>,

    pub etag: Option<String>,
}

impl Event {
    /// Change-detection token for this event snapshot.
    ///
    /// The token is opaque to callers: any content change on the provider
    /// side produces a new `updated_at` and therefore a new token. Events
    /// that never carried an update timestamp fall back to the start time,
    /// which is still deterministic for a given snapshot.
    pub fn version_key(&self) -> String {
        match self.updated_at {
            Some(updated) => updated.to_rfc3339(),
            None => self.start_time.to_rfc3339(),
        }
    }
}

/// Failure classes for calendar access.
#[derive(Debug)]
pub enum CalendarError {
    /// No usable credentials, or the refresh was rejected.
    Auth(AuthError),
    /// The provider answered with a non-success status.
    Api { status: u16, message: String },
    /// The request never completed (connect failure, timeout, bad payload).
    Transport(String),
}

impl std::fmt::Display for CalendarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalendarError::Auth(e) => write!(f, "calendar auth failed: {e}"),
            CalendarError::Api { status, message } => {
                write!(f, "calendar API returned HTTP {status}: {message}")
            }
            CalendarError::Transport(message) => write!(f, "calendar request failed: {message}"),
        }
    }
}

impl std::error::Error for CalendarError {}

impl From<AuthError> for CalendarError {
    fn from(e: AuthError) -> Self {
        CalendarError::Auth(e)
    }
}

/// Capability consumed by the reminder engine: list events in a window.
///
/// Implementations must fail loudly on transport errors rather than return
/// a partial result.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    async fn list_upcoming(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<Event>, CalendarError>;
}
