//! # Notify Collaborator
//!
//! Outbound messaging capability: the trait the reminder engine sends
//! through, and the Twilio SMS adapter.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

pub mod sms;

// Re-export commonly used items
pub use sms::TwilioSmsNotifier;

use async_trait::async_trait;

/// Failure classes for message delivery.
#[derive(Debug)]
pub enum NotifyError {
    /// The provider answered with a non-success status.
    Api { status: u16, message: String },
    /// The request never completed.
    Transport(String),
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::Api { status, message } => {
                write!(f, "notifier returned HTTP {status}: {message}")
            }
            NotifyError::Transport(message) => write!(f, "notifier request failed: {message}"),
        }
    }
}

impl std::error::Error for NotifyError {}

/// Capability consumed by the reminder engine: deliver a text body to the
/// configured destination. Failure is always distinguishable from success.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, body: &str) -> Result<(), NotifyError>;
}
