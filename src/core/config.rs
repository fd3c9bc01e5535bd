//! # Configuration
//!
//! Environment-driven configuration for the nudge service. Secrets and
//! endpoints come from environment variables (loaded from `.env` by the
//! binary); everything else has a sensible default.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use anyhow::{anyhow, Result};
use chrono::FixedOffset;
use std::path::PathBuf;

/// Default lookahead window for the reminder poll, in hours.
pub const DEFAULT_WINDOW_HOURS: i64 = 24;

/// Default reminder poll cadence, in seconds.
pub const DEFAULT_POLL_SECS: u64 = 60;

/// Runtime configuration assembled from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Fallback UTC offset applied to calendar timestamps that arrive
    /// without timezone information.
    pub timezone_offset: FixedOffset,

    // Google Calendar
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_calendar_id: String,
    pub google_token_path: PathBuf,

    // Twilio / SMS
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_from_number: String,
    pub user_phone_number: String,

    // Reminder engine
    pub reminder_state_path: PathBuf,
    pub reminder_poll_secs: u64,
    pub reminder_window_hours: i64,

    pub log_level: String,
}

impl Config {
    /// Build a Config from environment variables.
    ///
    /// Returns an error naming the first missing required variable.
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            timezone_offset: parse_utc_offset(&optional("TZ_OFFSET", "+00:00"))?,
            google_client_id: required("GOOGLE_CLIENT_ID")?,
            google_client_secret: required("GOOGLE_CLIENT_SECRET")?,
            google_calendar_id: optional("GOOGLE_CALENDAR_ID", "primary"),
            google_token_path: PathBuf::from(optional(
                "GOOGLE_TOKEN_PATH",
                "data/google_token.json",
            )),
            twilio_account_sid: required("TWILIO_ACCOUNT_SID")?,
            twilio_auth_token: required("TWILIO_AUTH_TOKEN")?,
            twilio_from_number: required("TWILIO_FROM_NUMBER")?,
            user_phone_number: required("USER_PHONE_NUMBER")?,
            reminder_state_path: PathBuf::from(optional(
                "REMINDER_STATE_PATH",
                "data/reminder_state.json",
            )),
            reminder_poll_secs: optional("REMINDER_POLL_SECS", "")
                .parse()
                .unwrap_or(DEFAULT_POLL_SECS),
            reminder_window_hours: optional("REMINDER_WINDOW_HOURS", "")
                .parse()
                .unwrap_or(DEFAULT_WINDOW_HOURS),
            log_level: optional("LOG_LEVEL", "info"),
        })
    }
}

fn required(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| anyhow!("Missing required environment variable: {name}"))
}

fn optional(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Parse a UTC offset of the form `+HH:MM`, `-HH:MM`, or `Z`.
pub fn parse_utc_offset(value: &str) -> Result<FixedOffset> {
    if value == "Z" || value == "z" {
        return FixedOffset::east_opt(0).ok_or_else(|| anyhow!("invalid offset"));
    }

    let (sign, rest) = if let Some(rest) = value.strip_prefix('+') {
        (1i32, rest)
    } else if let Some(rest) = value.strip_prefix('-') {
        (-1i32, rest)
    } else {
        return Err(anyhow!("Invalid UTC offset: {value}"));
    };

    let (hours, minutes) = rest
        .split_once(':')
        .ok_or_else(|| anyhow!("Invalid UTC offset: {value}"))?;
    let hours: i32 = hours
        .parse()
        .map_err(|_| anyhow!("Invalid UTC offset: {value}"))?;
    let minutes: i32 = minutes
        .parse()
        .map_err(|_| anyhow!("Invalid UTC offset: {value}"))?;
    if hours > 23 || minutes > 59 {
        return Err(anyhow!("UTC offset out of range: {value}"));
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| anyhow!("UTC offset out of range: {value}"))
}
