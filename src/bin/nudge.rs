use anyhow::Result;
use chrono::Duration;
use dotenvy::dotenv;
use log::info;
use std::sync::Arc;

use nudge::calendar::{GoogleCalendarClient, SessionProvider, TokenStore};
use nudge::core::Config;
use nudge::features::reminders::{ReminderEngine, ReminderScheduler, ReminderStateStore};
use nudge::notify::TwilioSmsNotifier;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Starting Nudge reminder service...");

    let token_store = TokenStore::new(&config.google_token_path);
    let session = SessionProvider::new(
        token_store,
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
    )?;
    let calendar = Arc::new(GoogleCalendarClient::new(
        session,
        config.google_calendar_id.clone(),
        config.timezone_offset,
    )?);
    let notifier = Arc::new(TwilioSmsNotifier::new(
        config.twilio_account_sid.clone(),
        config.twilio_auth_token.clone(),
        config.twilio_from_number.clone(),
        config.user_phone_number.clone(),
    )?);

    let state = ReminderStateStore::load(&config.reminder_state_path)?;
    info!(
        "Loaded reminder state from {} ({} tracked events)",
        state.path().display(),
        state.len()
    );

    let engine = ReminderEngine::new(calendar, notifier, state)
        .with_window(Duration::hours(config.reminder_window_hours));
    let scheduler = Arc::new(
        ReminderScheduler::new(engine)
            .with_poll_interval(std::time::Duration::from_secs(config.reminder_poll_secs)),
    );

    let runner = scheduler.clone();
    let handle = tokio::spawn(async move {
        runner.run().await;
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    scheduler.stop();
    handle.await?;

    Ok(())
}
