//! # Twilio SMS Adapter
//!
//! Sends message bodies to a fixed destination number through the Twilio
//! Messages endpoint.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use crate::notify::{Notifier, NotifyError};
use async_trait::async_trait;
use log::info;
use serde::Deserialize;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Wire shape of a created message, used for the delivery log line.
#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: Option<String>,
}

pub struct TwilioSmsNotifier {
    http: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
    to_number: String,
}

impl TwilioSmsNotifier {
    pub fn new(
        account_sid: String,
        auth_token: String,
        from_number: String,
        to_number: String,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            account_sid,
            auth_token,
            from_number,
            to_number,
        })
    }

    fn messages_url(&self) -> String {
        format!("{TWILIO_API_BASE}/Accounts/{}/Messages.json", self.account_sid)
    }
}

#[async_trait]
impl Notifier for TwilioSmsNotifier {
    async fn send(&self, body: &str) -> Result<(), NotifyError> {
        let response = self
            .http
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[
                ("Body", body),
                ("From", self.from_number.as_str()),
                ("To", self.to_number.as_str()),
            ])
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NotifyError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let created: MessageResponse = response
            .json()
            .await
            .unwrap_or(MessageResponse { sid: None });
        info!(
            "Sent SMS {} to {}",
            created.sid.as_deref().unwrap_or("(unknown sid)"),
            self.to_number
        );
        Ok(())
    }
}
