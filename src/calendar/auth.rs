//! # OAuth Token Store & Session Provider
//!
//! Persists Google OAuth tokens in a local JSON file and hands out a valid
//! access token on demand, refreshing through the token endpoint when the
//! stored one has expired.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Clock skew applied when deciding whether a token is still usable.
const EXPIRY_SLACK_SECS: i64 = 60;

/// Token material as persisted on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl StoredToken {
    /// Whether the access token needs a refresh before use.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => expiry <= now + Duration::seconds(EXPIRY_SLACK_SECS),
            // No recorded expiry: treat the token as usable until the API
            // says otherwise.
            None => self.token.is_none(),
        }
    }
}

/// Persists OAuth tokens locally in a JSON file.
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored token, or None when the file does not exist yet.
    pub fn load(&self) -> Result<Option<StoredToken>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read token file {}", self.path.display()))?;
        let token = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid token file {}", self.path.display()))?;
        Ok(Some(token))
    }

    pub fn save(&self, token: &StoredToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(token)?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write token file {}", self.path.display()))?;
        Ok(())
    }
}

/// Failure classes for session acquisition.
#[derive(Debug)]
pub enum AuthError {
    /// No stored token; the OAuth flow has not been completed.
    MissingCredentials,
    /// The token is expired and cannot be refreshed (no refresh token, or
    /// the endpoint rejected the refresh).
    RefreshDenied(String),
    /// The refresh request itself never completed.
    Transport(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingCredentials => {
                write!(f, "Google OAuth token not found. Complete the OAuth flow first.")
            }
            AuthError::RefreshDenied(reason) => write!(f, "token refresh denied: {reason}"),
            AuthError::Transport(reason) => write!(f, "token refresh failed: {reason}"),
        }
    }
}

impl std::error::Error for AuthError {}

/// A usable API session.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
}

/// Wire shape of a token endpoint refresh response.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: Option<i64>,
}

/// Hands out valid sessions, refreshing the stored token when needed.
pub struct SessionProvider {
    store: TokenStore,
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
}

impl SessionProvider {
    pub fn new(store: TokenStore, client_id: String, client_secret: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            store,
            client_id,
            client_secret,
            http,
        })
    }

    /// Return a valid session, refreshing the stored token if it expired.
    pub async fn get_valid_session(&self) -> Result<Session, AuthError> {
        let token = self
            .store
            .load()
            .map_err(|e| AuthError::Transport(e.to_string()))?
            .ok_or(AuthError::MissingCredentials)?;

        if !token.is_expired(Utc::now()) {
            if let Some(access_token) = token.token.clone() {
                return Ok(Session { access_token });
            }
        }

        let refresh_token = token
            .refresh_token
            .clone()
            .ok_or_else(|| AuthError::RefreshDenied("no refresh token on file".to_string()))?;

        info!("Refreshing Google OAuth token");
        let response = self
            .http
            .post(&token.token_uri)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::RefreshDenied(format!("HTTP {status}: {body}")));
        }

        let refreshed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let updated = StoredToken {
            token: Some(refreshed.access_token.clone()),
            refresh_token: Some(refresh_token),
            token_uri: token.token_uri,
            scopes: token.scopes,
            expiry: refreshed
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
        };
        self.store
            .save(&updated)
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        Ok(Session {
            access_token: refreshed.access_token,
        })
    }
}
