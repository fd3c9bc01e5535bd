//! # Google Calendar Adapter
//!
//! Thin REST wrapper around the Calendar v3 events endpoints. Normalizes
//! provider payloads into [`Event`] values with timezone-aware instants.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use crate::calendar::auth::SessionProvider;
use crate::calendar::{CalendarError, CalendarSource, Event};
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::json;

const API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Request payload for creating an event.
#[derive(Debug, Clone, Serialize)]
pub struct EventCreate {
    pub summary: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Override timezone name for start/end; the calendar default applies
    /// when absent.
    pub timezone: Option<String>,
}

/// Partial update payload; None fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventPatch {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

// Wire shapes for the events endpoints.

#[derive(Debug, Deserialize)]
struct EventsListResponse {
    #[serde(default)]
    items: Vec<RawEvent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    id: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    status: Option<String>,
    updated: Option<String>,
    created: Option<String>,
    etag: Option<String>,
    #[serde(default)]
    start: RawEventTime,
    #[serde(default)]
    end: RawEventTime,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEventTime {
    date_time: Option<String>,
    /// All-day events carry a date only.
    date: Option<String>,
    time_zone: Option<String>,
}

/// Wrapper around the Google Calendar API.
pub struct GoogleCalendarClient {
    http: reqwest::Client,
    session: SessionProvider,
    calendar_id: String,
    default_offset: FixedOffset,
}

impl GoogleCalendarClient {
    pub fn new(
        session: SessionProvider,
        calendar_id: String,
        default_offset: FixedOffset,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            session,
            calendar_id,
            default_offset,
        })
    }

    fn events_url(&self) -> String {
        format!("{API_BASE}/calendars/{}/events", self.calendar_id)
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/{event_id}", self.events_url())
    }

    /// List events between two instants, expanded to single instances and
    /// ordered by start time.
    pub async fn list_events(
        &self,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        max_results: u32,
    ) -> Result<Vec<Event>, CalendarError> {
        let session = self.session.get_valid_session().await?;
        let response = self
            .http
            .get(self.events_url())
            .bearer_auth(&session.access_token)
            .query(&[
                ("timeMin", time_min.to_rfc3339()),
                ("timeMax", time_max.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
                ("maxResults", max_results.to_string()),
            ])
            .send()
            .await
            .map_err(|e| CalendarError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CalendarError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let listing: EventsListResponse = response
            .json()
            .await
            .map_err(|e| CalendarError::Transport(e.to_string()))?;

        debug!("Fetched {} events from calendar", listing.items.len());
        Ok(listing
            .items
            .into_iter()
            .map(|raw| normalize_event(raw, self.default_offset))
            .collect())
    }

    /// Events for the current local day, bounded by the default offset.
    pub async fn list_events_today(&self) -> Result<Vec<Event>, CalendarError> {
        let (start_of_day, end_of_day) = local_day_bounds(Utc::now(), self.default_offset);
        self.list_events(start_of_day, end_of_day, 20).await
    }

    /// Events starting within the next `hours` hours.
    pub async fn list_upcoming_hours(&self, hours: i64) -> Result<Vec<Event>, CalendarError> {
        let now = Utc::now();
        self.list_events(now, now + Duration::hours(hours), 50).await
    }

    pub async fn create_event(&self, payload: EventCreate) -> Result<Event, CalendarError> {
        let session = self.session.get_valid_session().await?;
        let response = self
            .http
            .post(self.events_url())
            .bearer_auth(&session.access_token)
            .json(&create_body(&payload))
            .send()
            .await
            .map_err(|e| CalendarError::Transport(e.to_string()))?;

        self.read_event_response(response).await
    }

    pub async fn update_event(
        &self,
        event_id: &str,
        payload: EventPatch,
    ) -> Result<Event, CalendarError> {
        let session = self.session.get_valid_session().await?;
        let response = self
            .http
            .patch(self.event_url(event_id))
            .bearer_auth(&session.access_token)
            .json(&patch_body(&payload))
            .send()
            .await
            .map_err(|e| CalendarError::Transport(e.to_string()))?;

        self.read_event_response(response).await
    }

    pub async fn delete_event(&self, event_id: &str) -> Result<(), CalendarError> {
        let session = self.session.get_valid_session().await?;
        let response = self
            .http
            .delete(self.event_url(event_id))
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| CalendarError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CalendarError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }

    async fn read_event_response(
        &self,
        response: reqwest::Response,
    ) -> Result<Event, CalendarError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CalendarError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let raw: RawEvent = response
            .json()
            .await
            .map_err(|e| CalendarError::Transport(e.to_string()))?;
        Ok(normalize_event(raw, self.default_offset))
    }
}

#[async_trait]
impl CalendarSource for GoogleCalendarClient {
    async fn list_upcoming(
        &self,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<Event>, CalendarError> {
        self.list_events(window_start, window_end, 50).await
    }
}

/// Bounds of the local day containing `now`, expressed in UTC.
fn local_day_bounds(
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let local_midnight = now
        .with_timezone(&offset)
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let start_of_day = offset
        .from_local_datetime(&local_midnight)
        .unwrap()
        .with_timezone(&Utc);
    (start_of_day, start_of_day + Duration::days(1))
}

/// Request body for an event insert.
fn create_body(payload: &EventCreate) -> serde_json::Value {
    let mut start = json!({ "dateTime": payload.start_time.to_rfc3339() });
    let mut end = json!({ "dateTime": payload.end_time.to_rfc3339() });
    if let Some(tz) = &payload.timezone {
        start["timeZone"] = json!(tz);
        end["timeZone"] = json!(tz);
    }
    json!({
        "summary": payload.summary,
        "description": payload.description,
        "start": start,
        "end": end,
    })
}

/// Request body for a partial event update; untouched fields are omitted.
fn patch_body(payload: &EventPatch) -> serde_json::Value {
    let mut body = serde_json::Map::new();
    if let Some(summary) = &payload.summary {
        body.insert("summary".to_string(), json!(summary));
    }
    if let Some(description) = &payload.description {
        body.insert("description".to_string(), json!(description));
    }
    if let Some(start) = payload.start_time {
        body.insert("start".to_string(), json!({ "dateTime": start.to_rfc3339() }));
    }
    if let Some(end) = payload.end_time {
        body.insert("end".to_string(), json!({ "dateTime": end.to_rfc3339() }));
    }
    serde_json::Value::Object(body)
}

/// Normalize a provider payload into a domain event.
fn normalize_event(raw: RawEvent, default_offset: FixedOffset) -> Event {
    let timezone = raw
        .start
        .time_zone
        .clone()
        .or_else(|| raw.end.time_zone.clone());
    let start_time = resolve_instant(&raw.start, default_offset);
    let end_time = resolve_instant(&raw.end, default_offset);
    let updated_at = raw
        .updated
        .as_deref()
        .or(raw.created.as_deref())
        .and_then(|v| parse_rfc3339(v, default_offset));

    Event {
        id: raw.id.unwrap_or_default(),
        summary: raw.summary.unwrap_or_else(|| "(no title)".to_string()),
        description: raw.description,
        start_time,
        end_time,
        timezone,
        status: raw.status.unwrap_or_else(|| "confirmed".to_string()),
        updated_at,
        etag: raw.etag,
    }
}

/// Resolve a provider timestamp to an instant. All-day dates become local
/// midnight at the default offset; a missing value falls back to now.
fn resolve_instant(time: &RawEventTime, default_offset: FixedOffset) -> DateTime<Utc> {
    if let Some(value) = time.date_time.as_deref() {
        if let Some(instant) = parse_rfc3339(value, default_offset) {
            return instant;
        }
    }
    if let Some(value) = time.date.as_deref() {
        if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            if let Some(local) = default_offset
                .from_local_datetime(&date.and_hms_opt(0, 0, 0).unwrap())
                .single()
            {
                return local.with_timezone(&Utc);
            }
        }
    }
    Utc::now()
}

/// Parse an RFC 3339 timestamp, applying the default offset to naive values.
fn parse_rfc3339(value: &str, default_offset: FixedOffset) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Some(instant.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return default_offset
                .from_local_datetime(&naive)
                .single()
                .map(|local| local.with_timezone(&Utc));
        }
    }
    None
}
