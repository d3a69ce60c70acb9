//! Calendar backend client
//!
//! Fetches events for a date window and submits invitation responses. The
//! backend is not consistent about where it puts the event array, so every
//! body goes through [`normalize_events`] before anything else sees it.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::{Event, EventId, EventWindow, InvitationStatus};
use crate::error::ApiError;

/// Default backend base URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Source of truth for calendar events
///
/// Implemented by [`EventsClient`] for the real backend; tests supply their
/// own scripted implementations.
#[async_trait]
pub trait EventSource: Send + Sync + 'static {
    /// Fetches every event inside `window`
    async fn fetch_window(&self, window: &EventWindow) -> Result<Vec<Event>, ApiError>;

    /// Records the caller's response to an event invitation
    async fn respond(&self, event_id: EventId, status: InvitationStatus) -> Result<(), ApiError>;
}

/// The response body did not contain an event array in any known place
#[derive(Debug, Error)]
#[error("Malformed events response: {0}")]
pub struct MalformedResponse(pub String);

/// Body of the invitation response request
#[derive(Debug, Serialize)]
struct RespondRequest {
    event_id: EventId,
    status: InvitationStatus,
}

/// Client for the calendar REST endpoints
#[derive(Debug, Clone)]
pub struct EventsClient {
    http_client: Client,
    base_url: String,
}

impl Default for EventsClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl EventsClient {
    /// Creates a client for the backend rooted at `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Creates a client with a preconfigured HTTP client
    pub fn with_client(http_client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http_client,
            base_url,
        }
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn events_url(&self) -> String {
        format!("{}/calendar/events", self.base_url)
    }

    fn respond_url(&self) -> String {
        format!("{}/calendar/events/respond", self.base_url)
    }
}

#[async_trait]
impl EventSource for EventsClient {
    async fn fetch_window(&self, window: &EventWindow) -> Result<Vec<Event>, ApiError> {
        let start = window.start.to_string();
        let end = window.end.to_string();
        debug!(%window, "Fetching calendar events");

        let response = self
            .http_client
            .get(self.events_url())
            .query(&[("start_date", start.as_str()), ("end_date", end.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }

        // A body that is not JSON at all is a shape problem, not a transport one
        let text = response.text().await?;
        let body = match serde_json::from_str::<Value>(&text) {
            Ok(body) => body,
            Err(e) => {
                warn!(%window, error = %e, "Events response is not JSON, treating as empty");
                return Ok(Vec::new());
            }
        };

        Ok(normalize_events(body))
    }

    async fn respond(&self, event_id: EventId, status: InvitationStatus) -> Result<(), ApiError> {
        debug!(event_id, %status, "Submitting invitation response");

        let response = self
            .http_client
            .post(self.respond_url())
            .json(&RespondRequest { event_id, status })
            .send()
            .await?;

        let code = response.status();
        if !code.is_success() {
            return Err(ApiError::Status(code.as_u16()));
        }
        Ok(())
    }
}

/// Locates the event array inside a response body
///
/// Accepts a top-level array, an array under `data`, an array under
/// `data.data`, or an array under `events`.
pub fn extract_events(body: &Value) -> Result<&Vec<Value>, MalformedResponse> {
    if let Some(items) = body.as_array() {
        return Ok(items);
    }
    if let Some(data) = body.get("data") {
        if let Some(items) = data.as_array() {
            return Ok(items);
        }
        if let Some(items) = data.get("data").and_then(Value::as_array) {
            return Ok(items);
        }
    }
    if let Some(items) = body.get("events").and_then(Value::as_array) {
        return Ok(items);
    }
    Err(MalformedResponse(describe_shape(body)))
}

/// Turns any response body into a list of events
///
/// An unrecognized shape yields an empty list. Records that fail to parse
/// are dropped individually.
pub fn normalize_events(body: Value) -> Vec<Event> {
    let items = match extract_events(&body) {
        Ok(items) => items,
        Err(e) => {
            warn!(error = %e, "Treating events response as empty");
            return Vec::new();
        }
    };

    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<Event>(item.clone()) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(error = %e, "Dropping unparseable event record");
                None
            }
        })
        .collect()
}

fn describe_shape(body: &Value) -> String {
    match body {
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            format!("object with keys [{}]", keys.join(", "))
        }
        Value::Null => "null".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(_) => "string".to_string(),
        Value::Array(_) => "array".to_string(),
    }
}
