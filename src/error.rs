//! Error types for the staff calendar
//!
//! Backend failures are reported as [`ApiError`], wrapped by the cache into
//! [`CalendarError`] together with the window or event they concern.

use std::time::Duration;

use thiserror::Error;

use crate::data::EventId;

/// Errors raised while talking to the calendar backend
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed before a response arrived
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status
    #[error("Backend returned status {0}")]
    Status(u16),

    /// The request did not complete in time
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors surfaced to callers of the calendar cache
#[derive(Debug, Error)]
pub enum CalendarError {
    /// Events for a window could not be fetched and nothing fresh was cached
    #[error("Failed to fetch events for {key}: {source}")]
    FetchFailed {
        key: String,
        #[source]
        source: ApiError,
    },

    /// An invitation response was rejected or never reached the backend
    #[error("Failed to submit response for event {event_id}: {source}")]
    RespondFailed {
        event_id: EventId,
        #[source]
        source: ApiError,
    },
}

impl CalendarError {
    /// Whether this error came from the events fetch
    pub fn is_fetch_failed(&self) -> bool {
        matches!(self, CalendarError::FetchFailed { .. })
    }
}

/// Errors from the persisted key-value store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A value could not be serialized for storage
    #[error("Failed to serialize cache value: {0}")]
    Serialize(#[from] serde_json::Error),
}
