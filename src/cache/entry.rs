//! Cache keys, entries, and the freshness check

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::{Event, EventWindow};

/// Resource name calendar entries are stored under
pub const CALENDAR_EVENTS_RESOURCE: &str = "calendar_events";

/// Identifies the cached payload for one query window of one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    resource: &'static str,
    window: EventWindow,
}

impl CacheKey {
    pub fn new(resource: &'static str, window: EventWindow) -> Self {
        Self { resource, window }
    }

    /// Key for calendar events in `window`
    pub fn calendar_events(window: EventWindow) -> Self {
        Self::new(CALENDAR_EVENTS_RESOURCE, window)
    }

    pub fn window(&self) -> &EventWindow {
        &self.window
    }

    /// Storage slot holding the serialized payload
    pub fn payload_key(&self) -> String {
        self.to_string()
    }

    /// Storage slot holding the write timestamp in epoch milliseconds
    pub fn time_key(&self) -> String {
        format!("{}_time", self)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}",
            self.resource,
            self.window.start.format("%Y-%m-%d"),
            self.window.end.format("%Y-%m-%d")
        )
    }
}

/// A cached event list and when it was stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub payload: Vec<Event>,
    pub stored_at_millis: i64,
}

/// Whether an entry is still inside its time-to-live
///
/// True iff `now_millis - entry.stored_at_millis < ttl_millis`.
pub fn is_fresh(entry: &CacheEntry, now_millis: i64, ttl_millis: i64) -> bool {
    now_millis.saturating_sub(entry.stored_at_millis) < ttl_millis
}
