//! Core data models for the staff calendar
//!
//! This module contains the event records served by the backend, the query
//! window used to request them, and the invitation responses a staff member
//! can submit.

pub mod events;

pub use events::{normalize_events, EventSource, EventsClient, MalformedResponse};

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier the backend assigns to an event
pub type EventId = i64;

/// A single calendar event as returned by the backend
///
/// Only the fields the calendar needs are typed. Everything else the backend
/// sends is kept in `extra`. Optional fields the backend left out stay out
/// when written back, so cached payloads round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier for the event
    pub id: EventId,
    /// Display title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Type tag (meeting, holiday, training, ...)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Start timestamp as sent by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// End timestamp as sent by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    /// Precomputed local date used for day bucketing
    pub local_date: NaiveDate,
    /// Remaining backend fields, passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Inclusive date range used to query events
///
/// The calendar always queries whole months, but any range with
/// `start <= end` is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl EventWindow {
    /// Creates a window, returning `None` when `start` is after `end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Creates the window covering the first through last day of a month
    ///
    /// Returns `None` for an invalid month.
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        let end = next.pred_opt()?;
        Some(Self { start, end })
    }

    /// Returns the month window following this window's start month
    pub fn next_month(&self) -> Option<Self> {
        let (year, month) = if self.start.month() == 12 {
            (self.start.year() + 1, 1)
        } else {
            (self.start.year(), self.start.month() + 1)
        };
        Self::month(year, month)
    }

    /// Whether a date falls inside this window (both ends inclusive)
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for EventWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Response a staff member gives to an event invitation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Accepted,
    Declined,
}

impl fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvitationStatus::Accepted => write!(f, "accepted"),
            InvitationStatus::Declined => write!(f, "declined"),
        }
    }
}

/// Buckets events by their local date, keeping only days inside `window`
///
/// Days are ordered chronologically; events within a day keep the order
/// the backend returned them in.
pub fn group_by_day<'a>(
    events: &'a [Event],
    window: &EventWindow,
) -> BTreeMap<NaiveDate, Vec<&'a Event>> {
    let mut days: BTreeMap<NaiveDate, Vec<&Event>> = BTreeMap::new();
    for event in events.iter().filter(|e| window.contains(e.local_date)) {
        days.entry(event.local_date).or_default().push(event);
    }
    days
}

#[cfg(test)]
pub(crate) fn test_event(id: EventId, local_date: &str) -> Event {
    Event {
        id,
        title: Some(format!("Event {}", id)),
        kind: Some("meeting".to_string()),
        start: Some(format!("{}T09:00:00", local_date)),
        end: Some(format!("{}T10:00:00", local_date)),
        local_date: NaiveDate::parse_from_str(local_date, "%Y-%m-%d").unwrap(),
        extra: Map::new(),
    }
}
