//! Command-line interface parsing for the staff calendar
//!
//! This module handles parsing of CLI arguments using clap, resolving the
//! requested query window, and formatting event listings for the terminal.

use std::fmt::Write as _;

use chrono::{Datelike, NaiveDate};
use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::data::{group_by_day, Event, EventId, EventWindow, InvitationStatus};

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The month argument is not `YYYY-MM`
    #[error("Invalid month: '{0}'. Expected YYYY-MM, e.g. 2026-10")]
    InvalidMonth(String),

    /// A date argument is not `YYYY-MM-DD`
    #[error("Invalid date: '{0}'. Expected YYYY-MM-DD, e.g. 2026-10-01")]
    InvalidDate(String),

    /// The start date is after the end date
    #[error("Invalid window: start {start} is after end {end}")]
    ReversedWindow { start: NaiveDate, end: NaiveDate },

    /// Asked for zero months
    #[error("--months must be at least 1")]
    NoMonths,
}

/// Staff calendar - list events and answer invitations
#[derive(Parser, Debug)]
#[command(name = "staffcal")]
#[command(about = "Staff events calendar with cached month views")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List events for a month or date range, grouped by day
    Events {
        #[command(flatten)]
        window: WindowArgs,

        /// Skip the cache and fetch from the backend
        #[arg(long)]
        refresh: bool,

        /// Number of consecutive months to load, starting at the window
        #[arg(long, default_value_t = 1)]
        months: u32,
    },
    /// Accept or decline an event invitation, then reload its month
    Respond {
        /// Identifier of the event
        event_id: EventId,

        /// Response to submit
        #[arg(value_enum)]
        status: InvitationStatus,

        #[command(flatten)]
        window: WindowArgs,
    },
}

/// Query window selection shared by subcommands
///
/// Defaults to the current month when nothing is given.
#[derive(Args, Debug, Clone, Default)]
pub struct WindowArgs {
    /// Month to show
    #[arg(long, value_name = "YYYY-MM", conflicts_with_all = ["start", "end"])]
    pub month: Option<String>,

    /// First day of a custom window
    #[arg(long, value_name = "YYYY-MM-DD", requires = "end")]
    pub start: Option<String>,

    /// Last day of a custom window
    #[arg(long, value_name = "YYYY-MM-DD", requires = "start")]
    pub end: Option<String>,
}

impl WindowArgs {
    /// Resolves the arguments to a window, using `today` for the default
    pub fn resolve(&self, today: NaiveDate) -> Result<EventWindow, CliError> {
        if let Some(month) = &self.month {
            return parse_month_arg(month);
        }
        if let (Some(start), Some(end)) = (&self.start, &self.end) {
            let start = parse_date_arg(start)?;
            let end = parse_date_arg(end)?;
            return EventWindow::new(start, end).ok_or(CliError::ReversedWindow { start, end });
        }
        EventWindow::month(today.year(), today.month())
            .ok_or_else(|| CliError::InvalidMonth(today.format("%Y-%m").to_string()))
    }
}

/// Parses a `YYYY-MM` argument into that month's window
pub fn parse_month_arg(s: &str) -> Result<EventWindow, CliError> {
    let invalid = || CliError::InvalidMonth(s.to_string());
    let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    EventWindow::month(year, month).ok_or_else(invalid)
}

/// Parses a `YYYY-MM-DD` argument
pub fn parse_date_arg(s: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| CliError::InvalidDate(s.to_string()))
}

/// Returns `first` followed by the month windows after it, `count` in total
pub fn consecutive_windows(first: EventWindow, count: u32) -> Result<Vec<EventWindow>, CliError> {
    if count == 0 {
        return Err(CliError::NoMonths);
    }
    let mut windows = vec![first];
    while windows.len() < count as usize {
        let Some(next) = windows.last().and_then(EventWindow::next_month) else {
            break;
        };
        windows.push(next);
    }
    Ok(windows)
}

/// Formats events inside `window` as a day-by-day listing
pub fn format_events(events: &[Event], window: &EventWindow) -> String {
    let days = group_by_day(events, window);
    let mut out = String::new();

    let _ = writeln!(out, "Events {} to {}", window.start, window.end);
    if days.is_empty() {
        let _ = writeln!(out, "  (no events)");
        return out;
    }

    for (day, day_events) in days {
        let _ = writeln!(out, "{}", day.format("%a %Y-%m-%d"));
        for event in day_events {
            let time = event
                .start
                .as_deref()
                .and_then(|s| s.split_once('T'))
                .map(|(_, t)| t.get(..5).unwrap_or(t))
                .unwrap_or("--:--");
            let _ = writeln!(
                out,
                "  {} [{}] {} (#{})",
                time,
                event.kind.as_deref().unwrap_or("event"),
                event.title.as_deref().unwrap_or("(untitled)"),
                event.id
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_event;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_parse_month_arg_valid() {
        let window = parse_month_arg("2026-10").unwrap();
        assert_eq!(window.start, date("2026-10-01"));
        assert_eq!(window.end, date("2026-10-31"));
    }

    #[test]
    fn test_parse_month_arg_invalid() {
        for bad in ["2026", "2026-13", "october", "2026-x"] {
            let err = parse_month_arg(bad).unwrap_err();
            assert!(err.to_string().contains("Invalid month"), "{}", bad);
        }
    }

    #[test]
    fn test_parse_date_arg_invalid() {
        let err = parse_date_arg("2026-02-30").unwrap_err();
        assert!(err.to_string().contains("2026-02-30"));
    }

    #[test]
    fn test_resolve_defaults_to_current_month() {
        let window = WindowArgs::default().resolve(date("2026-10-16")).unwrap();
        assert_eq!(window, EventWindow::month(2026, 10).unwrap());
    }

    #[test]
    fn test_resolve_custom_range() {
        let args = WindowArgs {
            start: Some("2026-10-05".to_string()),
            end: Some("2026-10-09".to_string()),
            ..Default::default()
        };
        let window = args.resolve(date("2026-01-01")).unwrap();
        assert_eq!(window.start, date("2026-10-05"));
        assert_eq!(window.end, date("2026-10-09"));
    }

    #[test]
    fn test_resolve_reversed_range_is_error() {
        let args = WindowArgs {
            start: Some("2026-10-09".to_string()),
            end: Some("2026-10-05".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            args.resolve(date("2026-01-01")),
            Err(CliError::ReversedWindow { .. })
        ));
    }

    #[test]
    fn test_consecutive_windows_cross_year() {
        let windows = consecutive_windows(EventWindow::month(2026, 11).unwrap(), 3).unwrap();
        let starts: Vec<_> = windows.iter().map(|w| w.start).collect();
        assert_eq!(
            starts,
            vec![date("2026-11-01"), date("2026-12-01"), date("2027-01-01")]
        );
    }

    #[test]
    fn test_consecutive_windows_zero_is_error() {
        let result = consecutive_windows(EventWindow::month(2026, 11).unwrap(), 0);
        assert!(matches!(result, Err(CliError::NoMonths)));
    }

    #[test]
    fn test_cli_parse_events_with_month() {
        let cli = Cli::parse_from(["staffcal", "events", "--month", "2026-10", "--refresh"]);
        match cli.command {
            Command::Events { window, refresh, months } => {
                assert_eq!(window.month.as_deref(), Some("2026-10"));
                assert!(refresh);
                assert_eq!(months, 1);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_respond() {
        let cli = Cli::parse_from(["staffcal", "respond", "12", "declined"]);
        match cli.command {
            Command::Respond { event_id, status, window } => {
                assert_eq!(event_id, 12);
                assert_eq!(status, InvitationStatus::Declined);
                assert!(window.month.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_month_with_start() {
        let result = Cli::try_parse_from([
            "staffcal", "events", "--month", "2026-10", "--start", "2026-10-01", "--end", "2026-10-02",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_rejects_start_without_end() {
        let result = Cli::try_parse_from(["staffcal", "events", "--start", "2026-10-01"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_rejects_unknown_status() {
        let result = Cli::try_parse_from(["staffcal", "respond", "12", "maybe"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_format_events_groups_by_day() {
        let events = vec![test_event(2, "2026-10-06"), test_event(1, "2026-10-05")];
        let window = EventWindow::month(2026, 10).unwrap();

        let out = format_events(&events, &window);

        let mon = out.find("2026-10-05").unwrap();
        let tue = out.find("2026-10-06").unwrap();
        assert!(mon < tue, "days should be in order:\n{}", out);
        assert!(out.contains("09:00 [meeting] Event 1 (#1)"));
    }

    #[test]
    fn test_format_events_untitled_event() {
        let mut event = test_event(3, "2026-10-07");
        event.title = None;
        event.kind = None;
        let window = EventWindow::month(2026, 10).unwrap();

        let out = format_events(&[event], &window);

        assert!(out.contains("09:00 [event] (untitled) (#3)"), "{}", out);
    }

    #[test]
    fn test_format_events_empty() {
        let window = EventWindow::month(2026, 10).unwrap();
        assert!(format_events(&[], &window).contains("(no events)"));
    }
}
