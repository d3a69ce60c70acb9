//! Refresh notifications from the cache to whatever is displaying events
//!
//! Background revalidation finishes after `load` has already returned, so
//! its results reach the view through a tokio channel. The view owns a
//! [`RefreshHandle`]; dropping it marks the view as disposed, after which
//! the cache stops sending to it.

use tokio::sync::mpsc;
use tracing::debug;

use crate::data::{Event, EventWindow};

/// Default channel capacity
const DEFAULT_CAPACITY: usize = 32;

/// Messages sent from the cache to the view
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshMessage {
    /// A foreground fetch started for a window the view asked to indicate
    LoadingStarted(EventWindow),
    /// The foreground fetch for that window finished (successfully or not)
    LoadingFinished(EventWindow),
    /// A background revalidation stored new events for a window
    WindowRevalidated {
        window: EventWindow,
        events: Vec<Event>,
    },
    /// A background revalidation failed; the cached entry is unchanged
    RevalidationFailed { window: EventWindow, error: String },
}

/// Sending side, held by the cache
#[derive(Debug, Clone)]
pub struct RefreshNotifier {
    sender: mpsc::Sender<RefreshMessage>,
}

impl RefreshNotifier {
    /// Whether the view is still listening
    pub fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Delivers `message` if the view is alive
    ///
    /// Never waits: a full channel drops the message, since the next read
    /// sees the stored entry anyway.
    pub fn notify(&self, message: RefreshMessage) {
        if !self.is_alive() {
            debug!("View disposed, skipping refresh notification");
            return;
        }
        if let Err(e) = self.sender.try_send(message) {
            debug!(error = %e, "Dropping refresh notification");
        }
    }
}

/// Receiving side, held by the view
pub struct RefreshHandle {
    /// Channel for receiving refresh messages
    pub receiver: mpsc::Receiver<RefreshMessage>,
}

impl RefreshHandle {
    /// Creates a connected notifier/handle pair
    pub fn channel() -> (RefreshNotifier, RefreshHandle) {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (RefreshNotifier, RefreshHandle) {
        let (sender, receiver) = mpsc::channel(capacity);
        (RefreshNotifier { sender }, RefreshHandle { receiver })
    }

    /// Waits for the next message
    ///
    /// Returns `None` once every notifier is gone.
    pub async fn recv(&mut self) -> Option<RefreshMessage> {
        self.receiver.recv().await
    }

    /// Checks for a pending message without blocking
    pub fn try_recv(&mut self) -> Option<RefreshMessage> {
        self.receiver.try_recv().ok()
    }
}
