//! Synchronization controller and the seams it drives
//!
//! The controller consumes [`StreamEvent`]s from a bidirectional message stream
//! and writes subscribe/unsubscribe requests back through a [`MessageSink`].

mod controller;
mod throttle;

pub use controller::{SyncController, SyncState};
pub use throttle::Throttle;

use tokio::sync::mpsc;

use crate::error::{Result, SyncError};

/// Lifecycle and data events reported by the message stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The stream reached the open state
    Opened,
    /// One inbound text frame
    Message(String),
    /// The stream closed, for any reason
    Closed,
}

/// Outbound half of the message stream
#[cfg_attr(test, mockall::automock)]
pub trait MessageSink: Send {
    fn send_text(&self, text: String) -> Result<()>;
}

impl MessageSink for mpsc::UnboundedSender<String> {
    fn send_text(&self, text: String) -> Result<()> {
        self.send(text).map_err(|_| SyncError::ChannelClosed)
    }
}
