//! Peripheral sessions
//!
//! A session owns one worker process and drives it through the connection
//! lifecycle. Commands and their replies share a single ordered stream with
//! notifications; the [`Link`](link::Link) in the middle reads that stream,
//! keeps at most one command outstanding and parks events for later delivery.

mod discovery;
pub(crate) mod link;
mod peripheral;


pub use peripheral::Peripheral;

use std::fmt;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Only reachable through [`crate::scan::Scanner`]
    Scanning,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Scanning => "scanning",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
