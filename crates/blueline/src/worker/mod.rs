//! Privileged worker transport
//!
//! The radio work happens in a separate helper process that needs raw network
//! capabilities. This module owns that process and moves text lines in and
//! out of it; interpreting those lines is left to [`crate::protocol`].

pub mod command;
mod process;

#[cfg(test)]
pub(crate) mod mock;

pub use command::{Command, ScanMode, SecurityLevel};
pub use process::HelperProcess;

use crate::error::Result;
use std::time::Duration;

/// A bidirectional line channel to the worker.
pub trait Transport: Send {
    /// Writes one command line. The newline is appended here.
    fn send(&mut self, line: &str) -> Result<()>;

    /// Blocks for at most `timeout` waiting for one complete line.
    ///
    /// `Ok(None)` means the timeout elapsed with nothing to read. A zero
    /// timeout only returns what is already buffered.
    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>>;

    /// Asks the worker to quit, forcing it down after a grace period.
    /// Calling it again is a no-op.
    fn shutdown(&mut self) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, line: &str) -> Result<()> {
        (**self).send(line)
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<String>> {
        (**self).read_line(timeout)
    }

    fn shutdown(&mut self) -> Result<()> {
        (**self).shutdown()
    }
}
