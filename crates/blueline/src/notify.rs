//! Asynchronous notification delivery
//!
//! Notifications and indications arrive on the same stream as command replies.
//! The session routes them here; they wait in arrival order until the caller
//! asks for them with `wait_for_notifications`.

use crate::error::Result;
use crate::protocol::{Record, Tag};
use log::debug;
use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Notification,
    /// Acknowledged by the worker before it is forwarded
    Indication,
}

/// A value pushed by the peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub handle: u16,
    pub value: Vec<u8>,
    pub kind: NotificationKind,
}

impl Notification {
    /// Builds an event from an `ntfy` or `ind` record.
    pub fn from_record(record: &Record) -> Result<Option<Self>> {
        let kind = match record.tag() {
            Tag::Notification => NotificationKind::Notification,
            Tag::Indication => NotificationKind::Indication,
            _ => return Ok(None),
        };
        Ok(Some(Notification {
            handle: record.handle("hnd")?,
            value: record.bytes("d")?,
            kind,
        }))
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            NotificationKind::Notification => "notification",
            NotificationKind::Indication => "indication",
        };
        write!(f, "{} 0x{:04x}: {}", kind, self.handle, hex::encode(&self.value))
    }
}

/// Receives notification events.
///
/// Handlers run on the thread that called `wait_for_notifications`, with the
/// session's command link held: issuing a command from inside a handler fails
/// with `Error::Busy`.
pub trait NotificationHandler: Send {
    fn handle_notification(&mut self, notification: &Notification);
}

impl<F> NotificationHandler for F
where
    F: FnMut(&Notification) + Send,
{
    fn handle_notification(&mut self, notification: &Notification) {
        self(notification)
    }
}

/// Handler installed until the caller provides one.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHandler;

impl NotificationHandler for LogHandler {
    fn handle_notification(&mut self, notification: &Notification) {
        debug!("Unhandled {}", notification);
    }
}

/// FIFO of undelivered events plus the handler they go to.
pub struct Dispatcher {
    queue: VecDeque<Notification>,
    handler: Box<dyn NotificationHandler>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Dispatcher {
            queue: VecDeque::new(),
            handler: Box::new(LogHandler),
        }
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_handler(&mut self, handler: Box<dyn NotificationHandler>) {
        self.handler = handler;
    }

    pub fn push(&mut self, notification: Notification) {
        self.queue.push_back(notification);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Hands every queued event to the handler in arrival order.
    /// Returns how many were delivered.
    pub fn deliver_all(&mut self) -> usize {
        let mut delivered = 0;
        while let Some(notification) = self.queue.pop_front() {
            self.handler.handle_notification(&notification);
            delivered += 1;
        }
        delivered
    }

    /// Drops undelivered events, returning how many were lost.
    pub fn clear(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("queued", &self.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::classify;
    use std::sync::{Arc, Mutex};

    fn event(handle: u16, value: &[u8]) -> Notification {
        Notification {
            handle,
            value: value.to_vec(),
            kind: NotificationKind::Notification,
        }
    }

    #[test]
    fn test_from_record() {
        let record = classify("ind hnd=0x0010 d=beef").unwrap().unwrap();
        let n = Notification::from_record(&record).unwrap().unwrap();
        assert_eq!(n.handle, 0x10);
        assert_eq!(n.value, vec![0xbe, 0xef]);
        assert_eq!(n.kind, NotificationKind::Indication);
        assert_eq!(n.to_string(), "indication 0x0010: beef");

        let reply = classify("rsp d=00").unwrap().unwrap();
        assert!(Notification::from_record(&reply).unwrap().is_none());
        let broken = classify("ntfy d=00").unwrap().unwrap();
        assert!(Notification::from_record(&broken).is_err());
    }

    #[test]
    fn test_delivery_preserves_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut dispatcher = Dispatcher::new();
        dispatcher.set_handler(Box::new(move |n: &Notification| {
            sink.lock().unwrap().push(n.value[0]);
        }));

        for i in 0..5u8 {
            dispatcher.push(event(0x2a, &[i]));
        }
        assert_eq!(dispatcher.len(), 5);
        assert_eq!(dispatcher.deliver_all(), 5);
        assert!(dispatcher.is_empty());
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(dispatcher.deliver_all(), 0);
    }

    #[test]
    fn test_clear_reports_dropped() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.push(event(1, &[]));
        dispatcher.push(event(2, &[]));
        assert_eq!(dispatcher.clear(), 2);
        assert_eq!(dispatcher.deliver_all(), 0);
    }
}
