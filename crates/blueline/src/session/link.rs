use crate::att::{ATT_DEFAULT_MTU, ATT_ERROR_ATTRIBUTE_NOT_FOUND};
use crate::error::{Error, Result};
use crate::notify::{Dispatcher, Notification};
use crate::protocol::{classify, parse_number, Record, Tag};
use crate::worker::{Command, Transport};
use log::{debug, trace, warn};
use std::time::{Duration, Instant};

/// Link state the worker reports once the connection is gone.
pub(crate) const LINK_DOWN: &str = "disc";

/// What one read from the worker turned into.
#[derive(Debug)]
pub(crate) enum Inbound {
    /// `rsp`, `err` or `done` for the pending command
    Reply(Record),
    /// A notification or indication was queued on the dispatcher
    Event,
    Status(Record),
    Advertisement(Record),
    /// The deadline passed with nothing to read
    Timeout,
}

/// The single reader of a worker's output.
///
/// Holds the transport, the pending-command slot and the notification queue.
/// Callers get exclusive access through the session's link mutex, which is
/// what keeps at most one command outstanding.
pub(crate) struct Link<T: Transport> {
    transport: T,
    pub(crate) dispatcher: Dispatcher,
    pending: Option<&'static str>,
    mtu: u16,
    closed: bool,
}

/// Maps an `err` record onto the error taxonomy. Numeric codes are ATT codes.
pub(crate) fn error_from_record(record: &Record) -> Error {
    let code = record.first("code").unwrap_or("unknown");
    match parse_number(code).and_then(|n| u8::try_from(n).ok()) {
        Some(raw) => Error::gatt(raw),
        None => Error::Peer {
            code: code.to_string(),
            message: record.first("msg").map(str::to_string),
        },
    }
}

impl<T: Transport> Link<T> {
    pub fn new(transport: T) -> Self {
        Link {
            transport,
            dispatcher: Dispatcher::new(),
            pending: None,
            mtu: ATT_DEFAULT_MTU,
            closed: false,
        }
    }

    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Keyword of the command still waiting for its reply.
    pub fn pending(&self) -> Option<&'static str> {
        self.pending
    }

    /// Writes a command and marks it outstanding.
    pub fn begin(&mut self, command: &Command) -> Result<()> {
        if self.closed {
            return Err(Error::Transport("worker has been shut down".into()));
        }
        if let Some(pending) = self.pending {
            return Err(Error::InvalidState {
                operation: command.keyword(),
                state: pending,
            });
        }
        self.transport.send(&command.to_string())?;
        self.pending = Some(command.keyword());
        Ok(())
    }

    /// Sends a command that the worker never answers.
    pub fn send_only(&mut self, command: &Command) -> Result<()> {
        self.begin(command)?;
        self.pending = None;
        Ok(())
    }

    pub fn finish(&mut self) {
        self.pending = None;
    }

    /// Reads and routes lines until something needs the caller's attention.
    pub fn poll(&mut self, deadline: Instant) -> Result<Inbound> {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let line = match self.transport.read_line(remaining)? {
                Some(line) => line,
                None => return Ok(Inbound::Timeout),
            };

            let record = match classify(&line) {
                Ok(Some(record)) => record,
                Ok(None) => {
                    trace!("Worker: {}", line.trim());
                    continue;
                }
                Err(e) => {
                    warn!("Discarding worker line {:?}: {}", line.trim(), e);
                    continue;
                }
            };

            if let Some(mtu) = record.mtu() {
                if mtu != self.mtu {
                    debug!("MTU is now {}", mtu);
                    self.mtu = mtu;
                }
            }

            match record.tag() {
                Tag::Notification | Tag::Indication => match Notification::from_record(&record) {
                    Ok(Some(notification)) => {
                        trace!("Queued {}", notification);
                        self.dispatcher.push(notification);
                        return Ok(Inbound::Event);
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Discarding {}: {}", record, e),
                },
                Tag::Status => return Ok(Inbound::Status(record)),
                Tag::Advertisement => return Ok(Inbound::Advertisement(record)),
                Tag::Reply | Tag::Error | Tag::DiscoveryComplete => {
                    if self.pending.is_some() {
                        return Ok(Inbound::Reply(record));
                    }
                    warn!("Discarding reply with no command waiting: {}", record);
                }
            }
        }
    }

    /// Routes whatever is already buffered before a new command goes out.
    pub fn drain(&mut self) -> Result<()> {
        loop {
            match self.poll(Instant::now())? {
                Inbound::Timeout => return Ok(()),
                Inbound::Status(record) => check_link_status(&record)?,
                Inbound::Advertisement(record) => debug!("Ignoring {}", record),
                Inbound::Event | Inbound::Reply(_) => {}
            }
        }
    }

    /// Waits for the next reply to the pending command. `err` records come
    /// back as errors; `rsp` and `done` as records.
    pub fn await_reply(&mut self, deadline: Instant, timeout: Duration) -> Result<Record> {
        loop {
            match self.poll(deadline)? {
                Inbound::Reply(record) if record.tag() == Tag::Error => {
                    return Err(error_from_record(&record));
                }
                Inbound::Reply(record) => return Ok(record),
                Inbound::Status(record) => check_link_status(&record)?,
                Inbound::Advertisement(record) => debug!("Ignoring {}", record),
                Inbound::Event => {}
                Inbound::Timeout => return Err(Error::Timeout(timeout)),
            }
        }
    }

    /// One command, one reply.
    pub fn request(&mut self, command: &Command, timeout: Duration) -> Result<Record> {
        self.begin(command)?;
        let result = self.await_reply(Instant::now() + timeout, timeout);
        self.finish();
        result
    }

    /// Issues a discovery command and collects `rsp` records until `done`.
    ///
    /// The timeout applies to each record separately. An "attribute not
    /// found" error ends the stream like `done` does.
    pub fn discover(&mut self, command: &Command, timeout: Duration) -> Result<Vec<Record>> {
        self.begin(command)?;
        let mut records = Vec::new();
        let result = loop {
            match self.await_reply(Instant::now() + timeout, timeout) {
                Ok(record) if record.tag() == Tag::DiscoveryComplete => break Ok(records),
                Ok(record) => records.push(record),
                Err(Error::Gatt { raw, .. }) if raw == ATT_ERROR_ATTRIBUTE_NOT_FOUND => {
                    break Ok(records)
                }
                Err(e) => break Err(e),
            }
        };
        self.finish();
        result
    }

    /// Drives `connect` to a final answer within `timeout`.
    pub fn connect(&mut self, command: &Command, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        self.begin(command)?;
        let result = loop {
            match self.await_reply(deadline, timeout) {
                Ok(record) => match record.state() {
                    Some("conn") => break Ok(()),
                    Some("tryconn") => debug!("Connection attempt in progress"),
                    Some(LINK_DOWN) => break Err(Error::Connection("peer disconnected".into())),
                    _ => {
                        break Err(Error::Protocol(format!(
                            "unexpected reply to connect: {}",
                            record
                        )))
                    }
                },
                Err(e @ (Error::Gatt { .. } | Error::Peer { .. })) => {
                    break Err(Error::Connection(e.to_string()))
                }
                Err(Error::ConnectionLost(reason)) => break Err(Error::Connection(reason)),
                Err(e) => break Err(e),
            }
        };
        self.finish();
        result
    }

    /// Waits for events. Returns true once at least one has been delivered.
    pub fn wait_for_notifications(&mut self, timeout: Duration) -> Result<bool> {
        if self.dispatcher.deliver_all() > 0 {
            return Ok(true);
        }
        let deadline = Instant::now() + timeout;
        loop {
            match self.poll(deadline)? {
                Inbound::Event => {
                    self.dispatcher.deliver_all();
                    return Ok(true);
                }
                Inbound::Timeout => return Ok(false),
                Inbound::Status(record) => check_link_status(&record)?,
                Inbound::Advertisement(record) => debug!("Ignoring {}", record),
                Inbound::Reply(_) => {}
            }
        }
    }

    /// Shuts the worker down and drops undelivered events. Idempotent.
    pub fn close(&mut self) {
        self.pending = None;
        let dropped = self.dispatcher.clear();
        if dropped > 0 {
            warn!("Dropped {} undelivered notifications", dropped);
        }
        if !self.closed {
            self.closed = true;
            if let Err(e) = self.transport.shutdown() {
                warn!("Worker shutdown failed: {}", e);
            }
        }
    }

    /// Best-effort goodbye: the reply is awaited for `grace` at most.
    pub fn say_goodbye(&mut self, command: &Command, grace: Duration) {
        match self.request(command, grace) {
            Ok(_) => {}
            Err(e) => debug!("No acknowledgement for {}: {}", command.keyword(), e),
        }
    }
}

/// `stat state=disc` means the link is gone.
pub(crate) fn check_link_status(record: &Record) -> Result<()> {
    match record.state() {
        Some(LINK_DOWN) => Err(Error::ConnectionLost(
            "worker reported the link down".into(),
        )),
        state => {
            debug!("Link status {:?}", state);
            Ok(())
        }
    }
}
