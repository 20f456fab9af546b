use super::entry::{AdvertisingReport, ScanEntry};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::gap::{AddressType, BdAddr};
use crate::protocol::{Record, Tag};
use crate::session::link::{Inbound, Link, LINK_DOWN};
use crate::session::SessionState;
use crate::worker::{Command, HelperProcess, ScanMode, Transport};
use log::{debug, info, trace, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Receives every advertising report merged into the result set.
pub trait ScanHandler: Send {
    fn handle_discovery(&mut self, entry: &ScanEntry, is_new_device: bool, is_new_data: bool);
}

impl<F> ScanHandler for F
where
    F: FnMut(&ScanEntry, bool, bool) + Send,
{
    fn handle_discovery(&mut self, entry: &ScanEntry, is_new_device: bool, is_new_data: bool) {
        self(entry, is_new_device, is_new_data)
    }
}

/// Drives a worker through an LE scan and collects what it hears.
///
/// A scanner owns one worker; [`Scanner::stop`] shuts it down for good.
pub struct Scanner<T: Transport = HelperProcess> {
    link: Link<T>,
    state: SessionState,
    mode: ScanMode,
    entries: BTreeMap<(BdAddr, AddressType), ScanEntry>,
    handler: Option<Box<dyn ScanHandler>>,
    config: SessionConfig,
}

impl Scanner<HelperProcess> {
    pub fn new(config: SessionConfig) -> Result<Self> {
        let helper = HelperProcess::spawn(&config.worker)?;
        Ok(Scanner::with_transport(helper, config))
    }
}

impl<T: Transport> Scanner<T> {
    pub fn with_transport(transport: T, config: SessionConfig) -> Self {
        Scanner {
            link: Link::new(transport),
            state: SessionState::Disconnected,
            mode: ScanMode::default(),
            entries: BTreeMap::new(),
            handler: None,
            config,
        }
    }

    pub fn with_handler(mut self, handler: impl ScanHandler + 'static) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    pub fn set_handler(&mut self, handler: impl ScanHandler + 'static) {
        self.handler = Some(Box::new(handler));
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn devices(&self) -> impl Iterator<Item = &ScanEntry> {
        self.entries.values()
    }

    pub fn device(&self, addr: &BdAddr, addr_type: AddressType) -> Option<&ScanEntry> {
        self.entries.get(&(*addr, addr_type))
    }

    /// Starts scanning. A controller that is still busy with an earlier scan
    /// gets a `scanend` and one more attempt.
    pub fn start(&mut self, mode: ScanMode) -> Result<()> {
        if self.link.is_closed() {
            return Err(Error::InvalidState {
                operation: "scan",
                state: "closed",
            });
        }
        if self.state != SessionState::Disconnected {
            return Err(Error::InvalidState {
                operation: "scan",
                state: self.state.as_str(),
            });
        }

        self.mode = mode;
        let result = self.request_scan(mode);
        self.check_link(result)?;

        info!("Scanning ({}) on {}", mode, self.config.worker.iface_name());
        self.state = SessionState::Scanning;
        Ok(())
    }

    fn request_scan(&mut self, mode: ScanMode) -> Result<()> {
        let timeout = self.config.command_timeout;
        match self.link.request(&Command::scan(mode), timeout) {
            Ok(_) => Ok(()),
            Err(Error::Peer { code, .. }) if code == "busy" => {
                info!("Controller busy, ending the previous scan");
                self.end_previous_scan(timeout)?;
                self.link
                    .request(&Command::scan(mode), timeout)
                    .map(|_| ())
                    .map_err(management)
            }
            Err(e) => Err(management(e)),
        }
    }

    /// A transport failure ends the scan and releases the worker before the
    /// error reaches the caller.
    fn check_link<R>(&mut self, result: Result<R>) -> Result<R> {
        if let Err(e) = &result {
            if e.is_transport() {
                warn!("Lost the worker while scanning: {}", e);
                self.link.close();
                self.state = SessionState::Disconnected;
            }
        }
        result
    }

    /// `scanend` is acknowledged with a reply or with the link going down.
    fn end_previous_scan(&mut self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        self.link.begin(&Command::scan_end())?;
        let result = loop {
            match self.link.poll(deadline)? {
                Inbound::Reply(record) if record.tag() == Tag::Error => {
                    break Err(Error::Management(format!("scanend refused: {}", record)));
                }
                Inbound::Reply(_) => break Ok(()),
                Inbound::Status(record) if record.state() == Some(LINK_DOWN) => break Ok(()),
                Inbound::Timeout => break Err(Error::Timeout(timeout)),
                Inbound::Status(_) | Inbound::Advertisement(_) | Inbound::Event => {}
            }
        };
        self.link.finish();
        result
    }

    /// Collects advertising reports until `timeout` passes.
    pub fn process(&mut self, timeout: Duration) -> Result<()> {
        if self.state != SessionState::Scanning {
            return Err(Error::InvalidState {
                operation: "process",
                state: self.state.as_str(),
            });
        }

        let result = self.collect(timeout);
        self.check_link(result)
    }

    fn collect(&mut self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.link.poll(deadline)? {
                Inbound::Timeout => return Ok(()),
                Inbound::Advertisement(record) => match self.merge(&record) {
                    Err(Error::Protocol(msg)) => warn!("Dropping advertising report: {}", msg),
                    other => other?,
                },
                Inbound::Status(record) => {
                    if record.state() == Some(LINK_DOWN) && self.link.pending().is_none() {
                        debug!("Controller ended the scan, restarting");
                        self.link.begin(&Command::scan(self.mode))?;
                    }
                }
                // Only the restart above leaves a command outstanding.
                Inbound::Reply(record) => {
                    self.link.finish();
                    if record.tag() == Tag::Error {
                        return Err(Error::Management(format!(
                            "scan restart refused: {}",
                            record
                        )));
                    }
                }
                Inbound::Event => {
                    self.link.dispatcher.clear();
                }
            }
        }
    }

    fn merge(&mut self, record: &Record) -> Result<()> {
        let report = AdvertisingReport::from_record(record)?;
        trace!("Report from {}", report.addr);

        let iface = self.config.worker.iface;
        let entry = self
            .entries
            .entry((report.addr, report.addr_type))
            .or_insert_with(|| ScanEntry::new(report.addr, iface));
        let is_new_data = entry.update(&report)?;
        let is_new_device = entry.update_count <= 1;
        if is_new_device {
            debug!("Discovered {}", entry);
        }

        if let Some(handler) = self.handler.as_mut() {
            handler.handle_discovery(entry, is_new_device, is_new_data);
        }
        Ok(())
    }

    /// Ends the scan, stops the worker and returns what was found.
    pub fn stop(&mut self) -> Vec<ScanEntry> {
        self.shut_down();
        self.entries.values().cloned().collect()
    }

    fn shut_down(&mut self) {
        self.link.finish();
        if self.state == SessionState::Scanning && !self.link.is_closed() {
            self.link
                .say_goodbye(&Command::scan_end(), self.config.disconnect_grace);
        }
        self.link.close();
        self.state = SessionState::Disconnected;
    }

    /// Fresh scan for `timeout`: clear, start, process, stop.
    pub fn scan(&mut self, timeout: Duration, mode: ScanMode) -> Result<Vec<ScanEntry>> {
        self.clear();
        self.start(mode)?;
        if let Err(e) = self.process(timeout) {
            self.shut_down();
            return Err(e);
        }
        Ok(self.stop())
    }
}

fn management(e: Error) -> Error {
    match e {
        Error::Gatt { .. } | Error::Peer { .. } => Error::Management(e.to_string()),
        other => other,
    }
}

impl<T: Transport> Drop for Scanner<T> {
    fn drop(&mut self) {
        self.shut_down();
    }
}

impl<T: Transport> fmt::Debug for Scanner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scanner")
            .field("state", &self.state)
            .field("mode", &self.mode)
            .field("devices", &self.entries.len())
            .finish()
    }
}
