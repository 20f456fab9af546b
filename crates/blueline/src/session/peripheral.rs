use super::discovery;
use super::link::Link;
use super::SessionState;
use crate::att::{
    ATT_DEFAULT_MTU, ATT_HANDLE_MAX, ATT_HANDLE_MIN, CCCD_INDICATE, CCCD_NOTIFY,
    CLIENT_CHAR_CONFIG_UUID,
};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::gap::{AddressType, BdAddr};
use crate::gatt::{Characteristic, Descriptor, DiscoveryCache, Service};
use crate::notify::NotificationHandler;
use crate::protocol::Record;
use crate::uuid::Uuid;
use crate::worker::{Command, HelperProcess, SecurityLevel, Transport};
use log::{debug, info, warn};
use std::fmt;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{
    Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError,
};
use std::time::Duration;

#[derive(Debug, Default)]
struct Lifecycle {
    state: SessionState,
    target: Option<(BdAddr, AddressType)>,
    connected_once: bool,
}

/// A GATT client session with one peripheral.
///
/// Every method takes `&self`; the session can be shared between threads.
/// Only one command is ever outstanding: a call made while another one is
/// waiting on the worker fails with [`Error::Busy`] instead of queueing.
/// Cached discovery results can be read concurrently.
///
/// A session connects at most once. Dropping it disconnects and stops the
/// worker.
pub struct Peripheral<T: Transport = HelperProcess> {
    link: Mutex<Link<T>>,
    cache: RwLock<DiscoveryCache>,
    lifecycle: Mutex<Lifecycle>,
    mtu: AtomicU16,
    config: SessionConfig,
}

fn parse_target(address: &str, addr_type: &str) -> Result<(BdAddr, AddressType)> {
    let addr = address.parse::<BdAddr>().map_err(Error::InvalidArgument)?;
    let addr_type = addr_type
        .parse::<AddressType>()
        .map_err(Error::InvalidArgument)?;
    Ok((addr, addr_type))
}

impl Peripheral<HelperProcess> {
    /// Starts a worker and returns a session that is not yet connected.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let helper = HelperProcess::spawn(&config.worker)?;
        Ok(Peripheral::with_transport(helper, config))
    }

    /// Starts a worker and connects it to `address`.
    pub fn connect_to(address: &str, addr_type: &str, config: SessionConfig) -> Result<Self> {
        let (addr, addr_type) = parse_target(address, addr_type)?;
        let peripheral = Peripheral::new(config)?;
        peripheral.connect_addr(&addr, addr_type)?;
        Ok(peripheral)
    }
}

impl<T: Transport> Peripheral<T> {
    pub fn with_transport(transport: T, config: SessionConfig) -> Self {
        Peripheral {
            link: Mutex::new(Link::new(transport)),
            cache: RwLock::new(DiscoveryCache::new()),
            lifecycle: Mutex::new(Lifecycle::default()),
            mtu: AtomicU16::new(ATT_DEFAULT_MTU),
            config,
        }
    }

    pub fn with_handler(mut self, handler: impl NotificationHandler + 'static) -> Self {
        self.link
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .dispatcher
            .set_handler(Box::new(handler));
        self
    }

    /// Replaces the notification handler. Fails with `Busy` while a command
    /// or a notification wait is in progress.
    pub fn set_notification_handler(
        &self,
        handler: impl NotificationHandler + 'static,
    ) -> Result<()> {
        self.lock_link()?
            .dispatcher
            .set_handler(Box::new(handler));
        Ok(())
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.lifecycle().state
    }

    pub fn address(&self) -> Option<BdAddr> {
        self.lifecycle().target.map(|(addr, _)| addr)
    }

    pub fn address_type(&self) -> Option<AddressType> {
        self.lifecycle().target.map(|(_, addr_type)| addr_type)
    }

    /// Last MTU the worker reported.
    pub fn mtu(&self) -> u16 {
        self.mtu.load(Ordering::Relaxed)
    }

    // --- Locking ---

    fn lock_link(&self) -> Result<MutexGuard<'_, Link<T>>> {
        match self.link.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => Err(Error::Busy),
            Err(TryLockError::Poisoned(e)) => Ok(e.into_inner()),
        }
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cache(&self) -> RwLockReadGuard<'_, DiscoveryCache> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn cache_mut(&self) -> RwLockWriteGuard<'_, DiscoveryCache> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs one exchange with the link held. Transport failures end the
    /// session and surface as `ConnectionLost`.
    fn with_link<R>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut Link<T>) -> Result<R>,
    ) -> Result<R> {
        let mut link = self.lock_link()?;
        let state = self.state();
        if state != SessionState::Connected {
            return Err(Error::InvalidState {
                operation,
                state: state.as_str(),
            });
        }

        let result = link.drain().and_then(|_| f(&mut *link));
        self.mtu.store(link.mtu(), Ordering::Relaxed);

        match result {
            Err(e) if e.is_transport() => {
                warn!("Connection lost during {}: {}", operation, e);
                self.teardown(&mut *link);
                Err(match e {
                    Error::ConnectionLost(_) => e,
                    other => Error::ConnectionLost(other.to_string()),
                })
            }
            other => other,
        }
    }

    fn teardown(&self, link: &mut Link<T>) {
        link.close();
        self.cache_mut().clear();
        self.lifecycle().state = SessionState::Disconnected;
    }

    /// Applies a discovery batch. A batch the cache refuses means the worker
    /// and the cache disagree about the attribute table, so the session ends.
    fn populate(
        &self,
        link: &mut Link<T>,
        update: impl FnOnce(&mut DiscoveryCache) -> Result<()>,
    ) -> Result<()> {
        let result = update(&mut *self.cache_mut());
        if let Err(e) = &result {
            warn!("Rejected discovery reply, closing session: {}", e);
            self.teardown(link);
        }
        result
    }

    // --- Connection ---

    /// Connects using the configured interface and connect timeout.
    /// `addr_type` is `public` or `random`.
    pub fn connect(&self, address: &str, addr_type: &str) -> Result<()> {
        let (addr, addr_type) = parse_target(address, addr_type)?;
        self.connect_addr(&addr, addr_type)
    }

    pub fn connect_addr(&self, addr: &BdAddr, addr_type: AddressType) -> Result<()> {
        self.connect_with(
            addr,
            addr_type,
            Some(self.config.worker.iface),
            self.config.connect_timeout,
        )
    }

    pub fn connect_with(
        &self,
        addr: &BdAddr,
        addr_type: AddressType,
        iface: Option<u16>,
        timeout: Duration,
    ) -> Result<()> {
        let mut link = self.lock_link()?;
        {
            let mut lifecycle = self.lifecycle();
            if lifecycle.connected_once || lifecycle.state != SessionState::Disconnected {
                let state = match lifecycle.state {
                    SessionState::Disconnected => "closed",
                    other => other.as_str(),
                };
                return Err(Error::InvalidState {
                    operation: "connect",
                    state,
                });
            }
            lifecycle.state = SessionState::Connecting;
        }

        info!("Connecting to {} ({})", addr, addr_type);
        let command = Command::connect(addr, addr_type, iface);
        let result = link.drain().and_then(|_| link.connect(&command, timeout));
        self.mtu.store(link.mtu(), Ordering::Relaxed);

        let mut lifecycle = self.lifecycle();
        match result {
            Ok(()) => {
                lifecycle.state = SessionState::Connected;
                lifecycle.connected_once = true;
                lifecycle.target = Some((*addr, addr_type));
                info!("Connected to {}", addr);
                Ok(())
            }
            Err(e) => {
                lifecycle.state = SessionState::Disconnected;
                drop(lifecycle);
                warn!("Failed to connect to {}: {}", addr, e);
                if e.is_transport() {
                    link.close();
                } else {
                    link.say_goodbye(&Command::disconnect(), self.config.disconnect_grace);
                }
                Err(e)
            }
        }
    }

    /// Ends the connection and stops the worker. Succeeds even if the worker
    /// is already gone.
    pub fn disconnect(&self) -> Result<()> {
        let mut link = self.lock_link()?;
        self.close(&mut *link);
        Ok(())
    }

    fn close(&self, link: &mut Link<T>) {
        let state = self.state();
        if state == SessionState::Connected && !link.is_closed() {
            link.say_goodbye(&Command::disconnect(), self.config.disconnect_grace);
        }
        self.teardown(link);
        if state != SessionState::Disconnected {
            info!("Disconnected from {:?}", self.address());
        }
    }

    // --- Discovery ---

    /// All primary services, discovering them on first use.
    pub fn services(&self) -> Result<Vec<Service>> {
        {
            let cache = self.cache();
            if cache.services_complete() {
                return Ok(cache.services());
            }
        }

        let timeout = self.config.command_timeout;
        self.with_link("services", |link| {
            let records = link.discover(&Command::services(None), timeout)?;
            let found = discovery::services(&records)?;
            self.populate(link, |cache| {
                cache.insert_services(&found)?;
                cache.mark_services_complete();
                Ok(())
            })?;
            debug!("Discovered {} services", found.len());
            Ok(self.cache().services())
        })
    }

    pub fn service_by_uuid(&self, uuid: &Uuid) -> Result<Service> {
        if let Some(service) = self.cache().service_by_uuid(uuid) {
            return Ok(service);
        }
        let complete = self.cache().services_complete();
        if !complete {
            self.services()?;
        }
        self.cache()
            .service_by_uuid(uuid)
            .ok_or_else(|| Error::NotFound(format!("service {}", uuid)))
    }

    fn fetch_characteristics(
        &self,
        operation: &'static str,
        start: u16,
        end: u16,
        uuid: Option<&Uuid>,
        mark: impl FnOnce(&mut DiscoveryCache),
    ) -> Result<Vec<Characteristic>> {
        let timeout = self.config.command_timeout;
        let command = Command::characteristics(start, end, uuid);
        self.with_link(operation, |link| {
            let records = link.discover(&command, timeout)?;
            let found = discovery::characteristics(&records)?;
            self.populate(link, |cache| {
                cache.insert_characteristics(&found)?;
                mark(cache);
                Ok(())
            })?;
            Ok(found)
        })
    }

    /// Every characteristic on the device.
    pub fn characteristics(&self) -> Result<Vec<Characteristic>> {
        {
            let cache = self.cache();
            if cache.all_characteristics_complete() {
                return Ok(cache.characteristics());
            }
        }
        self.fetch_characteristics(
            "characteristics",
            ATT_HANDLE_MIN,
            ATT_HANDLE_MAX,
            None,
            DiscoveryCache::mark_all_characteristics_complete,
        )?;
        Ok(self.cache().characteristics())
    }

    pub fn characteristics_of(&self, service: &Service) -> Result<Vec<Characteristic>> {
        {
            let cache = self.cache();
            if cache.characteristics_complete(service) {
                return Ok(cache.characteristics_in(service.start_handle, service.end_handle));
            }
        }
        self.fetch_characteristics(
            "characteristics",
            service.start_handle,
            service.end_handle,
            None,
            |cache| cache.mark_characteristics_complete(service),
        )?;
        Ok(self
            .cache()
            .characteristics_in(service.start_handle, service.end_handle))
    }

    pub fn characteristics_by_uuid(&self, uuid: &Uuid) -> Result<Vec<Characteristic>> {
        {
            let cache = self.cache();
            if cache.all_characteristics_complete() {
                return Ok(cache.characteristics_by_uuid(uuid));
            }
        }
        self.fetch_characteristics(
            "characteristics",
            ATT_HANDLE_MIN,
            ATT_HANDLE_MAX,
            Some(uuid),
            |_| {},
        )
    }

    /// Always asks the worker; the answer is cached but never marks a scope
    /// complete.
    pub fn characteristics_in_range(
        &self,
        start: u16,
        end: u16,
        uuid: Option<&Uuid>,
    ) -> Result<Vec<Characteristic>> {
        check_range(start, end)?;
        self.fetch_characteristics("characteristics", start, end, uuid, |_| {})
    }

    fn fetch_descriptors(
        &self,
        start: u16,
        end: u16,
        mark: impl FnOnce(&mut DiscoveryCache),
    ) -> Result<Vec<Descriptor>> {
        let timeout = self.config.command_timeout;
        self.with_link("descriptors", |link| {
            let records = link.discover(&Command::descriptors(start, end), timeout)?;
            let found = discovery::descriptors(&records)?;
            self.populate(link, |cache| {
                cache.insert_descriptors(&found)?;
                mark(cache);
                Ok(())
            })?;
            Ok(found)
        })
    }

    /// Every attribute the worker reports in the descriptor scan of the whole
    /// handle space, declarations included.
    pub fn descriptors(&self) -> Result<Vec<Descriptor>> {
        {
            let cache = self.cache();
            if cache.all_descriptors_complete() {
                return Ok(cache.descriptors());
            }
        }
        self.fetch_descriptors(
            ATT_HANDLE_MIN,
            ATT_HANDLE_MAX,
            DiscoveryCache::mark_all_descriptors_complete,
        )?;
        Ok(self.cache().descriptors())
    }

    pub fn descriptors_in_range(&self, start: u16, end: u16) -> Result<Vec<Descriptor>> {
        check_range(start, end)?;
        self.fetch_descriptors(start, end, |_| {})
    }

    /// Descriptors that follow `characteristic`'s value, up to the next
    /// declaration or the end of its service.
    pub fn descriptors_of(&self, characteristic: &Characteristic) -> Result<Vec<Descriptor>> {
        {
            let cache = self.cache();
            if cache.descriptors_complete(characteristic) {
                return Ok(cache.descriptors_of(characteristic));
            }
        }

        // The span ends at the next characteristic, so its neighbours must be known.
        let owner = self
            .cache()
            .service_containing(characteristic.declaration_handle)
            .cloned();
        if let Some(service) = owner {
            self.characteristics_of(&service)?;
        }

        let end = self.cache().descriptor_span_end(characteristic);
        match characteristic.value_handle.checked_add(1) {
            Some(start) if start <= end => {
                self.fetch_descriptors(start, end, |cache| {
                    cache.mark_descriptors_complete(characteristic)
                })?;
            }
            _ => self.cache_mut().mark_descriptors_complete(characteristic),
        }
        Ok(self.cache().descriptors_of(characteristic))
    }

    // --- Attribute access ---

    pub fn read_characteristic(&self, handle: u16) -> Result<Vec<u8>> {
        let timeout = self.config.command_timeout;
        self.with_link("read", |link| {
            link.request(&Command::read(handle), timeout)?.bytes("d")
        })
    }

    /// Without a response the call returns as soon as the command is written.
    pub fn write_characteristic(
        &self,
        handle: u16,
        value: &[u8],
        with_response: bool,
    ) -> Result<()> {
        let timeout = self.config.command_timeout;
        let command = Command::write(handle, value, with_response);
        self.with_link("write", |link| {
            if with_response {
                link.request(&command, timeout).map(|_| ())
            } else {
                link.send_only(&command)
            }
        })
    }

    fn write_cccd(&self, characteristic: &Characteristic, value: u16) -> Result<()> {
        let cccd = self
            .descriptors_of(characteristic)?
            .into_iter()
            .find(|d| d.uuid == CLIENT_CHAR_CONFIG_UUID)
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "client configuration descriptor of {}",
                    characteristic.uuid
                ))
            })?;
        self.write_characteristic(cccd.handle, &value.to_le_bytes(), true)
    }

    pub fn enable_notifications(&self, characteristic: &Characteristic) -> Result<()> {
        if !characteristic.properties.can_notify() {
            return Err(Error::InvalidArgument(format!(
                "characteristic {} does not support notifications",
                characteristic.uuid
            )));
        }
        self.write_cccd(characteristic, CCCD_NOTIFY)
    }

    pub fn enable_indications(&self, characteristic: &Characteristic) -> Result<()> {
        if !characteristic.properties.can_indicate() {
            return Err(Error::InvalidArgument(format!(
                "characteristic {} does not support indications",
                characteristic.uuid
            )));
        }
        self.write_cccd(characteristic, CCCD_INDICATE)
    }

    pub fn disable_notifications(&self, characteristic: &Characteristic) -> Result<()> {
        self.write_cccd(characteristic, 0)
    }

    /// Delivers queued notifications, or waits up to `timeout` for one.
    /// Returns false if nothing arrived.
    pub fn wait_for_notifications(&self, timeout: Duration) -> Result<bool> {
        self.with_link("wait_for_notifications", |link| {
            link.wait_for_notifications(timeout)
        })
    }

    // --- Link management ---

    /// The worker's view of the link (`state`, `mtu`, ...).
    pub fn status(&self) -> Result<Record> {
        let timeout = self.config.command_timeout;
        self.with_link("status", |link| link.request(&Command::status(), timeout))
    }

    /// Requests an MTU and returns the one in effect afterwards.
    pub fn set_mtu(&self, mtu: u16) -> Result<u16> {
        let timeout = self.config.command_timeout;
        self.with_link("mtu", |link| {
            link.request(&Command::mtu(mtu), timeout)?;
            Ok(link.mtu())
        })
    }

    pub fn set_security_level(&self, level: SecurityLevel) -> Result<()> {
        let timeout = self.config.command_timeout;
        self.with_link("security", |link| {
            link.request(&Command::security(level), timeout).map(|_| ())
        })
    }

    pub fn pair(&self) -> Result<()> {
        self.management("pair", Command::pair())
    }

    pub fn unpair(&self) -> Result<()> {
        self.management("unpair", Command::unpair())
    }

    fn management(&self, operation: &'static str, command: Command) -> Result<()> {
        let timeout = self.config.command_timeout;
        self.with_link(operation, |link| match link.request(&command, timeout) {
            Ok(_) => Ok(()),
            Err(e @ (Error::Gatt { .. } | Error::Peer { .. })) => {
                Err(Error::Management(format!("{} refused: {}", operation, e)))
            }
            Err(e) => Err(e),
        })
    }
}

fn check_range(start: u16, end: u16) -> Result<()> {
    if start == 0 || start > end {
        return Err(Error::InvalidArgument(format!(
            "invalid handle range 0x{:04x}..0x{:04x}",
            start, end
        )));
    }
    Ok(())
}

impl<T: Transport> Drop for Peripheral<T> {
    fn drop(&mut self) {
        let mut link = self.link.lock().unwrap_or_else(PoisonError::into_inner);
        self.close(&mut *link);
    }
}

impl<T: Transport> fmt::Debug for Peripheral<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lifecycle = self.lifecycle();
        f.debug_struct("Peripheral")
            .field("state", &lifecycle.state)
            .field("target", &lifecycle.target)
            .field("mtu", &self.mtu())
            .finish()
    }
}
