//! Session and worker configuration
//!
//! Plain structs with sensible defaults. `from_env()` picks up overrides from
//! `BLUELINE_HELPER`, `BLUELINE_HCI` and `BLUELINE_TIMEOUT_SECS`.

use log::warn;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_HELPER: &str = "BLUELINE_HELPER";
pub const ENV_HCI: &str = "BLUELINE_HCI";
pub const ENV_TIMEOUT_SECS: &str = "BLUELINE_TIMEOUT_SECS";

pub const DEFAULT_HELPER_PATH: &str = "blueline-helper";
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_DISCONNECT_GRACE: Duration = Duration::from_secs(1);
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

/// How to launch the privileged helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub helper_path: PathBuf,
    /// Controller index, `hci<N>`
    pub iface: u16,
    /// How long `quit` is given before the helper is killed
    pub shutdown_grace: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            helper_path: PathBuf::from(DEFAULT_HELPER_PATH),
            iface: 0,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        Self::default().apply_env(|key| env::var(key).ok())
    }

    pub fn with_helper_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.helper_path = path.into();
        self
    }

    pub fn with_iface(mut self, iface: u16) -> Self {
        self.iface = iface;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn iface_name(&self) -> String {
        format!("hci{}", self.iface)
    }

    fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = lookup(ENV_HELPER) {
            self.helper_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup(ENV_HCI) {
            match parse_iface(&raw) {
                Some(iface) => self.iface = iface,
                None => warn!("Ignoring {}={:?}: not an interface index", ENV_HCI, raw),
            }
        }
        self
    }
}

/// Timeouts for one peripheral session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Bound on every request/reply exchange after connect
    pub command_timeout: Duration,
    pub connect_timeout: Duration,
    /// How long `disconnect` waits for the worker's acknowledgement
    pub disconnect_grace: Duration,
    pub worker: WorkerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            disconnect_grace: DEFAULT_DISCONNECT_GRACE,
            worker: WorkerConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = SessionConfig {
            worker: WorkerConfig::default().apply_env(&lookup),
            ..Default::default()
        };
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.command_timeout = Duration::from_secs(secs),
                _ => warn!("Ignoring {}={:?}: not a positive number", ENV_TIMEOUT_SECS, raw),
            }
        }
        config
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_disconnect_grace(mut self, grace: Duration) -> Self {
        self.disconnect_grace = grace;
        self
    }

    pub fn with_worker(mut self, worker: WorkerConfig) -> Self {
        self.worker = worker;
        self
    }
}

/// Accepts `0` as well as `hci0`.
pub fn parse_iface(raw: &str) -> Option<u16> {
    let raw = raw.trim();
    raw.strip_prefix("hci").unwrap_or(raw).parse().ok()
}
