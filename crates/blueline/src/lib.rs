//! Blueline - A Rust client engine for Bluetooth LE peripherals
//!
//! The radio work is done by a privileged helper process that speaks a line
//! protocol on its standard streams. This library drives that helper: it
//! correlates commands with replies, builds the GATT object model from
//! discovery results, runs the connection state machine and delivers
//! notifications. [`Peripheral`] is the GATT client, [`Scanner`] collects
//! advertising reports.
//!
//! ```no_run
//! use blueline::{Peripheral, SessionConfig};
//!
//! let peripheral = Peripheral::connect_to("C4:7C:8D:6A:3E:01", "public", SessionConfig::from_env())?;
//! for service in peripheral.services()? {
//!     println!("{}", service);
//! }
//! # Ok::<(), blueline::Error>(())
//! ```

pub mod assigned;
pub mod att;
pub mod config;
pub mod error;
pub mod gap;
pub mod gatt;
pub mod notify;
pub mod protocol;
pub mod scan;
pub mod session;
pub mod uuid;
pub mod worker;

// Re-export common types for convenience
pub use assigned::UuidNames;
pub use att::AttErrorCode;
pub use config::{SessionConfig, WorkerConfig};
pub use error::{Error, Result};
pub use gap::{AddressType, BdAddr};
pub use gatt::{Characteristic, CharacteristicProperties, Descriptor, Service};
pub use notify::{Notification, NotificationHandler, NotificationKind};
pub use scan::{AdValue, ScanEntry, ScanHandler, Scanner};
pub use session::{Peripheral, SessionState};
pub use uuid::Uuid;
pub use worker::{HelperProcess, ScanMode, SecurityLevel, Transport};
