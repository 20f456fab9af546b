//! LE scanning
//!
//! The worker reports every advertisement it hears as an `adv` record:
//!
//! ```text
//! adv addr=c4:7c:8d:6a:3e:01 type=1 rssi=67 flags=0 d=020106090948756d6964697479
//! ```
//!
//! `rssi` is the positive magnitude and `d` the raw advertising data.
//! [`Scanner`] merges reports by address into [`ScanEntry`] records.

mod entry;
mod scanner;

#[cfg(test)]
mod tests;

pub use entry::{parse_advertising_data, AdValue, AdvertisingReport, ScanEntry};
pub use scanner::{ScanHandler, Scanner};
pub use crate::worker::ScanMode;
