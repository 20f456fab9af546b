use crate::gap::constants::*;
use std::fmt;
use std::str::FromStr;

/// LE address type, as the worker names it on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum AddressType {
    #[default]
    Public,
    Random,
}

impl AddressType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressType::Public => "public",
            AddressType::Random => "random",
        }
    }

    /// Maps the numeric type carried in an advertising report.
    pub fn from_report(value: u8) -> Option<Self> {
        match value {
            REPORT_ADDRESS_PUBLIC => Some(AddressType::Public),
            REPORT_ADDRESS_RANDOM => Some(AddressType::Random),
            _ => None,
        }
    }
}

impl FromStr for AddressType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(AddressType::Public),
            "random" => Ok(AddressType::Random),
            other => Err(format!(
                "expected address type public or random, got {:?}",
                other
            )),
        }
    }
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A Bluetooth device address.
///
/// Bytes are kept in controller (little-endian) order; the text form is the
/// usual most-significant-octet-first `AA:BB:CC:DD:EE:FF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BdAddr {
    pub bytes: [u8; 6],
}

impl BdAddr {
    pub fn new(bytes: [u8; 6]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() >= 6 {
            let mut bytes = [0u8; 6];
            bytes.copy_from_slice(&slice[0..6]);
            Some(Self { bytes })
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl FromStr for BdAddr {
    type Err = String;

    /// Accepts `AA:BB:CC:DD:EE:FF` (any case) and the bare 12-digit hex form
    /// the worker uses in advertising reports.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = if s.contains(':') {
            let octets: Vec<&str> = s.split(':').collect();
            if octets.len() != 6 || octets.iter().any(|o| o.len() != 2) {
                return Err(format!("expected MAC address, got {:?}", s));
            }
            octets.concat()
        } else {
            s.to_string()
        };

        let mut be = [0u8; 6];
        hex::decode_to_slice(&digits, &mut be)
            .map_err(|_| format!("expected MAC address, got {:?}", s))?;
        be.reverse();
        Ok(BdAddr { bytes: be })
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.bytes[5],
            self.bytes[4],
            self.bytes[3],
            self.bytes[2],
            self.bytes[1],
            self.bytes[0]
        )
    }
}
