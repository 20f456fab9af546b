//! Outgoing command lines
//!
//! A command is a keyword followed by `key=value` parameters. Handles are
//! always written as four hex digits and payloads as lowercase hex.

use crate::gap::{AddressType, BdAddr};
use crate::uuid::Uuid;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    keyword: &'static str,
    params: Vec<(&'static str, String)>,
}

impl Command {
    pub fn new(keyword: &'static str) -> Self {
        Command {
            keyword,
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.params.push((key, value.to_string()));
        self
    }

    pub fn handle(self, key: &'static str, handle: u16) -> Self {
        self.param(key, format!("{:04x}", handle))
    }

    pub fn keyword(&self) -> &'static str {
        self.keyword
    }

    pub fn connect(addr: &BdAddr, addr_type: AddressType, iface: Option<u16>) -> Self {
        let cmd = Command::new("connect")
            .param("addr", addr)
            .param("addrType", addr_type);
        match iface {
            Some(iface) => cmd.param("iface", format!("hci{}", iface)),
            None => cmd,
        }
    }

    pub fn disconnect() -> Self {
        Command::new("disconnect")
    }

    pub fn services(uuid: Option<&Uuid>) -> Self {
        let cmd = Command::new("services");
        match uuid {
            Some(uuid) => cmd.param("uuid", uuid),
            None => cmd,
        }
    }

    pub fn characteristics(start: u16, end: u16, uuid: Option<&Uuid>) -> Self {
        let cmd = Command::new("characteristics")
            .handle("start", start)
            .handle("end", end);
        match uuid {
            Some(uuid) => cmd.param("uuid", uuid),
            None => cmd,
        }
    }

    pub fn descriptors(start: u16, end: u16) -> Self {
        Command::new("descriptors")
            .handle("start", start)
            .handle("end", end)
    }

    pub fn read(handle: u16) -> Self {
        Command::new("read").handle("hnd", handle)
    }

    pub fn write(handle: u16, value: &[u8], with_response: bool) -> Self {
        Command::new("write")
            .handle("hnd", handle)
            .param("value", hex::encode(value))
            .param("rsp", if with_response { "1" } else { "0" })
    }

    pub fn status() -> Self {
        Command::new("status")
    }

    pub fn mtu(mtu: u16) -> Self {
        Command::new("mtu").param("value", mtu)
    }

    pub fn security(level: SecurityLevel) -> Self {
        Command::new("security").param("level", level)
    }

    pub fn pair() -> Self {
        Command::new("pair")
    }

    pub fn unpair() -> Self {
        Command::new("unpair")
    }

    pub fn scan(mode: ScanMode) -> Self {
        Command::new("scan").param("mode", mode)
    }

    pub fn scan_end() -> Self {
        Command::new("scanend")
    }

    pub fn quit() -> Self {
        Command::new("quit")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword)?;
        for (key, value) in &self.params {
            write!(f, " {}={}", key, value)?;
        }
        Ok(())
    }
}

/// Link security requested from the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl SecurityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityLevel::Low => "low",
            SecurityLevel::Medium => "medium",
            SecurityLevel::High => "high",
        }
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(SecurityLevel::Low),
            "medium" => Ok(SecurityLevel::Medium),
            "high" => Ok(SecurityLevel::High),
            other => Err(format!("unknown security level {:?}", other)),
        }
    }
}

/// Active scans send scan requests and collect scan responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    #[default]
    Active,
    Passive,
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScanMode::Active => "active",
            ScanMode::Passive => "passive",
        })
    }
}
