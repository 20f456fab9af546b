use crate::error::{Error, Result};
use crate::uuid::Uuid;
use std::collections::BTreeMap;
use std::fmt;

/// Record kind, taken from the leading keyword of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// `rsp`: synchronous reply to the outstanding command
    Reply,
    /// `ntfy`: value notification
    Notification,
    /// `ind`: value indication
    Indication,
    /// `err`: synchronous failure of the outstanding command
    Error,
    /// `done`: end of a discovery reply stream
    DiscoveryComplete,
    /// `stat`: unsolicited link status change
    Status,
    /// `adv`: advertising report while scanning
    Advertisement,
}

impl Tag {
    pub fn keyword(&self) -> &'static str {
        match self {
            Tag::Reply => "rsp",
            Tag::Notification => "ntfy",
            Tag::Indication => "ind",
            Tag::Error => "err",
            Tag::DiscoveryComplete => "done",
            Tag::Status => "stat",
            Tag::Advertisement => "adv",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "rsp" => Some(Tag::Reply),
            "ntfy" => Some(Tag::Notification),
            "ind" => Some(Tag::Indication),
            "err" => Some(Tag::Error),
            "done" => Some(Tag::DiscoveryComplete),
            "stat" => Some(Tag::Status),
            "adv" => Some(Tag::Advertisement),
            _ => None,
        }
    }

    /// Records that belong to the pending command rather than the event stream.
    pub fn is_synchronous(&self) -> bool {
        matches!(self, Tag::Reply | Tag::Error | Tag::DiscoveryComplete)
    }
}

/// A classified worker line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    tag: Tag,
    fields: BTreeMap<String, Vec<String>>,
}

impl Record {
    pub fn new(tag: Tag) -> Self {
        Record {
            tag,
            fields: BTreeMap::new(),
        }
    }

    /// Builder form of [`Record::push`].
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: &str, value: impl Into<String>) {
        self.fields
            .entry(key.to_string())
            .or_default()
            .push(value.into());
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// Every value recorded under `key`, in arrival order.
    pub fn all(&self, key: &str) -> &[String] {
        self.fields.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.first(key).ok_or_else(|| {
            Error::Protocol(format!("{} record is missing {:?}", self.tag.keyword(), key))
        })
    }

    pub fn handle(&self, key: &str) -> Result<u16> {
        parse_handle(key, self.require(key)?)
    }

    pub fn handles(&self, key: &str) -> Result<Vec<u16>> {
        self.all(key).iter().map(|v| parse_handle(key, v)).collect()
    }

    /// Hex 16-bit fields other than handles (`props`).
    pub fn hex_values(&self, key: &str) -> Result<Vec<u16>> {
        self.all(key)
            .iter()
            .map(|v| {
                parse_hex_u16(v)
                    .ok_or_else(|| Error::Protocol(format!("{}={:?} is not hex", key, v)))
            })
            .collect()
    }

    pub fn int(&self, key: &str) -> Result<i64> {
        let raw = self.require(key)?;
        parse_number(raw)
            .ok_or_else(|| Error::Protocol(format!("{}={:?} is not a number", key, raw)))
    }

    /// Hex payload under `key`; an empty value is an empty payload.
    pub fn bytes(&self, key: &str) -> Result<Vec<u8>> {
        let raw = self.require(key)?;
        hex::decode(raw).map_err(|e| Error::Protocol(format!("{}={:?}: {}", key, raw, e)))
    }

    pub fn uuid(&self, key: &str) -> Result<Uuid> {
        let raw = self.require(key)?;
        raw.parse()
            .map_err(|e| Error::Protocol(format!("{}={:?}: {}", key, raw, e)))
    }

    pub fn uuids(&self, key: &str) -> Result<Vec<Uuid>> {
        self.all(key)
            .iter()
            .map(|raw| {
                raw.parse()
                    .map_err(|e| Error::Protocol(format!("{}={:?}: {}", key, raw, e)))
            })
            .collect()
    }

    /// Link state carried by `rsp`/`stat` records (`conn`, `tryconn`, `disc`, ...).
    pub fn state(&self) -> Option<&str> {
        self.first("state")
    }

    /// MTU update piggybacked on any record.
    pub fn mtu(&self) -> Option<u16> {
        self.first("mtu")
            .and_then(parse_number)
            .and_then(|v| u16::try_from(v).ok())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag.keyword())?;
        for (key, values) in &self.fields {
            for value in values {
                write!(f, " {}={}", key, value)?;
            }
        }
        Ok(())
    }
}

/// Integers on the wire are decimal unless written with a `0x` prefix.
pub fn parse_number(raw: &str) -> Option<i64> {
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let value = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i64>().ok()?,
    };
    Some(if negative { -value } else { value })
}

/// Handles and property bytes are always hex, `0x` optional.
pub fn parse_hex_u16(raw: &str) -> Option<u16> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    if digits.is_empty() || digits.len() > 4 {
        return None;
    }
    u16::from_str_radix(digits, 16).ok()
}

fn parse_handle(key: &str, raw: &str) -> Result<u16> {
    parse_hex_u16(raw)
        .ok_or_else(|| Error::Protocol(format!("{}={:?} is not a valid handle", key, raw)))
}
