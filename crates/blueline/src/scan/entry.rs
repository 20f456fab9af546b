use crate::error::{Error, Result};
use crate::gap::*;
use crate::protocol::Record;
use crate::uuid::Uuid;
use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{Cursor, Read};
use std::time::Instant;

/// One `adv` record from the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisingReport {
    pub addr: BdAddr,
    pub addr_type: AddressType,
    /// Signal strength magnitude as reported (positive)
    pub rssi: i16,
    pub flags: u8,
    pub data: Vec<u8>,
}

impl AdvertisingReport {
    pub fn from_record(record: &Record) -> Result<Self> {
        let addr = record
            .require("addr")?
            .parse::<BdAddr>()
            .map_err(Error::Protocol)?;

        let raw_type = record.int("type")?;
        let addr_type = u8::try_from(raw_type)
            .ok()
            .and_then(AddressType::from_report)
            .ok_or_else(|| {
                Error::Protocol(format!("unknown address type {} for {}", raw_type, addr))
            })?;

        let rssi = i16::try_from(record.int("rssi")?)
            .map_err(|_| Error::Protocol(format!("rssi out of range in {}", record)))?;

        // Older workers spell the field `flag`.
        let flags = match ["flags", "flag"].into_iter().find(|key| record.has(key)) {
            Some(key) => u8::try_from(record.int(key)?)
                .map_err(|_| Error::Protocol(format!("{} out of range in {}", key, record)))?,
            None => 0,
        };

        let data = if record.has("d") {
            record.bytes("d")?
        } else {
            Vec::new()
        };

        Ok(AdvertisingReport {
            addr,
            addr_type,
            rssi,
            flags,
            data,
        })
    }

    pub fn connectable(&self) -> bool {
        self.flags & REPORT_FLAG_NOT_CONNECTABLE == 0
    }
}

/// Splits advertising data into `(type, value)` elements.
///
/// A zero length byte ends the data (the rest is padding), as does an
/// element running past the end of the buffer.
pub fn parse_advertising_data(data: &[u8]) -> Vec<(u8, Vec<u8>)> {
    let mut cursor = Cursor::new(data);
    let mut result = Vec::new();

    while let Ok(length) = cursor.read_u8() {
        if length == 0 {
            break;
        }
        let Ok(ad_type) = cursor.read_u8() else {
            break;
        };
        let mut value = vec![0u8; length as usize - 1];
        if cursor.read_exact(&mut value).is_err() {
            break;
        }
        result.push((ad_type, value));
    }

    result
}

/// Decoded form of an advertising data element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdValue {
    /// Local names; bytes that are not valid UTF-8 come out as printable
    /// ASCII with `?` for everything else
    Text(String),
    Uuids(Vec<Uuid>),
    Bytes(Vec<u8>),
}

impl fmt::Display for AdValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdValue::Text(text) => f.write_str(text),
            AdValue::Uuids(uuids) => {
                for (i, uuid) in uuids.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", uuid)?;
                }
                Ok(())
            }
            AdValue::Bytes(bytes) => f.write_str(&hex::encode(bytes)),
        }
    }
}

fn decode_name(value: &[u8]) -> String {
    match std::str::from_utf8(value) {
        Ok(text) => text.to_string(),
        Err(_) => value
            .iter()
            .map(|&b| if (32..127).contains(&b) { b as char } else { '?' })
            .collect(),
    }
}

fn decode_uuids(value: &[u8], width: usize) -> Vec<Uuid> {
    value
        .chunks_exact(width)
        .filter_map(Uuid::try_from_slice_le)
        .collect()
}

/// Everything learned about one advertiser during a scan.
#[derive(Debug, Clone)]
pub struct ScanEntry {
    pub addr: BdAddr,
    /// Unknown until the first report arrives
    pub addr_type: Option<AddressType>,
    pub iface: u16,
    /// Negated report magnitude, in dBm
    pub rssi: i16,
    pub connectable: bool,
    pub raw_data: Vec<u8>,
    pub last_seen: Option<Instant>,
    pub update_count: u32,
    elements: BTreeMap<u8, Vec<u8>>,
}

impl ScanEntry {
    pub fn new(addr: BdAddr, iface: u16) -> Self {
        ScanEntry {
            addr,
            addr_type: None,
            iface,
            rssi: 0,
            connectable: false,
            raw_data: Vec::new(),
            last_seen: None,
            update_count: 0,
            elements: BTreeMap::new(),
        }
    }

    /// Merges a report into the entry. Returns true when any advertising
    /// element is new or changed its value.
    pub fn update(&mut self, report: &AdvertisingReport) -> Result<bool> {
        if let Some(known) = self.addr_type {
            if known != report.addr_type {
                return Err(Error::Protocol(format!(
                    "address type of {} changed from {} to {} during scan",
                    self.addr, known, report.addr_type
                )));
            }
        }
        self.addr_type = Some(report.addr_type);
        self.rssi = -report.rssi;
        self.connectable = report.connectable();
        self.raw_data = report.data.clone();
        self.last_seen = Some(Instant::now());

        // Advertising data and scan responses arrive as separate reports, so
        // elements accumulate across them.
        let mut is_new_data = false;
        for (ad_type, value) in parse_advertising_data(&report.data) {
            if self.elements.get(&ad_type) != Some(&value) {
                is_new_data = true;
            }
            self.elements.insert(ad_type, value);
        }

        self.update_count += 1;
        Ok(is_new_data)
    }

    /// Raw bytes of an element.
    pub fn raw_value(&self, ad_type: u8) -> Option<&[u8]> {
        self.elements.get(&ad_type).map(Vec::as_slice)
    }

    pub fn value(&self, ad_type: u8) -> Option<AdValue> {
        let value = self.elements.get(&ad_type)?;
        let decoded = match ad_type {
            ADV_TYPE_SHORT_LOCAL_NAME | ADV_TYPE_COMPLETE_LOCAL_NAME => {
                AdValue::Text(decode_name(value))
            }
            ADV_TYPE_16BIT_SERVICE_UUID_PARTIAL | ADV_TYPE_16BIT_SERVICE_UUID_COMPLETE => {
                AdValue::Uuids(decode_uuids(value, 2))
            }
            ADV_TYPE_32BIT_SERVICE_UUID_PARTIAL | ADV_TYPE_32BIT_SERVICE_UUID_COMPLETE => {
                AdValue::Uuids(decode_uuids(value, 4))
            }
            ADV_TYPE_128BIT_SERVICE_UUID_PARTIAL | ADV_TYPE_128BIT_SERVICE_UUID_COMPLETE => {
                AdValue::Uuids(decode_uuids(value, 16))
            }
            _ => AdValue::Bytes(value.clone()),
        };
        Some(decoded)
    }

    pub fn value_text(&self, ad_type: u8) -> Option<String> {
        self.value(ad_type).map(|v| v.to_string())
    }

    pub fn description(ad_type: u8) -> String {
        match ad_type_name(ad_type) {
            Some(name) => name.to_string(),
            None => format!("0x{:x}", ad_type),
        }
    }

    /// `(type, description, value text)` for every element seen so far.
    pub fn scan_data(&self) -> Vec<(u8, String, String)> {
        self.elements
            .keys()
            .filter_map(|&ad_type| {
                self.value_text(ad_type)
                    .map(|text| (ad_type, Self::description(ad_type), text))
            })
            .collect()
    }

    /// Complete local name, falling back to the shortened one.
    pub fn local_name(&self) -> Option<String> {
        [ADV_TYPE_COMPLETE_LOCAL_NAME, ADV_TYPE_SHORT_LOCAL_NAME]
            .into_iter()
            .find_map(|ad_type| self.value_text(ad_type))
    }

    pub fn tx_power(&self) -> Option<i8> {
        let mut cursor = Cursor::new(self.raw_value(ADV_TYPE_TX_POWER_LEVEL)?);
        cursor.read_i8().ok()
    }

    pub fn appearance(&self) -> Option<u16> {
        let mut cursor = Cursor::new(self.raw_value(ADV_TYPE_APPEARANCE)?);
        cursor.read_u16::<LittleEndian>().ok()
    }

    /// Company identifier and payload of the manufacturer specific element.
    pub fn manufacturer_data(&self) -> Option<(u16, &[u8])> {
        let value = self.raw_value(ADV_TYPE_MANUFACTURER_SPECIFIC)?;
        let mut cursor = Cursor::new(value);
        let company = cursor.read_u16::<LittleEndian>().ok()?;
        Some((company, &value[2..]))
    }
}

impl fmt::Display for ScanEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr)?;
        if let Some(addr_type) = self.addr_type {
            write!(f, " ({})", addr_type)?;
        }
        write!(f, " {} dBm", self.rssi)?;
        if !self.connectable {
            f.write_str(" [not connectable]")?;
        }
        if let Some(name) = self.local_name() {
            write!(f, " {:?}", name)?;
        }
        Ok(())
    }
}
