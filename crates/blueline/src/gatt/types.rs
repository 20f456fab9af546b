//! GATT entities built from discovery replies
//!
//! These are plain values: a copy held by the caller stays valid data after the
//! session that produced it is gone.

use crate::att::{CHARACTERISTIC_UUID, PRIMARY_SERVICE_UUID, SECONDARY_SERVICE_UUID};
use crate::uuid::Uuid;
use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Characteristic properties from the characteristic declaration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CharacteristicProperties: u8 {
        const BROADCAST = 0x01;
        const READ = 0x02;
        const WRITE_WITHOUT_RESPONSE = 0x04;
        const WRITE = 0x08;
        const NOTIFY = 0x10;
        const INDICATE = 0x20;
        const AUTHENTICATED_SIGNED_WRITES = 0x40;
        const EXTENDED_PROPERTIES = 0x80;
    }
}

const PROPERTY_NAMES: [(CharacteristicProperties, &str); 8] = [
    (CharacteristicProperties::BROADCAST, "BROADCAST"),
    (CharacteristicProperties::READ, "READ"),
    (CharacteristicProperties::WRITE_WITHOUT_RESPONSE, "WRITE NO RESPONSE"),
    (CharacteristicProperties::WRITE, "WRITE"),
    (CharacteristicProperties::NOTIFY, "NOTIFY"),
    (CharacteristicProperties::INDICATE, "INDICATE"),
    (CharacteristicProperties::AUTHENTICATED_SIGNED_WRITES, "SIGNED WRITE"),
    (CharacteristicProperties::EXTENDED_PROPERTIES, "EXTENDED PROPERTIES"),
];

impl CharacteristicProperties {
    pub fn can_read(&self) -> bool {
        self.contains(Self::READ)
    }

    pub fn can_write(&self) -> bool {
        self.contains(Self::WRITE)
    }

    pub fn can_write_without_response(&self) -> bool {
        self.contains(Self::WRITE_WITHOUT_RESPONSE)
    }

    pub fn can_notify(&self) -> bool {
        self.contains(Self::NOTIFY)
    }

    pub fn can_indicate(&self) -> bool {
        self.contains(Self::INDICATE)
    }
}

impl fmt::Display for CharacteristicProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = PROPERTY_NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&names.join(" "))
    }
}

/// A service and the handle range it occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub uuid: Uuid,
    pub start_handle: u16,
    pub end_handle: u16,
}

impl Service {
    pub fn new(uuid: Uuid, start_handle: u16, end_handle: u16) -> Self {
        Service {
            uuid,
            start_handle,
            end_handle,
        }
    }

    pub fn contains(&self, handle: u16) -> bool {
        self.start_handle <= handle && handle <= self.end_handle
    }

    pub fn overlaps(&self, other: &Service) -> bool {
        self.start_handle <= other.end_handle && other.start_handle <= self.end_handle
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Service <uuid={} handleStart={} handleEnd={}>",
            self.uuid.short_string(),
            self.start_handle,
            self.end_handle
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Characteristic {
    pub uuid: Uuid,
    /// Handle of the declaration attribute
    pub declaration_handle: u16,
    /// Handle that reads and writes go to
    pub value_handle: u16,
    pub properties: CharacteristicProperties,
}

impl Characteristic {
    pub fn new(
        uuid: Uuid,
        declaration_handle: u16,
        value_handle: u16,
        properties: CharacteristicProperties,
    ) -> Self {
        Characteristic {
            uuid,
            declaration_handle,
            value_handle,
            properties,
        }
    }

    pub fn supports_read(&self) -> bool {
        self.properties.can_read()
    }

    pub fn properties_to_string(&self) -> String {
        self.properties.to_string()
    }
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Characteristic <{}> handle=0x{:04x} value=0x{:04x} [{}]",
            self.uuid.short_string(),
            self.declaration_handle,
            self.value_handle,
            self.properties
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub uuid: Uuid,
    pub handle: u16,
}

impl Descriptor {
    pub fn new(uuid: Uuid, handle: u16) -> Self {
        Descriptor { uuid, handle }
    }

    /// Declarations that end the descriptor list of the preceding characteristic.
    pub fn is_boundary(&self) -> bool {
        self.uuid == PRIMARY_SERVICE_UUID
            || self.uuid == SECONDARY_SERVICE_UUID
            || self.uuid == CHARACTERISTIC_UUID
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Descriptor <{}> handle=0x{:04x}",
            self.uuid.short_string(),
            self.handle
        )
    }
}
