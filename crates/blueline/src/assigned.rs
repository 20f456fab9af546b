//! Names for assigned UUIDs
//!
//! A [`UuidNames`] table is built explicitly and passed to whatever needs to
//! print names; there is no process-wide instance. Tables can be loaded from
//! JSON files of the form
//!
//! ```text
//! {"service_UUIDs": [[6144, "generic_access", "Generic Access"], ...],
//!  "characteristic_UUIDs": [[10777, "battery_level", "Battery Level"], ...]}
//! ```
//!
//! where each entry is the numeric alias, a short identifier and a display
//! name. Section names are not interpreted.

use crate::error::{Error, Result};
use crate::uuid::Uuid;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UuidName {
    /// Short identifier, e.g. `battery_level`
    pub id: String,
    /// Display name, e.g. `Battery Level`
    pub name: String,
}

#[derive(Deserialize)]
#[serde(transparent)]
struct NameFile {
    sections: BTreeMap<String, Vec<(u32, String, String)>>,
}

/// Read-only UUID to name lookup.
#[derive(Debug, Clone, Default)]
pub struct UuidNames {
    by_uuid: HashMap<Uuid, UuidName>,
    by_name: HashMap<String, Uuid>,
}

const WELL_KNOWN: &[(u16, &str, &str)] = &[
    (0x1800, "generic_access", "Generic Access"),
    (0x1801, "generic_attribute", "Generic Attribute"),
    (0x180a, "device_information", "Device Information"),
    (0x180f, "battery_service", "Battery Service"),
    (0x1809, "health_thermometer", "Health Thermometer"),
    (0x180d, "heart_rate", "Heart Rate"),
    (0x181a, "environmental_sensing", "Environmental Sensing"),
    (0x2800, "primary_service", "Primary Service"),
    (0x2801, "secondary_service", "Secondary Service"),
    (0x2802, "include", "Include"),
    (0x2803, "characteristic", "Characteristic"),
    (0x2900, "characteristic_extended_properties", "Characteristic Extended Properties"),
    (0x2901, "characteristic_user_description", "Characteristic User Description"),
    (0x2902, "client_characteristic_configuration", "Client Characteristic Configuration"),
    (0x2903, "server_characteristic_configuration", "Server Characteristic Configuration"),
    (0x2904, "characteristic_presentation_format", "Characteristic Presentation Format"),
    (0x2a00, "device_name", "Device Name"),
    (0x2a01, "appearance", "Appearance"),
    (0x2a04, "peripheral_preferred_connection_parameters", "Peripheral Preferred Connection Parameters"),
    (0x2a05, "service_changed", "Service Changed"),
    (0x2a19, "battery_level", "Battery Level"),
    (0x2a1c, "temperature_measurement", "Temperature Measurement"),
    (0x2a24, "model_number_string", "Model Number String"),
    (0x2a25, "serial_number_string", "Serial Number String"),
    (0x2a26, "firmware_revision_string", "Firmware Revision String"),
    (0x2a27, "hardware_revision_string", "Hardware Revision String"),
    (0x2a28, "software_revision_string", "Software Revision String"),
    (0x2a29, "manufacturer_name_string", "Manufacturer Name String"),
    (0x2a37, "heart_rate_measurement", "Heart Rate Measurement"),
    (0x2a6e, "temperature", "Temperature"),
    (0x2a6f, "humidity", "Humidity"),
];

/// Lookup key: `Battery Level`, `battery_level` and `batteryLevel` all
/// become `batterylevel`.
fn name_key(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl UuidNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table preloaded with the common GATT services, declarations and
    /// characteristics.
    pub fn with_well_known() -> Self {
        let mut names = Self::new();
        for &(alias, id, name) in WELL_KNOWN {
            names.insert(Uuid::from_u16(alias), id, name);
        }
        names
    }

    pub fn insert(&mut self, uuid: Uuid, id: &str, name: &str) {
        for key in [id, name] {
            self.by_name.insert(name_key(key), uuid);
        }
        self.by_uuid.insert(
            uuid,
            UuidName {
                id: id.to_string(),
                name: name.to_string(),
            },
        );
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let file: NameFile = serde_json::from_str(json)
            .map_err(|e| Error::InvalidArgument(format!("UUID name table: {}", e)))?;
        let mut names = Self::new();
        for entries in file.sections.values() {
            for (alias, id, name) in entries {
                names.insert(Uuid::from_u32(*alias), id, name);
            }
        }
        Ok(names)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn len(&self) -> usize {
        self.by_uuid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_uuid.is_empty()
    }

    pub fn get(&self, uuid: &Uuid) -> Option<&UuidName> {
        self.by_uuid.get(uuid)
    }

    /// Display name of a UUID, if the table knows it.
    pub fn name(&self, uuid: &Uuid) -> Option<&str> {
        self.get(uuid).map(|n| n.name.as_str())
    }

    /// Looks a UUID up by identifier or display name, in any of the
    /// spellings `Battery Level`, `battery_level` or `batteryLevel`.
    pub fn lookup(&self, name: &str) -> Option<Uuid> {
        self.by_name.get(&name_key(name)).copied()
    }

    /// The display name, or the compact UUID text when the name is unknown.
    pub fn display_name(&self, uuid: &Uuid) -> String {
        match self.name(uuid) {
            Some(name) => name.to_string(),
            None => uuid.short_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"{
        "service_UUIDs": [[6144, "generic_access", "Generic Access"]],
        "characteristic_UUIDs": [[10777, "battery_level", "Battery Level"],
                                 [10862, "temperature", "Temperature (Celsius)"]]
    }"#;

    #[test]
    fn test_from_json() {
        let names = UuidNames::from_json(TABLE).unwrap();
        assert_eq!(names.len(), 3);
        assert_eq!(names.name(&Uuid::from_u16(0x1800)), Some("Generic Access"));
        assert_eq!(names.get(&Uuid::from_u16(0x2a19)).unwrap().id, "battery_level");
    }

    #[test]
    fn test_lookup_spellings() {
        let names = UuidNames::from_json(TABLE).unwrap();
        let level = Uuid::from_u16(0x2a19);
        assert_eq!(names.lookup("Battery Level"), Some(level));
        assert_eq!(names.lookup("battery_level"), Some(level));
        assert_eq!(names.lookup("batteryLevel"), Some(level));
        assert_eq!(names.lookup("temperatureCelsius"), Some(Uuid::from_u16(0x2a6e)));
        assert_eq!(names.lookup("heart rate"), None);
    }

    #[test]
    fn test_display_name_falls_back_to_uuid() {
        let names = UuidNames::with_well_known();
        assert_eq!(names.display_name(&Uuid::from_u16(0x180f)), "Battery Service");
        assert_eq!(names.display_name(&Uuid::from_u16(0xfff0)), "fff0");
        assert!(UuidNames::new().is_empty());
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(
            UuidNames::from_json(r#"{"service_UUIDs": [[1, "x"]]}"#),
            Err(Error::InvalidArgument(_))
        ));
        assert!(UuidNames::from_path("/nonexistent/uuids.json").is_err());
    }
}
