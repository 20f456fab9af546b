use super::types::{Characteristic, Descriptor, Service};
use crate::error::{Error, Result};
use crate::uuid::Uuid;
use std::collections::{BTreeMap, BTreeSet};

/// Everything discovered on one connection, keyed by handle.
///
/// Each insert takes a whole discovery batch. The batch is validated first and
/// either lands completely or not at all, so a bad reply never leaves a
/// half-populated table behind.
#[derive(Debug, Default, Clone)]
pub struct DiscoveryCache {
    services: BTreeMap<u16, Service>,
    characteristics: BTreeMap<u16, Characteristic>,
    descriptors: BTreeMap<u16, Descriptor>,
    all_services: bool,
    all_characteristics: bool,
    all_descriptors: bool,
    /// Start handles of services whose characteristics are all known
    characteristic_scopes: BTreeSet<u16>,
    /// Declaration handles of characteristics whose descriptors are all known
    descriptor_scopes: BTreeSet<u16>,
}

fn ensure_ascending<I: IntoIterator<Item = u16>>(what: &str, handles: I) -> Result<()> {
    let mut last: Option<u16> = None;
    for handle in handles {
        if let Some(prev) = last {
            if handle <= prev {
                return Err(Error::Protocol(format!(
                    "{} handles out of order: 0x{:04x} after 0x{:04x}",
                    what, handle, prev
                )));
            }
        }
        last = Some(handle);
    }
    Ok(())
}

impl DiscoveryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty() && self.characteristics.is_empty() && self.descriptors.is_empty()
    }

    // --- Services ---

    pub fn insert_services(&mut self, batch: &[Service]) -> Result<()> {
        ensure_ascending("service", batch.iter().map(|s| s.start_handle))?;
        for (i, service) in batch.iter().enumerate() {
            if service.start_handle == 0 || service.start_handle > service.end_handle {
                return Err(Error::Protocol(format!(
                    "service {} has an invalid range 0x{:04x}..0x{:04x}",
                    service.uuid, service.start_handle, service.end_handle
                )));
            }
            if let Some(prev) = i.checked_sub(1).map(|j| &batch[j]) {
                if prev.overlaps(service) {
                    return Err(Error::Protocol(format!(
                        "service ranges overlap at 0x{:04x}",
                        service.start_handle
                    )));
                }
            }
            let clash = self
                .services
                .values()
                .find(|known| known.overlaps(service) && known != &service);
            if let Some(known) = clash {
                return Err(Error::Protocol(format!(
                    "service 0x{:04x}..0x{:04x} overlaps cached 0x{:04x}..0x{:04x}",
                    service.start_handle, service.end_handle, known.start_handle, known.end_handle
                )));
            }
        }

        for service in batch {
            self.services.insert(service.start_handle, service.clone());
        }
        Ok(())
    }

    pub fn mark_services_complete(&mut self) {
        self.all_services = true;
    }

    pub fn services_complete(&self) -> bool {
        self.all_services
    }

    /// Services sorted by start handle.
    pub fn services(&self) -> Vec<Service> {
        self.services.values().cloned().collect()
    }

    pub fn service_by_uuid(&self, uuid: &Uuid) -> Option<Service> {
        self.services.values().find(|s| &s.uuid == uuid).cloned()
    }

    pub fn service_containing(&self, handle: u16) -> Option<&Service> {
        self.services
            .range(..=handle)
            .next_back()
            .map(|(_, s)| s)
            .filter(|s| s.contains(handle))
    }

    // --- Characteristics ---

    pub fn insert_characteristics(&mut self, batch: &[Characteristic]) -> Result<()> {
        ensure_ascending("characteristic", batch.iter().map(|c| c.declaration_handle))?;
        for c in batch {
            if c.declaration_handle >= c.value_handle {
                return Err(Error::Protocol(format!(
                    "characteristic {} declared at 0x{:04x} with value at 0x{:04x}",
                    c.uuid, c.declaration_handle, c.value_handle
                )));
            }
            if let Some(service) = self.service_containing(c.declaration_handle) {
                if !service.contains(c.value_handle) {
                    return Err(Error::Protocol(format!(
                        "characteristic value 0x{:04x} falls outside service 0x{:04x}..0x{:04x}",
                        c.value_handle, service.start_handle, service.end_handle
                    )));
                }
            }
            if let Some(known) = self.characteristics.get(&c.declaration_handle) {
                if known != c {
                    return Err(Error::Protocol(format!(
                        "characteristic at 0x{:04x} changed between discoveries",
                        c.declaration_handle
                    )));
                }
            }
        }

        for c in batch {
            self.characteristics.insert(c.declaration_handle, c.clone());
        }
        Ok(())
    }

    pub fn mark_characteristics_complete(&mut self, service: &Service) {
        self.characteristic_scopes.insert(service.start_handle);
    }

    pub fn mark_all_characteristics_complete(&mut self) {
        self.all_characteristics = true;
    }

    pub fn all_characteristics_complete(&self) -> bool {
        self.all_characteristics
    }

    pub fn characteristics_complete(&self, service: &Service) -> bool {
        self.all_characteristics || self.characteristic_scopes.contains(&service.start_handle)
    }

    pub fn characteristics(&self) -> Vec<Characteristic> {
        self.characteristics.values().cloned().collect()
    }

    pub fn characteristics_in(&self, start: u16, end: u16) -> Vec<Characteristic> {
        if start > end {
            return Vec::new();
        }
        self.characteristics
            .range(start..=end)
            .map(|(_, c)| c.clone())
            .collect()
    }

    pub fn characteristics_by_uuid(&self, uuid: &Uuid) -> Vec<Characteristic> {
        self.characteristics
            .values()
            .filter(|c| &c.uuid == uuid)
            .cloned()
            .collect()
    }

    pub fn characteristic_by_value_handle(&self, handle: u16) -> Option<&Characteristic> {
        self.characteristics
            .values()
            .find(|c| c.value_handle == handle)
    }

    /// Last handle that can belong to `characteristic`'s descriptors, given
    /// what is known about its neighbours.
    pub fn descriptor_span_end(&self, characteristic: &Characteristic) -> u16 {
        let service_end = self
            .service_containing(characteristic.declaration_handle)
            .map(|s| s.end_handle)
            .unwrap_or(u16::MAX);
        let next_declaration = self
            .characteristics
            .range(characteristic.declaration_handle.saturating_add(1)..)
            .next()
            .map(|(handle, _)| handle.saturating_sub(1))
            .unwrap_or(u16::MAX);
        service_end.min(next_declaration)
    }

    // --- Descriptors ---

    pub fn insert_descriptors(&mut self, batch: &[Descriptor]) -> Result<()> {
        ensure_ascending("descriptor", batch.iter().map(|d| d.handle))?;
        if let Some(d) = batch.iter().find(|d| d.handle == 0) {
            return Err(Error::Protocol(format!("descriptor {} at handle 0", d.uuid)));
        }
        for d in batch {
            self.descriptors.insert(d.handle, d.clone());
        }
        Ok(())
    }

    pub fn mark_descriptors_complete(&mut self, characteristic: &Characteristic) {
        self.descriptor_scopes
            .insert(characteristic.declaration_handle);
    }

    pub fn mark_all_descriptors_complete(&mut self) {
        self.all_descriptors = true;
    }

    pub fn all_descriptors_complete(&self) -> bool {
        self.all_descriptors
    }

    pub fn descriptors_complete(&self, characteristic: &Characteristic) -> bool {
        self.all_descriptors
            || self
                .descriptor_scopes
                .contains(&characteristic.declaration_handle)
    }

    pub fn descriptors(&self) -> Vec<Descriptor> {
        self.descriptors.values().cloned().collect()
    }

    pub fn descriptors_in(&self, start: u16, end: u16) -> Vec<Descriptor> {
        if start > end {
            return Vec::new();
        }
        self.descriptors
            .range(start..=end)
            .map(|(_, d)| d.clone())
            .collect()
    }

    /// Descriptors after the value handle, stopping at the next declaration.
    pub fn descriptors_of(&self, characteristic: &Characteristic) -> Vec<Descriptor> {
        match characteristic.value_handle.checked_add(1) {
            Some(start) => self
                .descriptors_in(start, self.descriptor_span_end(characteristic))
                .into_iter()
                .take_while(|d| !d.is_boundary())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn descriptor_by_uuid(&self, characteristic: &Characteristic, uuid: &Uuid) -> Option<Descriptor> {
        self.descriptors_of(characteristic)
            .into_iter()
            .find(|d| &d.uuid == uuid)
    }
}
