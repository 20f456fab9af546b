//! Unit tests for the GATT model and discovery cache

use super::*;
use crate::error::Error;
use crate::uuid::Uuid;

fn service(uuid: u16, start: u16, end: u16) -> Service {
    Service::new(Uuid::from_u16(uuid), start, end)
}

fn characteristic(uuid: u16, decl: u16, props: u8) -> Characteristic {
    Characteristic::new(
        Uuid::from_u16(uuid),
        decl,
        decl + 1,
        CharacteristicProperties::from_bits_truncate(props),
    )
}

fn populated() -> DiscoveryCache {
    let mut cache = DiscoveryCache::new();
    cache
        .insert_services(&[service(0x1800, 1, 5), service(0x180f, 6, 0x20)])
        .unwrap();
    cache.mark_services_complete();
    cache
        .insert_characteristics(&[
            characteristic(0x2a00, 2, 0x02),
            characteristic(0x2a19, 7, 0x12),
            characteristic(0x2a1a, 0x0b, 0x0a),
        ])
        .unwrap();
    cache.mark_all_characteristics_complete();
    cache
}

#[test]
fn test_properties() {
    let props = CharacteristicProperties::from_bits_truncate(0x1a);
    assert!(props.can_read());
    assert!(props.can_write());
    assert!(props.can_notify());
    assert!(!props.can_indicate());
    assert!(!props.can_write_without_response());
    assert_eq!(props.to_string(), "READ WRITE NOTIFY");
    assert_eq!(CharacteristicProperties::empty().to_string(), "");

    let c = characteristic(0x2a37, 0x10, 0x14);
    assert_eq!(c.properties_to_string(), "WRITE NO RESPONSE NOTIFY");
    assert!(!c.supports_read());
}

#[test]
fn test_service_ranges() {
    let a = service(0x1800, 1, 5);
    assert!(a.contains(1));
    assert!(a.contains(5));
    assert!(!a.contains(6));
    assert!(a.overlaps(&service(0x1801, 5, 9)));
    assert!(!a.overlaps(&service(0x1801, 6, 9)));
}

#[test]
fn test_services_sorted_and_looked_up() {
    let cache = populated();
    let services = cache.services();
    assert_eq!(services.len(), 2);
    assert!(services
        .windows(2)
        .all(|w| w[0].end_handle < w[1].start_handle));
    assert_eq!(
        cache.service_by_uuid(&Uuid::from_u16(0x180f)).unwrap().start_handle,
        6
    );
    assert!(cache.service_by_uuid(&Uuid::from_u16(0x180a)).is_none());
    assert_eq!(cache.service_containing(0x0b).unwrap().uuid, 0x180fu16);
    assert!(cache.service_containing(0x21).is_none());
}

#[test]
fn test_out_of_order_services_rejected_atomically() {
    let mut cache = DiscoveryCache::new();
    let result = cache.insert_services(&[service(0x1801, 6, 20), service(0x1800, 1, 5)]);
    assert!(matches!(result, Err(Error::Protocol(_))));
    assert!(cache.is_empty());

    let result = cache.insert_services(&[service(0x1800, 1, 5), service(0x1801, 9, 7)]);
    assert!(matches!(result, Err(Error::Protocol(_))));
    assert!(cache.is_empty());
}

#[test]
fn test_overlapping_services_rejected() {
    let mut cache = DiscoveryCache::new();
    cache.insert_services(&[service(0x1800, 1, 5)]).unwrap();
    assert!(cache
        .insert_services(&[service(0x1801, 3, 9)])
        .is_err());
    assert!(cache
        .insert_services(&[service(0x1801, 1, 9), service(0x1802, 6, 9)])
        .is_err());
    // The same service seen again by a filtered discovery is fine.
    cache.insert_services(&[service(0x1800, 1, 5)]).unwrap();
    assert_eq!(cache.services().len(), 1);
}

#[test]
fn test_characteristic_invariants() {
    let mut cache = DiscoveryCache::new();
    cache.insert_services(&[service(0x1800, 1, 5)]).unwrap();

    let backwards = Characteristic::new(
        Uuid::from_u16(0x2a00),
        4,
        3,
        CharacteristicProperties::READ,
    );
    assert!(cache.insert_characteristics(&[backwards]).is_err());

    let escapes = Characteristic::new(
        Uuid::from_u16(0x2a00),
        5,
        6,
        CharacteristicProperties::READ,
    );
    assert!(cache.insert_characteristics(&[escapes]).is_err());

    let batch = [characteristic(0x2a00, 2, 0x02), characteristic(0x2a01, 2, 0x02)];
    assert!(cache.insert_characteristics(&batch).is_err());
    assert!(cache.characteristics().is_empty());

    cache
        .insert_characteristics(&[characteristic(0x2a00, 2, 0x02)])
        .unwrap();
    for c in cache.characteristics() {
        assert!(c.declaration_handle < c.value_handle);
        let owner = cache.service_containing(c.declaration_handle).unwrap();
        assert!(owner.contains(c.value_handle));
    }
}

#[test]
fn test_characteristic_scopes() {
    let mut cache = DiscoveryCache::new();
    let battery = service(0x180f, 6, 0x20);
    cache.insert_services(&[battery.clone()]).unwrap();
    assert!(!cache.characteristics_complete(&battery));

    cache
        .insert_characteristics(&[characteristic(0x2a19, 7, 0x12)])
        .unwrap();
    cache.mark_characteristics_complete(&battery);
    assert!(cache.characteristics_complete(&battery));
    assert!(!cache.all_characteristics_complete());

    let other = service(0x1800, 1, 5);
    assert!(!cache.characteristics_complete(&other));
    cache.mark_all_characteristics_complete();
    assert!(cache.characteristics_complete(&other));
}

#[test]
fn test_characteristic_lookups() {
    let cache = populated();
    assert_eq!(cache.characteristics_in(6, 0x20).len(), 2);
    assert!(cache.characteristics_in(0x20, 6).is_empty());
    assert_eq!(cache.characteristics_by_uuid(&Uuid::from_u16(0x2a19)).len(), 1);
    assert_eq!(
        cache.characteristic_by_value_handle(8).unwrap().uuid,
        0x2a19u16
    );
}

#[test]
fn test_descriptors_stop_at_next_declaration() {
    let mut cache = populated();
    let level = cache.characteristics_by_uuid(&Uuid::from_u16(0x2a19))[0].clone();
    assert_eq!(cache.descriptor_span_end(&level), 0x0a);

    cache
        .insert_descriptors(&[
            Descriptor::new(Uuid::from_u16(0x2902), 9),
            Descriptor::new(Uuid::from_u16(0x2803), 0x0a),
            Descriptor::new(Uuid::from_u16(0x2901), 0x0d),
        ])
        .unwrap();
    cache.mark_descriptors_complete(&level);

    let found = cache.descriptors_of(&level);
    assert_eq!(found, vec![Descriptor::new(Uuid::from_u16(0x2902), 9)]);
    assert!(cache.descriptors_complete(&level));
    assert!(cache
        .descriptor_by_uuid(&level, &Uuid::from_u16(0x2902))
        .is_some());

    let last = cache.characteristics_by_uuid(&Uuid::from_u16(0x2a1a))[0].clone();
    assert_eq!(cache.descriptor_span_end(&last), 0x20);
    assert_eq!(cache.descriptors_of(&last).len(), 1);
    assert!(!cache.descriptors_complete(&last));
}

#[test]
fn test_descriptor_batches_must_ascend() {
    let mut cache = DiscoveryCache::new();
    let batch = [
        Descriptor::new(Uuid::from_u16(0x2902), 9),
        Descriptor::new(Uuid::from_u16(0x2901), 8),
    ];
    assert!(matches!(
        cache.insert_descriptors(&batch),
        Err(Error::Protocol(_))
    ));
    assert!(cache.descriptors().is_empty());
}

#[test]
fn test_clear_resets_completeness() {
    let mut cache = populated();
    cache.mark_all_descriptors_complete();
    cache.clear();
    assert!(cache.is_empty());
    assert!(!cache.services_complete());
    assert!(!cache.all_characteristics_complete());
    assert!(!cache.all_descriptors_complete());
}
