//! Discovery replies to GATT entities
//!
//! A discovery `rsp` record carries one or more entities as parallel field
//! sequences; entity `i` is made of the `i`-th value of every field.

use crate::error::{Error, Result};
use crate::gatt::{Characteristic, CharacteristicProperties, Descriptor, Service};
use crate::protocol::Record;

fn same_length(record: &Record, lengths: &[(&str, usize)]) -> Result<usize> {
    let expected = lengths[0].1;
    if lengths.iter().any(|(_, n)| *n != expected) {
        let detail: Vec<String> = lengths
            .iter()
            .map(|(key, n)| format!("{}={}", key, n))
            .collect();
        return Err(Error::Protocol(format!(
            "mismatched discovery fields ({}) in {}",
            detail.join(", "),
            record
        )));
    }
    Ok(expected)
}

pub(crate) fn services(records: &[Record]) -> Result<Vec<Service>> {
    let mut found = Vec::new();
    for record in records {
        let starts = record.handles("hnd")?;
        let ends = record.handles("end")?;
        let uuids = record.uuids("uuid")?;
        same_length(
            record,
            &[("hnd", starts.len()), ("end", ends.len()), ("uuid", uuids.len())],
        )?;
        for ((start, end), uuid) in starts.into_iter().zip(ends).zip(uuids) {
            found.push(Service::new(uuid, start, end));
        }
    }
    Ok(found)
}

pub(crate) fn characteristics(records: &[Record]) -> Result<Vec<Characteristic>> {
    let mut found = Vec::new();
    for record in records {
        let declarations = record.handles("hnd")?;
        let values = record.handles("vhnd")?;
        let props = record.hex_values("props")?;
        let uuids = record.uuids("uuid")?;
        same_length(
            record,
            &[
                ("hnd", declarations.len()),
                ("vhnd", values.len()),
                ("props", props.len()),
                ("uuid", uuids.len()),
            ],
        )?;
        for (((declaration, value), props), uuid) in
            declarations.into_iter().zip(values).zip(props).zip(uuids)
        {
            let props = u8::try_from(props).map_err(|_| {
                Error::Protocol(format!("props=0x{:x} does not fit a property byte", props))
            })?;
            found.push(Characteristic::new(
                uuid,
                declaration,
                value,
                CharacteristicProperties::from_bits_truncate(props),
            ));
        }
    }
    Ok(found)
}

pub(crate) fn descriptors(records: &[Record]) -> Result<Vec<Descriptor>> {
    let mut found = Vec::new();
    for record in records {
        let handles = record.handles("hnd")?;
        let uuids = record.uuids("uuid")?;
        same_length(record, &[("hnd", handles.len()), ("uuid", uuids.len())])?;
        found.extend(
            handles
                .into_iter()
                .zip(uuids)
                .map(|(handle, uuid)| Descriptor::new(uuid, handle)),
        );
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::classify;

    fn records(lines: &[&str]) -> Vec<Record> {
        lines
            .iter()
            .map(|l| classify(l).unwrap().unwrap())
            .collect()
    }

    #[test]
    fn test_services_zip_by_position() {
        let found = services(&records(&[
            "rsp hnd=1 end=5 uuid=1800",
            "rsp hnd=6 end=20 uuid=1801 hnd=21 end=ffff uuid=180f",
        ]))
        .unwrap();
        let ranges: Vec<(u16, u16)> = found.iter().map(|s| (s.start_handle, s.end_handle)).collect();
        assert_eq!(ranges, vec![(1, 5), (6, 0x20), (0x21, 0xffff)]);
        assert_eq!(found[2].uuid, 0x180fu16);
    }

    #[test]
    fn test_characteristic_fields() {
        let found = characteristics(&records(&[
            "rsp hnd=2 vhnd=3 props=0a uuid=2a00 hnd=4 vhnd=5 props=02 uuid=2a01",
        ]))
        .unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].value_handle, 3);
        assert!(found[0].properties.can_write());
        assert!(found[1].properties.can_read());
    }

    #[test]
    fn test_mismatched_fields_rejected() {
        assert!(matches!(
            services(&records(&["rsp hnd=1 end=5 uuid=1800 hnd=6"])),
            Err(Error::Protocol(_))
        ));
        assert!(characteristics(&records(&["rsp hnd=2 vhnd=3 props=1ff uuid=2a00"])).is_err());
        assert!(descriptors(&records(&["rsp hnd=9"])).is_err());
    }
}
