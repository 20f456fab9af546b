//! Unit tests for record classification

use super::*;
use crate::error::Error;
use crate::uuid::Uuid;

#[test]
fn test_status_output_is_skipped() {
    assert!(classify("").unwrap().is_none());
    assert!(classify("\n").unwrap().is_none());
    assert!(classify("# helper started on hci0").unwrap().is_none());
}

#[test]
fn test_reply_fields() {
    let record = classify("rsp state=conn mtu=23\n").unwrap().unwrap();
    assert_eq!(record.tag(), Tag::Reply);
    assert_eq!(record.state(), Some("conn"));
    assert_eq!(record.mtu(), Some(23));
    assert!(record.tag().is_synchronous());
}

#[test]
fn test_repeated_keys_form_sequences() {
    let record = classify("rsp hnd=1 end=5 uuid=1800 hnd=6 end=20 uuid=1801")
        .unwrap()
        .unwrap();
    assert_eq!(record.handles("hnd").unwrap(), vec![1, 6]);
    assert_eq!(record.handles("end").unwrap(), vec![5, 0x20]);
    assert_eq!(
        record.uuids("uuid").unwrap(),
        vec![Uuid::from_u16(0x1800), Uuid::from_u16(0x1801)]
    );
}

#[test]
fn test_every_keyword_maps_to_a_tag() {
    let cases = [
        ("rsp", Tag::Reply),
        ("ntfy hnd=0x10 d=01", Tag::Notification),
        ("ind hnd=0x10 d=01", Tag::Indication),
        ("err code=0x0a", Tag::Error),
        ("done", Tag::DiscoveryComplete),
        ("stat state=disc", Tag::Status),
        ("adv addr=112233445566 type=1 rssi=60 flags=0 d=", Tag::Advertisement),
    ];
    for (line, tag) in cases {
        assert_eq!(classify(line).unwrap().unwrap().tag(), tag, "{}", line);
    }
    assert!(!Tag::Notification.is_synchronous());
    assert!(!Tag::Advertisement.is_synchronous());
}

#[test]
fn test_malformed_lines_are_protocol_errors() {
    for line in ["bogus a=1", "rsp state", "rsp =conn", "RSP state=conn"] {
        match classify(line) {
            Err(Error::Protocol(_)) => {}
            other => panic!("{:?} classified as {:?}", line, other),
        }
    }
}

#[test]
fn test_typed_accessors() {
    let record = classify("ntfy hnd=0x002a d=0aff").unwrap().unwrap();
    assert_eq!(record.handle("hnd").unwrap(), 42);
    assert_eq!(record.bytes("d").unwrap(), vec![0x0a, 0xff]);

    let record = classify("adv rssi=-61 d=").unwrap().unwrap();
    assert_eq!(record.int("rssi").unwrap(), -61);
    assert!(record.bytes("d").unwrap().is_empty());

    let record = classify("rsp hnd=2a props=0x1a").unwrap().unwrap();
    assert_eq!(record.handle("hnd").unwrap(), 0x2a);
    assert_eq!(record.hex_values("props").unwrap(), vec![0x1a]);

    let record = classify("rsp hnd=12345 d=zz").unwrap().unwrap();
    assert!(matches!(record.handle("hnd"), Err(Error::Protocol(_))));
    assert!(matches!(record.bytes("d"), Err(Error::Protocol(_))));
    assert!(matches!(record.require("missing"), Err(Error::Protocol(_))));
}

#[test]
fn test_display_renders_a_parseable_line() {
    let record = Record::new(Tag::Reply)
        .with("hnd", "1")
        .with("uuid", "1800")
        .with("hnd", "6");
    let line = record.to_string();
    assert_eq!(line, "rsp hnd=1 hnd=6 uuid=1800");
    assert_eq!(classify(&line).unwrap().unwrap(), record);
}

#[test]
fn test_parse_number() {
    assert_eq!(parse_number("20"), Some(20));
    assert_eq!(parse_number("0x20"), Some(32));
    assert_eq!(parse_number("-0x10"), Some(-16));
    assert_eq!(parse_number("0xzz"), None);
    assert_eq!(parse_number(""), None);
    assert_eq!(parse_hex_u16("002a"), Some(0x2a));
    assert_eq!(parse_hex_u16("0xFFFF"), Some(0xffff));
    assert_eq!(parse_hex_u16("0x"), None);
}
