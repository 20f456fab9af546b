use super::*;
use crate::config::SessionConfig;
use crate::error::Error;
use crate::gap::*;
use crate::protocol::classify;
use crate::session::SessionState;
use crate::uuid::Uuid;
use crate::worker::mock::MockTransport;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SENSOR: &str = "adv addr=c4:7c:8d:6a:3e:01 type=1 rssi=67 flags=0 d=020106090948756d6964697479";

fn report(line: &str) -> AdvertisingReport {
    AdvertisingReport::from_record(&classify(line).unwrap().unwrap()).unwrap()
}

fn entry_with(data: &str) -> ScanEntry {
    let report = report(&format!("adv addr=00:00:00:00:00:01 type=2 rssi=40 d={}", data));
    let mut entry = ScanEntry::new(report.addr, 0);
    entry.update(&report).unwrap();
    entry
}

fn scanner(mock: &MockTransport) -> Scanner<MockTransport> {
    Scanner::with_transport(mock.clone(), SessionConfig::default())
}

#[test]
fn test_parse_advertising_data() {
    let data = hex::decode("0201060303aa fe".replace(' ', "")).unwrap();
    assert_eq!(
        parse_advertising_data(&data),
        vec![(ADV_TYPE_FLAGS, vec![0x06]), (0x03, vec![0xaa, 0xfe])]
    );

    // Zero padding ends the data
    assert_eq!(parse_advertising_data(&[0x02, 0x01, 0x06, 0x00, 0x00]).len(), 1);
    // So does an element that runs off the end
    assert_eq!(parse_advertising_data(&[0x02, 0x01, 0x06, 0x05, 0x09, 0x41]).len(), 1);
    assert!(parse_advertising_data(&[]).is_empty());
}

#[test]
fn test_report_fields() {
    let report = report(SENSOR);
    assert_eq!(report.addr.to_string(), "C4:7C:8D:6A:3E:01");
    assert_eq!(report.addr_type, AddressType::Public);
    assert_eq!(report.rssi, 67);
    assert!(report.connectable());

    let old = self::report("adv addr=c47c8d6a3e01 type=2 rssi=50 flag=4");
    assert_eq!(old.addr_type, AddressType::Random);
    assert!(!old.connectable());
    assert!(old.data.is_empty());

    let bad = classify("adv addr=c4:7c:8d:6a:3e:01 type=3 rssi=50").unwrap().unwrap();
    assert!(matches!(
        AdvertisingReport::from_record(&bad),
        Err(Error::Protocol(_))
    ));
}

#[test]
fn test_entry_decoding() {
    let data = [
        "020106",
        "090948756d6964697479",
        "05030f180a18",
        "020af4",
        "0319c103",
        "05ff4c000215",
    ]
    .concat();
    let entry = entry_with(&data);

    assert_eq!(entry.rssi, -40);
    assert_eq!(entry.addr_type, Some(AddressType::Random));
    assert_eq!(entry.local_name().as_deref(), Some("Humidity"));
    assert_eq!(
        entry.value(ADV_TYPE_16BIT_SERVICE_UUID_COMPLETE),
        Some(AdValue::Uuids(vec![Uuid::from_u16(0x180f), Uuid::from_u16(0x180a)]))
    );
    assert_eq!(
        entry.value_text(ADV_TYPE_16BIT_SERVICE_UUID_COMPLETE).unwrap(),
        "0000180f-0000-1000-8000-00805f9b34fb,0000180a-0000-1000-8000-00805f9b34fb"
    );
    assert_eq!(entry.value_text(ADV_TYPE_FLAGS).as_deref(), Some("06"));
    assert_eq!(entry.tx_power(), Some(-12));
    assert_eq!(entry.appearance(), Some(0x03c1));
    assert_eq!(entry.manufacturer_data(), Some((0x004c, &[0x02, 0x15][..])));
    assert_eq!(entry.value(ADV_TYPE_SERVICE_DATA_16BIT), None);

    let elements = entry.scan_data();
    assert_eq!(elements.len(), 6);
    assert_eq!(elements[0], (ADV_TYPE_FLAGS, "Flags".to_string(), "06".to_string()));
    assert!(elements
        .iter()
        .any(|(t, d, v)| *t == ADV_TYPE_COMPLETE_LOCAL_NAME
            && d == "Complete Local Name"
            && v == "Humidity"));
}

#[test]
fn test_entry_names() {
    // Invalid UTF-8 falls back to printable ASCII
    let entry = entry_with("0508ff41e942");
    assert_eq!(entry.local_name().as_deref(), Some("?A?B"));

    assert_eq!(ScanEntry::description(ADV_TYPE_MANUFACTURER_SPECIFIC), "Manufacturer");
    assert_eq!(ScanEntry::description(0x42), "0x42");
}

#[test]
fn test_entry_update_tracks_new_data() {
    let mut entry = ScanEntry::new("c4:7c:8d:6a:3e:01".parse().unwrap(), 0);
    assert!(entry.update(&report(SENSOR)).unwrap());
    assert!(!entry.update(&report(SENSOR)).unwrap());

    // A scan response adds elements without dropping earlier ones
    let response = "adv addr=c4:7c:8d:6a:3e:01 type=1 rssi=70 flags=4 d=020af4";
    assert!(entry.update(&report(response)).unwrap());
    assert_eq!(entry.update_count, 3);
    assert_eq!(entry.rssi, -70);
    assert!(!entry.connectable);
    assert_eq!(entry.local_name().as_deref(), Some("Humidity"));
    assert_eq!(entry.raw_data, vec![0x02, 0x0a, 0xf4]);

    let moved = "adv addr=c4:7c:8d:6a:3e:01 type=2 rssi=70";
    assert!(matches!(
        entry.update(&report(moved)),
        Err(Error::Protocol(_))
    ));
}

#[test]
fn test_start_and_process() {
    let mock = MockTransport::new();
    mock.on("scan", &["rsp"]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let mut scanner = scanner(&mock).with_handler(
        move |entry: &ScanEntry, is_new_device: bool, is_new_data: bool| {
            sink.lock()
                .unwrap()
                .push((entry.addr.to_string(), is_new_device, is_new_data));
        },
    );

    scanner.start(ScanMode::Active).unwrap();
    assert_eq!(scanner.state(), SessionState::Scanning);
    assert_eq!(mock.sent(), vec!["scan mode=active"]);

    mock.push_line(SENSOR);
    mock.push_line("ntfy hnd=0010 d=01");
    mock.push_line(SENSOR);
    mock.push_line("adv addr=c4:7c:8d:6a:3e:01 type=1 rssi=66 d=020af4");
    mock.push_line("adv addr=00:11:22:33:44:55 type=2 rssi=90");
    scanner.process(Duration::from_millis(10)).unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            ("C4:7C:8D:6A:3E:01".to_string(), true, true),
            ("C4:7C:8D:6A:3E:01".to_string(), false, false),
            ("C4:7C:8D:6A:3E:01".to_string(), false, true),
            ("00:11:22:33:44:55".to_string(), true, false),
        ]
    );
    assert_eq!(scanner.devices().count(), 2);
    let sensor = scanner
        .device(&"c4:7c:8d:6a:3e:01".parse().unwrap(), AddressType::Public)
        .unwrap();
    assert_eq!(sensor.rssi, -66);
    assert_eq!(sensor.update_count, 3);
}

#[test]
fn test_start_when_busy_ends_previous_scan() {
    let mock = MockTransport::new();
    mock.on("scan", &["err code=busy"]);
    mock.on("scanend", &["stat state=disc"]);
    mock.on("scan", &["rsp"]);
    let mut scanner = scanner(&mock);

    scanner.start(ScanMode::Passive).unwrap();
    assert_eq!(scanner.state(), SessionState::Scanning);
    assert_eq!(
        mock.sent(),
        vec!["scan mode=passive", "scanend", "scan mode=passive"]
    );
}

#[test]
fn test_start_refused() {
    let mock = MockTransport::new();
    mock.on("scan", &["err code=rejected msg=not-powered"]);
    let mut scanner = scanner(&mock);

    assert!(matches!(
        scanner.start(ScanMode::Active),
        Err(Error::Management(_))
    ));
    assert_eq!(scanner.state(), SessionState::Disconnected);

    assert!(matches!(
        scanner.process(Duration::from_millis(1)),
        Err(Error::InvalidState { operation: "process", state: "disconnected" })
    ));
}

#[test]
fn test_controller_scan_end_restarts() {
    let mock = MockTransport::new();
    mock.on("scan", &["rsp"]);
    mock.on("scan", &["rsp"]);
    let mut scanner = scanner(&mock);
    scanner.start(ScanMode::Active).unwrap();

    mock.push_line("stat state=disc");
    scanner.process(Duration::from_millis(10)).unwrap();
    assert_eq!(mock.sent(), vec!["scan mode=active", "scan mode=active"]);

    // The restart was acknowledged, so stop can go out right away
    mock.on("scanend", &["rsp"]);
    scanner.stop();
    assert_eq!(mock.sent_keywords(), vec!["scan", "scan", "scanend"]);
}

#[test]
fn test_address_types_are_separate_devices() {
    let mock = MockTransport::new();
    mock.on("scan", &["rsp"]);
    let mut scanner = scanner(&mock);
    scanner.start(ScanMode::Active).unwrap();

    mock.push_line(SENSOR);
    mock.push_line("adv addr=c4:7c:8d:6a:3e:01 type=2 rssi=50");
    scanner.process(Duration::from_millis(10)).unwrap();

    let addr: BdAddr = "c4:7c:8d:6a:3e:01".parse().unwrap();
    assert_eq!(scanner.devices().count(), 2);
    assert_eq!(scanner.device(&addr, AddressType::Public).unwrap().rssi, -67);
    assert_eq!(scanner.device(&addr, AddressType::Random).unwrap().rssi, -50);
}

#[test]
fn test_malformed_report_is_skipped() {
    let mock = MockTransport::new();
    mock.on("scan", &["rsp"]);
    let mut scanner = scanner(&mock);
    scanner.start(ScanMode::Active).unwrap();

    mock.push_line("adv addr=00:11:22:33:44:55 type=2");
    mock.push_line("adv addr=00:11:22:33:44:55 type=2 rssi=60 d=0201");
    mock.push_line(SENSOR);
    scanner.process(Duration::from_millis(10)).unwrap();

    assert_eq!(scanner.state(), SessionState::Scanning);
    assert_eq!(scanner.devices().count(), 2);
}

#[test]
fn test_lost_worker_ends_scan() {
    let mock = MockTransport::new();
    mock.on("scan", &["rsp"]);
    let mut scanner = scanner(&mock);
    scanner.start(ScanMode::Active).unwrap();

    mock.push_line(SENSOR);
    mock.kill();
    assert!(matches!(
        scanner.process(Duration::from_millis(10)),
        Err(Error::Transport(_))
    ));
    assert_eq!(scanner.state(), SessionState::Disconnected);
    assert_eq!(mock.shutdowns(), 1);
    assert_eq!(scanner.devices().count(), 1);

    // Stopping afterwards sends nothing and keeps what was heard
    assert_eq!(scanner.stop().len(), 1);
    assert_eq!(mock.sent_keywords(), vec!["scan"]);
    assert_eq!(mock.shutdowns(), 1);
}

#[test]
fn test_start_on_dead_worker_closes_scanner() {
    let mock = MockTransport::new();
    mock.kill();
    let mut scanner = scanner(&mock);

    assert!(matches!(
        scanner.start(ScanMode::Passive),
        Err(Error::Transport(_))
    ));
    assert_eq!(scanner.state(), SessionState::Disconnected);
    assert!(matches!(
        scanner.start(ScanMode::Passive),
        Err(Error::InvalidState { operation: "scan", state: "closed" })
    ));
}

#[test]
fn test_scan_runs_a_full_cycle() {
    let mock = MockTransport::new();
    mock.on("scan", &["rsp", SENSOR]);
    mock.on("scanend", &["rsp"]);
    let mut scanner = scanner(&mock);

    let found = scanner
        .scan(Duration::from_millis(10), ScanMode::Passive)
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].local_name().as_deref(), Some("Humidity"));
    assert_eq!(mock.sent(), vec!["scan mode=passive", "scanend"]);
    assert_eq!(mock.shutdowns(), 1);
    assert_eq!(scanner.state(), SessionState::Disconnected);

    // The worker is gone after stop
    assert!(matches!(
        scanner.start(ScanMode::Active),
        Err(Error::InvalidState { operation: "scan", state: "closed" })
    ));

    drop(scanner);
    assert_eq!(mock.shutdowns(), 1);
}
