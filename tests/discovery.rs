//! Discovery fan-out/fan-in tests.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use dab_compliance::mock::{DiscoveryReplies, MockBroker, MockDevice, MockDeviceConfig};
use dab_compliance::{DabClient, Transport};

fn client_over(broker: &Arc<MockBroker>) -> DabClient {
    DabClient::new(broker.clone() as Arc<dyn Transport>)
}

const WAIT: Duration = Duration::from_millis(250);

#[test]
fn test_discovery_finds_an_announcing_device() {
    let broker = Arc::new(MockBroker::new());
    let _device = MockDevice::attach(&broker, MockDeviceConfig::default());

    let devices = client_over(&broker).discover(1, WAIT).unwrap();

    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].device_id, "mock-device");
    assert_eq!(devices[0].ip.as_deref(), Some("192.168.1.20"));
}

#[test]
fn test_duplicate_replies_dedupe_and_fill_address() {
    let broker = Arc::new(MockBroker::new());
    let mut config = MockDeviceConfig::default();
    // First reply names the device without an address, the second fills
    // it in, the third must NOT overwrite it.
    config.discovery = DiscoveryReplies::Scripted(vec![
        json!({"device_id": "tv-9"}),
        json!({"deviceId": "tv-9", "ip": "10.0.0.5"}),
        json!({"deviceId": "tv-9", "ipAddress": "10.9.9.9"}),
    ]);
    let _device = MockDevice::attach(&broker, config);

    let devices = client_over(&broker).discover(1, WAIT).unwrap();

    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].device_id, "tv-9");
    assert_eq!(devices[0].ip.as_deref(), Some("10.0.0.5"));
}

#[test]
fn test_malformed_replies_are_dropped_not_fatal() {
    let broker = Arc::new(MockBroker::new());
    let mut config = MockDeviceConfig::default();
    config.discovery = DiscoveryReplies::Scripted(vec![
        json!("just a string"),
        json!([1, 2, 3]),
        json!({"ip": "10.0.0.1"}),
        json!({"deviceId": "", "ip": "10.0.0.2"}),
        json!({"deviceId": "tv-ok"}),
    ]);
    let _device = MockDevice::attach(&broker, config);

    let devices = client_over(&broker).discover(1, WAIT).unwrap();

    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].device_id, "tv-ok");
    assert_eq!(devices[0].ip, None);
}

#[test]
fn test_silent_bus_yields_empty_list() {
    let broker = Arc::new(MockBroker::new());
    let mut config = MockDeviceConfig::default();
    config.discovery = DiscoveryReplies::Silent;
    let _device = MockDevice::attach(&broker, config);

    let devices = client_over(&broker).discover(2, WAIT).unwrap();
    assert!(devices.is_empty());
}

#[test]
fn test_zero_attempts_still_probes_once() {
    let broker = Arc::new(MockBroker::new());
    let _device = MockDevice::attach(&broker, MockDeviceConfig::default());

    // attempts floor is 1, wait floor is 200ms.
    let devices = client_over(&broker)
        .discover(0, Duration::from_millis(0))
        .unwrap();
    assert_eq!(devices.len(), 1);
}

#[test]
fn test_multiple_devices_are_all_collected() {
    let broker = Arc::new(MockBroker::new());
    for id in ["tv-a", "tv-b", "tv-c"] {
        let mut config = MockDeviceConfig::default();
        config.device_id = id.to_string();
        config.ip = Some(format!("10.1.1.{}", id.len()));
        let _device = MockDevice::attach(&broker, config);
    }

    let mut devices = client_over(&broker).discover(2, WAIT).unwrap();
    devices.sort_by(|a, b| a.device_id.cmp(&b.device_id));

    let ids: Vec<_> = devices.iter().map(|d| d.device_id.as_str()).collect();
    assert_eq!(ids, vec!["tv-a", "tv-b", "tv-c"]);
}

#[test]
fn test_concurrent_discovery_runs_do_not_cross_talk() {
    let broker = Arc::new(MockBroker::new());
    let _device = MockDevice::attach(&broker, MockDeviceConfig::default());

    let client_a = client_over(&broker);
    let client_b = client_over(&broker);

    let a = std::thread::spawn(move || client_a.discover(1, WAIT).unwrap());
    let b = std::thread::spawn(move || client_b.discover(1, WAIT).unwrap());

    // Each run has its own single-use reply topic; both see the device
    // exactly once.
    assert_eq!(a.join().unwrap().len(), 1);
    assert_eq!(b.join().unwrap().len(), 1);
}
