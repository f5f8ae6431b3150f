//! Request/response correlation tests over the mock broker.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;

use dab_compliance::mock::{MockBroker, MockDevice, MockDeviceConfig};
use dab_compliance::DabClient;
use dab_protocol::{ops, status, Operation};

fn harness(config: MockDeviceConfig) -> (Arc<MockBroker>, Arc<MockDevice>, DabClient) {
    let broker = Arc::new(MockBroker::new());
    let device = MockDevice::attach(&broker, config);
    let client = DabClient::new(broker.clone() as Arc<dyn dab_compliance::Transport>);
    (broker, device, client)
}

#[test]
fn test_round_trip_returns_parsed_body() {
    let (_broker, _device, client) = harness(MockDeviceConfig::default());

    let response = client
        .call(
            "mock-device",
            &Operation::new(ops::DEVICE_INFO),
            &json!({}),
            Duration::from_secs(5),
        )
        .unwrap();

    assert_eq!(response.status, status::OK);
    assert_eq!(
        response.field("model").and_then(|v| v.as_str()),
        Some("TV-1000")
    );
}

#[test]
fn test_sequential_calls_are_independent() {
    let (_broker, _device, client) = harness(MockDeviceConfig::default());
    let operation = Operation::new(ops::HEALTH_CHECK);

    let first = client
        .call("mock-device", &operation, &json!({}), Duration::from_secs(5))
        .unwrap();
    let second = client
        .call("mock-device", &operation, &json!({}), Duration::from_secs(5))
        .unwrap();

    assert_eq!(first.status, status::OK);
    assert_eq!(second.status, status::OK);
    assert_eq!(first.body, second.body);
}

#[test]
fn test_timeout_produces_sentinel_not_error() {
    let mut config = MockDeviceConfig::default();
    config.silent_operations.insert(ops::DEVICE_INFO.to_string());
    let (_broker, _device, client) = harness(config);

    let deadline = Duration::from_millis(300);
    let start = Instant::now();
    let response = client
        .call(
            "mock-device",
            &Operation::new(ops::DEVICE_INFO),
            &json!({}),
            deadline,
        )
        .unwrap();
    let elapsed = start.elapsed();

    assert_eq!(response.status, status::TIMEOUT);
    assert!(response.is_timeout());
    assert!(response.body.is_none());
    // Bounded wait: no lingering past the deadline.
    assert!(elapsed < deadline + Duration::from_secs(1));
}

#[test]
fn test_call_recovers_after_a_timeout() {
    let mut config = MockDeviceConfig::default();
    config.silent_operations.insert(ops::DEVICE_INFO.to_string());
    let (_broker, _device, client) = harness(config);

    let timed_out = client
        .call(
            "mock-device",
            &Operation::new(ops::DEVICE_INFO),
            &json!({}),
            Duration::from_millis(200),
        )
        .unwrap();
    assert!(timed_out.is_timeout());

    // The next call on the same instance starts clean.
    let healthy = client
        .call(
            "mock-device",
            &Operation::new(ops::HEALTH_CHECK),
            &json!({}),
            Duration::from_secs(5),
        )
        .unwrap();
    assert_eq!(healthy.status, status::OK);
}

#[test]
fn test_malformed_reply_is_unknown_status() {
    let mut config = MockDeviceConfig::default();
    config
        .malformed_operations
        .insert(ops::DEVICE_INFO.to_string());
    let (_broker, _device, client) = harness(config);

    let response = client
        .call(
            "mock-device",
            &Operation::new(ops::DEVICE_INFO),
            &json!({}),
            Duration::from_secs(5),
        )
        .unwrap();

    assert_eq!(response.status, status::UNKNOWN);
    assert!(response.body.is_none());
}

#[test]
fn test_forced_status_flows_through() {
    let mut config = MockDeviceConfig::default();
    config
        .status_overrides
        .insert(ops::DEVICE_INFO.to_string(), status::BAD_REQUEST);
    let (_broker, _device, client) = harness(config);

    let response = client
        .call(
            "mock-device",
            &Operation::new(ops::DEVICE_INFO),
            &json!({}),
            Duration::from_secs(5),
        )
        .unwrap();
    assert_eq!(response.status, status::BAD_REQUEST);
}

#[test]
fn test_unknown_operation_is_not_implemented() {
    let (_broker, _device, client) = harness(MockDeviceConfig::default());

    let response = client
        .call(
            "mock-device",
            &Operation::new("no/such/operation"),
            &json!({}),
            Duration::from_secs(5),
        )
        .unwrap();
    assert_eq!(response.status, status::NOT_IMPLEMENTED);
}

#[test]
fn test_same_instance_serializes_concurrent_callers() {
    let (_broker, _device, client) = harness(MockDeviceConfig::default());
    let client = Arc::new(client);

    let mut workers = Vec::new();
    for _ in 0..4 {
        let client = Arc::clone(&client);
        workers.push(std::thread::spawn(move || {
            client
                .call(
                    "mock-device",
                    &Operation::new(ops::HEALTH_CHECK),
                    &json!({}),
                    Duration::from_secs(5),
                )
                .unwrap()
        }));
    }
    for worker in workers {
        let response = worker.join().unwrap();
        assert_eq!(response.status, status::OK);
    }
}

#[test]
fn test_independent_instances_do_not_interfere() {
    let broker = Arc::new(MockBroker::new());
    let mut first = MockDeviceConfig::default();
    first.device_id = "tv-a".to_string();
    let mut second = MockDeviceConfig::default();
    second.device_id = "tv-b".to_string();
    let _device_a = MockDevice::attach(&broker, first);
    let _device_b = MockDevice::attach(&broker, second);

    let client_a = DabClient::new(broker.clone() as Arc<dyn dab_compliance::Transport>);
    let client_b = DabClient::new(broker.clone() as Arc<dyn dab_compliance::Transport>);

    let a = std::thread::spawn(move || {
        client_a
            .call(
                "tv-a",
                &Operation::new(ops::DEVICE_INFO),
                &json!({}),
                Duration::from_secs(5),
            )
            .unwrap()
    });
    let b = std::thread::spawn(move || {
        client_b
            .call(
                "tv-b",
                &Operation::new(ops::DEVICE_INFO),
                &json!({}),
                Duration::from_secs(5),
            )
            .unwrap()
    });

    let response_a = a.join().unwrap();
    let response_b = b.join().unwrap();
    assert_eq!(
        response_a.field("deviceId").and_then(|v| v.as_str()),
        Some("tv-a")
    );
    assert_eq!(
        response_b.field("deviceId").and_then(|v| v.as_str()),
        Some("tv-b")
    );
}
