//! Conformance suite registry.
//!
//! A representative set of cases exercising the core operations. The
//! payloads come from the runtime configuration so suites stay
//! device-neutral; behavioral depth lives in the per-operation validation
//! the device performs, not here.

use serde_json::json;

use dab_protocol::ops;

use crate::config::RuntimeConfig;
use crate::runner::TestCase;

/// A named, ordered collection of test cases.
#[derive(Debug, Clone)]
pub struct Suite {
    pub name: String,
    pub cases: Vec<TestCase>,
}

impl Suite {
    pub fn new(name: impl Into<String>, cases: Vec<TestCase>) -> Self {
        Self {
            name: name.into(),
            cases,
        }
    }
}

/// Core conformance cases: inventory operations, device identity, health.
pub fn conformance(config: &RuntimeConfig) -> Suite {
    let app = config.app_id("youtube");
    Suite::new(
        "conformance",
        vec![
            TestCase::new("Operations List", ops::OPERATIONS_LIST, json!({}))
                .expected_latency(5000),
            TestCase::new("Version", ops::VERSION, json!({})).expected_latency(5000),
            TestCase::new("Device Info", ops::DEVICE_INFO, json!({})).expected_latency(5000),
            TestCase::new("Health Check", ops::HEALTH_CHECK, json!({})).expected_latency(5000),
            TestCase::new("Settings List", ops::SETTINGS_LIST, json!({})).expected_latency(5000),
            TestCase::new("Key List", ops::KEY_LIST, json!({})).expected_latency(5000),
            TestCase::new(
                "Launch App",
                ops::APP_LAUNCH,
                json!({"appId": app}),
            )
            .with_gate(format!("ops: {}", ops::APP_LAUNCH))
            .expected_latency(10000),
            TestCase::new(
                "Get App State",
                ops::APP_GET_STATE,
                json!({"appId": app}),
            )
            .with_gate(format!("ops: {}, {}", ops::APP_GET_STATE, ops::APP_LAUNCH))
            .expected_latency(5000),
            TestCase::new("Exit App", ops::APP_EXIT, json!({"appId": app}))
                .with_gate(format!("ops: {}", ops::APP_EXIT))
                .expected_latency(10000),
            TestCase::new(
                "Press Home Key",
                ops::KEY_PRESS,
                json!({"keyCode": "KEY_HOME"}),
            )
            .with_gate("keys: KEY_HOME")
            .expected_latency(5000),
            TestCase::new(
                "Launch Without App Id",
                ops::APP_LAUNCH,
                json!({"appId": ""}),
            )
            .negative()
            .expected_latency(10000),
        ],
    )
}

/// Settings cases, gated on declared setting descriptors.
pub fn settings(_config: &RuntimeConfig) -> Suite {
    Suite::new(
        "settings",
        vec![
            TestCase::new("Get Settings", ops::SETTINGS_GET, json!({})).expected_latency(5000),
            TestCase::new(
                "Set Language",
                ops::SETTINGS_SET,
                json!({"language": "en-US"}),
            )
            .with_gate("settings: language")
            .expected_latency(5000),
            TestCase::new(
                "Mute Audio",
                ops::SETTINGS_SET,
                json!({"mute": true}),
            )
            .with_gate("settings: mute")
            .expected_latency(5000),
            TestCase::new(
                "Set Unknown Setting",
                ops::SETTINGS_SET,
                json!({"definitelyNotASetting": 1}),
            )
            .negative()
            .requires_version("2.1")
            .expected_latency(5000),
        ],
    )
}

/// All registered suites.
pub fn all(config: &RuntimeConfig) -> Vec<Suite> {
    vec![conformance(config), settings(config)]
}

/// Look up a suite by name.
pub fn by_name(config: &RuntimeConfig, name: &str) -> Option<Suite> {
    all(config).into_iter().find(|suite| suite.name == name)
}
