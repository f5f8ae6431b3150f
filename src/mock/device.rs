//! Scriptable DAB device double.
//!
//! Answers requests on `dab/<device-id>/#` and discovery probes on the
//! broadcast topic. Tests configure the declared capability lists, health,
//! chunked log plans, and failure modes (silent, malformed, forced status)
//! to drive every classification path in the client.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, Weak};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Map, Value};

use dab_protocol::{ops, topics};

use crate::transport::{Message, Transport};

use super::MockBroker;

/// How the device answers discovery probes.
#[derive(Debug, Clone)]
pub enum DiscoveryReplies {
    /// One reply: `{"deviceId": <id>, "ip": <ip>}`.
    Announce,
    /// Publish these payloads verbatim, in order, per probe.
    Scripted(Vec<Value>),
    /// Never answer.
    Silent,
}

/// Mock device configuration.
#[derive(Debug, Clone)]
pub struct MockDeviceConfig {
    pub device_id: String,
    pub ip: Option<String>,

    /// Reply to `operations/list`. An empty list is declared as-is,
    /// leaving clients on their open-world default.
    pub declared_operations: Vec<String>,

    /// Settings descriptor object returned by `system/settings/list`.
    pub settings: Value,

    pub key_codes: Vec<String>,
    pub voice_systems: Vec<Value>,
    pub healthy: bool,
    pub version: String,
    pub device_info: Value,

    /// Chunk plan for `system/logs`: (remainingChunks, raw payload).
    /// Sequences with gaps are allowed; that is the point.
    pub log_chunks: Vec<(u64, Vec<u8>)>,

    /// Operations that are never answered (the client times out).
    pub silent_operations: BTreeSet<String>,

    /// Operations answered with a non-JSON payload.
    pub malformed_operations: BTreeSet<String>,

    /// Forced status codes per operation, overriding normal routing.
    pub status_overrides: BTreeMap<String, i64>,

    pub discovery: DiscoveryReplies,
}

impl Default for MockDeviceConfig {
    fn default() -> Self {
        Self {
            device_id: "mock-device".to_string(),
            ip: Some("192.168.1.20".to_string()),
            declared_operations: vec![
                ops::OPERATIONS_LIST.to_string(),
                ops::VERSION.to_string(),
                ops::DEVICE_INFO.to_string(),
                ops::HEALTH_CHECK.to_string(),
                ops::SETTINGS_LIST.to_string(),
                ops::SETTINGS_GET.to_string(),
                ops::SETTINGS_SET.to_string(),
                ops::KEY_LIST.to_string(),
                ops::KEY_PRESS.to_string(),
                ops::VOICE_LIST.to_string(),
                ops::APP_LAUNCH.to_string(),
                ops::APP_EXIT.to_string(),
                ops::APP_GET_STATE.to_string(),
                ops::LOGS_COLLECT.to_string(),
            ],
            settings: json!({
                "language": ["en-US", "fr-FR"],
                "mute": true,
                "brightness": {"min": 0, "max": 100},
            }),
            key_codes: vec![
                "KEY_HOME".to_string(),
                "KEY_BACK".to_string(),
                "KEY_ENTER".to_string(),
            ],
            voice_systems: vec![json!({"name": "GoogleAssistant", "enabled": true})],
            healthy: true,
            version: "2.1".to_string(),
            device_info: json!({
                "manufacturer": "Acme",
                "model": "TV-1000",
                "serialNumber": "SN-0001",
                "chipset": "acme9000",
                "firmwareVersion": "1.2.3",
                "firmwareBuild": "123",
            }),
            log_chunks: vec![
                (2, b"first ".to_vec()),
                (1, b"second ".to_vec()),
                (0, b"third".to_vec()),
            ],
            silent_operations: BTreeSet::new(),
            malformed_operations: BTreeSet::new(),
            status_overrides: BTreeMap::new(),
            discovery: DiscoveryReplies::Announce,
        }
    }
}

/// A mock DAB device attached to a [`MockBroker`].
pub struct MockDevice {
    broker: Weak<MockBroker>,
    config: Mutex<MockDeviceConfig>,
    app_states: Mutex<HashMap<String, String>>,
    setting_values: Mutex<Map<String, Value>>,
}

impl MockDevice {
    /// Attach a device to the broker. The returned handle configures the
    /// device; the broker keeps it answering until the broker is dropped.
    pub fn attach(broker: &Arc<MockBroker>, config: MockDeviceConfig) -> Arc<Self> {
        let device_id = config.device_id.clone();
        let device = Arc::new(Self {
            broker: Arc::downgrade(broker),
            config: Mutex::new(config),
            app_states: Mutex::new(HashMap::new()),
            setting_values: Mutex::new(Map::new()),
        });

        let on_request = Arc::clone(&device);
        broker
            .subscribe(
                &format!("{}/{}/#", topics::ROOT, device_id),
                Arc::new(move |msg: &Message| on_request.handle_request(msg)),
            )
            .ok();

        let on_probe = Arc::clone(&device);
        broker
            .subscribe(
                topics::DISCOVERY_TOPIC,
                Arc::new(move |msg: &Message| on_probe.handle_discovery(msg)),
            )
            .ok();

        device
    }

    pub fn device_id(&self) -> String {
        self.config.lock().unwrap().device_id.clone()
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.config.lock().unwrap().healthy = healthy;
    }

    pub fn set_discovery(&self, discovery: DiscoveryReplies) {
        self.config.lock().unwrap().discovery = discovery;
    }

    /// Current state of an application, when one has been recorded.
    pub fn app_state(&self, app_id: &str) -> Option<String> {
        self.app_states.lock().unwrap().get(app_id).cloned()
    }

    fn publish_json(&self, topic: &str, body: &Value) {
        if let Some(broker) = self.broker.upgrade() {
            if let Ok(payload) = serde_json::to_vec(body) {
                broker.publish(topic, &payload, None).ok();
            }
        }
    }

    fn handle_discovery(&self, msg: &Message) {
        let Some(reply) = msg.reply_topic.clone() else {
            return;
        };
        let (discovery, device_id, ip) = {
            let config = self.config.lock().unwrap();
            (
                config.discovery.clone(),
                config.device_id.clone(),
                config.ip.clone(),
            )
        };
        match discovery {
            DiscoveryReplies::Announce => {
                let mut body = json!({"deviceId": device_id});
                if let Some(ip) = ip {
                    body["ip"] = json!(ip);
                }
                self.publish_json(&reply, &body);
            }
            DiscoveryReplies::Scripted(payloads) => {
                for payload in payloads {
                    self.publish_json(&reply, &payload);
                }
            }
            DiscoveryReplies::Silent => {}
        }
    }

    fn handle_request(&self, msg: &Message) {
        let config = self.config.lock().unwrap().clone();
        let prefix = format!("{}/{}/", topics::ROOT, config.device_id);
        let Some(operation) = msg.topic.strip_prefix(&prefix) else {
            return;
        };
        if config.silent_operations.contains(operation) {
            return;
        }
        let Some(reply) = msg.reply_topic.clone() else {
            return;
        };
        if config.malformed_operations.contains(operation) {
            if let Some(broker) = self.broker.upgrade() {
                broker.publish(&reply, b"%% not json %%", None).ok();
            }
            return;
        }
        if let Some(code) = config.status_overrides.get(operation) {
            self.publish_json(&reply, &json!({"status": code}));
            return;
        }

        let request: Value = serde_json::from_slice(&msg.payload).unwrap_or(Value::Null);
        let body = self.answer(&config, operation, &request, &reply);
        if let Some(body) = body {
            self.publish_json(&reply, &body);
        }
    }

    /// Route one operation. Returns the reply body, or `None` when the
    /// operation publishes its own messages (chunked logs).
    fn answer(
        &self,
        config: &MockDeviceConfig,
        operation: &str,
        request: &Value,
        reply: &str,
    ) -> Option<Value> {
        match operation {
            ops::OPERATIONS_LIST => Some(json!({
                "status": 200,
                "operations": config.declared_operations,
            })),
            ops::VERSION => Some(json!({"status": 200, "DAB Version": config.version})),
            ops::DEVICE_INFO => {
                let mut body = config.device_info.clone();
                if let Some(obj) = body.as_object_mut() {
                    obj.insert("status".to_string(), json!(200));
                    obj.insert("deviceId".to_string(), json!(config.device_id));
                }
                Some(body)
            }
            ops::HEALTH_CHECK => Some(json!({"status": 200, "healthy": config.healthy})),
            ops::SETTINGS_LIST => {
                let mut body = config.settings.clone();
                if let Some(obj) = body.as_object_mut() {
                    obj.insert("status".to_string(), json!(200));
                }
                Some(body)
            }
            ops::SETTINGS_GET => {
                let values = self.setting_values.lock().unwrap();
                let mut body = json!({"status": 200});
                if let Some(obj) = body.as_object_mut() {
                    for (name, value) in values.iter() {
                        obj.insert(name.clone(), value.clone());
                    }
                }
                Some(body)
            }
            ops::SETTINGS_SET => {
                let Some(requested) = request.as_object() else {
                    return Some(json!({"status": 400}));
                };
                let declared = config.settings.as_object();
                let all_known = requested
                    .keys()
                    .all(|name| declared.is_some_and(|d| d.contains_key(name)));
                if !all_known || requested.is_empty() {
                    return Some(json!({"status": 400}));
                }
                let mut values = self.setting_values.lock().unwrap();
                for (name, value) in requested {
                    values.insert(name.clone(), value.clone());
                }
                Some(json!({"status": 200}))
            }
            ops::KEY_LIST => Some(json!({"status": 200, "keyCodes": config.key_codes})),
            ops::KEY_PRESS => {
                let key = request.get("keyCode").and_then(Value::as_str).unwrap_or("");
                if config.key_codes.iter().any(|k| k == key) {
                    Some(json!({"status": 200}))
                } else {
                    Some(json!({"status": 400}))
                }
            }
            ops::VOICE_LIST => Some(json!({
                "status": 200,
                "voiceSystems": config.voice_systems,
            })),
            ops::APP_LAUNCH => {
                let app = request.get("appId").and_then(Value::as_str).unwrap_or("");
                if app.is_empty() {
                    return Some(json!({"status": 400}));
                }
                self.app_states
                    .lock()
                    .unwrap()
                    .insert(app.to_string(), "FOREGROUND".to_string());
                Some(json!({"status": 200}))
            }
            ops::APP_EXIT => {
                let app = request.get("appId").and_then(Value::as_str).unwrap_or("");
                if app.is_empty() {
                    return Some(json!({"status": 400}));
                }
                let background = request
                    .get("background")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                let state = if background { "BACKGROUND" } else { "STOPPED" };
                self.app_states
                    .lock()
                    .unwrap()
                    .insert(app.to_string(), state.to_string());
                Some(json!({"status": 200, "state": state}))
            }
            ops::APP_GET_STATE => {
                let app = request.get("appId").and_then(Value::as_str).unwrap_or("");
                let state = self
                    .app_state(app)
                    .unwrap_or_else(|| "STOPPED".to_string());
                Some(json!({"status": 200, "state": state}))
            }
            ops::LOGS_COLLECT => {
                for (remaining, data) in &config.log_chunks {
                    self.publish_json(
                        reply,
                        &json!({
                            "remainingChunks": remaining,
                            "data": BASE64.encode(data),
                        }),
                    );
                }
                None
            }
            _ => Some(json!({"status": 501})),
        }
    }
}
