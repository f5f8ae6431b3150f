//! Capability gating.
//!
//! Before a behavioral test runs, its requirement spec is evaluated
//! against the device: operation requirements consult the capability cache
//! (open-world), while settings, keys and voice requirements go through a
//! live probe, because those domains need device-reported descriptors that
//! are only obtained on demand. Probes populate the shared
//! [`CapabilityStore`] so each descriptor is fetched once per run.
//!
//! Gate evaluation never crashes a test: a probe failure or malformed
//! reply degrades to "cannot confirm support", which counts as an unmet
//! requirement.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde_json::{json, Value};

use dab_gate::{Category, Requirement, RequirementSet};
use dab_protocol::{ops, DabResponse, Operation};

use crate::capability::{CapabilityStore, SettingsDescriptor, Validation, VoiceSystem};
use crate::client::{ClientError, DabClient, DEFAULT_CALL_TIMEOUT};

/// Result of one gate evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateOutcome {
    /// True when every requirement was confirmed supported.
    pub satisfied: bool,

    /// The first requirement that could not be confirmed, when any.
    /// Categories after it were not evaluated.
    pub first_unmet: Option<Requirement>,
}

impl GateOutcome {
    fn met() -> Self {
        Self {
            satisfied: true,
            first_unmet: None,
        }
    }

    fn unmet(category: Category, name: &str) -> Self {
        Self {
            satisfied: false,
            first_unmet: Some(Requirement::new(category, name)),
        }
    }
}

/// Evaluates capability requirements against one device.
pub struct DabChecker {
    client: Arc<DabClient>,
    store: Arc<CapabilityStore>,
    probe_timeout: Duration,
}

impl DabChecker {
    pub fn new(client: Arc<DabClient>, store: Arc<CapabilityStore>) -> Self {
        Self {
            client,
            store,
            probe_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Bound the deadline of each capability probe.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// The capability store this checker populates and consults.
    pub fn store(&self) -> &Arc<CapabilityStore> {
        &self.store
    }

    /// Issue a probe call and return the body of a successful reply.
    /// Any failure (transport, timeout, non-OK status) yields `None`.
    fn probe(&self, device_id: &str, operation: &str, payload: Value) -> Option<Value> {
        match self.client.call(
            device_id,
            &Operation::new(operation),
            &payload,
            self.probe_timeout,
        ) {
            Ok(response) if response.is_ok() => response.body,
            Ok(response) => {
                debug!("probe {operation} answered status {}", response.status);
                None
            }
            Err(err) => {
                warn!("probe {operation} failed: {err}");
                None
            }
        }
    }

    /// Tri-state operation support, populating the declared operation
    /// list on first use.
    ///
    /// `Uncertain` when no list could be obtained; the open-world cache
    /// semantics then apply to anyone consulting the store directly.
    pub fn operation_supported(&self, device_id: &str, operation: &str) -> Validation {
        if !self.store.has_operations() {
            info!("fetching declared operation list from the device");
            if let Some(body) = self.probe(device_id, ops::OPERATIONS_LIST, json!({})) {
                self.store.record_operations(parse_operation_list(&body));
            }
        }
        if !self.store.has_operations() {
            return Validation::Uncertain;
        }
        if self.store.is_operation_supported(operation) {
            Validation::Support
        } else {
            Validation::Unsupport
        }
    }

    /// Tri-state setting support, fetching the settings descriptor on
    /// first use. The populated flag is set even when the probe yields
    /// nothing, so a dead endpoint is probed once per run.
    pub fn setting_supported(
        &self,
        device_id: &str,
        name: &str,
        value: Option<&Value>,
    ) -> Validation {
        if !self.store.settings_populated() {
            info!("fetching supported settings descriptor from the device");
            let descriptor = self
                .probe(device_id, ops::SETTINGS_LIST, json!({}))
                .and_then(|body| SettingsDescriptor::from_response(&body));
            self.store.record_settings(descriptor);
        }
        self.store.is_setting_supported(name, value)
    }

    /// Tri-state key support, fetching the declared key list on first use.
    pub fn key_supported(&self, device_id: &str, key: &str) -> Validation {
        if !self.store.has_keys() {
            info!("fetching supported key list from the device");
            if let Some(body) = self.probe(device_id, ops::KEY_LIST, json!({})) {
                self.store.record_keys(parse_string_list(&body, "keyCodes"));
            }
        }
        if !self.store.has_keys() {
            return Validation::Uncertain;
        }
        if self.store.is_key_supported(key) {
            Validation::Support
        } else {
            Validation::Unsupport
        }
    }

    /// Tri-state voice system support, fetching the declared systems on
    /// first use.
    pub fn voice_supported(&self, device_id: &str, name: &str) -> Validation {
        if !self.store.has_voice_systems() {
            info!("fetching voice system list from the device");
            if let Some(body) = self.probe(device_id, ops::VOICE_LIST, json!({})) {
                self.store
                    .record_voice_systems(parse_voice_systems(&body));
            }
        }
        if !self.store.has_voice_systems() {
            return Validation::Uncertain;
        }
        if self.store.voice_system(name).is_some() {
            Validation::Support
        } else {
            Validation::Unsupport
        }
    }

    /// Evaluate a requirement spec against the device.
    ///
    /// Categories run in a fixed order (operations, settings, keys,
    /// voices, each lexicographically) and evaluation stops at the first
    /// requirement that cannot be confirmed. An empty spec is satisfied.
    pub fn evaluate(&self, device_id: &str, spec: &str) -> GateOutcome {
        let requirements = RequirementSet::parse(spec);
        debug!(
            "gate spec parsed into {} requirement(s): {requirements:?}",
            requirements.len()
        );

        for operation in &requirements.operations {
            if !self.store.is_operation_supported(operation) {
                return GateOutcome::unmet(Category::Operations, operation);
            }
        }
        for setting in &requirements.settings {
            if self.setting_supported(device_id, setting, None) != Validation::Support {
                return GateOutcome::unmet(Category::Settings, setting);
            }
        }
        for key in &requirements.keys {
            if self.key_supported(device_id, key) != Validation::Support {
                return GateOutcome::unmet(Category::Keys, key);
            }
        }
        for voice in &requirements.voices {
            if self.voice_supported(device_id, voice) != Validation::Support {
                return GateOutcome::unmet(Category::Voices, voice);
            }
        }
        GateOutcome::met()
    }

    /// Issue a call, refusing up front when the cache already marks the
    /// operation unsupported.
    ///
    /// This is the one place a typed error stands in for a status code:
    /// calling a known-unsupported operation is a caller programming error
    /// (the caller should have gated first), not a device-reported
    /// outcome.
    pub fn execute_gated(
        &self,
        device_id: &str,
        operation: &Operation,
        payload: &Value,
    ) -> Result<DabResponse, ClientError> {
        if self.store.has_operations() && !self.store.is_operation_supported(operation.name()) {
            return Err(ClientError::UnsupportedOperation {
                operation: operation.name().to_string(),
            });
        }
        self.client.call_default(device_id, operation, payload)
    }
}

/// Parse an `operations/list` body. Both reply generations are accepted:
/// a list of names, or a list of `{"operation": name}` objects.
fn parse_operation_list(body: &Value) -> Vec<String> {
    body.get("operations")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| match entry {
                    Value::String(name) => Some(name.clone()),
                    Value::Object(obj) => obj
                        .get("operation")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a body field holding a list of strings.
fn parse_string_list(body: &Value, field: &str) -> Vec<String> {
    body.get(field)
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a `voice/list` body.
fn parse_voice_systems(body: &Value) -> Vec<VoiceSystem> {
    body.get("voiceSystems")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}
