//! Device capability cache.
//!
//! What a device supports (operations, settings, input keys, voice
//! systems, applications) is discovered lazily and memoized here for the
//! whole test run. The store is an explicitly constructed object shared via
//! `Arc`, one instance per run; `reset` restores the empty state for test
//! isolation.
//!
//! The open-world default applies throughout: an unpopulated category means
//! "nothing is known to be missing", not "nothing is supported". Tightening
//! this would flip pass/fail outcomes for devices that never declare a
//! list.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tri-state support judgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Validation {
    /// The device declares support.
    Support,
    /// The device declares the capability absent.
    Unsupport,
    /// The descriptor was never populated; no judgment possible.
    Uncertain,
}

/// One voice system as reported by `voice/list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceSystem {
    pub name: String,

    #[serde(default)]
    pub enabled: bool,
}

/// Declared domain of one setting.
///
/// The settings descriptor maps each setting name to the values the device
/// accepts: an enumerated list, a plain boolean availability flag, or a
/// numeric range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingDomain {
    Flag(bool),
    Range { min: f64, max: f64 },
    Options(Vec<Value>),
    Other(Value),
}

/// Parsed `system/settings/list` descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsDescriptor {
    settings: BTreeMap<String, SettingDomain>,
}

impl SettingsDescriptor {
    /// Build a descriptor from a `system/settings/list` response body.
    ///
    /// Accepts both the flat shape (settings next to the `status` field)
    /// and the nested `{"settings": {...}}` shape. Returns `None` when the
    /// body is not an object at all.
    pub fn from_response(body: &Value) -> Option<Self> {
        let object = body.as_object()?;
        let source = object
            .get("settings")
            .and_then(Value::as_object)
            .unwrap_or(object);

        let mut settings = BTreeMap::new();
        for (name, value) in source {
            if name == "status" {
                continue;
            }
            // Other(Value) catches everything, so this cannot fail.
            if let Ok(domain) = serde_json::from_value(value.clone()) {
                settings.insert(name.clone(), domain);
            }
        }
        Some(Self { settings })
    }

    /// Declared domain for a setting, when the descriptor has one.
    pub fn domain(&self, name: &str) -> Option<&SettingDomain> {
        self.settings.get(name)
    }

    /// Number of declared settings.
    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }
}

#[derive(Debug, Default)]
struct Inner {
    operations: BTreeSet<String>,
    settings: Option<SettingsDescriptor>,
    settings_populated: bool,
    keys: BTreeSet<String>,
    voice_systems: Vec<VoiceSystem>,
    applications: BTreeSet<String>,
}

/// Run-wide capability store.
///
/// Writes (population) are mutually exclusive and idempotent; reads may
/// run concurrently with an in-flight population and observe the
/// open-world / `Uncertain` default, which is acceptable.
#[derive(Debug, Default)]
pub struct CapabilityStore {
    inner: Mutex<Inner>,
}

impl CapabilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Restore the empty state. Used between runs for test isolation.
    pub fn reset(&self) {
        *self.lock() = Inner::default();
    }

    // --- operations ---

    /// Record declared operations. Extends the set; duplicates collapse.
    pub fn record_operations<I>(&self, operations: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.lock().operations.extend(operations);
    }

    /// True once at least one operation has been declared.
    pub fn has_operations(&self) -> bool {
        !self.lock().operations.is_empty()
    }

    /// Open-world membership test: true when nothing has been declared,
    /// or when the operation is in the declared set.
    pub fn is_operation_supported(&self, operation: &str) -> bool {
        let inner = self.lock();
        inner.operations.is_empty() || inner.operations.contains(operation)
    }

    // --- settings ---

    /// True once `record_settings` has run, successful or not.
    pub fn settings_populated(&self) -> bool {
        self.lock().settings_populated
    }

    /// Record the settings descriptor. Idempotent: once populated, later
    /// calls are ignored until `reset`. Recording `None` still sets the
    /// populated flag, so a dead descriptor endpoint is probed once per
    /// run rather than once per gate.
    pub fn record_settings(&self, descriptor: Option<SettingsDescriptor>) {
        let mut inner = self.lock();
        if inner.settings_populated {
            return;
        }
        inner.settings = descriptor;
        inner.settings_populated = true;
    }

    /// Judge a setting against the declared descriptor.
    ///
    /// `Uncertain` until a descriptor exists. With one: a setting is
    /// supported when its domain is a non-empty list (containing `value`
    /// when one is given), a boolean `true` flag, or a numeric range whose
    /// bounds differ. Everything else, including an absent key, is
    /// `Unsupport`.
    pub fn is_setting_supported(&self, name: &str, value: Option<&Value>) -> Validation {
        let inner = self.lock();
        let Some(descriptor) = &inner.settings else {
            return Validation::Uncertain;
        };
        match descriptor.domain(name) {
            None => Validation::Unsupport,
            Some(SettingDomain::Flag(true)) => Validation::Support,
            Some(SettingDomain::Flag(false)) => Validation::Unsupport,
            Some(SettingDomain::Options(values)) => {
                if values.is_empty() {
                    Validation::Unsupport
                } else {
                    match value {
                        None => Validation::Support,
                        Some(v) if values.contains(v) => Validation::Support,
                        Some(_) => Validation::Unsupport,
                    }
                }
            }
            Some(SettingDomain::Range { min, max }) => {
                if min != max {
                    Validation::Support
                } else {
                    Validation::Unsupport
                }
            }
            Some(SettingDomain::Other(_)) => Validation::Unsupport,
        }
    }

    // --- input keys ---

    pub fn record_keys<I>(&self, keys: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.lock().keys.extend(keys);
    }

    pub fn has_keys(&self) -> bool {
        !self.lock().keys.is_empty()
    }

    /// Open-world membership test over the declared key list.
    pub fn is_key_supported(&self, key: &str) -> bool {
        let inner = self.lock();
        inner.keys.is_empty() || inner.keys.contains(key)
    }

    // --- voice systems ---

    pub fn record_voice_systems(&self, systems: Vec<VoiceSystem>) {
        let mut inner = self.lock();
        if inner.voice_systems.is_empty() {
            inner.voice_systems = systems;
        }
    }

    pub fn has_voice_systems(&self) -> bool {
        !self.lock().voice_systems.is_empty()
    }

    /// Look up a declared voice system by name.
    pub fn voice_system(&self, name: &str) -> Option<VoiceSystem> {
        self.lock()
            .voice_systems
            .iter()
            .find(|v| v.name == name)
            .cloned()
    }

    // --- applications ---

    pub fn record_applications<I>(&self, applications: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.lock().applications.extend(applications);
    }

    /// Open-world membership test over the declared application list.
    pub fn is_application_supported(&self, application: &str) -> bool {
        let inner = self.lock();
        inner.applications.is_empty() || inner.applications.contains(application)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_open_world_operations() {
        let store = CapabilityStore::new();
        assert!(store.is_operation_supported("anything/at-all"));

        store.record_operations(["applications/launch".to_string()]);
        assert!(store.is_operation_supported("applications/launch"));
        assert!(!store.is_operation_supported("applications/exit"));
    }

    #[test]
    fn test_settings_uncertain_until_populated() {
        let store = CapabilityStore::new();
        assert_eq!(
            store.is_setting_supported("brightness", None),
            Validation::Uncertain
        );
        assert!(!store.settings_populated());
    }

    #[test]
    fn test_settings_population_is_idempotent() {
        let store = CapabilityStore::new();
        let first = SettingsDescriptor::from_response(&json!({"memc": true}));
        store.record_settings(first);
        assert_eq!(store.is_setting_supported("memc", None), Validation::Support);

        // A second population attempt must not replace the descriptor.
        store.record_settings(SettingsDescriptor::from_response(&json!({"memc": false})));
        assert_eq!(store.is_setting_supported("memc", None), Validation::Support);
    }

    #[test]
    fn test_failed_population_still_sets_flag() {
        let store = CapabilityStore::new();
        store.record_settings(None);
        assert!(store.settings_populated());
        assert_eq!(
            store.is_setting_supported("memc", None),
            Validation::Uncertain
        );
    }

    #[test]
    fn test_range_setting_supported_when_bounds_differ() {
        let store = CapabilityStore::new();
        store.record_settings(SettingsDescriptor::from_response(&json!({
            "brightness": {"min": 0, "max": 100},
            "contrast": {"min": 50, "max": 50},
        })));
        assert_eq!(
            store.is_setting_supported("brightness", Some(&json!(50))),
            Validation::Support
        );
        assert_eq!(
            store.is_setting_supported("contrast", None),
            Validation::Unsupport
        );
        assert_eq!(
            store.is_setting_supported("volume", Some(&json!(5))),
            Validation::Unsupport
        );
    }

    #[test]
    fn test_list_setting_checks_membership() {
        let store = CapabilityStore::new();
        store.record_settings(SettingsDescriptor::from_response(&json!({
            "language": ["en-US", "fr-FR"],
            "pictureMode": [],
        })));
        assert_eq!(
            store.is_setting_supported("language", Some(&json!("en-US"))),
            Validation::Support
        );
        assert_eq!(
            store.is_setting_supported("language", Some(&json!("de-DE"))),
            Validation::Unsupport
        );
        assert_eq!(
            store.is_setting_supported("language", None),
            Validation::Support
        );
        assert_eq!(
            store.is_setting_supported("pictureMode", None),
            Validation::Unsupport
        );
    }

    #[test]
    fn test_flag_setting() {
        let store = CapabilityStore::new();
        store.record_settings(SettingsDescriptor::from_response(&json!({
            "memc": true,
            "cec": false,
        })));
        assert_eq!(store.is_setting_supported("memc", None), Validation::Support);
        assert_eq!(store.is_setting_supported("cec", None), Validation::Unsupport);
    }

    #[test]
    fn test_nested_settings_shape() {
        let descriptor = SettingsDescriptor::from_response(&json!({
            "status": 200,
            "settings": {"mute": true}
        }))
        .unwrap();
        assert_eq!(descriptor.len(), 1);
        assert!(descriptor.domain("mute").is_some());
        assert!(descriptor.domain("status").is_none());
    }

    #[test]
    fn test_status_field_is_not_a_setting() {
        let descriptor =
            SettingsDescriptor::from_response(&json!({"status": 200, "memc": true})).unwrap();
        assert!(descriptor.domain("status").is_none());
        assert_eq!(descriptor.len(), 1);
    }

    #[test]
    fn test_keys_open_world() {
        let store = CapabilityStore::new();
        assert!(store.is_key_supported("KEY_HOME"));
        store.record_keys(["KEY_HOME".to_string(), "KEY_BACK".to_string()]);
        assert!(store.is_key_supported("KEY_HOME"));
        assert!(!store.is_key_supported("KEY_POWER"));
    }

    #[test]
    fn test_voice_system_lookup() {
        let store = CapabilityStore::new();
        assert!(store.voice_system("GoogleAssistant").is_none());
        store.record_voice_systems(vec![VoiceSystem {
            name: "GoogleAssistant".to_string(),
            enabled: true,
        }]);
        assert!(store.voice_system("GoogleAssistant").is_some());
        assert!(store.voice_system("Alexa").is_none());
    }

    #[test]
    fn test_reset_restores_empty_state() {
        let store = CapabilityStore::new();
        store.record_operations(["a/b".to_string()]);
        store.record_settings(SettingsDescriptor::from_response(&json!({"memc": true})));
        store.record_keys(["KEY_HOME".to_string()]);
        store.reset();

        assert!(!store.has_operations());
        assert!(!store.settings_populated());
        assert!(store.is_operation_supported("anything"));
        assert_eq!(
            store.is_setting_supported("memc", None),
            Validation::Uncertain
        );
    }
}
