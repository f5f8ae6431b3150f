//! DAB operation names.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A remote DAB procedure, identified by its hierarchical name
/// (e.g. `applications/launch`).
///
/// Immutable once constructed; both the request topic and the reply topic
/// are derived from it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Operation(String);

impl Operation {
    /// Create an operation from its hierarchical name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The hierarchical operation name.
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Operation {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Well-known operation names used by the checker and the preflight path.
pub mod ops {
    pub const OPERATIONS_LIST: &str = "operations/list";
    pub const SETTINGS_LIST: &str = "system/settings/list";
    pub const SETTINGS_GET: &str = "system/settings/get";
    pub const SETTINGS_SET: &str = "system/settings/set";
    pub const KEY_LIST: &str = "input/key/list";
    pub const KEY_PRESS: &str = "input/key-press";
    pub const VOICE_LIST: &str = "voice/list";
    pub const VOICE_SET: &str = "voice/set";
    pub const HEALTH_CHECK: &str = "health-check/get";
    pub const VERSION: &str = "version";
    pub const DEVICE_INFO: &str = "device/info";
    pub const APP_LAUNCH: &str = "applications/launch";
    pub const APP_EXIT: &str = "applications/exit";
    pub const APP_GET_STATE: &str = "applications/get-state";
    pub const APP_LIST: &str = "applications/list";
    pub const LOGS_COLLECT: &str = "system/logs";
}
