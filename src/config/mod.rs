//! Runtime configuration.
//!
//! Test cases refer to applications by alias (`youtube`, `sample_app`) so
//! suites stay device-neutral; the alias map and the default voice system
//! can be overridden by a TOML file. Built-in defaults apply for anything
//! the file does not set.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::Deserialize;

/// Effective runtime configuration: built-in defaults with file overrides
/// applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Application alias → device application id.
    pub apps: BTreeMap<String, String>,

    /// Voice system name used by voice cases.
    pub voice_system: String,
}

/// File shape: every key optional.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    apps: Option<BTreeMap<String, String>>,
    voice_system: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let apps = [
            ("youtube", "YouTube"),
            ("netflix", "Netflix"),
            ("prime_video", "PrimeVideo"),
            ("sample_app", "Sample_App"),
        ]
        .into_iter()
        .map(|(alias, id)| (alias.to_string(), id.to_string()))
        .collect();
        Self {
            apps,
            voice_system: "GoogleAssistant".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Parse a TOML override document over the defaults.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content)?;
        let mut config = Self::default();
        if let Some(apps) = raw.apps {
            config.apps = apps;
        }
        if let Some(voice_system) = raw.voice_system {
            config.voice_system = voice_system;
        }
        Ok(config)
    }

    /// Load overrides from a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Resolve an application alias; an unknown alias is taken verbatim
    /// as the application id.
    pub fn app_id<'a>(&'a self, alias: &'a str) -> &'a str {
        self.apps.get(alias).map(String::as_str).unwrap_or(alias)
    }
}

/// Configuration loading failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] io::Error),

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
}
