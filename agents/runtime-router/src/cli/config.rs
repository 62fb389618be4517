//! Configuration module
//!
//! Handles loading and validating router configuration from TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::store::file::{DEFAULT_ALLOWLIST_PATH, DEFAULT_STATE_PATH};
use crate::workload::RUNTIME_OVERRIDE_LABEL;

/// Well-known container engine sockets merged into every registry.
///
/// The bundled connector speaks the Docker Engine API only, so the CRI-O and
/// containerd sockets register only when a Docker-compatible shim serves
/// them. Otherwise they are logged as unavailable at startup.
pub const DEFAULT_ENDPOINTS: [&str; 3] = [
    "unix:///var/run/crio/crio.sock",
    "unix:///run/containerd/containerd.sock",
    "unix:///var/run/docker.sock",
];

/// Main configuration structure for the Runtime Router
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection registry settings
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Workload selector settings
    #[serde(default)]
    pub selector: SelectorConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Initial freshness period and bootstrap dial timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,

    /// Registry state document
    #[serde(default = "default_state_path")]
    pub state_path: String,

    /// Endpoint allowlist document
    #[serde(default = "default_allowlist_path")]
    pub allowlist_path: String,

    /// Endpoints registered at startup in addition to the allowlist
    #[serde(default = "default_endpoints")]
    pub default_endpoints: Vec<String>,
}

/// Workload selector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Label carrying the requested runtime endpoint
    #[serde(default = "default_label_key")]
    pub label_key: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_timeout_secs() -> u64 {
    10
}

fn default_state_path() -> String {
    DEFAULT_STATE_PATH.to_string()
}

fn default_allowlist_path() -> String {
    DEFAULT_ALLOWLIST_PATH.to_string()
}

fn default_endpoints() -> Vec<String> {
    DEFAULT_ENDPOINTS.iter().map(|e| e.to_string()).collect()
}

fn default_label_key() -> String {
    RUNTIME_OVERRIDE_LABEL.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_timeout_secs(),
            state_path: default_state_path(),
            allowlist_path: default_allowlist_path(),
            default_endpoints: default_endpoints(),
        }
    }
}

impl RegistryConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            label_key: default_label_key(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is absent
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject settings the registry cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.registry.default_timeout_secs == 0 {
            anyhow::bail!("registry.default_timeout_secs must be greater than zero");
        }
        if self.selector.label_key.is_empty() {
            anyhow::bail!("selector.label_key must not be empty");
        }
        if let Some(empty) = self.registry.default_endpoints.iter().position(|e| e.is_empty()) {
            anyhow::bail!("registry.default_endpoints[{}] is empty", empty);
        }
        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }
}
