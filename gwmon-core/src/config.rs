//! Monitoring configuration.

use crate::directory::resolve_directory;
use crate::layout::BufferSizes;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default gateway identifier, also the default monitor file name.
pub const DEFAULT_GATEWAY_ID: &str = "gateway";

/// Configuration for shared-memory monitoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Whether the monitor file is created at all.
    ///
    /// When false the no-op manager is used and no counters are published.
    pub enabled: bool,
    /// Gateway identifier, written into the file and used as its name.
    pub gateway_id: String,
    /// Directory for the monitor file. `None` uses [`resolve_directory`].
    pub directory: Option<PathBuf>,
    /// Counter buffer sizes.
    pub buffer_sizes: BufferSizes,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            gateway_id: DEFAULT_GATEWAY_ID.to_string(),
            directory: None,
            buffer_sizes: BufferSizes::default(),
        }
    }
}

impl MonitoringConfig {
    /// Create a new builder.
    pub fn builder() -> MonitoringConfigBuilder {
        MonitoringConfigBuilder::default()
    }

    /// Create configuration from environment variables.
    ///
    /// Environment variables:
    /// - `GWMON_ENABLED`: "true"/"1"/"yes"/"on" to enable monitoring
    /// - `GWMON_GATEWAY_ID`: gateway identifier (defaults to "gateway")
    /// - `GWMON_DIRECTORY`: monitor directory (defaults to the resolved one)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            enabled: lookup("GWMON_ENABLED")
                .map(|s| parse_flag(&s))
                .unwrap_or(defaults.enabled),
            gateway_id: lookup("GWMON_GATEWAY_ID")
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.gateway_id),
            directory: lookup("GWMON_DIRECTORY")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            buffer_sizes: defaults.buffer_sizes,
        }
    }

    /// Enable or disable monitoring.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the gateway identifier.
    pub fn with_gateway_id(mut self, gateway_id: impl Into<String>) -> Self {
        self.gateway_id = gateway_id.into();
        self
    }

    /// Set the monitor directory.
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Set the counter buffer sizes.
    pub fn with_buffer_sizes(mut self, sizes: BufferSizes) -> Self {
        self.buffer_sizes = sizes;
        self
    }

    /// Directory the monitor file lives in.
    pub fn monitor_directory(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(resolve_directory)
    }

    /// Full path of the monitor file.
    pub fn monitor_file_path(&self) -> PathBuf {
        self.monitor_directory().join(&self.gateway_id)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Builder for [`MonitoringConfig`].
#[derive(Debug, Clone, Default)]
pub struct MonitoringConfigBuilder {
    enabled: Option<bool>,
    gateway_id: Option<String>,
    directory: Option<PathBuf>,
    buffer_sizes: Option<BufferSizes>,
}

impl MonitoringConfigBuilder {
    /// Enable or disable monitoring.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    /// Set the gateway identifier.
    pub fn gateway_id(mut self, gateway_id: impl Into<String>) -> Self {
        self.gateway_id = Some(gateway_id.into());
        self
    }

    /// Set the monitor directory.
    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Set the counter buffer sizes.
    pub fn buffer_sizes(mut self, sizes: BufferSizes) -> Self {
        self.buffer_sizes = Some(sizes);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> MonitoringConfig {
        let defaults = MonitoringConfig::default();
        MonitoringConfig {
            enabled: self.enabled.unwrap_or(defaults.enabled),
            gateway_id: self.gateway_id.unwrap_or(defaults.gateway_id),
            directory: self.directory.or(defaults.directory),
            buffer_sizes: self.buffer_sizes.unwrap_or(defaults.buffer_sizes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_disabled() {
        let config = MonitoringConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.gateway_id, DEFAULT_GATEWAY_ID);
        assert!(config.directory.is_none());
        assert_eq!(config.buffer_sizes, BufferSizes::default());
    }

    #[test]
    fn lookup_reads_variables() {
        let vars: HashMap<&str, &str> = [
            ("GWMON_ENABLED", "Yes"),
            ("GWMON_GATEWAY_ID", "edge-7"),
            ("GWMON_DIRECTORY", "/var/run/gwmon"),
        ]
        .into_iter()
        .collect();

        let config = MonitoringConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert!(config.enabled);
        assert_eq!(config.gateway_id, "edge-7");
        assert_eq!(config.monitor_file_path(), PathBuf::from("/var/run/gwmon/edge-7"));
    }

    #[test]
    fn lookup_ignores_empty_values() {
        let config = MonitoringConfig::from_lookup(|k| match k {
            "GWMON_ENABLED" => Some("off".to_string()),
            _ => Some(String::new()),
        });
        assert!(!config.enabled);
        assert_eq!(config.gateway_id, DEFAULT_GATEWAY_ID);
        assert!(config.directory.is_none());
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = MonitoringConfig::builder()
            .enabled(true)
            .gateway_id("gw-1")
            .directory("/tmp/monitor")
            .buffer_sizes(BufferSizes::for_counters(64))
            .build();
        assert!(config.enabled);
        assert_eq!(config.monitor_directory(), PathBuf::from("/tmp/monitor"));
        assert_eq!(config.buffer_sizes.gateway_values, 512);
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: MonitoringConfig =
            serde_json::from_str(r#"{"enabled": true, "gateway_id": "gw-2"}"#).unwrap();
        assert!(config.enabled);
        assert_eq!(config.gateway_id, "gw-2");
        assert_eq!(config.buffer_sizes, BufferSizes::default());
    }
}
