//! Settings of the synchronization engine itself.

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BridgeConfig {
    /// Minimum time between two connect attempts.
    #[validate(range(
        min = 1000,
        max = 600_000,
        message = "Reconnect interval must be between 1000 and 600000 ms"
    ))]
    pub reconnect_interval_ms: u64,

    /// Consecutive failed connects after which emergency mode is raised.
    #[validate(range(
        min = 1,
        max = 1000,
        message = "Emergency threshold must be between 1 and 1000"
    ))]
    pub emergency_threshold: u16,

    /// Cadence of the supervisor tick.
    #[validate(range(
        min = 10,
        max = 10_000,
        message = "Tick interval must be between 10 and 10000 ms"
    ))]
    pub tick_interval_ms: u64,

    /// JSON file holding the persisted configuration aggregate.
    #[validate(custom(function = "validate_settings_path"))]
    pub settings_path: PathBuf,

    #[validate(nested)]
    pub discovery: DiscoveryConfig,

    #[validate(nested)]
    pub presence: PresenceConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            reconnect_interval_ms: 5000,
            emergency_threshold: 10,
            tick_interval_ms: 100,
            settings_path: PathBuf::from("/var/lib/otgw-bridge/settings.json"),
            discovery: DiscoveryConfig::default(),
            presence: PresenceConfig::default(),
        }
    }
}

impl BridgeConfig {
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

fn validate_settings_path(path: &PathBuf) -> Result<(), ValidationError> {
    if path.as_os_str().is_empty() || path.file_name().is_none() {
        return Err(ValidationError::new("invalid_settings_path")
            .with_message("Settings path must name a file".into()));
    }
    Ok(())
}

/// Identity used in hub discovery descriptors.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Discovery root the hub listens on.
    #[validate(length(min = 1, message = "Discovery prefix must not be empty"))]
    pub prefix: String,

    /// Stable device id. Used in config topics and unique ids, so only
    /// `[A-Za-z0-9_-]` is accepted.
    #[validate(
        length(min = 1, max = 64, message = "Device id must be 1 to 64 characters"),
        custom(function = "validate_object_id")
    )]
    pub device_id: String,

    #[validate(length(min = 1, message = "Device name must not be empty"))]
    pub device_name: String,

    pub manufacturer: String,
    pub model: String,

    /// Link shown on the hub's device page.
    pub configuration_url: Option<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            prefix: "homeassistant".to_string(),
            device_id: "otgw".to_string(),
            device_name: "OpenTherm Gateway".to_string(),
            manufacturer: "otgw-bridge".to_string(),
            model: "OpenTherm Gateway".to_string(),
            configuration_url: None,
        }
    }
}

fn validate_object_id(id: &str) -> Result<(), ValidationError> {
    if id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_device_id")
            .with_message(format!("Device id contains unsupported characters: {id}").into()))
    }
}

/// Local-network presence refresh after failed connects and state publishes.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PresenceConfig {
    /// Program and arguments, e.g. `["arping", "-U", "-c", "1", "-I", "eth0", "192.168.1.20"]`.
    /// Empty disables the refresh.
    pub command: Vec<String>,

    #[validate(range(
        min = 100,
        max = 30_000,
        message = "Presence timeout must be between 100 and 30000 ms"
    ))]
    pub timeout_ms: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        PresenceConfig {
            command: Vec::new(),
            timeout_ms: 2000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(BridgeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_device_id_charset() {
        let mut config = BridgeConfig::default();
        config.discovery.device_id = "boiler gw".into();
        assert!(config.validate().is_err());

        config.discovery.device_id = "boiler_gw-1".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_settings_path_must_name_a_file() {
        let config = BridgeConfig {
            settings_path: PathBuf::new(),
            ..BridgeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_durations() {
        let config = BridgeConfig::default();
        assert_eq!(config.reconnect_interval(), Duration::from_secs(5));
        assert_eq!(config.tick_interval(), Duration::from_millis(100));
    }
}
