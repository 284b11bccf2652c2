use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

/// Where the outdoor temperature comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum OutdoorTempSource {
    /// Reported by the boiler over OpenTherm.
    #[default]
    Boiler = 0,
    /// Written remotely through `state/set`.
    Manual = 1,
    /// Read from a locally attached sensor.
    Sensor = 2,
}

impl TryFrom<u8> for OutdoorTempSource {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Boiler),
            1 => Ok(Self::Manual),
            2 => Ok(Self::Sensor),
            other => Err(format!("unknown outdoor temperature source: {other}")),
        }
    }
}

impl From<OutdoorTempSource> for u8 {
    fn from(source: OutdoorTempSource) -> Self {
        source as u8
    }
}

impl fmt::Display for OutdoorTempSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Boiler => "boiler",
            Self::Manual => "manual",
            Self::Sensor => "sensor",
        })
    }
}

/// Configuration aggregate. The serialized form is the `settings` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub debug: bool,
    #[serde(rename = "outdoorTempSource")]
    pub outdoor_temp_source: OutdoorTempSource,
    pub mqtt: MqttSettings,
    pub emergency: EmergencySettings,
    pub heating: HeatingSettings,
    pub dhw: DhwSettings,
    pub pid: PidSettings,
    pub equitherm: EquithermSettings,
}

impl Settings {
    /// Live state goes out at this interval, configuration at ten times it.
    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.mqtt.interval))
    }

    /// PID or equitherm regulation owns the heating target.
    pub fn regulated(&self) -> bool {
        self.pid.enable || self.equitherm.enable
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttSettings {
    /// Milliseconds, 1000..=120000.
    pub interval: u32,
}

impl MqttSettings {
    pub const MIN_INTERVAL: u32 = 1000;
    pub const MAX_INTERVAL: u32 = 120_000;
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self { interval: 5000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergencySettings {
    pub enable: bool,
    pub target: f32,
    #[serde(rename = "useEquitherm")]
    pub use_equitherm: bool,
}

impl Default for EmergencySettings {
    fn default() -> Self {
        Self {
            enable: true,
            target: 40.0,
            use_equitherm: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatingSettings {
    pub enable: bool,
    pub target: f32,
    pub hysteresis: f32,
}

impl Default for HeatingSettings {
    fn default() -> Self {
        Self {
            enable: true,
            target: 40.0,
            hysteresis: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DhwSettings {
    pub enable: bool,
    /// Whole degrees only.
    pub target: u8,
}

impl Default for DhwSettings {
    fn default() -> Self {
        Self {
            enable: true,
            target: 40,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidSettings {
    pub enable: bool,
    pub p_factor: f32,
    pub i_factor: f32,
    pub d_factor: f32,
}

impl Default for PidSettings {
    fn default() -> Self {
        Self {
            enable: false,
            p_factor: 3.0,
            i_factor: 0.2,
            d_factor: 1.0,
        }
    }
}

/// Outdoor-temperature compensation curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EquithermSettings {
    pub enable: bool,
    pub n_factor: f32,
    pub k_factor: f32,
    pub t_factor: f32,
}

impl Default for EquithermSettings {
    fn default() -> Self {
        Self {
            enable: false,
            n_factor: 0.67,
            k_factor: 1.0,
            t_factor: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_document_shape() {
        let value = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(value["outdoorTempSource"], json!(0));
        assert_eq!(value["mqtt"]["interval"], json!(5000));
        assert_eq!(value["emergency"]["useEquitherm"], json!(false));
        assert_eq!(value["dhw"]["target"], json!(40));
        assert!(value["pid"].get("p_factor").is_some());
        assert!(value["equitherm"].get("t_factor").is_some());
    }

    #[test]
    fn test_stored_document_with_missing_groups() {
        let settings: Settings =
            serde_json::from_str(r#"{"debug": true, "outdoorTempSource": 1}"#).unwrap();
        assert!(settings.debug);
        assert_eq!(settings.outdoor_temp_source, OutdoorTempSource::Manual);
        assert_eq!(settings.heating, HeatingSettings::default());
    }

    #[test]
    fn test_unknown_source_is_rejected() {
        assert!(serde_json::from_str::<Settings>(r#"{"outdoorTempSource": 7}"#).is_err());
    }

    #[test]
    fn test_regulated() {
        let mut settings = Settings::default();
        assert!(!settings.regulated());
        settings.equitherm.enable = true;
        assert!(settings.regulated());
    }
}
