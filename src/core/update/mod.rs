//! Strongly-typed partial updates decoded from inbound command payloads.
//!
//! Every field is optional. Decoding only fails when the payload as a whole is
//! unusable (empty, not JSON, not an object); field-level type problems turn
//! into missing fields and are left for the command processor to skip.

mod lenient;

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("empty payload")]
    Empty,

    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("payload is not a JSON object")]
    NotAnObject,
}

fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, DecodeError> {
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Err(DecodeError::Empty);
    }
    // Arrays would otherwise bind positionally to the struct fields.
    match serde_json::from_slice::<Value>(payload)? {
        document @ Value::Object(_) => Ok(serde_json::from_value(document)?),
        _ => Err(DecodeError::NotAnObject),
    }
}

/// Decoded `settings/set` document.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub debug: Option<bool>,
    #[serde(
        rename = "outdoorTempSource",
        default,
        deserialize_with = "lenient::integer"
    )]
    pub outdoor_temp_source: Option<i64>,
    #[serde(default, deserialize_with = "lenient::group")]
    pub mqtt: MqttUpdate,
    #[serde(default, deserialize_with = "lenient::group")]
    pub emergency: EmergencyUpdate,
    #[serde(default, deserialize_with = "lenient::group")]
    pub heating: HeatingUpdate,
    #[serde(default, deserialize_with = "lenient::group")]
    pub dhw: DhwUpdate,
    #[serde(default, deserialize_with = "lenient::group")]
    pub pid: PidUpdate,
    #[serde(default, deserialize_with = "lenient::group")]
    pub equitherm: EquithermUpdate,
}

impl SettingsUpdate {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        decode(payload)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct MqttUpdate {
    #[serde(default, deserialize_with = "lenient::integer")]
    pub interval: Option<i64>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct EmergencyUpdate {
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub enable: Option<bool>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub target: Option<f64>,
    #[serde(rename = "useEquitherm", default, deserialize_with = "lenient::boolean")]
    pub use_equitherm: Option<bool>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct HeatingUpdate {
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub enable: Option<bool>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub target: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub hysteresis: Option<f64>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct DhwUpdate {
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub enable: Option<bool>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub target: Option<i64>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct PidUpdate {
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub enable: Option<bool>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub p_factor: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub i_factor: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub d_factor: Option<f64>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct EquithermUpdate {
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub enable: Option<bool>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub n_factor: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub k_factor: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub t_factor: Option<f64>,
}

/// Decoded `state/set` document.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct VarsUpdate {
    /// Heartbeat. Only its truthiness matters.
    #[serde(default, deserialize_with = "lenient::truthy")]
    pub ping: bool,
    #[serde(default, deserialize_with = "lenient::group")]
    pub tuning: TuningUpdate,
    #[serde(default, deserialize_with = "lenient::group")]
    pub temperatures: TemperaturesUpdate,
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub restart: Option<bool>,
}

impl VarsUpdate {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        decode(payload)
    }

    pub fn restart_requested(&self) -> bool {
        self.restart == Some(true)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct TuningUpdate {
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub enable: Option<bool>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub regulator: Option<i64>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct TemperaturesUpdate {
    #[serde(default, deserialize_with = "lenient::number")]
    pub indoor: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub outdoor: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_malformed_payloads() {
        assert!(matches!(
            SettingsUpdate::decode(b""),
            Err(DecodeError::Empty)
        ));
        assert!(matches!(VarsUpdate::decode(b"  \n"), Err(DecodeError::Empty)));
        assert!(matches!(
            SettingsUpdate::decode(b"{\"debug\": "),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_non_object_documents_fail() {
        assert!(matches!(
            SettingsUpdate::decode(b"null"),
            Err(DecodeError::NotAnObject)
        ));
        assert!(matches!(
            SettingsUpdate::decode(b"[true, 2]"),
            Err(DecodeError::NotAnObject)
        ));
        assert!(matches!(
            VarsUpdate::decode(b"42"),
            Err(DecodeError::NotAnObject)
        ));
    }

    #[test]
    fn test_full_settings_document() {
        let update = SettingsUpdate::decode(
            br#"{
                "debug": true,
                "outdoorTempSource": 2,
                "mqtt": {"interval": 10000},
                "emergency": {"enable": false, "target": 45.5, "useEquitherm": true},
                "heating": {"enable": true, "target": 50, "hysteresis": 0.3},
                "dhw": {"enable": false, "target": 55},
                "pid": {"enable": true, "p_factor": 2.5, "i_factor": 0.1, "d_factor": 0},
                "equitherm": {"enable": true, "n_factor": 0.7, "k_factor": 3, "t_factor": 2.25}
            }"#,
        )
        .unwrap();

        assert_eq!(update.debug, Some(true));
        assert_eq!(update.outdoor_temp_source, Some(2));
        assert_eq!(update.mqtt.interval, Some(10000));
        assert_eq!(update.emergency.use_equitherm, Some(true));
        assert_eq!(update.heating.target, Some(50.0));
        assert_eq!(update.dhw.target, Some(55));
        assert_eq!(update.pid.d_factor, Some(0.0));
        assert_eq!(update.equitherm.t_factor, Some(2.25));
    }

    #[test]
    fn test_mistyped_fields_become_missing() {
        let update = SettingsUpdate::decode(
            br#"{
                "debug": 1,
                "outdoorTempSource": 1.0,
                "heating": {"enable": "yes", "target": "hot", "hysteresis": 0.4},
                "dhw": {"target": 50.5},
                "pid": 7,
                "unknown": {"anything": true}
            }"#,
        )
        .unwrap();

        assert_eq!(update.debug, None);
        assert_eq!(update.outdoor_temp_source, None);
        assert_eq!(update.heating.enable, None);
        assert_eq!(update.heating.target, None);
        assert_eq!(update.heating.hysteresis, Some(0.4));
        assert_eq!(update.dhw.target, None);
        assert_eq!(update.pid, PidUpdate::default());
    }

    #[test]
    fn test_null_is_missing() {
        let update = SettingsUpdate::decode(br#"{"debug": null, "heating": null}"#).unwrap();
        assert_eq!(update, SettingsUpdate::default());
    }

    #[test]
    fn test_vars_document() {
        let update = VarsUpdate::decode(
            br#"{
                "ping": "x",
                "tuning": {"enable": true, "regulator": 1},
                "temperatures": {"indoor": 21.456, "outdoor": -4},
                "restart": false
            }"#,
        )
        .unwrap();

        assert!(update.ping);
        assert_eq!(update.tuning.enable, Some(true));
        assert_eq!(update.tuning.regulator, Some(1));
        assert_eq!(update.temperatures.indoor, Some(21.456));
        assert_eq!(update.temperatures.outdoor, Some(-4.0));
        assert!(!update.restart_requested());
    }

    #[test]
    fn test_ping_truthiness() {
        for (payload, expected) in [
            (r#"{"ping": true}"#, true),
            (r#"{"ping": 1}"#, true),
            (r#"{"ping": "alive"}"#, true),
            (r#"{"ping": false}"#, false),
            (r#"{"ping": 0}"#, false),
            (r#"{"ping": ""}"#, false),
            (r#"{"ping": null}"#, false),
            (r#"{}"#, false),
        ] {
            let update = VarsUpdate::decode(payload.as_bytes()).unwrap();
            assert_eq!(update.ping, expected, "payload {payload}");
        }
    }

    #[test]
    fn test_restart_must_be_boolean_true() {
        assert!(VarsUpdate::decode(br#"{"restart": true}"#)
            .unwrap()
            .restart_requested());
        assert!(!VarsUpdate::decode(br#"{"restart": 1}"#)
            .unwrap()
            .restart_requested());
    }
}
