use std::fmt;

use serde::{Deserialize, Serialize};

/// Regulator being auto-tuned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Regulator {
    #[default]
    Equitherm = 0,
    Pid = 1,
}

impl TryFrom<u8> for Regulator {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Equitherm),
            1 => Ok(Self::Pid),
            other => Err(format!("unknown regulator: {other}")),
        }
    }
}

impl From<Regulator> for u8 {
    fn from(regulator: Regulator) -> Self {
        regulator as u8
    }
}

/// Live-state aggregate. The serialized form is the `state` document.
///
/// Apart from tuning and the indoor/outdoor temperatures, every field belongs
/// to the appliance driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vars {
    pub tuning: Tuning,
    pub states: States,
    pub sensors: Sensors,
    pub temperatures: Temperatures,
    pub parameters: Parameters,
}

impl Vars {
    pub fn status_token(&self) -> StatusToken {
        if self.states.fault {
            StatusToken::Fault
        } else if self.states.ot_status {
            StatusToken::Online
        } else {
            StatusToken::Offline
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub enable: bool,
    pub regulator: Regulator,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct States {
    /// OpenTherm link is up.
    #[serde(rename = "otStatus")]
    pub ot_status: bool,
    pub heating: bool,
    pub dhw: bool,
    pub flame: bool,
    pub fault: bool,
    pub diagnostic: bool,
    #[serde(rename = "faultCode")]
    pub fault_code: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sensors {
    /// Percent.
    pub modulation: f32,
    /// Bar.
    pub pressure: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Temperatures {
    pub indoor: f32,
    pub outdoor: f32,
    pub heating: f32,
    pub dhw: f32,
}

/// Bounds and setpoint reported by the appliance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Parameters {
    pub heating_min_temp: u8,
    pub heating_max_temp: u8,
    pub heating_setpoint: f32,
    pub dhw_min_temp: u8,
    pub dhw_max_temp: u8,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            heating_min_temp: 20,
            heating_max_temp: 90,
            heating_setpoint: 0.0,
            dhw_min_temp: 30,
            dhw_max_temp: 60,
        }
    }
}

/// Value published on the `status` address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusToken {
    Fault,
    Online,
    Offline,
}

impl StatusToken {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusToken::Fault => "fault",
            StatusToken::Online => "online",
            StatusToken::Offline => "offline",
        }
    }
}

impl fmt::Display for StatusToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
