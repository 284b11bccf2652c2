//! The configuration and live-state aggregates and the container that owns them.

mod settings;
mod state;
mod vars;

pub use settings::{
    DhwSettings, EmergencySettings, EquithermSettings, HeatingSettings, MqttSettings,
    OutdoorTempSource, PidSettings, Settings,
};
pub use state::{BridgeState, TempBounds};
pub use vars::{Parameters, Regulator, Sensors, States, StatusToken, Temperatures, Tuning, Vars};

/// Decimal places kept for temperatures and hysteresis.
pub const TEMPERATURE_PRECISION: u32 = 1;
/// Decimal places kept for PID and equitherm factors.
pub const FACTOR_PRECISION: u32 = 3;
/// Decimal places kept for temperatures written into the live state.
pub const READING_PRECISION: u32 = 2;

/// `round(value * 10^p) / 10^p`, computed in `f64` and stored as `f32`.
pub fn round_to(value: f64, precision: u32) -> f32 {
    let scale = 10f64.powi(precision as i32);
    ((value * scale).round() / scale) as f32
}
