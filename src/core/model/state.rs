use super::{OutdoorTempSource, Settings, Vars};

/// Inclusive temperature range announced for a numeric control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TempBounds {
    pub min: u8,
    pub max: u8,
}

impl TempBounds {
    /// Heating range while a regulator owns the target.
    pub const REGULATED_HEATING: TempBounds = TempBounds { min: 10, max: 30 };

    pub const fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    /// Low bound wins when the range is inverted.
    pub fn clamp(&self, value: f32) -> f32 {
        let (min, max) = (f32::from(self.min), f32::from(self.max));
        if value < min {
            min
        } else if value > max {
            max
        } else {
            value
        }
    }
}

/// Owned state shared by every engine component within a tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BridgeState {
    pub settings: Settings,
    pub vars: Vars,
    emergency: bool,
}

impl BridgeState {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn emergency(&self) -> bool {
        self.emergency
    }

    pub(crate) fn set_emergency(&mut self, emergency: bool) {
        self.emergency = emergency;
    }

    /// Fixed while PID or equitherm regulation is on, device-reported otherwise.
    pub fn heating_bounds(&self) -> TempBounds {
        if self.settings.regulated() {
            TempBounds::REGULATED_HEATING
        } else {
            TempBounds::new(
                self.vars.parameters.heating_min_temp,
                self.vars.parameters.heating_max_temp,
            )
        }
    }

    /// Always device-reported.
    pub fn dhw_bounds(&self) -> TempBounds {
        TempBounds::new(
            self.vars.parameters.dhw_min_temp,
            self.vars.parameters.dhw_max_temp,
        )
    }

    /// The outdoor temperature is remotely writable only in manual mode.
    pub fn outdoor_temp_editable(&self) -> bool {
        self.settings.outdoor_temp_source == OutdoorTempSource::Manual
    }

    pub(crate) fn clamp_heating_target(&mut self) {
        self.settings.heating.target = self.heating_bounds().clamp(self.settings.heating.target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp() {
        let bounds = TempBounds::new(20, 60);
        assert_eq!(bounds.clamp(10.0), 20.0);
        assert_eq!(bounds.clamp(75.5), 60.0);
        assert_eq!(bounds.clamp(42.5), 42.5);

        let inverted = TempBounds::new(50, 40);
        assert_eq!(inverted.clamp(45.0), 50.0);
    }

    #[test]
    fn test_heating_bounds_follow_regulation() {
        let mut state = BridgeState::default();
        state.vars.parameters.heating_min_temp = 25;
        state.vars.parameters.heating_max_temp = 80;
        assert_eq!(state.heating_bounds(), TempBounds::new(25, 80));

        state.settings.pid.enable = true;
        assert_eq!(state.heating_bounds(), TempBounds::REGULATED_HEATING);

        state.settings.heating.target = 55.0;
        state.clamp_heating_target();
        assert_eq!(state.settings.heating.target, 30.0);
    }

    #[test]
    fn test_outdoor_editability() {
        let mut state = BridgeState::default();
        assert!(!state.outdoor_temp_editable());
        state.settings.outdoor_temp_source = OutdoorTempSource::Manual;
        assert!(state.outdoor_temp_editable());
        state.settings.outdoor_temp_source = OutdoorTempSource::Sensor;
        assert!(!state.outdoor_temp_editable());
    }
}
