//! Field-by-field application of decoded command documents.

use tracing::{debug, error, info, warn};

use super::{
    model::{
        round_to, BridgeState, MqttSettings, OutdoorTempSource, Regulator, FACTOR_PRECISION,
        READING_PRECISION, TEMPERATURE_PRECISION,
    },
    store::SettingsStore,
    update::{SettingsUpdate, VarsUpdate},
};

/// Result of applying one command document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// No field was present and valid.
    Unchanged,
    /// At least one field was applied.
    Changed,
    /// The configuration has been flushed and the process must restart.
    Restart,
}

impl CommandOutcome {
    /// True only for `Changed`; a restart is reported separately.
    pub fn changed(&self) -> bool {
        matches!(self, CommandOutcome::Changed)
    }
}

/// Counts applied fields; an applied field counts even if its value was
/// already current.
#[derive(Debug, Default)]
struct Applied(usize);

impl Applied {
    fn set<T>(&mut self, field: &mut T, value: Option<T>) {
        if let Some(value) = value {
            *field = value;
            self.0 += 1;
        }
    }

    fn any(&self) -> bool {
        self.0 > 0
    }
}

fn in_range<U: TryFrom<i64>>(value: Option<i64>, min: i64, max: i64) -> Option<U> {
    value
        .filter(|v| (min..=max).contains(v))
        .and_then(|v| U::try_from(v).ok())
}

/// Rounds to `precision`; a value that does not fit a finite `f32` is
/// treated as absent.
fn rounded(value: Option<f64>, precision: u32) -> Option<f32> {
    value
        .map(|v| round_to(v, precision))
        .filter(|v| v.is_finite())
}

pub struct CommandProcessor<S> {
    store: S,
}

impl<S: SettingsStore> CommandProcessor<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The store that receives applied changes.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Applies a `settings/set` document. Every applied change is handed to
    /// the store.
    pub async fn apply_settings(
        &mut self,
        state: &mut BridgeState,
        update: &SettingsUpdate,
    ) -> CommandOutcome {
        let mut applied = Applied::default();
        let settings = &mut state.settings;

        applied.set(&mut settings.debug, update.debug);
        applied.set(
            &mut settings.outdoor_temp_source,
            in_range::<u8>(update.outdoor_temp_source, 0, 2)
                .and_then(|v| OutdoorTempSource::try_from(v).ok()),
        );
        applied.set(
            &mut settings.mqtt.interval,
            in_range(
                update.mqtt.interval,
                i64::from(MqttSettings::MIN_INTERVAL),
                i64::from(MqttSettings::MAX_INTERVAL),
            ),
        );

        applied.set(&mut settings.emergency.enable, update.emergency.enable);
        applied.set(
            &mut settings.emergency.target,
            rounded(update.emergency.target, TEMPERATURE_PRECISION),
        );
        applied.set(
            &mut settings.emergency.use_equitherm,
            update.emergency.use_equitherm,
        );

        applied.set(&mut settings.heating.enable, update.heating.enable);
        let heating_target = rounded(update.heating.target, TEMPERATURE_PRECISION);
        applied.set(&mut settings.heating.target, heating_target);
        applied.set(
            &mut settings.heating.hysteresis,
            rounded(update.heating.hysteresis, TEMPERATURE_PRECISION),
        );

        applied.set(&mut settings.dhw.enable, update.dhw.enable);
        applied.set(
            &mut settings.dhw.target,
            in_range(update.dhw.target, 0, 255),
        );

        applied.set(&mut settings.pid.enable, update.pid.enable);
        applied.set(
            &mut settings.pid.p_factor,
            rounded(update.pid.p_factor, FACTOR_PRECISION),
        );
        applied.set(
            &mut settings.pid.i_factor,
            rounded(update.pid.i_factor, FACTOR_PRECISION),
        );
        applied.set(
            &mut settings.pid.d_factor,
            rounded(update.pid.d_factor, FACTOR_PRECISION),
        );

        applied.set(&mut settings.equitherm.enable, update.equitherm.enable);
        applied.set(
            &mut settings.equitherm.n_factor,
            rounded(update.equitherm.n_factor, FACTOR_PRECISION),
        );
        applied.set(
            &mut settings.equitherm.k_factor,
            rounded(update.equitherm.k_factor, FACTOR_PRECISION),
        );
        applied.set(
            &mut settings.equitherm.t_factor,
            rounded(update.equitherm.t_factor, FACTOR_PRECISION),
        );

        // Bounds depend on the regulation flags applied above.
        if heating_target.is_some() {
            state.clamp_heating_target();
        }

        if !applied.any() {
            debug!("Settings command carried no applicable field");
            return CommandOutcome::Unchanged;
        }

        debug!("Applied {} settings field(s)", applied.0);
        if let Err(e) = self.store.update(&state.settings).await {
            warn!("Failed to persist settings: {}", e);
        }
        CommandOutcome::Changed
    }

    /// Applies a `state/set` document. A restart request flushes the
    /// configuration and takes precedence over every other outcome.
    pub async fn apply_vars(
        &mut self,
        state: &mut BridgeState,
        update: &VarsUpdate,
    ) -> CommandOutcome {
        let mut applied = Applied::default();
        let outdoor_editable = state.outdoor_temp_editable();
        let vars = &mut state.vars;

        if update.ping {
            applied.0 += 1;
        }

        applied.set(&mut vars.tuning.enable, update.tuning.enable);
        applied.set(
            &mut vars.tuning.regulator,
            in_range::<u8>(update.tuning.regulator, 0, 1)
                .and_then(|v| Regulator::try_from(v).ok()),
        );

        applied.set(
            &mut vars.temperatures.indoor,
            rounded(update.temperatures.indoor, READING_PRECISION),
        );
        if outdoor_editable {
            applied.set(
                &mut vars.temperatures.outdoor,
                rounded(update.temperatures.outdoor, READING_PRECISION),
            );
        } else if update.temperatures.outdoor.is_some() {
            debug!(
                "Ignoring outdoor temperature, source is {}",
                state.settings.outdoor_temp_source
            );
        }

        if update.restart_requested() {
            info!("Restart requested, flushing settings");
            if let Err(e) = self.store.flush(&state.settings).await {
                error!("Failed to flush settings before restart: {}", e);
            }
            return CommandOutcome::Restart;
        }

        if applied.any() {
            CommandOutcome::Changed
        } else {
            CommandOutcome::Unchanged
        }
    }
}
