//! Every entity the bridge exposes to the hub.

use super::descriptor::{nest, Component, Descriptor, Device};
use crate::{
    config::bridge::DiscoveryConfig,
    core::{model::TempBounds, topic::TopicResolver},
};

const OUTDOOR_SOURCES: [&str; 3] = ["Boiler", "Manual", "External sensor"];
const REGULATORS: [&str; 2] = ["Equitherm", "PID"];

/// Which aggregate an entity reads from and writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Document {
    Settings,
    State,
}

/// Builds descriptors for a single device.
#[derive(Debug, Clone)]
pub struct Catalog {
    prefix: String,
    device_id: String,
    device: Device,
    topics: TopicResolver,
}

impl Catalog {
    pub fn new(config: &DiscoveryConfig, topics: TopicResolver) -> Self {
        let device = Device {
            identifiers: vec![config.device_id.clone()],
            name: config.device_name.clone(),
            manufacturer: config.manufacturer.clone(),
            model: config.model.clone(),
            sw_version: env!("CARGO_PKG_VERSION").to_string(),
            configuration_url: config.configuration_url.clone(),
        };
        Self {
            prefix: config.prefix.trim_end_matches('/').to_string(),
            device_id: config.device_id.clone(),
            device,
            topics,
        }
    }

    /// `<prefix>/<component>/<device-id>/<key>/config`
    pub fn config_topic(&self, component: Component, key: &str) -> String {
        format!(
            "{}/{}/{}/{}/config",
            self.prefix,
            component.as_str(),
            self.device_id,
            key
        )
    }

    /// Entities whose shape never depends on runtime state.
    pub fn static_entities(&self) -> Vec<Descriptor> {
        vec![
            // switches
            self.switch(Document::Settings, "debug", "Debug", "debug")
                .config_category()
                .icon("mdi:code-braces"),
            self.switch(Document::Settings, "emergency", "Use emergency", "emergency.enable")
                .config_category()
                .icon("mdi:sun-snowflake-variant"),
            self.switch(
                Document::Settings,
                "emergency_use_equitherm",
                "Use equitherm in emergency",
                "emergency.useEquitherm",
            )
            .config_category()
            .icon("mdi:snowflake-alert"),
            self.switch(Document::Settings, "heating", "Heating", "heating.enable")
                .icon("mdi:radiator"),
            self.switch(Document::Settings, "dhw", "DHW", "dhw.enable")
                .icon("mdi:water-pump"),
            self.switch(Document::Settings, "pid", "PID", "pid.enable")
                .config_category()
                .icon("mdi:chart-bar-stacked"),
            self.switch(Document::Settings, "equitherm", "Equitherm", "equitherm.enable")
                .config_category()
                .icon("mdi:sun-snowflake-variant"),
            self.switch(Document::State, "tuning", "Tuning", "tuning.enable")
                .config_category()
                .icon("mdi:tune-vertical"),
            // selects
            self.select(
                Document::Settings,
                "outdoor_temp_source",
                "Outdoor temperature source",
                "outdoorTempSource",
                &OUTDOOR_SOURCES,
            )
            .config_category()
            .icon("mdi:home-thermometer"),
            self.select(
                Document::State,
                "tuning_regulator",
                "Tuning regulator",
                "tuning.regulator",
                &REGULATORS,
            )
            .config_category(),
            // numbers
            self.number(Document::Settings, "emergency_target", "Emergency target temperature", "emergency.target", 1)
                .config_category()
                .temperature()
                .bounds(5.0, 80.0, 0.5),
            self.number(Document::Settings, "heating_hysteresis", "Heating hysteresis", "heating.hysteresis", 1)
                .config_category()
                .device_class("temperature")
                .unit("°C")
                .bounds(0.0, 5.0, 0.1),
            self.number(Document::Settings, "pid_p_factor", "PID factor P", "pid.p_factor", 3)
                .config_category()
                .icon("mdi:alpha-p-circle-outline")
                .bounds(0.001, 10.0, 0.001),
            self.number(Document::Settings, "pid_i_factor", "PID factor I", "pid.i_factor", 3)
                .config_category()
                .icon("mdi:alpha-i-circle-outline")
                .bounds(0.0, 10.0, 0.001),
            self.number(Document::Settings, "pid_d_factor", "PID factor D", "pid.d_factor", 3)
                .config_category()
                .icon("mdi:alpha-d-circle-outline")
                .bounds(0.0, 10.0, 0.001),
            self.number(Document::Settings, "equitherm_n_factor", "Equitherm factor N", "equitherm.n_factor", 3)
                .config_category()
                .icon("mdi:alpha-n-circle-outline")
                .bounds(0.001, 5.0, 0.001),
            self.number(Document::Settings, "equitherm_k_factor", "Equitherm factor K", "equitherm.k_factor", 3)
                .config_category()
                .icon("mdi:alpha-k-circle-outline")
                .bounds(0.0, 10.0, 0.01),
            self.number(Document::Settings, "equitherm_t_factor", "Equitherm factor T", "equitherm.t_factor", 3)
                .config_category()
                .icon("mdi:alpha-t-circle-outline")
                .bounds(0.0, 10.0, 0.01),
            self.number(Document::State, "indoor_temp", "Indoor temperature", "temperatures.indoor", 2)
                .temperature()
                .bounds(-40.0, 60.0, 0.01),
            // sensors
            self.sensor("heating_setpoint", "Heating setpoint", "parameters.heatingSetpoint", 1)
                .temperature()
                .measurement(),
            self.sensor("heating_temp", "Heating temperature", "temperatures.heating", 2)
                .temperature()
                .measurement(),
            self.sensor("dhw_temp", "DHW temperature", "temperatures.dhw", 2)
                .temperature()
                .measurement(),
            self.sensor("modulation", "Modulation level", "sensors.modulation", 0)
                .device_class("power_factor")
                .unit("%")
                .measurement(),
            self.sensor("pressure", "Pressure", "sensors.pressure", 2)
                .device_class("pressure")
                .unit("bar")
                .measurement(),
            self.sensor("fault_code", "Fault code", "states.faultCode", 0)
                .diagnostic_category()
                .icon("mdi:cog-box"),
            // binary sensors
            self.binary_sensor("ot_status", "OpenTherm status", "states.otStatus")
                .diagnostic_category()
                .device_class("connectivity"),
            self.binary_sensor("heating_state", "Heating active", "states.heating")
                .device_class("running"),
            self.binary_sensor("dhw_state", "DHW active", "states.dhw")
                .device_class("running"),
            self.binary_sensor("flame", "Flame", "states.flame")
                .device_class("running")
                .icon("mdi:fire"),
            self.binary_sensor("fault", "Fault", "states.fault")
                .diagnostic_category()
                .device_class("problem"),
            self.binary_sensor("diagnostic", "Diagnostic", "states.diagnostic")
                .diagnostic_category()
                .device_class("problem"),
            self.connectivity(),
        ]
    }

    /// Heating target number, in half-degree steps within `bounds`.
    pub fn heating_target(&self, bounds: TempBounds) -> Descriptor {
        self.number(Document::Settings, "heating_target", "Heating target", "heating.target", 1)
            .temperature()
            .bounds(f32::from(bounds.min), f32::from(bounds.max), 0.5)
    }

    /// Whole-degree DHW target number.
    pub fn dhw_target(&self, bounds: TempBounds) -> Descriptor {
        self.number(Document::Settings, "dhw_target", "DHW target", "dhw.target", 0)
            .temperature()
            .bounds(f32::from(bounds.min), f32::from(bounds.max), 1.0)
    }

    /// Thermostat card for the heating circuit. While regulated the target is
    /// a room temperature, so the current reading follows it.
    pub fn heating_climate(&self, bounds: TempBounds, regulated: bool) -> Descriptor {
        let current = if regulated {
            "temperatures.indoor"
        } else {
            "temperatures.heating"
        };
        self.climate("heating_climate", "Heating", "heating", current, 1, bounds, 0.5)
            .icon("mdi:radiator")
    }

    pub fn dhw_climate(&self, bounds: TempBounds) -> Descriptor {
        self.climate("dhw_climate", "DHW", "dhw", "temperatures.dhw", 0, bounds, 1.0)
            .icon("mdi:water-pump")
    }

    /// Writable outdoor temperature, offered only in manual mode.
    pub fn outdoor_number(&self) -> Descriptor {
        self.number(Document::State, "outdoor_temp", "Outdoor temperature", "temperatures.outdoor", 2)
            .temperature()
            .bounds(-70.0, 50.0, 0.01)
    }

    /// Read-only outdoor temperature, offered for every other source.
    pub fn outdoor_sensor(&self) -> Descriptor {
        self.sensor("outdoor_temp", "Outdoor temperature", "temperatures.outdoor", 2)
            .temperature()
            .measurement()
    }

    fn entity(&self, component: Component, key: &str, name: &str) -> Descriptor {
        Descriptor::new(component, key, name, &self.device_id, self.device.clone())
            .available_on(&self.topics.status())
    }

    fn state_topic(&self, document: Document) -> String {
        match document {
            Document::Settings => self.topics.settings(),
            Document::State => self.topics.state(),
        }
    }

    fn command_topic(&self, document: Document) -> String {
        match document {
            Document::Settings => self.topics.settings_set(),
            Document::State => self.topics.state_set(),
        }
    }

    fn switch(&self, document: Document, key: &str, name: &str, path: &str) -> Descriptor {
        let mut d = self.entity(Component::Switch, key, name);
        d.state_topic = Some(self.state_topic(document));
        d.value_template = Some(on_off(path));
        d.command_topic = Some(self.command_topic(document));
        d.payload_on = Some(nest(path, "true"));
        d.payload_off = Some(nest(path, "false"));
        d.state_on = Some("ON");
        d.state_off = Some("OFF");
        d
    }

    fn number(
        &self,
        document: Document,
        key: &str,
        name: &str,
        path: &str,
        precision: u32,
    ) -> Descriptor {
        let mut d = self.entity(Component::Number, key, name);
        d.state_topic = Some(self.state_topic(document));
        d.value_template = Some(reading(path, precision));
        d.command_topic = Some(self.command_topic(document));
        d.command_template = Some(nest(path, &command_value(precision)));
        d
    }

    fn select(
        &self,
        document: Document,
        key: &str,
        name: &str,
        path: &str,
        options: &[&'static str],
    ) -> Descriptor {
        let quoted = options
            .iter()
            .map(|o| format!("'{o}'"))
            .collect::<Vec<_>>()
            .join(", ");

        let mut branches = String::new();
        for (index, option) in options.iter().enumerate().skip(1) {
            let keyword = if index == 1 { "if" } else { "elif" };
            branches.push_str(&format!("{{% {keyword} value == '{option}' %}}{index}"));
        }
        branches.push_str("{% else %}0{% endif %}");

        let mut d = self.entity(Component::Select, key, name);
        d.state_topic = Some(self.state_topic(document));
        d.value_template = Some(format!("{{{{ [{quoted}][value_json.{path}|int(0)] }}}}"));
        d.command_topic = Some(self.command_topic(document));
        d.command_template = Some(nest(path, &branches));
        d.options = Some(options.to_vec());
        d
    }

    fn sensor(&self, key: &str, name: &str, path: &str, precision: u32) -> Descriptor {
        let mut d = self.entity(Component::Sensor, key, name);
        d.state_topic = Some(self.topics.state());
        d.value_template = Some(reading(path, precision));
        d
    }

    fn binary_sensor(&self, key: &str, name: &str, path: &str) -> Descriptor {
        let mut d = self.entity(Component::BinarySensor, key, name);
        d.state_topic = Some(self.topics.state());
        d.value_template = Some(on_off(path));
        d.payload_on = Some("ON".to_string());
        d.payload_off = Some("OFF".to_string());
        d
    }

    /// Reads the status address directly, so it carries no availability.
    fn connectivity(&self) -> Descriptor {
        let mut d = Descriptor::new(
            Component::BinarySensor,
            "status",
            "Status",
            &self.device_id,
            self.device.clone(),
        )
        .diagnostic_category()
        .device_class("problem");
        d.state_topic = Some(self.topics.status());
        d.value_template = Some("{{ iif(value == 'online', 'OFF', 'ON') }}".to_string());
        d.payload_on = Some("ON".to_string());
        d.payload_off = Some("OFF".to_string());
        d
    }

    #[allow(clippy::too_many_arguments)]
    fn climate(
        &self,
        key: &str,
        name: &str,
        group: &str,
        current: &str,
        precision: u32,
        bounds: TempBounds,
        step: f32,
    ) -> Descriptor {
        let enable = format!("{group}.enable");
        let target = format!("{group}.target");

        let mut d = self.entity(Component::Climate, key, name);
        d.modes = Some(vec!["off", "heat"]);
        d.mode_command_topic = Some(self.topics.settings_set());
        d.mode_command_template = Some(nest(
            &enable,
            "{% if value == 'heat' %}true{% else %}false{% endif %}",
        ));
        d.mode_state_topic = Some(self.topics.settings());
        d.mode_state_template = Some(format!(
            "{{{{ iif(value_json.{enable}, 'heat', 'off', 'off') }}}}"
        ));
        d.current_temperature_topic = Some(self.topics.state());
        d.current_temperature_template = Some(reading(current, 2));
        d.temperature_command_topic = Some(self.topics.settings_set());
        d.temperature_command_template = Some(nest(&target, &command_value(precision)));
        d.temperature_state_topic = Some(self.topics.settings());
        d.temperature_state_template = Some(reading(&target, precision));
        d.temperature_unit = Some("C");
        d.min_temp = Some(f32::from(bounds.min));
        d.max_temp = Some(f32::from(bounds.max));
        d.temp_step = Some(step);
        d
    }
}

fn on_off(path: &str) -> String {
    format!("{{{{ iif(value_json.{path}, 'ON', 'OFF', 'OFF') }}}}")
}

fn reading(path: &str, precision: u32) -> String {
    if precision == 0 {
        format!("{{{{ value_json.{path}|int(0) }}}}")
    } else {
        format!("{{{{ value_json.{path}|float(0)|round({precision}) }}}}")
    }
}

fn command_value(precision: u32) -> String {
    if precision == 0 {
        "{{ value|int(0) }}".to_string()
    } else {
        format!("{{{{ value|float(0)|round({precision}) }}}}")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serde_json::Value;

    use super::*;

    fn catalog() -> Catalog {
        Catalog::new(&DiscoveryConfig::default(), TopicResolver::new("opentherm"))
    }

    #[test]
    fn test_config_topic() {
        assert_eq!(
            catalog().config_topic(Component::BinarySensor, "flame"),
            "homeassistant/binary_sensor/otgw/flame/config"
        );
    }

    #[test]
    fn test_static_keys_are_unique() {
        let entities = catalog().static_entities();
        let ids: HashSet<_> = entities.iter().map(|d| d.unique_id.clone()).collect();
        assert_eq!(ids.len(), entities.len());
        assert!(entities.iter().all(|d| d.unique_id.starts_with("otgw_")));
    }

    #[test]
    fn test_switch_payloads_are_partial_documents() {
        let entities = catalog().static_entities();
        let heating = entities
            .iter()
            .find(|d| d.key() == "heating" && d.component == Component::Switch)
            .unwrap();

        assert_eq!(heating.command_topic.as_deref(), Some("opentherm/settings/set"));
        assert_eq!(heating.state_topic.as_deref(), Some("opentherm/settings"));
        let on: Value = serde_json::from_str(heating.payload_on.as_deref().unwrap()).unwrap();
        assert_eq!(on, serde_json::json!({"heating": {"enable": true}}));
        assert_eq!(heating.availability[0].topic, "opentherm/status");
    }

    #[test]
    fn test_select_templates() {
        let entities = catalog().static_entities();
        let source = entities
            .iter()
            .find(|d| d.key() == "outdoor_temp_source")
            .unwrap();

        assert_eq!(
            source.value_template.as_deref(),
            Some("{{ ['Boiler', 'Manual', 'External sensor'][value_json.outdoorTempSource|int(0)] }}")
        );
        assert_eq!(
            source.command_template.as_deref(),
            Some(
                "{\"outdoorTempSource\": {% if value == 'Manual' %}1\
                 {% elif value == 'External sensor' %}2{% else %}0{% endif %}}"
            )
        );
    }

    #[test]
    fn test_dynamic_entities_carry_bounds() {
        let catalog = catalog();
        let number = catalog.heating_target(TempBounds::new(25, 75));
        assert_eq!((number.min, number.max), (Some(25.0), Some(75.0)));

        let climate = catalog.dhw_climate(TempBounds::new(35, 65));
        assert_eq!((climate.min_temp, climate.max_temp), (Some(35.0), Some(65.0)));
        assert_eq!(
            climate.temperature_command_template.as_deref(),
            Some("{\"dhw\": {\"target\": {{ value|int(0) }}}}")
        );

        let regulated = catalog.heating_climate(TempBounds::REGULATED_HEATING, true);
        assert_eq!(
            regulated.current_temperature_template.as_deref(),
            Some("{{ value_json.temperatures.indoor|float(0)|round(2) }}")
        );
    }

    #[test]
    fn test_outdoor_variants_share_a_key() {
        let catalog = catalog();
        assert_eq!(catalog.outdoor_number().key(), catalog.outdoor_sensor().key());
        assert_eq!(catalog.outdoor_number().component, Component::Number);
        assert_eq!(catalog.outdoor_sensor().component, Component::Sensor);
    }
}
