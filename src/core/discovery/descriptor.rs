//! Home Assistant MQTT discovery payloads.

use std::fmt;

use serde::Serialize;

/// Discovery component, i.e. the second level of the config topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    Switch,
    Number,
    Select,
    Sensor,
    BinarySensor,
    Climate,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Switch => "switch",
            Component::Number => "number",
            Component::Select => "select",
            Component::Sensor => "sensor",
            Component::BinarySensor => "binary_sensor",
            Component::Climate => "climate",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device block shared by every descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub sw_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Availability {
    pub topic: String,
    pub payload_available: &'static str,
    pub payload_not_available: &'static str,
}

/// One entity as the hub expects it on its config topic.
///
/// Only the fields relevant to the component are set; the rest stay `None`
/// and are left out of the payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Descriptor {
    #[serde(skip)]
    pub component: Component,
    /// Last level of the config topic, without the device prefix.
    #[serde(skip)]
    pub key: String,
    pub object_id: String,
    pub unique_id: String,
    pub name: String,
    pub device: Device,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub availability: Vec<Availability>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_category: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<&'static str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_off: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_on: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_off: Option<&'static str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<&'static str>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub modes: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode_command_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode_command_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode_state_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode_state_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_temperature_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_temperature_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_command_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_command_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_state_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_state_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature_unit: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_temp: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_temp: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_step: Option<f32>,
}

impl Descriptor {
    pub fn new(
        component: Component,
        object_id: &str,
        name: &str,
        device_id: &str,
        device: Device,
    ) -> Self {
        Self {
            component,
            key: object_id.to_string(),
            object_id: format!("{device_id}_{object_id}"),
            unique_id: format!("{device_id}_{object_id}"),
            name: name.to_string(),
            device,
            availability: Vec::new(),
            entity_category: None,
            device_class: None,
            state_class: None,
            unit_of_measurement: None,
            icon: None,
            state_topic: None,
            value_template: None,
            command_topic: None,
            command_template: None,
            payload_on: None,
            payload_off: None,
            state_on: None,
            state_off: None,
            min: None,
            max: None,
            step: None,
            mode: None,
            options: None,
            modes: None,
            mode_command_topic: None,
            mode_command_template: None,
            mode_state_topic: None,
            mode_state_template: None,
            current_temperature_topic: None,
            current_temperature_template: None,
            temperature_command_topic: None,
            temperature_command_template: None,
            temperature_state_topic: None,
            temperature_state_template: None,
            temperature_unit: None,
            min_temp: None,
            max_temp: None,
            temp_step: None,
        }
    }

    pub fn available_on(mut self, status_topic: &str) -> Self {
        self.availability = vec![Availability {
            topic: status_topic.to_string(),
            payload_available: "online",
            payload_not_available: "offline",
        }];
        self
    }

    pub fn config_category(mut self) -> Self {
        self.entity_category = Some("config");
        self
    }

    pub fn diagnostic_category(mut self) -> Self {
        self.entity_category = Some("diagnostic");
        self
    }

    pub fn device_class(mut self, class: &'static str) -> Self {
        self.device_class = Some(class);
        self
    }

    pub fn unit(mut self, unit: &'static str) -> Self {
        self.unit_of_measurement = Some(unit);
        self
    }

    pub fn measurement(mut self) -> Self {
        self.state_class = Some("measurement");
        self
    }

    pub fn icon(mut self, icon: &'static str) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn temperature(self) -> Self {
        self.device_class("temperature").unit("°C")
    }

    /// Range and step of a numeric control, entered through a text box.
    pub fn bounds(mut self, min: f32, max: f32, step: f32) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self.step = Some(step);
        self.mode = Some("box");
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// `{"a": {"b": <raw>}}` for path `a.b`.
pub fn nest(path: &str, raw: &str) -> String {
    path.rsplit('.')
        .fold(raw.to_string(), |inner, key| format!("{{\"{key}\": {inner}}}"))
}
