//! otgw-mqtt: broker session for the OpenTherm gateway bridge.
//!
//! A thin layer over `rumqttc` that the bridge drives from its own tick
//! instead of a background task:
//!
//! * [`Config`] / [`TlsConfig`]: validated session settings
//! * [`ClientBuilder`]: maps the settings onto `MqttOptions`
//! * [`MqttSession`]: bounded connect, publish, subscribe and poll calls
//! * [`ConnectionState`]: what the session currently believes
//! * [`MqttError`]: with fatal/transient classification

pub mod client;
pub mod config;
pub mod error;
pub mod session;
pub mod state;

pub use client::ClientBuilder;
pub use config::{Config, TlsConfig};
pub use error::MqttError;
pub use session::{Incoming, MqttSession};
pub use state::ConnectionState;
