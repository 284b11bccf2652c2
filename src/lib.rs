//! otgw-bridge: MQTT synchronization engine for an OpenTherm gateway
//!
//! Bridges the gateway's configuration and live operating state to a
//! Home Assistant style hub: entities are announced through MQTT discovery,
//! both aggregates are published on their own cadence, and remote commands
//! are validated and applied field by field.
//!
//! ## Modules
//!
//! * `config`: TOML configuration with `validator` rules: logging, the
//!   engine itself (`[bridge]`) and the broker session (`[transport]`).
//!
//! * `core`: The engine:
//!   - Connection supervisor and emergency escalation
//!   - Entity announcer (static and bound-dependent descriptors)
//!   - Command processor for `settings/set` and `state/set`
//!   - State synchronizer with independent publish intervals
//!
//! * `logger`: Centralized logging initialization using `tracing`.
//!   Supports console output in multiple formats (compact, pretty, JSON)
//!   and optional systemd journald integration.

pub mod config;
pub mod core;
pub mod logger;
