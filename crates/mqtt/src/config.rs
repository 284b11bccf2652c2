//! Broker session configuration.
//!
//! All structures deserialize with `serde(default)` so a partial `[transport]`
//! table is enough, and every numeric knob is range-checked by `validator`
//! before a session is built.
//!
//! # Base topic
//!
//! `base_topic` is the root every bridge address hangs off
//! (`<base_topic>/settings`, `<base_topic>/state/set`, ...). It is also used for
//! the last-will registration on `<base_topic>/status`.
//!
//! # Examples
//!
//! ```toml
//! [transport]
//! base_topic = "opentherm"
//! host = "mqtt.home.local"
//! port = 8883
//!
//! [transport.tls]
//! ca_cert_path = "/etc/otgw-bridge/ca.pem"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Broker connection settings for one bridge session.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    /// Root of every bridge address. Must not contain MQTT wildcards.
    #[validate(
        length(
            min = 1,
            max = 255,
            message = "Base topic must be between 1 and 255 characters"
        ),
        custom(function = "validate_topic_root")
    )]
    pub base_topic: String,

    /// Broker hostname or IP address.
    #[validate(length(
        min = 1,
        max = 255,
        message = "Host must be between 1 and 255 characters"
    ))]
    pub host: String,

    /// Broker port. 1883 is plain MQTT, 8883 is MQTT over TLS.
    #[validate(range(min = 1, max = 65535, message = "Port must be between 1 and 65535"))]
    pub port: u16,

    /// Client identifier. An empty value is replaced by a random UUID when
    /// the session is built.
    #[validate(length(max = 36, message = "Client ID must not exceed 36 characters"))]
    pub client_id: String,

    /// Optional broker credentials. Both must be present to be used.
    pub username: Option<String>,
    pub password: Option<String>,

    /// Upper bound in seconds for one connect attempt (TCP, TLS and CONNACK).
    ///
    /// A connect runs inside a supervisor tick, so this is what keeps a tick
    /// bounded while the broker is unreachable.
    #[validate(range(
        min = 1,
        max = 300,
        message = "Connection timeout must be between 1 and 300 seconds"
    ))]
    pub connection_timeout: u64,

    /// Keep-alive interval in seconds.
    #[validate(range(
        min = 5,
        max = 3600,
        message = "Keep alive must be between 5 and 3600 seconds"
    ))]
    pub keep_alive: u64,

    /// Request a clean session from the broker on every connect.
    pub clean_session: bool,

    /// Maximum number of unacknowledged outgoing QoS>0 packets.
    #[validate(range(
        min = 1,
        max = 1000,
        message = "Max inflight must be between 1 and 1000"
    ))]
    pub max_inflight: u16,

    /// Maximum packet size in bytes, applied to both directions.
    #[validate(range(
        min = 64,
        max = 268_435_455,
        message = "Max packet size must be between 64 bytes and 256 MiB"
    ))]
    pub max_packet_size: Option<u32>,

    /// Capacity of the client request queue.
    ///
    /// A full discovery announcement enqueues several dozen publishes in one
    /// go; the session drains the queue itself when it fills up.
    #[validate(range(
        min = 1,
        max = 4096,
        message = "Request channel capacity must be between 1 and 4096"
    ))]
    pub request_channel_capacity: Option<u16>,

    /// How long, in milliseconds, one pump call may drive the network.
    #[validate(range(
        min = 1,
        max = 5000,
        message = "Poll budget must be between 1 and 5000 milliseconds"
    ))]
    pub poll_budget_ms: u64,

    /// Optional TLS settings. Absent or without a CA path means plain TCP.
    #[validate(nested)]
    pub tls: Option<TlsConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_topic: "opentherm".to_string(),
            host: "localhost".to_string(),
            port: 1883,
            client_id: String::new(),
            username: None,
            password: None,
            connection_timeout: 5,
            keep_alive: 60,
            clean_session: true,
            max_inflight: 10,
            max_packet_size: Some(8192),
            request_channel_capacity: Some(128),
            poll_budget_ms: 20,
            tls: None,
        }
    }
}

impl Config {
    /// The client id that will be presented to the broker.
    pub fn effective_client_id(&self) -> String {
        if self.client_id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            self.client_id.clone()
        }
    }

    /// Credentials, only when both halves are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }

    /// Whether TLS will be used for this session.
    pub fn uses_tls(&self) -> bool {
        self.tls.as_ref().is_some_and(TlsConfig::is_enabled)
    }
}

fn validate_topic_root(root: &str) -> Result<(), ValidationError> {
    if root.contains(['+', '#']) {
        return Err(ValidationError::new("wildcard_in_topic")
            .with_message("Base topic must not contain '+' or '#'".into()));
    }
    if root.starts_with('/') || root.ends_with('/') {
        return Err(ValidationError::new("slash_in_topic")
            .with_message("Base topic must not start or end with '/'".into()));
    }
    Ok(())
}

/// TLS settings. Files are checked for existence at validation time and read
/// when the client is built.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TlsConfig {
    /// CA certificate used to verify the broker (PEM).
    #[validate(custom(
        function = "validate_file_path",
        message = "CA certificate file does not exist"
    ))]
    pub ca_cert_path: Option<String>,

    /// Client certificate for mutual TLS (PEM). Requires `client_key_path`.
    #[validate(custom(
        function = "validate_file_path",
        message = "Client certificate file does not exist"
    ))]
    pub client_cert_path: Option<String>,

    /// Unencrypted client private key for mutual TLS (PEM).
    #[validate(custom(
        function = "validate_file_path",
        message = "Client key file does not exist"
    ))]
    pub client_key_path: Option<String>,
}

impl TlsConfig {
    pub fn new(
        ca_cert_path: impl Into<String>,
        client_cert_path: impl Into<String>,
        client_key_path: impl Into<String>,
    ) -> Self {
        TlsConfig {
            ca_cert_path: Some(ca_cert_path.into()),
            client_cert_path: Some(client_cert_path.into()),
            client_key_path: Some(client_key_path.into()),
        }
    }

    pub fn with_ca_only(ca_cert_path: impl Into<String>) -> Self {
        TlsConfig {
            ca_cert_path: Some(ca_cert_path.into()),
            ..TlsConfig::default()
        }
    }

    /// True only when both the client certificate and key are set.
    pub fn has_client_auth(&self) -> bool {
        self.client_cert_path.is_some() && self.client_key_path.is_some()
    }

    pub fn is_enabled(&self) -> bool {
        self.ca_cert_path.is_some()
    }

    /// Checks that the CA is present and that client auth is either complete
    /// or absent, and that every referenced file exists.
    pub fn validate_config(&self) -> Result<(), ValidationError> {
        let Some(ca) = &self.ca_cert_path else {
            return Err(ValidationError::new("missing_ca_cert")
                .with_message("CA certificate path is required".into()));
        };
        validate_file_path(ca)?;

        match (&self.client_cert_path, &self.client_key_path) {
            (Some(cert), Some(key)) => {
                validate_file_path(cert)?;
                validate_file_path(key)?;
            }
            (None, None) => {}
            _ => {
                return Err(ValidationError::new("incomplete_client_auth").with_message(
                    "Both client certificate and key must be provided or neither".into(),
                ));
            }
        }

        Ok(())
    }
}

fn validate_file_path(path: &str) -> Result<(), ValidationError> {
    if path.is_empty() {
        return Err(
            ValidationError::new("empty_path").with_message("File path cannot be empty".into())
        );
    }

    let path_obj = Path::new(path);
    if !path_obj.exists() {
        return Err(ValidationError::new("file_not_found")
            .with_message(format!("File does not exist: {path}").into()));
    }
    if !path_obj.is_file() {
        return Err(ValidationError::new("not_a_file")
            .with_message(format!("Path is not a file: {path}").into()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{fs::File, io::Write};

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(!config.uses_tls());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            base_topic = "boiler"
            host = "broker.lan"
            "#,
        )
        .unwrap();

        assert_eq!(config.base_topic, "boiler");
        assert_eq!(config.host, "broker.lan");
        assert_eq!(config.port, 1883);
        assert_eq!(config.poll_budget_ms, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_base_topic_rejects_wildcards_and_slashes() {
        let mut config = Config::default();
        config.base_topic = "home/#".into();
        assert!(config.validate().is_err());

        config.base_topic = "home/".into();
        assert!(config.validate().is_err());

        config.base_topic = "home/boiler".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_host_is_invalid() {
        let config = Config {
            host: String::new(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_client_id() {
        let config = Config {
            client_id: "otgw".into(),
            ..Config::default()
        };
        assert_eq!(config.effective_client_id(), "otgw");

        let generated = Config::default().effective_client_id();
        assert_eq!(generated.len(), 36);
    }

    #[test]
    fn test_credentials_require_both_parts() {
        let mut config = Config {
            username: Some("user".into()),
            ..Config::default()
        };
        assert!(config.credentials().is_none());

        config.password = Some("secret".into());
        assert_eq!(config.credentials(), Some(("user", "secret")));
    }

    #[test]
    fn test_tls_validate_config() {
        let dir = TempDir::new().unwrap();
        let ca = dir.path().join("ca.pem");
        let cert = dir.path().join("client.crt");
        File::create(&ca).unwrap().write_all(b"ca").unwrap();
        File::create(&cert).unwrap().write_all(b"cert").unwrap();
        let ca = ca.to_string_lossy().into_owned();
        let cert = cert.to_string_lossy().into_owned();

        assert!(TlsConfig::with_ca_only(&ca).validate_config().is_ok());
        assert!(TlsConfig::default().validate_config().is_err());

        let partial = TlsConfig {
            client_cert_path: Some(cert),
            ..TlsConfig::with_ca_only(&ca)
        };
        assert!(!partial.has_client_auth());
        assert!(partial.validate_config().is_err());

        let missing = TlsConfig::with_ca_only("/nonexistent/ca.pem");
        assert!(missing.validate_config().is_err());
    }
}
