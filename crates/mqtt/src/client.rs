//! Builder turning a [`Config`] into a rumqttc client and event loop.
//!
//! ```ignore
//! let (client, event_loop) = ClientBuilder::from_config(&config)?
//!     .last_will("opentherm/status", "offline")
//!     .build()?;
//! ```

use std::{fs, time::Duration};

use rumqttc::{AsyncClient, EventLoop, LastWill, MqttOptions, QoS, TlsConfiguration, Transport};
use validator::Validate;

use super::{
    config::{Config, TlsConfig},
    error::MqttError,
};

const DEFAULT_REQUEST_CAPACITY: usize = 128;

/// Accumulates `MqttOptions` and the TLS setup; consumed by [`build`](Self::build).
pub struct ClientBuilder {
    opts: MqttOptions,
    cap: usize,
    tls_config: Option<TlsConfig>,
}

impl ClientBuilder {
    pub fn new(
        client_id: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        cap: usize,
    ) -> Self {
        Self {
            opts: MqttOptions::new(client_id, host, port),
            cap,
            tls_config: None,
        }
    }

    /// Validates `config` and maps every setting onto the builder.
    ///
    /// # Errors
    ///
    /// Returns [`MqttError::Config`] when validation fails.
    pub fn from_config(config: &Config) -> Result<Self, MqttError> {
        config.validate()?;

        let cap = config
            .request_channel_capacity
            .map_or(DEFAULT_REQUEST_CAPACITY, usize::from);
        let mut builder = Self::new(
            config.effective_client_id(),
            config.host.clone(),
            config.port,
            cap,
        )
        .keep_alive(config.keep_alive)
        .clean_session(config.clean_session)
        .max_inflight(config.max_inflight);

        if let Some(size) = config.max_packet_size {
            builder = builder.max_packet_size(size as usize, size as usize);
        }
        if let Some((user, pass)) = config.credentials() {
            builder = builder.credentials(user, pass);
        }
        if config.uses_tls() {
            builder.tls_config = config.tls.clone();
        }

        Ok(builder)
    }

    pub fn with_tls(
        mut self,
        ca_cert_path: impl Into<String>,
        client_cert_path: impl Into<String>,
        client_key_path: impl Into<String>,
    ) -> Self {
        self.tls_config = Some(TlsConfig::new(
            ca_cert_path,
            client_cert_path,
            client_key_path,
        ));
        self
    }

    pub fn with_tls_ca_only(mut self, ca_cert_path: impl Into<String>) -> Self {
        self.tls_config = Some(TlsConfig::with_ca_only(ca_cert_path));
        self
    }

    pub fn keep_alive(mut self, secs: u64) -> Self {
        self.opts.set_keep_alive(Duration::from_secs(secs));
        self
    }

    pub fn max_packet_size(mut self, incoming: usize, outgoing: usize) -> Self {
        self.opts.set_max_packet_size(incoming, outgoing);
        self
    }

    pub fn clean_session(mut self, clean: bool) -> Self {
        self.opts.set_clean_session(clean);
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.opts.set_credentials(username, password);
        self
    }

    pub fn max_inflight(mut self, max: u16) -> Self {
        self.opts.set_inflight(max);
        self
    }

    /// Registers a non-retained, QoS 0 last will.
    pub fn last_will(mut self, topic: impl Into<String>, payload: &str) -> Self {
        let will = LastWill::new(
            topic.into(),
            payload.as_bytes().to_vec(),
            QoS::AtMostOnce,
            false,
        );
        self.opts.set_last_will(will);
        self
    }

    fn load_file(path: &str) -> Result<Vec<u8>, MqttError> {
        Ok(fs::read(path)?)
    }

    fn build_tls_transport(tls: &TlsConfig) -> Result<Transport, MqttError> {
        tls.validate_config()
            .map_err(|e| MqttError::ClientSetup(format!("Invalid TLS configuration: {e}")))?;

        let ca_path = tls
            .ca_cert_path
            .as_deref()
            .ok_or_else(|| MqttError::ClientSetup("TLS CA certificate is not set".into()))?;
        let ca = Self::load_file(ca_path)?;

        let client_auth = match (&tls.client_cert_path, &tls.client_key_path) {
            (Some(cert), Some(key)) => Some((Self::load_file(cert)?, Self::load_file(key)?)),
            _ => None,
        };

        Ok(Transport::Tls(TlsConfiguration::Simple {
            ca,
            client_auth,
            alpn: None,
        }))
    }

    /// Builds the client and its event loop.
    ///
    /// # Errors
    ///
    /// Fails when TLS is configured but its files are missing or unreadable.
    pub fn build(self) -> Result<(AsyncClient, EventLoop), MqttError> {
        let mut opts = self.opts;
        if let Some(tls) = &self.tls_config {
            opts.set_transport(Self::build_tls_transport(tls)?);
        }

        Ok(AsyncClient::new(opts, self.cap))
    }
}

#[cfg(test)]
mod tests {
    use std::{fs::File, io::Write};

    use tempfile::TempDir;

    use super::*;

    struct TestFiles {
        _temp_dir: TempDir,
        ca_cert: String,
        client_cert: String,
        client_key: String,
    }

    impl TestFiles {
        fn new() -> std::io::Result<Self> {
            let temp_dir = TempDir::new()?;
            let ca_cert = temp_dir.path().join("ca.crt");
            let client_cert = temp_dir.path().join("client.crt");
            let client_key = temp_dir.path().join("client.key");

            File::create(&ca_cert)?.write_all(b"ca certificate content")?;
            File::create(&client_cert)?.write_all(b"client certificate content")?;
            File::create(&client_key)?.write_all(b"client key content")?;

            Ok(TestFiles {
                _temp_dir: temp_dir,
                ca_cert: ca_cert.to_string_lossy().into_owned(),
                client_cert: client_cert.to_string_lossy().into_owned(),
                client_key: client_key.to_string_lossy().into_owned(),
            })
        }
    }

    #[test]
    fn test_build_tcp_client() {
        let result = ClientBuilder::new("test_client", "localhost", 1883, 16)
            .keep_alive(30)
            .clean_session(true)
            .credentials("user", "pass")
            .last_will("opentherm/status", "offline")
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_build_tls_client_with_client_auth() {
        let files = TestFiles::new().expect("Failed to create test files");
        let result = ClientBuilder::new("test_client", "localhost", 8883, 16)
            .with_tls(&files.ca_cert, &files.client_cert, &files.client_key)
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_build_tls_missing_ca() {
        let result = ClientBuilder::new("test_client", "localhost", 8883, 16)
            .with_tls_ca_only("/nonexistent/ca.crt")
            .build();
        assert!(matches!(result, Err(MqttError::ClientSetup(_))));
    }

    #[test]
    fn test_from_config() {
        let config = Config {
            client_id: "otgw-test".into(),
            request_channel_capacity: Some(32),
            ..Config::default()
        };
        let builder = ClientBuilder::from_config(&config).unwrap();
        assert_eq!(builder.cap, 32);
        assert!(builder.tls_config.is_none());
        assert!(builder.build().is_ok());
    }

    #[test]
    fn test_from_config_invalid() {
        let config = Config {
            host: String::new(),
            ..Config::default()
        };
        assert!(matches!(
            ClientBuilder::from_config(&config),
            Err(MqttError::Config(_))
        ));
    }

    #[test]
    fn test_from_config_ignores_tls_without_ca() {
        let config = Config {
            tls: Some(TlsConfig::default()),
            ..Config::default()
        };
        let builder = ClientBuilder::from_config(&config).unwrap();
        assert!(builder.tls_config.is_none());
    }
}
