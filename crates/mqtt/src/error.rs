//! Error type for session construction and broker I/O.
//!
//! Everything the session does funnels into `MqttError`. Callers that
//! supervise a long-running connection usually only need
//! [`MqttError::is_fatal`] to tell misconfiguration apart from an outage.

use rumqttc::{ConnectReturnCode, ConnectionError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MqttError {
    /// The client could not be assembled (bad TLS setup, unreadable files).
    #[error("Client setup error: {0}")]
    ClientSetup(String),

    /// Configuration failed validation.
    #[error("Configuration error: {0}")]
    Config(#[from] validator::ValidationErrors),

    /// A request could not be queued on the client.
    #[error("Client request error: {0}")]
    ClientRequest(#[from] rumqttc::ClientError),

    /// The network connection failed or was lost.
    ///
    /// Boxed to keep the enum small.
    #[error("Connection error: {0}")]
    Connection(#[from] Box<ConnectionError>),

    /// No CONNACK within the configured connection timeout.
    #[error("Connection attempt timed out after {0} seconds")]
    ConnectTimeout(u64),

    /// An operation that needs a live session was called while disconnected.
    #[error("Not connected to the broker")]
    NotConnected,

    /// File I/O, mostly while loading certificates.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ConnectionError> for MqttError {
    fn from(err: ConnectionError) -> Self {
        MqttError::Connection(Box::new(err))
    }
}

impl MqttError {
    /// Whether retrying is unlikely to help without an operator changing
    /// something (credentials, certificates, protocol version).
    pub fn is_fatal(&self) -> bool {
        match self {
            MqttError::ClientSetup(_) | MqttError::Config(_) => true,
            MqttError::Connection(err) => {
                matches!(classify_connection_error(err), Disposition::Fatal)
            }
            _ => false,
        }
    }

    /// Innermost message of the error chain, without surrounding quotes.
    pub fn root_cause(&self) -> String {
        let mut current: &dyn std::error::Error = self;
        while let Some(source) = current.source() {
            current = source;
        }
        current.to_string().trim_matches('"').to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Fatal,
    Reconnect,
}

pub(crate) fn classify_connection_error(err: &ConnectionError) -> Disposition {
    use Disposition::*;

    match err {
        // Certificates or crypto setup.
        ConnectionError::Tls(_) => Fatal,
        ConnectionError::MqttState(_) => Fatal,
        ConnectionError::NotConnAck(_) => Fatal,
        ConnectionError::RequestsDone => Fatal,

        ConnectionError::Io(e) => match e.kind() {
            std::io::ErrorKind::AddrInUse
            | std::io::ErrorKind::PermissionDenied
            | std::io::ErrorKind::InvalidInput
            | std::io::ErrorKind::InvalidData => Fatal,
            _ => Reconnect,
        },

        ConnectionError::NetworkTimeout | ConnectionError::FlushTimeout => Reconnect,

        ConnectionError::ConnectionRefused(code) => match code {
            ConnectReturnCode::RefusedProtocolVersion
            | ConnectReturnCode::BadClientId
            | ConnectReturnCode::BadUserNamePassword
            | ConnectReturnCode::NotAuthorized => Fatal,
            _ => Reconnect,
        },

        #[allow(unreachable_patterns)]
        _ => Reconnect,
    }
}
