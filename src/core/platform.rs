//! Host facilities the engine needs but does not own.

use std::{process::Stdio, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tokio::{process::Command, time::timeout};
use tracing::{debug, trace};

use crate::config::bridge::PresenceConfig;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("failed to execute '{command}': {source}")]
    CommandExecution {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with {status}")]
    CommandFailed { command: String, status: String },

    #[error("'{command}' timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },
}

#[async_trait]
pub trait Platform: Send + Sync {
    /// Announces this host on the local network so peers drop stale
    /// address-resolution entries. Best effort.
    async fn refresh_presence(&self) -> Result<(), PlatformError>;
}

/// Runs an optional external command (typically a gratuitous ARP).
#[derive(Debug, Clone)]
pub struct HostPlatform {
    command: Vec<String>,
    timeout: Duration,
}

impl HostPlatform {
    pub fn new(config: &PresenceConfig) -> Self {
        Self {
            command: config.command.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// False when no presence command is configured.
    pub fn enabled(&self) -> bool {
        !self.command.is_empty()
    }
}

#[async_trait]
impl Platform for HostPlatform {
    async fn refresh_presence(&self) -> Result<(), PlatformError> {
        let Some((program, args)) = self.command.split_first() else {
            trace!("Presence refresh disabled");
            return Ok(());
        };
        let command = self.command.join(" ");

        let mut child = Command::new(program);
        child
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let status = match timeout(self.timeout, child.status()).await {
            Ok(Ok(status)) => status,
            Ok(Err(source)) => return Err(PlatformError::CommandExecution { command, source }),
            Err(_) => {
                return Err(PlatformError::Timeout {
                    command,
                    timeout: self.timeout,
                })
            }
        };

        if status.success() {
            debug!("Presence refreshed via '{}'", command);
            Ok(())
        } else {
            Err(PlatformError::CommandFailed {
                command,
                status: status.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform(command: &[&str]) -> HostPlatform {
        HostPlatform::new(&PresenceConfig {
            command: command.iter().map(|s| s.to_string()).collect(),
            timeout_ms: 2000,
        })
    }

    #[tokio::test]
    async fn test_disabled_is_a_no_op() {
        let platform = platform(&[]);
        assert!(!platform.enabled());
        assert!(platform.refresh_presence().await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_program_is_reported() {
        let result = platform(&["/nonexistent/otgw-arping"]).refresh_presence().await;
        assert!(matches!(
            result,
            Err(PlatformError::CommandExecution { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_status_is_checked() {
        assert!(platform(&["true"]).refresh_presence().await.is_ok());
        assert!(matches!(
            platform(&["false"]).refresh_presence().await,
            Err(PlatformError::CommandFailed { .. })
        ));
    }
}
