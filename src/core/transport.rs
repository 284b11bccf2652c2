//! The publish/subscribe seam between the engine and the broker session.

use async_trait::async_trait;
use otgw_mqtt::{MqttError, MqttSession};
use thiserror::Error;

/// A message delivered on one of the subscribed command addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("subscribe to '{topic}' failed: {reason}")]
    Subscribe { topic: String, reason: String },

    #[error("publish to '{topic}' failed: {reason}")]
    Publish { topic: String, reason: String },
}

/// Session primitives the engine relies on. Every call must return within a
/// bounded time; the engine calls them from inside a tick.
#[async_trait]
pub trait Transport: Send {
    fn is_connected(&self) -> bool;

    async fn connect(&mut self) -> Result<(), TransportError>;

    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    async fn publish(&mut self, topic: &str, payload: &[u8], retain: bool)
        -> Result<(), TransportError>;

    /// Moves traffic in both directions and returns what arrived since the
    /// previous call, in arrival order.
    async fn pump(&mut self) -> Vec<InboundMessage>;

    async fn disconnect(&mut self);
}

fn reason(err: &MqttError) -> String {
    match err {
        MqttError::NotConnected => "not connected".to_string(),
        other => other.root_cause(),
    }
}

#[async_trait]
impl Transport for MqttSession {
    fn is_connected(&self) -> bool {
        MqttSession::is_connected(self)
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        MqttSession::connect(self).await.map_err(|e| {
            if e.is_fatal() {
                TransportError::Connect(format!("{} (check configuration)", reason(&e)))
            } else {
                TransportError::Connect(reason(&e))
            }
        })
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        MqttSession::subscribe(self, topic)
            .await
            .map_err(|e| match e {
                MqttError::NotConnected => TransportError::NotConnected,
                other => TransportError::Subscribe {
                    topic: topic.to_string(),
                    reason: reason(&other),
                },
            })
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), TransportError> {
        MqttSession::publish(self, topic, payload, retain)
            .await
            .map_err(|e| match e {
                MqttError::NotConnected => TransportError::NotConnected,
                other => TransportError::Publish {
                    topic: topic.to_string(),
                    reason: reason(&other),
                },
            })
    }

    async fn pump(&mut self) -> Vec<InboundMessage> {
        self.poll()
            .await
            .into_iter()
            .map(|incoming| InboundMessage {
                topic: incoming.topic,
                payload: incoming.payload,
            })
            .collect()
    }

    async fn disconnect(&mut self) {
        MqttSession::disconnect(self).await
    }
}
