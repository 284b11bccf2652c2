//! Recording doubles for the engine seams.

use std::{
    collections::VecDeque,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;

use super::{
    model::Settings,
    platform::{Platform, PlatformError},
    store::{SettingsStore, StoreError},
    transport::{InboundMessage, Transport, TransportError},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

impl Published {
    pub fn text(&self) -> &str {
        std::str::from_utf8(&self.payload).unwrap()
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.payload).unwrap()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connect,
    Subscribe(String),
    Publish(Published),
}

/// In-memory broker session. Connects only while `reachable` is set.
#[derive(Debug, Default)]
pub struct MockTransport {
    pub reachable: bool,
    pub connected: bool,
    pub reject_publish: bool,
    pub inbound: VecDeque<InboundMessage>,
    pub events: Vec<Event>,
}

impl MockTransport {
    pub fn reachable() -> Self {
        Self {
            reachable: true,
            ..Self::default()
        }
    }

    pub fn push(&mut self, topic: &str, payload: &[u8]) {
        self.inbound.push_back(InboundMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
    }

    pub fn published(&self) -> Vec<&Published> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Publish(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn published_to(&self, topic: &str) -> Vec<&Published> {
        self.published()
            .into_iter()
            .filter(|p| p.topic == topic)
            .collect()
    }

    pub fn subscriptions(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Subscribe(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn connects(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, Event::Connect))
            .count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        self.events.push(Event::Connect);
        if self.reachable {
            self.connected = true;
            Ok(())
        } else {
            Err(TransportError::Connect("connection refused".to_string()))
        }
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.events.push(Event::Subscribe(topic.to_string()));
        Ok(())
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        if self.reject_publish {
            return Err(TransportError::Publish {
                topic: topic.to_string(),
                reason: "queue full".to_string(),
            });
        }
        self.events.push(Event::Publish(Published {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            retain,
        }));
        Ok(())
    }

    async fn pump(&mut self) -> Vec<InboundMessage> {
        if !self.connected {
            return Vec::new();
        }
        self.inbound.drain(..).collect()
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }
}

/// Keeps every aggregate it was handed.
#[derive(Debug, Default)]
pub struct MockStore {
    pub updates: Vec<Settings>,
    pub flushes: Vec<Settings>,
}

#[async_trait]
impl SettingsStore for MockStore {
    async fn update(&mut self, settings: &Settings) -> Result<(), StoreError> {
        self.updates.push(settings.clone());
        Ok(())
    }

    async fn flush(&mut self, settings: &Settings) -> Result<(), StoreError> {
        self.flushes.push(settings.clone());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MockPlatform {
    refreshes: AtomicUsize,
}

impl MockPlatform {
    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Platform for MockPlatform {
    async fn refresh_presence(&self) -> Result<(), PlatformError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
