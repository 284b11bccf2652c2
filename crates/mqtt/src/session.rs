//! A single-owner broker session driven from the caller's own loop.
//!
//! Unlike a background connection task, `MqttSession` never spawns: the owner
//! calls [`connect`](MqttSession::connect) when it decides to retry and
//! [`poll`](MqttSession::poll) once per tick to move packets in both
//! directions. Every call is bounded in time, so a cooperative scheduler can
//! drive it without stalling.

use std::{collections::VecDeque, time::Duration};

use rumqttc::{
    AsyncClient, ClientError, ConnectReturnCode, Event, EventLoop, Packet, QoS, Request,
};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, trace, warn};

use super::{client::ClientBuilder, config::Config, error::MqttError, state::ConnectionState};

/// A publish received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incoming {
    pub topic: String,
    pub payload: Vec<u8>,
}

pub struct MqttSession {
    client: AsyncClient,
    event_loop: EventLoop,
    state: ConnectionState,
    inbox: VecDeque<Incoming>,
    connect_timeout: Duration,
    poll_budget: Duration,
}

impl MqttSession {
    /// Builds the client from `config` and registers `offline` as last will on
    /// `<base_topic>/status`. Nothing touches the network until `connect`.
    pub fn new(config: &Config) -> Result<Self, MqttError> {
        let (client, event_loop) = ClientBuilder::from_config(config)?
            .last_will(format!("{}/status", config.base_topic), "offline")
            .build()?;

        Ok(Self {
            client,
            event_loop,
            state: ConnectionState::default(),
            inbox: VecDeque::new(),
            connect_timeout: Duration::from_secs(config.connection_timeout),
            poll_budget: Duration::from_millis(config.poll_budget_ms),
        })
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    fn update_state(&mut self, state: ConnectionState) {
        if self.state != state {
            debug!("Connection state changed to: {}", state);
            self.state = state;
        }
    }

    fn mark_lost(&mut self, err: &MqttError) {
        if self.state.is_connected() {
            warn!("Connection lost: {}", err.root_cause());
        }
        self.update_state(ConnectionState::Disconnected(err.root_cause()));
    }

    /// Runs one connect attempt until CONNACK, failure, or the configured
    /// connection timeout.
    pub async fn connect(&mut self) -> Result<(), MqttError> {
        if self.is_connected() {
            return Ok(());
        }
        self.update_state(ConnectionState::Connecting);

        let result = match timeout(self.connect_timeout, self.await_connack()).await {
            Ok(result) => result,
            Err(_) => Err(MqttError::ConnectTimeout(self.connect_timeout.as_secs())),
        };

        match result {
            Ok(()) => {
                info!("Connection established successfully");
                self.update_state(ConnectionState::Connected);
                Ok(())
            }
            Err(err) => {
                self.update_state(ConnectionState::Disconnected(err.root_cause()));
                Err(err)
            }
        }
    }

    async fn await_connack(&mut self) -> Result<(), MqttError> {
        loop {
            match self.event_loop.poll().await? {
                Event::Incoming(Packet::ConnAck(ack)) => {
                    return if ack.code == ConnectReturnCode::Success {
                        Ok(())
                    } else {
                        Err(rumqttc::ConnectionError::ConnectionRefused(ack.code).into())
                    };
                }
                event => self.handle_event(event),
            }
        }
    }

    /// Drives the network for at most the poll budget and returns every
    /// publish received since the previous call.
    pub async fn poll(&mut self) -> Vec<Incoming> {
        if self.is_connected() {
            self.drive(self.poll_budget).await;
        }
        self.inbox.drain(..).collect()
    }

    async fn drive(&mut self, budget: Duration) {
        let deadline = Instant::now() + budget;
        while self.is_connected() {
            match timeout_at(deadline, self.event_loop.poll()).await {
                Ok(Ok(event)) => self.handle_event(event),
                Ok(Err(err)) => {
                    self.mark_lost(&MqttError::from(err));
                    break;
                }
                Err(_) => break,
            }
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Incoming(Packet::Publish(publish)) => {
                trace!("Received publish on topic {}", publish.topic);
                self.inbox.push_back(Incoming {
                    topic: publish.topic,
                    payload: publish.payload.to_vec(),
                });
            }
            Event::Incoming(Packet::Disconnect) => {
                warn!("Disconnected by broker");
                self.update_state(ConnectionState::Disconnected(
                    "Disconnected by broker".into(),
                ));
            }
            Event::Incoming(packet) => trace!("Incoming packet: {:?}", packet),
            Event::Outgoing(outgoing) => trace!("Outgoing packet: {:?}", outgoing),
        }
    }

    pub async fn subscribe(&mut self, topic: &str) -> Result<(), MqttError> {
        self.ensure_connected()?;
        let request = self.client.try_subscribe(topic, QoS::AtMostOnce);
        self.retry_when_full(request, |client| client.try_subscribe(topic, QoS::AtMostOnce))
            .await
    }

    pub async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), MqttError> {
        self.ensure_connected()?;
        let request = self
            .client
            .try_publish(topic, QoS::AtMostOnce, retain, payload.to_vec());
        self.retry_when_full(request, |client| {
            client.try_publish(topic, QoS::AtMostOnce, retain, payload.to_vec())
        })
        .await
    }

    /// Sends DISCONNECT and gives the event loop one budget to flush it.
    pub async fn disconnect(&mut self) {
        if !self.is_connected() {
            return;
        }
        if let Err(e) = self.client.try_disconnect() {
            warn!("Error sending disconnect packet: {:?}", e);
        }
        self.drive(self.poll_budget).await;
        self.update_state(ConnectionState::Disconnected("Disconnected by client".into()));
    }

    fn ensure_connected(&self) -> Result<(), MqttError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(MqttError::NotConnected)
        }
    }

    /// The request queue only drains while the event loop is polled, and the
    /// owner is the only one polling. On a full queue, drive the loop once
    /// and retry.
    async fn retry_when_full<F>(
        &mut self,
        first: Result<(), ClientError>,
        mut again: F,
    ) -> Result<(), MqttError>
    where
        F: FnMut(&AsyncClient) -> Result<(), ClientError>,
    {
        match first {
            Err(ClientError::TryRequest(Request::Publish(_) | Request::Subscribe(_))) => {
                debug!("Request queue full, draining before retry");
                self.drive(self.poll_budget).await;
                self.ensure_connected()?;
                Ok(again(&self.client)?)
            }
            other => Ok(other?),
        }
    }
}
