//! Connection supervision and the per-tick orchestration of the engine.

use std::time::Duration;

use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    commands::{CommandOutcome, CommandProcessor},
    discovery::{Announcer, Catalog},
    model::BridgeState,
    platform::Platform,
    store::SettingsStore,
    sync::Synchronizer,
    topic::{CommandTopic, TopicResolver},
    transport::{InboundMessage, Transport},
    update::{SettingsUpdate, VarsUpdate},
};
use crate::config::bridge::BridgeConfig;

/// Where a single tick left the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Disconnected,
    Connected,
    /// Settings are flushed; nothing else may be published.
    RestartRequested,
}

/// Why [`Supervisor::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    Cancelled,
    RestartRequested,
}

pub struct Supervisor<T, S, P> {
    transport: T,
    platform: P,
    commands: CommandProcessor<S>,
    state: BridgeState,
    topics: TopicResolver,
    announcer: Announcer,
    sync: Synchronizer,
    reconnect_interval: Duration,
    emergency_threshold: u16,
    attempts: u16,
    last_attempt: Option<Instant>,
}

impl<T, S, P> Supervisor<T, S, P>
where
    T: Transport,
    S: SettingsStore,
    P: Platform,
{
    /// Builds the engine around an unconnected transport. Nothing is sent
    /// until the first [`tick`](Self::tick).
    pub fn new(
        transport: T,
        store: S,
        platform: P,
        state: BridgeState,
        topics: TopicResolver,
        config: &BridgeConfig,
    ) -> Self {
        let catalog = Catalog::new(&config.discovery, topics.clone());
        Self {
            transport,
            platform,
            commands: CommandProcessor::new(store),
            state,
            announcer: Announcer::new(catalog),
            sync: Synchronizer::new(topics.clone()),
            topics,
            reconnect_interval: config.reconnect_interval(),
            emergency_threshold: config.emergency_threshold,
            attempts: 0,
            last_attempt: None,
        }
    }

    /// Both aggregates and the emergency flag.
    pub fn state(&self) -> &BridgeState {
        &self.state
    }

    /// Access for the appliance driver, between ticks.
    pub fn state_mut(&mut self) -> &mut BridgeState {
        &mut self.state
    }

    /// Set once failed connects reach the configured threshold.
    pub fn emergency(&self) -> bool {
        self.state.emergency()
    }

    /// Consecutive failed connects since the last success.
    pub fn attempts(&self) -> u16 {
        self.attempts
    }

    /// The transport this supervisor owns.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The durable store behind the command processor.
    pub fn store(&self) -> &S {
        self.commands.store()
    }

    /// One pass of the engine. Runs to completion before the next may start.
    pub async fn tick(&mut self) -> TickOutcome {
        if !self.transport.is_connected() {
            if !self.retry_due() {
                return TickOutcome::Disconnected;
            }
            if !self.connect().await {
                return TickOutcome::Disconnected;
            }
        }

        let inbound = self.transport.pump().await;
        for message in inbound {
            if self.handle(message).await == CommandOutcome::Restart {
                return TickOutcome::RestartRequested;
            }
        }

        if !self.transport.is_connected() {
            info!("Connection lost");
            return TickOutcome::Disconnected;
        }

        let changed = self
            .announcer
            .publish_dynamic(&mut self.transport, &mut self.state, false)
            .await;
        self.sync
            .publish(&mut self.transport, &self.platform, &self.state, changed)
            .await;

        TickOutcome::Connected
    }

    /// Ticks every `period` until cancelled or a restart is requested.
    pub async fn run(&mut self, period: Duration, cancel: CancellationToken) -> RunExit {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let exit = loop {
            tokio::select! {
                _ = cancel.cancelled() => break RunExit::Cancelled,
                _ = ticker.tick() => {
                    if self.tick().await == TickOutcome::RestartRequested {
                        break RunExit::RestartRequested;
                    }
                }
            }
        };

        self.transport.disconnect().await;
        info!("Supervisor stopped: {:?}", exit);
        exit
    }

    fn retry_due(&self) -> bool {
        self.last_attempt
            .map_or(true, |at| at.elapsed() >= self.reconnect_interval)
    }

    async fn connect(&mut self) -> bool {
        info!(attempt = self.attempts + 1, "Connecting to broker");

        match self.transport.connect().await {
            Ok(()) => {
                info!("Connected to broker");
                self.on_connected().await;
                true
            }
            Err(e) => {
                warn!("Failed to connect to broker: {}", e);
                self.attempts = self.attempts.saturating_add(1);
                if !self.state.emergency() && self.attempts >= self.emergency_threshold {
                    self.state.set_emergency(true);
                    warn!(
                        attempts = self.attempts,
                        "Emergency mode enabled"
                    );
                }
                if let Err(e) = self.platform.refresh_presence().await {
                    debug!("Presence refresh failed: {}", e);
                }
                self.last_attempt = Some(Instant::now());
                false
            }
        }
    }

    async fn on_connected(&mut self) {
        for topic in [self.topics.settings_set(), self.topics.state_set()] {
            if let Err(e) = self.transport.subscribe(&topic).await {
                warn!("Failed to subscribe to {}: {}", topic, e);
            }
        }

        self.announcer.publish_static(&mut self.transport).await;
        self.announcer
            .publish_dynamic(&mut self.transport, &mut self.state, true)
            .await;

        self.attempts = 0;
        self.last_attempt = None;
        if self.state.emergency() {
            self.state.set_emergency(false);
            info!("Emergency mode disabled");
        }
    }

    async fn handle(&mut self, message: InboundMessage) -> CommandOutcome {
        if message.payload.is_empty() {
            return CommandOutcome::Unchanged;
        }
        if self.state.settings.debug {
            debug!(
                topic = %message.topic,
                payload = %String::from_utf8_lossy(&message.payload),
                "Command received"
            );
        }

        let outcome = match self.topics.command_for(&message.topic) {
            Some(CommandTopic::Settings) => match SettingsUpdate::decode(&message.payload) {
                Ok(update) => self.commands.apply_settings(&mut self.state, &update).await,
                Err(e) => {
                    debug!("Dropping settings command: {}", e);
                    return CommandOutcome::Unchanged;
                }
            },
            Some(CommandTopic::State) => match VarsUpdate::decode(&message.payload) {
                Ok(update) => self.commands.apply_vars(&mut self.state, &update).await,
                Err(e) => {
                    debug!("Dropping state command: {}", e);
                    return CommandOutcome::Unchanged;
                }
            },
            None => {
                debug!("Ignoring message on {}", message.topic);
                return CommandOutcome::Unchanged;
            }
        };

        match outcome {
            CommandOutcome::Restart => return outcome,
            CommandOutcome::Changed => {
                self.sync
                    .publish(&mut self.transport, &self.platform, &self.state, true)
                    .await;
            }
            CommandOutcome::Unchanged => {}
        }

        if let Err(e) = self.transport.publish(&message.topic, &[], true).await {
            warn!("Failed to clear retained command on {}: {}", message.topic, e);
        }
        outcome
    }
}
