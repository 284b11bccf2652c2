//! Rate-limited publishing of the two aggregates.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::{
    model::BridgeState,
    platform::Platform,
    topic::TopicResolver,
    transport::Transport,
};

/// The configuration aggregate goes out this many times less often than the
/// live state.
pub const SETTINGS_INTERVAL_FACTOR: u32 = 10;

/// Which aggregates one `publish` call sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub state: bool,
    pub settings: bool,
}

impl PublishReport {
    pub fn any(&self) -> bool {
        self.state || self.settings
    }
}

pub struct Synchronizer {
    topics: TopicResolver,
    last_state: Option<Instant>,
    last_settings: Option<Instant>,
}

impl Synchronizer {
    pub fn new(topics: TopicResolver) -> Self {
        Self {
            topics,
            last_state: None,
            last_settings: None,
        }
    }

    /// Sends each aggregate whose own interval has elapsed, or both when
    /// `force` is set. A never-published aggregate is always due.
    pub async fn publish<T, P>(
        &mut self,
        transport: &mut T,
        platform: &P,
        state: &BridgeState,
        force: bool,
    ) -> PublishReport
    where
        T: Transport + ?Sized,
        P: Platform + ?Sized,
    {
        let now = Instant::now();
        let interval = state.settings.publish_interval();
        let mut report = PublishReport::default();

        if force || due(self.last_state, interval, now) {
            self.publish_state(transport, platform, state).await;
            report.state = true;
        }

        if force || due(self.last_settings, interval * SETTINGS_INTERVAL_FACTOR, now) {
            self.publish_settings(transport, state).await;
            report.settings = true;
        }

        if report.any() {
            trace!(?report, force, "Aggregates published");
        }
        report
    }

    /// Live state, then the status token, then a presence refresh. Resets only
    /// the live-state timer.
    pub async fn publish_state<T, P>(&mut self, transport: &mut T, platform: &P, state: &BridgeState)
    where
        T: Transport + ?Sized,
        P: Platform + ?Sized,
    {
        self.last_state = Some(Instant::now());

        send_json(transport, &self.topics.state(), &state.vars).await;

        let status = state.vars.status_token();
        if let Err(e) = transport
            .publish(&self.topics.status(), status.as_str().as_bytes(), false)
            .await
        {
            warn!("Failed to publish status '{}': {}", status, e);
        }

        if let Err(e) = platform.refresh_presence().await {
            debug!("Presence refresh failed: {}", e);
        }
    }

    /// Resets only the configuration timer.
    pub async fn publish_settings<T>(&mut self, transport: &mut T, state: &BridgeState)
    where
        T: Transport + ?Sized,
    {
        self.last_settings = Some(Instant::now());
        send_json(transport, &self.topics.settings(), &state.settings).await;
    }
}

fn due(last: Option<Instant>, interval: Duration, now: Instant) -> bool {
    last.map_or(true, |at| now.saturating_duration_since(at) >= interval)
}

async fn send_json<T, V>(transport: &mut T, topic: &str, value: &V)
where
    T: Transport + ?Sized,
    V: Serialize,
{
    let payload = match serde_json::to_vec(value) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Failed to encode {}: {}", topic, e);
            return;
        }
    };
    if let Err(e) = transport.publish(topic, &payload, false).await {
        warn!("Failed to publish {}: {}", topic, e);
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::advance;

    use super::*;
    use crate::core::testing::{MockPlatform, MockTransport};

    fn connected() -> MockTransport {
        MockTransport {
            connected: true,
            ..MockTransport::reachable()
        }
    }

    fn both() -> PublishReport {
        PublishReport {
            state: true,
            settings: true,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_call_publishes_both() {
        let mut sync = Synchronizer::new(TopicResolver::new("opentherm"));
        let mut transport = connected();
        let platform = MockPlatform::default();
        let state = BridgeState::default();

        let report = sync.publish(&mut transport, &platform, &state, false).await;

        assert_eq!(report, both());
        let topics: Vec<_> = transport.published().iter().map(|p| p.topic.clone()).collect();
        assert_eq!(
            topics,
            ["opentherm/state", "opentherm/status", "opentherm/settings"]
        );
        assert!(transport.published().iter().all(|p| !p.retain));
        assert_eq!(transport.published_to("opentherm/status")[0].text(), "offline");
        assert_eq!(platform.refreshes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_intervals() {
        let mut sync = Synchronizer::new(TopicResolver::new("opentherm"));
        let mut transport = connected();
        let platform = MockPlatform::default();
        let state = BridgeState::default();
        sync.publish(&mut transport, &platform, &state, false).await;

        advance(Duration::from_millis(4999)).await;
        assert!(!sync.publish(&mut transport, &platform, &state, false).await.any());

        advance(Duration::from_millis(1)).await;
        let report = sync.publish(&mut transport, &platform, &state, false).await;
        assert_eq!(report, PublishReport { state: true, settings: false });

        // 50 s in total since the settings went out.
        advance(Duration::from_millis(45_000)).await;
        assert_eq!(sync.publish(&mut transport, &platform, &state, false).await, both());
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_bypasses_intervals() {
        let mut sync = Synchronizer::new(TopicResolver::new("opentherm"));
        let mut transport = connected();
        let platform = MockPlatform::default();
        let state = BridgeState::default();

        sync.publish(&mut transport, &platform, &state, false).await;
        transport.clear();
        assert_eq!(sync.publish(&mut transport, &platform, &state, true).await, both());
        assert_eq!(transport.published().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_direct_publish_resets_only_its_timer() {
        let mut sync = Synchronizer::new(TopicResolver::new("opentherm"));
        let mut transport = connected();
        let platform = MockPlatform::default();
        let state = BridgeState::default();
        sync.publish(&mut transport, &platform, &state, false).await;

        advance(Duration::from_millis(3000)).await;
        sync.publish_settings(&mut transport, &state).await;
        advance(Duration::from_millis(2000)).await;

        let report = sync.publish(&mut transport, &platform, &state, false).await;
        assert_eq!(report, PublishReport { state: true, settings: false });
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_token() {
        let mut sync = Synchronizer::new(TopicResolver::new("opentherm"));
        let mut transport = connected();
        let platform = MockPlatform::default();
        let mut state = BridgeState::default();
        state.vars.states.ot_status = true;

        sync.publish(&mut transport, &platform, &state, true).await;
        state.vars.states.fault = true;
        sync.publish(&mut transport, &platform, &state, true).await;

        let tokens: Vec<_> = transport
            .published_to("opentherm/status")
            .iter()
            .map(|p| p.text().to_string())
            .collect();
        assert_eq!(tokens, ["online", "fault"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_publish_still_resets_timer() {
        let mut sync = Synchronizer::new(TopicResolver::new("opentherm"));
        let mut transport = MockTransport::default();
        let platform = MockPlatform::default();
        let state = BridgeState::default();

        assert_eq!(sync.publish(&mut transport, &platform, &state, false).await, both());
        assert!(!sync.publish(&mut transport, &platform, &state, false).await.any());
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_document_shape() {
        let mut sync = Synchronizer::new(TopicResolver::new("opentherm"));
        let mut transport = connected();
        let platform = MockPlatform::default();
        let state = BridgeState::default();

        sync.publish(&mut transport, &platform, &state, true).await;

        let document = transport.published_to("opentherm/state")[0].json();
        assert_eq!(document["parameters"]["heatingMaxTemp"], 90);
        assert_eq!(document["states"]["faultCode"], 0);
        let settings = transport.published_to("opentherm/settings")[0].json();
        assert_eq!(settings["mqtt"]["interval"], 5000);
    }
}
