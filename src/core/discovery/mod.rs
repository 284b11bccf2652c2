//! Hub discovery: static announcements once per connection, and the few
//! entities whose shape follows runtime state re-announced when it moves.

mod catalog;
mod descriptor;

pub use catalog::Catalog;
pub use descriptor::{nest, Availability, Component, Descriptor, Device};

use tracing::{debug, warn};

use super::{
    model::{BridgeState, TempBounds},
    transport::Transport,
};

/// What was last announced for the state-dependent entities.
///
/// Lives as long as the announcer, so it survives reconnects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnouncedShape {
    pub heating: TempBounds,
    pub dhw: TempBounds,
    pub outdoor_editable: bool,
}

pub struct Announcer {
    catalog: Catalog,
    announced: AnnouncedShape,
}

impl Announcer {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            announced: AnnouncedShape::default(),
        }
    }

    /// Descriptor factory for this device.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Bounds and outdoor variant of the last dynamic announcement.
    pub fn announced(&self) -> AnnouncedShape {
        self.announced
    }

    /// Publishes every static descriptor, retained. Failures are logged and
    /// skipped. Returns how many went out.
    pub async fn publish_static<T>(&self, transport: &mut T) -> usize
    where
        T: Transport + ?Sized,
    {
        let entities = self.catalog.static_entities();
        let total = entities.len();
        let mut sent = 0;
        for descriptor in &entities {
            if self.announce(transport, descriptor).await {
                sent += 1;
            }
        }
        debug!("Announced {}/{} static entities", sent, total);
        sent
    }

    /// Re-announces the state-dependent entities whose shape differs from the
    /// last announcement, or all of them when `force` is set. The heating
    /// target is clamped into its new bounds first. Returns whether anything
    /// was re-announced.
    pub async fn publish_dynamic<T>(
        &mut self,
        transport: &mut T,
        state: &mut BridgeState,
        force: bool,
    ) -> bool
    where
        T: Transport + ?Sized,
    {
        let mut changed = false;

        let heating = state.heating_bounds();
        if force || heating != self.announced.heating {
            state.clamp_heating_target();
            debug!(
                "Announcing heating range {}..={}",
                heating.min, heating.max
            );
            self.announce(transport, &self.catalog.heating_target(heating))
                .await;
            self.announce(
                transport,
                &self
                    .catalog
                    .heating_climate(heating, state.settings.regulated()),
            )
            .await;
            self.announced.heating = heating;
            changed = true;
        }

        let dhw = state.dhw_bounds();
        if force || dhw != self.announced.dhw {
            debug!("Announcing DHW range {}..={}", dhw.min, dhw.max);
            self.announce(transport, &self.catalog.dhw_target(dhw)).await;
            self.announce(transport, &self.catalog.dhw_climate(dhw)).await;
            self.announced.dhw = dhw;
            changed = true;
        }

        let editable = state.outdoor_temp_editable();
        if force || editable != self.announced.outdoor_editable {
            let (retired, current) = if editable {
                (self.catalog.outdoor_sensor(), self.catalog.outdoor_number())
            } else {
                (self.catalog.outdoor_number(), self.catalog.outdoor_sensor())
            };
            self.retract(transport, &retired).await;
            self.announce(transport, &current).await;
            self.announced.outdoor_editable = editable;
            changed = true;
        }

        changed
    }

    async fn announce<T>(&self, transport: &mut T, descriptor: &Descriptor) -> bool
    where
        T: Transport + ?Sized,
    {
        let topic = self
            .catalog
            .config_topic(descriptor.component, descriptor.key());
        let payload = match serde_json::to_vec(descriptor) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode descriptor for {}: {}", topic, e);
                return false;
            }
        };
        match transport.publish(&topic, &payload, true).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to announce {}: {}", descriptor.key(), e);
                false
            }
        }
    }

    /// Deletes an entity from the hub with an empty retained payload.
    async fn retract<T>(&self, transport: &mut T, descriptor: &Descriptor)
    where
        T: Transport + ?Sized,
    {
        let topic = self
            .catalog
            .config_topic(descriptor.component, descriptor.key());
        if let Err(e) = transport.publish(&topic, &[], true).await {
            warn!("Failed to retract {}: {}", descriptor.key(), e);
        }
    }
}
