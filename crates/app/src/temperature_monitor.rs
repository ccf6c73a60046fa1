//! Temperature monitor: turns raw readings into band transitions.
//!
//! Consumes `TemperatureData` events, tracks the current
//! [`TemperatureBand`] of every sensor and publishes `TemperatureChanged`
//! only when a sensor moves to another band.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use burrow_domain::environment::{SensorLocation, TemperatureBand, TemperatureThresholds};
use burrow_domain::error::BurrowError;
use burrow_domain::event::{Event, EventKind, EventPayload};
use burrow_domain::id::{ResourceId, SubscriptionId};

use crate::event_bus::{EventBus, handler_fn};
use crate::ports::EventPublisher;

/// Per-sensor temperature band tracker.
pub struct TemperatureMonitor<P> {
    publisher: P,
    thresholds: TemperatureThresholds,
    bands: Mutex<HashMap<ResourceId, TemperatureBand>>,
}

impl<P> TemperatureMonitor<P>
where
    P: EventPublisher + Send + Sync + 'static,
{
    pub fn new(publisher: P, thresholds: TemperatureThresholds) -> Self {
        Self {
            publisher,
            thresholds,
            bands: Mutex::new(HashMap::new()),
        }
    }

    /// Current band of `sensor`, [`TemperatureBand::Normal`] until a reading
    /// says otherwise.
    #[must_use]
    pub fn band(&self, sensor: &ResourceId) -> TemperatureBand {
        self.bands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(sensor)
            .copied()
            .unwrap_or_default()
    }

    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) -> SubscriptionId {
        let this = Arc::clone(self);
        bus.subscribe(
            EventKind::TemperatureData,
            handler_fn("temperature", move |event: Arc<Event>| {
                let this = Arc::clone(&this);
                async move { this.handle_event(&event).await.map(|_| ()) }
            }),
        )
    }

    /// Handle a `TemperatureData` event.
    ///
    /// # Errors
    ///
    /// Returns the publisher's error.
    pub async fn handle_event(&self, event: &Event) -> Result<Option<TemperatureBand>, BurrowError> {
        let EventPayload::TemperatureReading { celsius, location } = event.payload else {
            return Ok(None);
        };
        let Some(sensor) = &event.subject else {
            tracing::warn!(id = %event.id, "temperature reading without sensor, ignoring");
            return Ok(None);
        };
        self.observe(sensor, celsius, location, event.room.as_deref())
            .await
    }

    /// Record a reading and publish `TemperatureChanged` if the band moved.
    ///
    /// # Errors
    ///
    /// Returns the publisher's error.
    pub async fn observe(
        &self,
        sensor: &ResourceId,
        celsius: f64,
        location: SensorLocation,
        room: Option<&str>,
    ) -> Result<Option<TemperatureBand>, BurrowError> {
        let changed = {
            let mut bands = self.bands.lock().unwrap_or_else(PoisonError::into_inner);
            let current = bands.entry(sensor.clone()).or_default();
            let next = current.next(celsius, location, &self.thresholds);
            if let Some(next) = next {
                tracing::info!(%sensor, from = %current, to = %next, celsius, ?location, "temperature band changed");
                *current = next;
            }
            next
        };

        let Some(band) = changed else {
            tracing::trace!(%sensor, celsius, "temperature reading");
            return Ok(None);
        };
        let mut event = Event::new(
            EventKind::TemperatureChanged,
            Some(sensor.clone()),
            EventPayload::TemperatureBand {
                band,
                celsius,
                location,
            },
        );
        if let Some(room) = room {
            event = event.in_room(room);
        }
        self.publisher.publish(event).await?;
        Ok(Some(band))
    }
}
