//! Day-cycle monitor: publishes `DayPhaseChanged` on phase transitions.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use burrow_domain::environment::{DayPhase, DaycycleSettings, Season};
use burrow_domain::error::BurrowError;
use burrow_domain::event::Event;
use burrow_domain::time::Timestamp;

use crate::ports::{Almanac, Clock, EventPublisher};

/// How often the current phase is recomputed.
pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Watches the clock and reports day phase transitions.
pub struct DaycycleMonitor<A, P, C> {
    almanac: A,
    publisher: P,
    clock: C,
    settings: DaycycleSettings,
    last: Mutex<Option<DayPhase>>,
}

impl<A, P, C> DaycycleMonitor<A, P, C>
where
    A: Almanac + Send + Sync,
    P: EventPublisher + Send + Sync,
    C: Clock + Send + Sync,
{
    pub fn new(almanac: A, publisher: P, clock: C, settings: DaycycleSettings) -> Self {
        Self {
            almanac,
            publisher,
            clock,
            settings,
            last: Mutex::new(None),
        }
    }

    /// Phase and season at `at`.
    ///
    /// # Errors
    ///
    /// Returns the almanac's error if sun times are unavailable.
    pub fn phase_at(&self, at: Timestamp) -> Result<(DayPhase, Season), BurrowError> {
        let date = at.date_naive();
        let sun = self.almanac.sun_times(date)?;
        let phase = self.settings.phase_at(at, sun);
        let season = Season::at(date, self.almanac.southern_hemisphere());
        Ok((phase, season))
    }

    /// Phase and season right now.
    ///
    /// # Errors
    ///
    /// Returns the almanac's error if sun times are unavailable.
    pub fn current(&self) -> Result<(DayPhase, Season), BurrowError> {
        self.phase_at(self.clock.now())
    }

    /// Recompute the phase and publish an event if it changed since the
    /// previous poll. The first poll only records the phase.
    ///
    /// # Errors
    ///
    /// Returns the almanac's or the publisher's error.
    pub async fn poll(&self) -> Result<Option<DayPhase>, BurrowError> {
        let (phase, season) = self.current()?;
        let previous = self
            .last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(phase);
        match previous {
            Some(previous) if previous != phase => {
                tracing::info!(from = %previous, to = %phase, %season, "day phase changed");
                self.publisher
                    .publish(Event::day_phase(phase, season))
                    .await?;
                Ok(Some(phase))
            }
            Some(_) => Ok(None),
            None => {
                tracing::debug!(%phase, %season, "initial day phase");
                Ok(None)
            }
        }
    }

    /// Poll forever at [`POLL_INTERVAL`]. Errors are logged and retried on
    /// the next tick.
    pub async fn run(&self) {
        loop {
            if let Err(err) = self.poll().await {
                tracing::warn!(%err, "day cycle poll failed");
            }
            self.clock.sleep(POLL_INTERVAL).await;
        }
    }
}
