//! Temperature thresholds and band transitions with hysteresis.

use serde::{Deserialize, Serialize};

use super::TemperatureBand;
use crate::error::ConfigurationError;

/// Margin (°C) a reading must cross beyond a threshold to change band.
pub const HYSTERESIS: f64 = 0.25;

/// Where a temperature sensor is located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorLocation {
    Inside,
    Outside,
}

/// Cold/hot thresholds, in °C.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemperatureThresholds {
    pub outdoor_cold: f64,
    pub indoor_cold: f64,
    pub indoor_hot: f64,
    pub outdoor_hot: f64,
}

impl Default for TemperatureThresholds {
    fn default() -> Self {
        Self {
            outdoor_cold: 5.0,
            indoor_cold: 16.0,
            indoor_hot: 25.0,
            outdoor_hot: 30.0,
        }
    }
}

impl TemperatureThresholds {
    /// Require `outdoor_cold < indoor_cold < indoor_hot < outdoor_hot`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnorderedThresholds`] otherwise.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let values = [
            self.outdoor_cold,
            self.indoor_cold,
            self.indoor_hot,
            self.outdoor_hot,
        ];
        if values.windows(2).all(|w| w[0] < w[1]) {
            Ok(())
        } else {
            Err(ConfigurationError::UnorderedThresholds(format!(
                "outdoor_cold={}, indoor_cold={}, indoor_hot={}, outdoor_hot={}",
                self.outdoor_cold, self.indoor_cold, self.indoor_hot, self.outdoor_hot
            )))
        }
    }

    /// `(cold, hot)` thresholds applying to a sensor location.
    #[must_use]
    pub fn for_location(&self, location: SensorLocation) -> (f64, f64) {
        match location {
            SensorLocation::Inside => (self.indoor_cold, self.indoor_hot),
            SensorLocation::Outside => (self.outdoor_cold, self.outdoor_hot),
        }
    }
}

impl TemperatureBand {
    /// Band after observing `reading`, or `None` when the band is unchanged.
    ///
    /// A band only changes once the reading crosses its threshold by more
    /// than [`HYSTERESIS`], which keeps a sensor hovering around a threshold
    /// from flapping. Cold and hot always go through normal.
    #[must_use]
    pub fn next(
        self,
        reading: f64,
        location: SensorLocation,
        thresholds: &TemperatureThresholds,
    ) -> Option<Self> {
        let (cold, hot) = thresholds.for_location(location);
        match self {
            Self::Normal if reading < cold - HYSTERESIS => Some(Self::Cold),
            Self::Normal if reading > hot + HYSTERESIS => Some(Self::Hot),
            Self::Cold if reading > cold + HYSTERESIS => Some(Self::Normal),
            Self::Hot if reading < hot - HYSTERESIS => Some(Self::Normal),
            _ => None,
        }
    }
}
