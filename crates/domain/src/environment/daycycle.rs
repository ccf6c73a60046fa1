//! Day cycle: bucket a time of day into a [`DayPhase`].
//!
//! Intermediate phases are placed at fixed percentages of the
//! sunrise → sunset span. Anything outside `[sunrise, sunset)` is night.

use serde::{Deserialize, Serialize};

use super::DayPhase;
use crate::error::ConfigurationError;
use crate::time::Timestamp;

/// Sunrise and sunset for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SunTimes {
    pub sunrise: Timestamp,
    pub sunset: Timestamp,
}

/// Offsets of the intermediate phases, in percent of the daylight span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaycycleSettings {
    pub late_morning: u8,
    pub noon: u8,
    pub late_afternoon: u8,
    pub evening: u8,
}

impl Default for DaycycleSettings {
    fn default() -> Self {
        Self {
            late_morning: 30,
            noon: 50,
            late_afternoon: 70,
            evening: 90,
        }
    }
}

impl DaycycleSettings {
    /// Check the offsets are strictly increasing and below 100%.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnorderedDaycycleOffsets`] otherwise.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let offsets = [self.late_morning, self.noon, self.late_afternoon, self.evening];
        let increasing = offsets.windows(2).all(|w| w[0] < w[1]);
        if !increasing || self.evening >= 100 {
            return Err(ConfigurationError::UnorderedDaycycleOffsets(format!(
                "late_morning={}, noon={}, late_afternoon={}, evening={}",
                self.late_morning, self.noon, self.late_afternoon, self.evening
            )));
        }
        Ok(())
    }

    /// Determine the phase of `at` for a day with the given sun times.
    #[must_use]
    pub fn phase_at(&self, at: Timestamp, sun: SunTimes) -> DayPhase {
        if at < sun.sunrise || at >= sun.sunset {
            return DayPhase::Night;
        }
        let boundary = |percent: u8| sun.sunrise + (sun.sunset - sun.sunrise) * i32::from(percent) / 100;
        if at < boundary(self.late_morning) {
            DayPhase::Morning
        } else if at < boundary(self.noon) {
            DayPhase::LateMorning
        } else if at < boundary(self.late_afternoon) {
            DayPhase::Afternoon
        } else if at < boundary(self.evening) {
            DayPhase::LateAfternoon
        } else {
            DayPhase::Evening
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(hour: u32, minute: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2025, 6, 1, hour, minute, 0).unwrap()
    }

    // 08:00 → 18:00: ten hours of daylight, so each 10% is one hour.
    fn sun() -> SunTimes {
        SunTimes {
            sunrise: at(8, 0),
            sunset: at(18, 0),
        }
    }

    #[test]
    fn should_accept_default_offsets() {
        assert!(DaycycleSettings::default().validate().is_ok());
    }

    #[test]
    fn should_reject_unordered_offsets() {
        let settings = DaycycleSettings {
            noon: 20,
            ..DaycycleSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigurationError::UnorderedDaycycleOffsets(_))
        ));
    }

    #[test]
    fn should_reject_evening_at_hundred_percent() {
        let settings = DaycycleSettings {
            evening: 100,
            ..DaycycleSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn should_return_night_before_sunrise_and_after_sunset() {
        let settings = DaycycleSettings::default();
        assert_eq!(settings.phase_at(at(7, 59), sun()), DayPhase::Night);
        assert_eq!(settings.phase_at(at(18, 0), sun()), DayPhase::Night);
    }

    #[test]
    fn should_bucket_daylight_into_intermediate_phases() {
        let settings = DaycycleSettings::default();
        assert_eq!(settings.phase_at(at(8, 0), sun()), DayPhase::Morning);
        assert_eq!(settings.phase_at(at(11, 0), sun()), DayPhase::LateMorning);
        assert_eq!(settings.phase_at(at(13, 30), sun()), DayPhase::Afternoon);
        assert_eq!(settings.phase_at(at(15, 0), sun()), DayPhase::LateAfternoon);
        assert_eq!(settings.phase_at(at(17, 30), sun()), DayPhase::Evening);
    }
}
