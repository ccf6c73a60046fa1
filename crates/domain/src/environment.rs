//! Environment conditions: the inputs of shutter automation.
//!
//! Three independent dimensions describe "what it is like outside right now":
//! the [`DayPhase`] (coarse time of day derived from sunrise and sunset), the
//! [`Season`], and the outdoor [`TemperatureBand`].

mod daycycle;
mod temperature;

pub use daycycle::{DaycycleSettings, SunTimes};
pub use temperature::{SensorLocation, TemperatureThresholds, HYSTERESIS};

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Coarse time-of-day bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayPhase {
    Morning,
    LateMorning,
    Afternoon,
    LateAfternoon,
    Evening,
    Night,
}

impl DayPhase {
    pub const ALL: [Self; 6] = [
        Self::Morning,
        Self::LateMorning,
        Self::Afternoon,
        Self::LateAfternoon,
        Self::Evening,
        Self::Night,
    ];

    #[must_use]
    pub fn is_night(self) -> bool {
        matches!(self, Self::Night)
    }
}

impl fmt::Display for DayPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Morning => "morning",
            Self::LateMorning => "late_morning",
            Self::Afternoon => "afternoon",
            Self::LateAfternoon => "late_afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        })
    }
}

/// Astronomical season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    /// Season for a calendar date.
    ///
    /// Boundaries are the usual equinox and solstice dates (March 20,
    /// June 21, September 22, December 21). The southern hemisphere gets
    /// the opposite season.
    #[must_use]
    pub fn at(date: NaiveDate, southern_hemisphere: bool) -> Self {
        let day = (date.month(), date.day());
        let northern = if day < (3, 20) {
            Self::Winter
        } else if day < (6, 21) {
            Self::Spring
        } else if day < (9, 22) {
            Self::Summer
        } else if day < (12, 21) {
            Self::Autumn
        } else {
            Self::Winter
        };
        if southern_hemisphere {
            northern.opposite()
        } else {
            northern
        }
    }

    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Winter => Self::Summer,
            Self::Spring => Self::Autumn,
            Self::Summer => Self::Winter,
            Self::Autumn => Self::Spring,
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Winter => "winter",
            Self::Spring => "spring",
            Self::Summer => "summer",
            Self::Autumn => "autumn",
        })
    }
}

/// Discretised temperature classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureBand {
    Cold,
    #[default]
    Normal,
    Hot,
}

impl fmt::Display for TemperatureBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cold => "cold",
            Self::Normal => "normal",
            Self::Hot => "hot",
        })
    }
}

/// Snapshot of the three conditions, as seen by the preset resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conditions {
    pub day_phase: DayPhase,
    pub season: Season,
    pub temperature: TemperatureBand,
}

impl fmt::Display for Conditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.day_phase, self.season, self.temperature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, month, day).unwrap()
    }

    #[test]
    fn should_return_winter_in_january() {
        assert_eq!(Season::at(date(1, 15), false), Season::Winter);
    }

    #[test]
    fn should_switch_to_spring_on_march_equinox() {
        assert_eq!(Season::at(date(3, 19), false), Season::Winter);
        assert_eq!(Season::at(date(3, 20), false), Season::Spring);
    }

    #[test]
    fn should_return_summer_in_july() {
        assert_eq!(Season::at(date(7, 14), false), Season::Summer);
    }

    #[test]
    fn should_return_autumn_in_october() {
        assert_eq!(Season::at(date(10, 1), false), Season::Autumn);
    }

    #[test]
    fn should_return_winter_after_december_solstice() {
        assert_eq!(Season::at(date(12, 25), false), Season::Winter);
    }

    #[test]
    fn should_flip_season_in_southern_hemisphere() {
        assert_eq!(Season::at(date(7, 14), true), Season::Winter);
        assert_eq!(Season::at(date(1, 15), true), Season::Summer);
    }

    #[test]
    fn should_report_only_night_as_night() {
        let nights: Vec<_> = DayPhase::ALL.iter().filter(|p| p.is_night()).collect();
        assert_eq!(nights, vec![&DayPhase::Night]);
    }

    #[test]
    fn should_display_conditions_compactly() {
        let conditions = Conditions {
            day_phase: DayPhase::LateMorning,
            season: Season::Summer,
            temperature: TemperatureBand::Hot,
        };
        assert_eq!(conditions.to_string(), "late_morning/summer/hot");
    }

    #[test]
    fn should_deserialize_snake_case_phase() {
        let phase: DayPhase = serde_json::from_str("\"late_afternoon\"").unwrap();
        assert_eq!(phase, DayPhase::LateAfternoon);
    }
}
