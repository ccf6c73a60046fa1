//! Almanac with the same sunrise and sunset every day.

use burrow_app::ports::Almanac;
use burrow_domain::environment::SunTimes;
use burrow_domain::error::BurrowError;
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

/// Fixed sun times, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedAlmanac {
    pub sunrise: NaiveTime,
    pub sunset: NaiveTime,
    pub southern_hemisphere: bool,
}

impl FixedAlmanac {
    #[must_use]
    pub fn new(sunrise: NaiveTime, sunset: NaiveTime) -> Self {
        Self {
            sunrise,
            sunset,
            southern_hemisphere: false,
        }
    }
}

impl Almanac for FixedAlmanac {
    fn sun_times(&self, date: NaiveDate) -> Result<SunTimes, BurrowError> {
        Ok(SunTimes {
            sunrise: Utc.from_utc_datetime(&date.and_time(self.sunrise)),
            sunset: Utc.from_utc_datetime(&date.and_time(self.sunset)),
        })
    }

    fn southern_hemisphere(&self) -> bool {
        self.southern_hemisphere
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_place_sun_times_on_requested_date() {
        let almanac = FixedAlmanac::new(
            NaiveTime::from_hms_opt(7, 30, 0).unwrap(),
            NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
        );
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();

        let sun = almanac.sun_times(date).unwrap();

        assert_eq!(sun.sunrise.date_naive(), date);
        assert_eq!(sun.sunset - sun.sunrise, chrono::TimeDelta::minutes(690));
    }
}
