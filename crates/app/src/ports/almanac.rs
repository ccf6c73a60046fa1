//! Almanac port: sunrise and sunset times.

use burrow_domain::environment::SunTimes;
use burrow_domain::error::BurrowError;
use chrono::NaiveDate;

/// Computes or looks up sun times for a date.
pub trait Almanac {
    /// # Errors
    ///
    /// Returns an error if sun times are unavailable for `date`.
    fn sun_times(&self, date: NaiveDate) -> Result<SunTimes, BurrowError>;

    /// Whether the location is south of the equator (seasons are swapped).
    fn southern_hemisphere(&self) -> bool {
        false
    }
}

impl<T: Almanac + ?Sized> Almanac for std::sync::Arc<T> {
    fn sun_times(&self, date: NaiveDate) -> Result<SunTimes, BurrowError> {
        (**self).sun_times(date)
    }

    fn southern_hemisphere(&self) -> bool {
        (**self).southern_hemisphere()
    }
}
