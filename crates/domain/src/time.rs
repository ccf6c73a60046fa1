//! Time and timestamp helpers.

use chrono::{DateTime, TimeDelta, Utc};

/// UTC timestamp used for event times, arming times and keypad activity.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Convert a std duration to a chrono delta, saturating on overflow.
#[must_use]
pub fn delta(duration: std::time::Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

/// Time elapsed from `since` to `now`, zero when `since` is in the future.
#[must_use]
pub fn elapsed(since: Timestamp, now: Timestamp) -> std::time::Duration {
    (now - since).to_std().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_compute_elapsed_duration() {
        let start = now();
        let later = start + TimeDelta::seconds(42);
        assert_eq!(elapsed(start, later), Duration::from_secs(42));
    }

    #[test]
    fn should_clamp_elapsed_to_zero_when_since_is_in_the_future() {
        let start = now();
        let earlier = start - TimeDelta::seconds(5);
        assert_eq!(elapsed(start, earlier), Duration::ZERO);
    }

    #[test]
    fn should_convert_std_duration_to_delta() {
        assert_eq!(delta(Duration::from_secs(75)), TimeDelta::seconds(75));
    }
}
