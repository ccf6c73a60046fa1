//! Bounded retry with exponential backoff for device calls.

use std::future::Future;
use std::time::Duration;

use burrow_domain::error::DeviceError;

use crate::ports::Clock;

/// How many times a transient device failure is retried, and how long to
/// wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Never retry.
    #[must_use]
    pub fn none() -> Self {
        Self {
            retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based), doubling each time
    /// and capped at `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Run `op`, retrying transient failures according to `policy`.
///
/// # Errors
///
/// Returns the last error once retries are exhausted, or the first
/// non-transient error.
pub async fn retry<C, F, Fut, T>(
    clock: &C,
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, DeviceError>
where
    C: Clock,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DeviceError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.retries => {
                attempt += 1;
                let delay = policy.delay_for_attempt(attempt);
                tracing::debug!(%err, label, attempt, ?delay, "retrying device call");
                clock.sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
