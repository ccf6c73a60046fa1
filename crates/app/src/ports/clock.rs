//! Clock port: wall-clock time and sleeping, injectable for tests.

use std::future::Future;
use std::time::Duration;

use burrow_domain::time::{Timestamp, delta, now};

/// Source of time for grace windows, timeouts and polling loops.
pub trait Clock {
    fn now(&self) -> Timestamp;

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

impl<T: Clock + Send + Sync> Clock for std::sync::Arc<T> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        (**self).sleep(duration)
    }
}

/// Clock driven by the tokio timer.
///
/// `now` is the wall-clock time at construction plus the tokio time elapsed
/// since, so pausing and advancing tokio time moves it too.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: Timestamp,
    started: tokio::time::Instant,
}

impl TokioClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: now(),
            started: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> Timestamp {
        self.origin + delta(self.started.elapsed())
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
