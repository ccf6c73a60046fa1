//! Event bus port: publishing domain events.

use std::future::Future;

use burrow_domain::error::BurrowError;
use burrow_domain::event::Event;

/// Publishes domain events to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), BurrowError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), BurrowError>> + Send {
        (**self).publish(event)
    }
}
