//! In-process event bus with per-kind handler registries.
//!
//! Every published event is fanned out to the handlers subscribed to its
//! [`EventKind`]. Each handler invocation runs on its own tokio task, so a
//! slow, failing or panicking handler never blocks the publisher or the
//! other handlers. Delivery order between handlers is unspecified.
//!
//! A handler registered with [`EventBus::subscribe_ordered`] gets its own
//! queue drained by a single task instead: it sees events one at a time, in
//! the order they were published.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use burrow_domain::error::BurrowError;
use burrow_domain::event::{Event, EventKind};
use burrow_domain::id::SubscriptionId;

use crate::ports::EventPublisher;

/// Boxed future returned by [`EventHandler::handle`].
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), BurrowError>> + Send>>;

/// Reaction to a published event.
pub trait EventHandler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Handle one event. The returned future must own everything it needs.
    fn handle(&self, event: Arc<Event>) -> HandlerFuture;
}

struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Arc<Event>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), BurrowError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, event: Arc<Event>) -> HandlerFuture {
        Box::pin((self.f)(event))
    }
}

/// Wrap a closure returning a future into an [`EventHandler`].
pub fn handler_fn<F, Fut>(name: impl Into<String>, f: F) -> Arc<dyn EventHandler>
where
    F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BurrowError>> + Send + 'static,
{
    Arc::new(FnHandler {
        name: name.into(),
        f,
    })
}

struct Queued {
    event: Arc<Event>,
    done: oneshot::Sender<()>,
}

struct Subscription {
    id: SubscriptionId,
    handler: Arc<dyn EventHandler>,
    /// Set for ordered subscriptions.
    queue: Option<mpsc::UnboundedSender<Queued>>,
}

/// Handles of the tasks spawned by one [`EventBus::publish`].
///
/// Dropping it leaves the tasks running.
#[must_use = "dropping a Dispatch detaches the handler tasks"]
pub struct Dispatch {
    tasks: Vec<JoinHandle<()>>,
}

impl Dispatch {
    /// Number of handlers the event was dispatched to.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every handler task to finish.
    pub async fn settled(self) {
        for task in self.tasks {
            let _ = task.await;
        }
    }
}

/// Publish/subscribe registry keyed by [`EventKind`].
///
/// The registry lock is only held to copy or edit the handler lists, so
/// handlers may subscribe, unsubscribe and publish freely.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<EventKind, Vec<Subscription>>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of `kind`.
    pub fn subscribe(&self, kind: EventKind, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        self.register(kind, handler, None)
    }

    /// Register `handler` for events of `kind`, delivered one at a time in
    /// publish order.
    ///
    /// Must be called from within a tokio runtime. The queue task stops once
    /// the subscription is removed.
    pub fn subscribe_ordered(
        &self,
        kind: EventKind,
        handler: Arc<dyn EventHandler>,
    ) -> SubscriptionId {
        let (queue, mut pending) = mpsc::unbounded_channel::<Queued>();
        let worker = Arc::clone(&handler);
        tokio::spawn(async move {
            while let Some(Queued { event, done }) = pending.recv().await {
                deliver(&worker, event).await;
                let _ = done.send(());
            }
            tracing::trace!(handler = worker.name(), "ordered queue closed");
        });
        self.register(kind, handler, Some(queue))
    }

    fn register(
        &self,
        kind: EventKind,
        handler: Arc<dyn EventHandler>,
        queue: Option<mpsc::UnboundedSender<Queued>>,
    ) -> SubscriptionId {
        let id = SubscriptionId::new();
        tracing::debug!(%kind, handler = handler.name(), %id, ordered = queue.is_some(), "subscribed");
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push(Subscription { id, handler, queue });
        id
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for subscriptions in handlers.values_mut() {
            if let Some(index) = subscriptions.iter().position(|s| s.id == id) {
                subscriptions.remove(index);
                return true;
            }
        }
        false
    }

    /// Number of handlers currently subscribed to `kind`.
    #[must_use]
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    /// Spawn one task per handler subscribed to `event.kind`.
    ///
    /// Ordered subscriptions are enqueued before this returns, so events
    /// published one after the other reach them in that order.
    ///
    /// Must be called from within a tokio runtime.
    pub fn publish(&self, event: Event) -> Dispatch {
        type Target = (Arc<dyn EventHandler>, Option<mpsc::UnboundedSender<Queued>>);
        let targets: Vec<Target> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event.kind)
            .map(|subs| {
                subs.iter()
                    .map(|s| (Arc::clone(&s.handler), s.queue.clone()))
                    .collect()
            })
            .unwrap_or_default();

        tracing::trace!(kind = %event.kind, id = %event.id, handlers = targets.len(), "publishing");

        let event = Arc::new(event);
        let tasks = targets
            .into_iter()
            .map(|(handler, queue)| {
                let event = Arc::clone(&event);
                match queue {
                    Some(queue) => {
                        let (done, finished) = oneshot::channel();
                        if queue.send(Queued { event, done }).is_err() {
                            tracing::debug!(handler = handler.name(), "ordered queue closed, event dropped");
                        }
                        tokio::spawn(async move {
                            let _ = finished.await;
                        })
                    }
                    None => tokio::spawn(async move { deliver(&handler, event).await }),
                }
            })
            .collect();

        Dispatch { tasks }
    }
}

/// Run one handler invocation on its own task and log its failure.
async fn deliver(handler: &Arc<dyn EventHandler>, event: Arc<Event>) {
    let kind = event.kind;
    match tokio::spawn(handler.handle(event)).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            tracing::warn!(%err, handler = handler.name(), %kind, "event handler failed");
        }
        Err(err) => {
            tracing::error!(%err, handler = handler.name(), %kind, "event handler panicked");
        }
    }
}

impl EventPublisher for EventBus {
    fn publish(&self, event: Event) -> impl Future<Output = Result<(), BurrowError>> + Send {
        drop(EventBus::publish(self, event));
        async { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_domain::event::EventPayload;
    use burrow_domain::id::EventId;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    // ── Helpers ────────────────────────────────────────────────────

    fn sleep_event() -> Event {
        Event::new(EventKind::Sleep, None, EventPayload::None)
    }

    fn recorder(seen: &Arc<Mutex<Vec<EventId>>>) -> Arc<dyn EventHandler> {
        let seen = Arc::clone(seen);
        handler_fn("recorder", move |event: Arc<Event>| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().unwrap().push(event.id);
                Ok::<(), BurrowError>(())
            }
        })
    }

    // ── Tests ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn should_deliver_event_to_every_subscriber_of_kind() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(EventKind::Sleep, recorder(&seen));
        bus.subscribe(EventKind::Sleep, recorder(&seen));

        let event = sleep_event();
        let id = event.id;
        let dispatch = bus.publish(event);
        assert_eq!(dispatch.len(), 2);
        dispatch.settled().await;

        assert_eq!(*seen.lock().unwrap(), vec![id, id]);
    }

    #[tokio::test]
    async fn should_not_deliver_other_kinds() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(EventKind::WakeUp, recorder(&seen));

        let dispatch = bus.publish(sleep_event());
        assert!(dispatch.is_empty());
        dispatch.settled().await;
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_stop_delivering_after_unsubscribe() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let id = bus.subscribe(EventKind::Sleep, recorder(&seen));

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.subscriber_count(EventKind::Sleep), 0);

        bus.publish(sleep_event()).settled().await;
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_keep_delivering_when_a_handler_fails_or_panics() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(
            EventKind::Sleep,
            handler_fn("failing", |_event: Arc<Event>| async {
                Err::<(), BurrowError>(BurrowError::Validation(
                    burrow_domain::error::ValidationError::EmptyName,
                ))
            }),
        );
        bus.subscribe(
            EventKind::Sleep,
            handler_fn("panicking", |event: Arc<Event>| async move {
                assert!(event.room.is_some(), "handler bug");
                Ok::<(), BurrowError>(())
            }),
        );
        bus.subscribe(EventKind::Sleep, recorder(&seen));

        bus.publish(sleep_event()).settled().await;
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_block_publisher_on_slow_handler() {
        let bus = EventBus::new();
        let done = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&done);
        bus.subscribe(
            EventKind::Sleep,
            handler_fn("slow", move |_event: Arc<Event>| {
                let counter = Arc::clone(&counter);
                async move {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), BurrowError>(())
                }
            }),
        );

        let dispatch = bus.publish(sleep_event());
        assert_eq!(done.load(Ordering::SeqCst), 0);
        dispatch.settled().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn should_allow_handler_to_unsubscribe_itself() {
        let bus = Arc::new(EventBus::new());
        let own_id = Arc::new(Mutex::new(None::<SubscriptionId>));
        let calls = Arc::new(AtomicUsize::new(0));

        let handler = {
            let bus = Arc::clone(&bus);
            let own_id = Arc::clone(&own_id);
            let calls = Arc::clone(&calls);
            handler_fn("once", move |_event: Arc<Event>| {
                let bus = Arc::clone(&bus);
                let own_id = Arc::clone(&own_id);
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let id = own_id.lock().unwrap().take();
                    if let Some(id) = id {
                        bus.unsubscribe(id);
                    }
                    Ok::<(), BurrowError>(())
                }
            })
        };
        let id = bus.subscribe(EventKind::Sleep, handler);
        *own_id.lock().unwrap() = Some(id);

        EventBus::publish(&bus, sleep_event()).settled().await;
        EventBus::publish(&bus, sleep_event()).settled().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn should_deliver_ordered_subscription_in_publish_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler = {
            let seen = Arc::clone(&seen);
            handler_fn("ordered", move |event: Arc<Event>| {
                let seen = Arc::clone(&seen);
                async move {
                    tokio::task::yield_now().await;
                    seen.lock().unwrap().push(event.id);
                    Ok::<(), BurrowError>(())
                }
            })
        };
        bus.subscribe_ordered(EventKind::Sleep, handler);

        let events: Vec<Event> = (0..200).map(|_| sleep_event()).collect();
        let published: Vec<EventId> = events.iter().map(|e| e.id).collect();
        let dispatches: Vec<Dispatch> = events.into_iter().map(|e| bus.publish(e)).collect();
        for dispatch in dispatches {
            dispatch.settled().await;
        }

        assert_eq!(*seen.lock().unwrap(), published);
    }

    #[tokio::test]
    async fn should_drop_events_for_removed_ordered_subscription() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let id = bus.subscribe_ordered(EventKind::Sleep, recorder(&seen));

        bus.publish(sleep_event()).settled().await;
        assert!(bus.unsubscribe(id));
        bus.publish(sleep_event()).settled().await;

        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn should_publish_through_port() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(EventKind::Sleep, recorder(&seen));

        EventPublisher::publish(&bus, sleep_event()).await.unwrap();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
