//! Alarm system: keypad authentication, arming and intrusion response.
//!
//! Pure transition rules live in [`AlarmSession`]; this service owns the
//! session behind a short-lived lock and performs the side effects each
//! transition calls for: persisting the armed flag, camera monitoring,
//! notifications, bus events and the delayed front-door check.
//!
//! Keypad transitions are serialised through a dedicated async lock so the
//! persisted flag always reflects the last accepted transition. The session
//! lock itself is never held across IO or a sleep.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use burrow_domain::alarm::{
    AlarmCode, AlarmSession, AlarmSettings, AlarmState, KeypadCommand, KeypadKey, KeypadOutcome,
    OpeningOutcome,
};
use burrow_domain::error::BurrowError;
use burrow_domain::event::{Event, EventKind, EventPayload};
use burrow_domain::id::{ResourceId, SubscriptionId};
use burrow_domain::time::elapsed;

use crate::event_bus::{EventBus, EventHandler, handler_fn};
use crate::ports::notification::notify;
use crate::ports::storage::{get_or, put};
use crate::ports::{
    Camera, Clock, EventPublisher, KeyValueStore, Notification, NotificationSink, Priority,
};

/// Store key of the persisted armed flag.
pub const ARMED_KEY: &str = "alarm_enabled";

/// Static alarm configuration.
#[derive(Debug, Clone)]
pub struct AlarmConfig {
    pub code: AlarmCode,
    pub settings: AlarmSettings,
    /// Cameras monitored while armed and captured when triggered.
    pub cameras: Vec<ResourceId>,
    /// Camera facing the front door, used for the entry burst.
    pub front_door_camera: Option<ResourceId>,
}

impl AlarmConfig {
    #[must_use]
    pub fn new(code: AlarmCode) -> Self {
        Self {
            code,
            settings: AlarmSettings::default(),
            cameras: Vec::new(),
            front_door_camera: None,
        }
    }
}

/// Intrusion alarm driven by keypad and opening events.
pub struct AlarmSystem<S, N, K, P, C> {
    store: S,
    notifier: N,
    cameras: K,
    publisher: P,
    clock: C,
    config: AlarmConfig,
    session: Mutex<AlarmSession>,
    transitions: tokio::sync::Mutex<()>,
}

impl<S, N, K, P, C> AlarmSystem<S, N, K, P, C>
where
    S: KeyValueStore + Send + Sync + 'static,
    N: NotificationSink + Send + Sync + 'static,
    K: Camera + Send + Sync + 'static,
    P: EventPublisher + Send + Sync + 'static,
    C: Clock + Send + Sync + 'static,
{
    pub fn new(store: S, notifier: N, cameras: K, publisher: P, clock: C, config: AlarmConfig) -> Self {
        Self {
            store,
            notifier,
            cameras,
            publisher,
            clock,
            config,
            session: Mutex::new(AlarmSession::new()),
            transitions: tokio::sync::Mutex::new(()),
        }
    }

    fn session(&self) -> MutexGuard<'_, AlarmSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn state(&self) -> AlarmState {
        self.session().state()
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.session().is_armed()
    }

    /// Re-arm after a restart if the persisted flag says the alarm was on.
    ///
    /// The arming grace window counts as already elapsed, so the next
    /// opening anywhere triggers at once.
    ///
    /// # Errors
    ///
    /// Returns the store's error if the flag cannot be read.
    pub async fn restore(&self) -> Result<AlarmState, BurrowError> {
        let _transition = self.transitions.lock().await;
        let armed: bool = get_or(&self.store, ARMED_KEY, false).await?;
        if !armed {
            return Ok(AlarmState::Disarmed);
        }
        let epoch = self
            .session()
            .resume(self.clock.now(), &self.config.settings);
        tracing::warn!(epoch, "alarm was armed before shutdown, resuming");
        self.start_monitoring().await;
        notify(
            &self.notifier,
            Notification::new("Alarm re-armed", "Automatic resume after restart")
                .priority(Priority::High)
                .tag("recycle"),
        )
        .await;
        self.publish(EventKind::AlarmArmed, "automatic resume").await;
        Ok(self.state())
    }

    /// Subscribe to keypad and opening events.
    ///
    /// Keypad presses go through an ordered subscription: a code typed
    /// faster than the handlers run must still reach the buffer digit by
    /// digit, followed by its command.
    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) -> Vec<SubscriptionId> {
        vec![
            bus.subscribe_ordered(EventKind::Keypad, self.handler()),
            bus.subscribe(EventKind::OpeningChanged, self.handler()),
        ]
    }

    fn handler(self: &Arc<Self>) -> Arc<dyn EventHandler> {
        let this = Arc::clone(self);
        handler_fn("alarm", move |event: Arc<Event>| {
            let this = Arc::clone(&this);
            async move {
                this.handle_event(&event).await;
                Ok::<(), BurrowError>(())
            }
        })
    }

    /// Dispatch a bus event to the matching handler.
    pub async fn handle_event(self: &Arc<Self>, event: &Event) {
        match &event.payload {
            EventPayload::Keypad { key } => self.handle_key(*key).await,
            EventPayload::Opening {
                state, front_door, ..
            } if state.is_open() => {
                let opening = event
                    .subject
                    .clone()
                    .unwrap_or_else(|| ResourceId::new("unknown"));
                self.handle_opening(&opening, *front_door);
            }
            _ => {}
        }
    }

    /// Handle one keypad key.
    pub async fn handle_key(&self, key: KeypadKey) {
        match key {
            KeypadKey::Digit(digit) => self.handle_digit(digit),
            KeypadKey::Command(command) => {
                self.handle_command(command).await;
            }
        }
    }

    /// Append a digit to the keypad buffer.
    pub fn handle_digit(&self, digit: u8) {
        let now = self.clock.now();
        self.session()
            .press_digit(digit, now, &self.config.code, &self.config.settings);
    }

    /// Evaluate the typed code for an `ON`/`OFF` press and act on it.
    pub async fn handle_command(&self, command: KeypadCommand) -> KeypadOutcome {
        let _transition = self.transitions.lock().await;
        let now = self.clock.now();
        let outcome =
            self.session()
                .submit(command, now, &self.config.code, &self.config.settings);

        match outcome {
            KeypadOutcome::Ignored => {
                tracing::debug!(%command, "keypad command without code, ignoring");
            }
            KeypadOutcome::LockedOut => {
                tracing::warn!(%command, "keypad locked out, attempt rejected");
                let wait = self.config.settings.idle_timeout.as_secs();
                notify(
                    &self.notifier,
                    Notification::new(
                        "Keypad locked",
                        format!("Too many wrong codes, wait {wait} seconds"),
                    )
                    .priority(Priority::High)
                    .tag("no_entry"),
                )
                .await;
            }
            KeypadOutcome::Rejected { remaining } => {
                tracing::warn!(%command, remaining, "wrong alarm code");
                notify(
                    &self.notifier,
                    Notification::new(
                        "Wrong alarm code",
                        format!("{remaining} attempt(s) left"),
                    )
                    .priority(Priority::High)
                    .tag("warning"),
                )
                .await;
            }
            KeypadOutcome::AlreadyInState { armed } => {
                let state = if armed { "armed" } else { "disarmed" };
                tracing::info!(state, "alarm already in requested state");
                notify(
                    &self.notifier,
                    Notification::new(format!("Alarm already {state}"), "Nothing changed")
                        .tag("information_source"),
                )
                .await;
            }
            KeypadOutcome::Armed { epoch } => {
                tracing::info!(epoch, "alarm armed");
                self.persist(true).await;
                self.start_monitoring().await;
                notify(
                    &self.notifier,
                    Notification::new("Alarm armed", "Code entered on keypad")
                        .tag("green_circle")
                        .tag("lock"),
                )
                .await;
                self.publish(EventKind::AlarmArmed, "keypad").await;
            }
            KeypadOutcome::Disarmed => {
                tracing::info!("alarm disarmed");
                self.persist(false).await;
                self.stop_monitoring().await;
                notify(
                    &self.notifier,
                    Notification::new("Alarm disarmed", "Code entered on keypad")
                        .tag("red_circle")
                        .tag("unlock"),
                )
                .await;
                self.publish(EventKind::AlarmDisarmed, "keypad").await;
            }
        }
        outcome
    }

    /// React to a door or window opening.
    ///
    /// Triggering and the front-door delay run as background tasks.
    pub fn handle_opening(self: &Arc<Self>, opening: &ResourceId, front_door: bool) -> OpeningOutcome {
        let now = self.clock.now();
        let outcome = self
            .session()
            .opening(now, front_door, &self.config.settings);

        match outcome {
            OpeningOutcome::Disarmed => {
                tracing::debug!(%opening, "opening while disarmed, ignoring");
            }
            OpeningOutcome::InGrace => {
                tracing::debug!(%opening, "opening shortly after arming, ignoring");
            }
            OpeningOutcome::AlreadyTriggered => {
                tracing::debug!(%opening, "opening while already triggered");
            }
            OpeningOutcome::Trigger { epoch } => {
                tracing::warn!(%opening, epoch, "opening detected while armed, triggering");
                let this = Arc::clone(self);
                let reason = format!("Sensor {opening} opened");
                tokio::spawn(async move { this.run_trigger(epoch, reason).await });
            }
            OpeningOutcome::FrontDoor { epoch } => {
                tracing::info!(%opening, epoch, "front door opened while armed, waiting for code");
                let this = Arc::clone(self);
                let opening = opening.clone();
                tokio::spawn(async move { this.front_door_grace(epoch, opening).await });
            }
        }
        outcome
    }

    /// Send the entry burst, wait the grace delay, then trigger unless the
    /// alarm was disarmed or re-armed meanwhile.
    async fn front_door_grace(&self, epoch: u64, opening: ResourceId) {
        let opened_at = self.clock.now();
        let settings = self.config.settings;

        match &self.config.front_door_camera {
            Some(camera) => {
                let mut priority = Priority::Default;
                for _ in 0..settings.front_door_burst {
                    self.send_capture(camera, "Someone came in", priority, "detective")
                        .await;
                    priority = Priority::Min;
                }
            }
            None => {
                notify(
                    &self.notifier,
                    Notification::new("Front door opened", "Waiting for the alarm code")
                        .tag("detective"),
                )
                .await;
            }
        }

        let spent = elapsed(opened_at, self.clock.now());
        self.clock
            .sleep(settings.front_door_grace.saturating_sub(spent))
            .await;

        if self.session().confirm_trigger(epoch) {
            tracing::warn!(%opening, "alarm not disarmed during grace delay, triggering");
            self.run_trigger(epoch, format!("Front door {opening} opened"))
                .await;
        } else {
            tracing::info!(%opening, "alarm disarmed or re-armed during grace delay");
        }
    }

    /// Notify and capture every camera in rounds of decreasing priority
    /// until the alarm is disarmed or re-armed.
    ///
    /// Without cameras the headline notification stands in for the first
    /// round, so text reminders start one priority lower.
    async fn run_trigger(&self, epoch: u64, reason: String) {
        self.publish(EventKind::AlarmTriggered, &reason).await;
        notify(
            &self.notifier,
            Notification::new("Alarm triggered", reason.as_str())
                .priority(Priority::Max)
                .tag("rotating_light"),
        )
        .await;

        let mut priority = Priority::Max;
        let mut round = 0u32;
        while self.session().is_current(epoch) {
            round += 1;
            tracing::debug!(epoch, round, %priority, "alarm trigger round");
            if self.config.cameras.is_empty() && round > 1 {
                notify(
                    &self.notifier,
                    Notification::new("Alarm triggered", reason.as_str())
                        .priority(priority)
                        .tag("rotating_light"),
                )
                .await;
            }
            for camera in &self.config.cameras {
                self.send_capture(camera, "Alarm triggered", priority, "rotating_light")
                    .await;
            }
            priority = priority.lower();
            self.clock.sleep(self.config.settings.trigger_interval).await;
        }
        tracing::info!(epoch, rounds = round, "alarm trigger loop stopped");
    }

    async fn send_capture(&self, camera: &ResourceId, message: &str, priority: Priority, tag: &str) {
        let notification = Notification::new(format!("Camera {camera}"), message)
            .priority(priority)
            .tag(tag)
            .tag("video_camera");
        let notification = match self.cameras.capture(camera).await {
            Ok(snapshot) => notification.attach(snapshot.into_attachment()),
            Err(err) => {
                tracing::warn!(%err, %camera, "camera capture failed");
                Notification {
                    message: format!("{message} (capture failed: {err})"),
                    ..notification
                }
            }
        };
        notify(&self.notifier, notification).await;
    }

    async fn persist(&self, armed: bool) {
        if let Err(err) = put(&self.store, ARMED_KEY, &armed).await {
            tracing::error!(%err, armed, "failed to persist alarm state");
        }
    }

    async fn start_monitoring(&self) {
        for camera in &self.config.cameras {
            if let Err(err) = self.cameras.start_monitoring(camera).await {
                tracing::warn!(%err, %camera, "failed to start camera monitoring");
            }
        }
    }

    async fn stop_monitoring(&self) {
        for camera in &self.config.cameras {
            if let Err(err) = self.cameras.stop_monitoring(camera).await {
                tracing::warn!(%err, %camera, "failed to stop camera monitoring");
            }
        }
    }

    async fn publish(&self, kind: EventKind, reason: &str) {
        let event = Event::new(
            kind,
            None,
            EventPayload::Alarm {
                reason: reason.to_string(),
            },
        );
        if let Err(err) = self.publisher.publish(event).await {
            tracing::warn!(%err, %kind, "failed to publish alarm event");
        }
    }
}
