//! Shutter automation: keeps shutters at the preset matching the current
//! day phase, season and outdoor temperature.
//!
//! Reacts to condition changes, window contacts and sleep/wake-up events.
//! An open window fitted with a shutter forces that shutter fully open,
//! whatever the presets say. Rooms whose occupants sleep are left alone
//! unless an adjustment explicitly overrides sleep.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use burrow_domain::environment::{Conditions, SensorLocation};
use burrow_domain::error::BurrowError;
use burrow_domain::event::{Event, EventKind, EventPayload};
use burrow_domain::id::{ResourceId, SubscriptionId};
use burrow_domain::opening::OpenState;
use burrow_domain::shutter::ShutterPosition;

use crate::coordinator::CommandHandle;
use crate::event_bus::{EventBus, handler_fn};
use crate::ports::{Clock, DeviceDriver, NotificationSink};
use crate::shutters::{Shutter, ShutterController};

/// Which shutters an adjustment applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdjustScope {
    pub room: Option<String>,
    pub shutter: Option<ResourceId>,
    /// Also move shutters of sleeping rooms.
    pub override_sleep: bool,
}

impl AdjustScope {
    /// Every shutter of every awake room.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn room(room: impl Into<String>) -> Self {
        Self {
            room: Some(room.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn shutter(id: ResourceId) -> Self {
        Self {
            shutter: Some(id),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn override_sleep(mut self) -> Self {
        self.override_sleep = true;
        self
    }

    fn includes(&self, shutter: &Shutter) -> bool {
        self.shutter.as_ref().is_none_or(|id| *id == shutter.id)
            && self.room.as_deref().is_none_or(|room| shutter.is_in(room))
    }
}

struct AutomationState {
    conditions: Conditions,
    windows: HashMap<ResourceId, OpenState>,
    sleeping: HashSet<String>,
}

impl AutomationState {
    fn window_open(&self, shutter: &ResourceId) -> bool {
        self.windows.get(shutter).is_some_and(|s| s.is_open())
    }

    fn asleep(&self, shutter: &Shutter) -> bool {
        shutter
            .room
            .as_deref()
            .is_some_and(|room| self.sleeping.contains(room))
    }
}

/// Reaction handler driving shutters from environment conditions.
pub struct ShutterAutomation<D, N, C> {
    controller: Arc<ShutterController<D, N, C>>,
    state: Mutex<AutomationState>,
}

impl<D, N, C> ShutterAutomation<D, N, C>
where
    D: DeviceDriver + Send + Sync + 'static,
    N: NotificationSink + Send + Sync + 'static,
    C: Clock + Send + Sync + 'static,
{
    pub fn new(controller: Arc<ShutterController<D, N, C>>, initial: Conditions) -> Self {
        Self {
            controller,
            state: Mutex::new(AutomationState {
                conditions: initial,
                windows: HashMap::new(),
                sleeping: HashSet::new(),
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, AutomationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Conditions the automation currently resolves presets against.
    #[must_use]
    pub fn conditions(&self) -> Conditions {
        self.state().conditions
    }

    /// Whether the occupants of `room` are asleep.
    #[must_use]
    pub fn is_sleeping(&self, room: &str) -> bool {
        self.state().sleeping.contains(&room.to_lowercase())
    }

    /// Subscribe to every event kind the automation reacts to.
    pub fn subscribe(self: &Arc<Self>, bus: &EventBus) -> Vec<SubscriptionId> {
        [
            EventKind::DayPhaseChanged,
            EventKind::TemperatureChanged,
            EventKind::OpeningChanged,
            EventKind::Sleep,
            EventKind::WakeUp,
        ]
        .into_iter()
        .map(|kind| {
            let this = Arc::clone(self);
            bus.subscribe(
                kind,
                handler_fn("shutter_automation", move |event: Arc<Event>| {
                    let this = Arc::clone(&this);
                    async move {
                        this.handle_event(&event);
                        Ok::<(), BurrowError>(())
                    }
                }),
            )
        })
        .collect()
    }

    /// Update state from `event` and move the affected shutters.
    pub fn handle_event(&self, event: &Event) -> Vec<CommandHandle> {
        match (&event.kind, &event.payload) {
            (EventKind::DayPhaseChanged, EventPayload::DayPhase { phase, season }) => {
                {
                    let mut state = self.state();
                    state.conditions.day_phase = *phase;
                    state.conditions.season = *season;
                }
                tracing::info!(%phase, %season, "readjusting shutters for day phase");
                self.adjust(&AdjustScope::all())
            }
            (
                EventKind::TemperatureChanged,
                EventPayload::TemperatureBand {
                    band,
                    location: SensorLocation::Outside,
                    ..
                },
            ) => {
                self.state().conditions.temperature = *band;
                tracing::info!(%band, "readjusting shutters for outdoor temperature");
                self.adjust(&AdjustScope::all())
            }
            (
                EventKind::OpeningChanged,
                EventPayload::Opening {
                    state,
                    shutter: Some(shutter),
                    ..
                },
            ) => {
                self.state().windows.insert(shutter.clone(), *state);
                tracing::info!(%shutter, %state, "readjusting shutter for window");
                self.adjust(&AdjustScope::shutter(shutter.clone()))
            }
            (EventKind::Sleep, _) => match event.room.as_deref() {
                Some(room) => self.go_to_sleep(room),
                None => Vec::new(),
            },
            (EventKind::WakeUp, _) => match event.room.as_deref() {
                Some(room) => self.wake_up(room),
                None => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    /// Move every shutter in `scope` to its resolved preset.
    ///
    /// Shutters with an open window go fully open. Shutters without a
    /// matching preset are left alone.
    pub fn adjust(&self, scope: &AdjustScope) -> Vec<CommandHandle> {
        let targets: Vec<(ResourceId, ShutterPosition)> = {
            let state = self.state();
            self.controller
                .shutters()
                .filter(|shutter| scope.includes(shutter))
                .filter(|shutter| {
                    let skip = !scope.override_sleep && state.asleep(shutter);
                    if skip {
                        tracing::debug!(shutter = %shutter.id, "room asleep, not moving shutter");
                    }
                    !skip
                })
                .filter_map(|shutter| {
                    let position = if state.window_open(&shutter.id) {
                        Some(ShutterPosition::Open)
                    } else {
                        shutter
                            .presets
                            .resolve(&state.conditions)
                            .map(|preset| preset.position)
                    };
                    if position.is_none() {
                        tracing::debug!(shutter = %shutter.id, conditions = %state.conditions, "no preset matches");
                    }
                    position.map(|p| (shutter.id.clone(), p))
                })
                .collect()
        };
        self.operate_all(targets)
    }

    /// Mark `room` asleep and close its shutters, except over open windows.
    fn go_to_sleep(&self, room: &str) -> Vec<CommandHandle> {
        let targets: Vec<(ResourceId, ShutterPosition)> = {
            let mut state = self.state();
            state.sleeping.insert(room.to_lowercase());
            self.controller
                .shutters()
                .filter(|shutter| shutter.is_in(room) && !state.window_open(&shutter.id))
                .map(|shutter| (shutter.id.clone(), ShutterPosition::Closed))
                .collect()
        };
        tracing::info!(room, "room asleep");
        self.operate_all(targets)
    }

    fn wake_up(&self, room: &str) -> Vec<CommandHandle> {
        if !self.state().sleeping.remove(&room.to_lowercase()) {
            tracing::info!(room, "ignoring wake-up of a room that was not asleep");
            return Vec::new();
        }
        tracing::info!(room, "room awake");
        self.adjust(&AdjustScope::room(room))
    }

    fn operate_all(&self, targets: Vec<(ResourceId, ShutterPosition)>) -> Vec<CommandHandle> {
        targets
            .into_iter()
            .filter_map(|(id, position)| match self.controller.operate(&id, position, false) {
                Ok(handle) => Some(handle),
                Err(err) => {
                    tracing::warn!(%err, shutter = %id, "cannot operate shutter");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;

    use burrow_domain::environment::{DayPhase, Season, TemperatureBand};
    use burrow_domain::error::DeviceError;
    use burrow_domain::instruction::Instruction;
    use burrow_domain::preset::{PresetRuleSet, ShutterPreset};

    use crate::coordinator::CommandCoordinator;
    use crate::ports::{Notification, TokioClock};

    // ── Fakes ──────────────────────────────────────────────────────

    #[derive(Default)]
    struct SpyDriver {
        applied: Mutex<Vec<(ResourceId, Instruction)>>,
    }

    impl DeviceDriver for SpyDriver {
        fn apply(
            &self,
            resource: &ResourceId,
            instruction: &Instruction,
        ) -> impl Future<Output = Result<(), DeviceError>> + Send {
            self.applied
                .lock()
                .unwrap()
                .push((resource.clone(), instruction.clone()));
            async { Ok(()) }
        }
    }

    struct NullSink;

    impl NotificationSink for NullSink {
        fn send(
            &self,
            _notification: Notification,
        ) -> impl Future<Output = Result<(), BurrowError>> + Send {
            async { Ok(()) }
        }
    }

    // ── Helpers ────────────────────────────────────────────────────

    type TestAutomation = ShutterAutomation<Arc<SpyDriver>, NullSink, TokioClock>;

    fn half(p: u8) -> ShutterPosition {
        ShutterPosition::Half(Some(p))
    }

    fn living_presets(name: &str) -> PresetRuleSet {
        PresetRuleSet::new(
            ResourceId::new(name),
            vec![
                ShutterPreset::fallback(half(40))
                    .when_season(Season::Summer)
                    .when_temperature(TemperatureBand::Hot),
                ShutterPreset::fallback(ShutterPosition::Closed).when_day_phase(DayPhase::Night),
                ShutterPreset::fallback(ShutterPosition::Open),
            ],
        )
        .unwrap()
    }

    fn make_automation() -> (Arc<TestAutomation>, Arc<SpyDriver>) {
        let driver = Arc::new(SpyDriver::default());
        let coordinator = Arc::new(CommandCoordinator::new(
            Arc::clone(&driver),
            NullSink,
            TokioClock::new(),
        ));
        let shutters = vec![
            Shutter::new(living_presets("living")).in_room("living"),
            Shutter::new(living_presets("bedroom")).in_room("bedroom"),
        ];
        let controller = Arc::new(ShutterController::new(coordinator, shutters));
        let initial = Conditions {
            day_phase: DayPhase::Afternoon,
            season: Season::Winter,
            temperature: TemperatureBand::Normal,
        };
        (Arc::new(ShutterAutomation::new(controller, initial)), driver)
    }

    async fn settle(handles: Vec<CommandHandle>) {
        for handle in handles {
            handle.outcome().await.unwrap();
        }
    }

    fn moved(driver: &SpyDriver) -> Vec<(String, ShutterPosition)> {
        driver
            .applied
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(id, i)| match i {
                Instruction::MoveShutter { position } => Some((id.to_string(), *position)),
                _ => None,
            })
            .collect()
    }

    fn outdoor(band: TemperatureBand) -> Event {
        Event::new(
            EventKind::TemperatureChanged,
            Some(ResourceId::new("garden")),
            EventPayload::TemperatureBand {
                band,
                celsius: 31.0,
                location: SensorLocation::Outside,
            },
        )
    }

    // ── Tests ──────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn should_move_to_resolved_preset_when_summer_turns_hot() {
        let (automation, driver) = make_automation();

        settle(automation.handle_event(&Event::day_phase(DayPhase::Afternoon, Season::Summer))).await;
        settle(automation.handle_event(&outdoor(TemperatureBand::Hot))).await;

        let moves = moved(&driver);
        assert_eq!(moves.len(), 4);
        assert_eq!(
            &moves[2..],
            &[
                ("bedroom".to_string(), half(40)),
                ("living".to_string(), half(40))
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_ignore_indoor_temperature_changes() {
        let (automation, driver) = make_automation();
        let indoor = Event::new(
            EventKind::TemperatureChanged,
            None,
            EventPayload::TemperatureBand {
                band: TemperatureBand::Hot,
                celsius: 27.0,
                location: SensorLocation::Inside,
            },
        );

        assert!(automation.handle_event(&indoor).is_empty());
        assert!(moved(&driver).is_empty());
        assert_eq!(automation.conditions().temperature, TemperatureBand::Normal);
    }

    #[tokio::test(start_paused = true)]
    async fn should_force_open_when_window_open_regardless_of_preset() {
        let (automation, driver) = make_automation();
        let living = ResourceId::new("living");
        settle(automation.handle_event(&Event::day_phase(DayPhase::Night, Season::Winter))).await;

        settle(automation.handle_event(&Event::opening(
            ResourceId::new("living_window"),
            OpenState::Open,
            Some(living.clone()),
            false,
        )))
        .await;
        settle(automation.adjust(&AdjustScope::all())).await;

        let living_moves: Vec<_> = moved(&driver)
            .into_iter()
            .filter(|(id, _)| id == "living")
            .map(|(_, p)| p)
            .collect();
        assert_eq!(
            living_moves,
            vec![
                ShutterPosition::Closed,
                ShutterPosition::Open,
                ShutterPosition::Open
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_return_to_preset_when_window_closes() {
        let (automation, driver) = make_automation();
        let living = ResourceId::new("living");
        settle(automation.handle_event(&Event::day_phase(DayPhase::Night, Season::Winter))).await;
        settle(automation.handle_event(&Event::opening(
            ResourceId::new("living_window"),
            OpenState::Open,
            Some(living.clone()),
            false,
        )))
        .await;
        settle(automation.handle_event(&Event::opening(
            ResourceId::new("living_window"),
            OpenState::Closed,
            Some(living),
            false,
        )))
        .await;

        assert_eq!(
            moved(&driver).last(),
            Some(&("living".to_string(), ShutterPosition::Closed))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_skip_sleeping_rooms_unless_overridden() {
        let (automation, driver) = make_automation();
        let sleep = Event::sleep("Bedroom");
        settle(automation.handle_event(&sleep)).await;
        assert!(automation.is_sleeping("bedroom"));
        assert_eq!(
            moved(&driver),
            vec![("bedroom".to_string(), ShutterPosition::Closed)]
        );

        settle(automation.adjust(&AdjustScope::all())).await;
        assert_eq!(
            moved(&driver).last(),
            Some(&("living".to_string(), ShutterPosition::Open))
        );
        assert_eq!(moved(&driver).len(), 2);

        settle(automation.adjust(&AdjustScope::room("bedroom").override_sleep())).await;
        assert_eq!(
            moved(&driver).last(),
            Some(&("bedroom".to_string(), ShutterPosition::Open))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_readjust_room_on_wake_up() {
        let (automation, driver) = make_automation();
        let sleep = Event::sleep("bedroom");
        let wake = Event::wake_up("bedroom");
        settle(automation.handle_event(&sleep)).await;

        settle(automation.handle_event(&wake)).await;

        assert!(!automation.is_sleeping("bedroom"));
        assert_eq!(
            moved(&driver),
            vec![
                ("bedroom".to_string(), ShutterPosition::Closed),
                ("bedroom".to_string(), ShutterPosition::Open)
            ]
        );
        assert!(automation.handle_event(&wake).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_react_to_events_published_on_bus() {
        let (automation, driver) = make_automation();
        let bus = EventBus::new();
        let ids = automation.subscribe(&bus);
        assert_eq!(ids.len(), 5);

        bus.publish(Event::day_phase(DayPhase::Night, Season::Winter))
            .settled()
            .await;
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;

        assert_eq!(moved(&driver).len(), 2);
        assert_eq!(automation.conditions().day_phase, DayPhase::Night);
    }
}
