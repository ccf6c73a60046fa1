//! Shutter controller: turns target positions into coordinated commands.
//!
//! Some shutters jam askew when driven down from (nearly) fully open. Those
//! are flagged `defective` and get a slower procedure: open fully, then
//! jiggle open/closed a few times before heading to the target. The whole
//! procedure is one [`Command`], so any newer order for the same shutter
//! interrupts it.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use burrow_domain::error::{BurrowError, NotFoundError};
use burrow_domain::id::ResourceId;
use burrow_domain::instruction::Instruction;
use burrow_domain::preset::PresetRuleSet;
use burrow_domain::shutter::ShutterPosition;

use crate::coordinator::{Command, CommandCoordinator, CommandHandle, CommandOutcome};
use crate::ports::{Clock, DeviceDriver, NotificationSink};

/// Open/close rounds of the defective-shutter procedure.
pub const JIGGLE_ROUNDS: usize = 8;
/// How long each jiggle moves up.
pub const JIGGLE_OPEN: Duration = Duration::from_millis(1500);
/// How long each jiggle moves down.
pub const JIGGLE_CLOSE: Duration = Duration::from_secs(2);
/// Closing percentage below which a defective shutter may jam.
pub const SAFE_PERCENT: u8 = 30;

/// A motorised shutter and its automation rules.
#[derive(Debug, Clone)]
pub struct Shutter {
    pub id: ResourceId,
    /// Occupant zone, used to skip sleeping rooms.
    pub room: Option<String>,
    pub presets: PresetRuleSet,
    /// Closing percentage used for `ShutterPosition::Half(None)`.
    pub halfway: u8,
    /// Time to travel from fully closed to fully open.
    pub travel_time: Duration,
    pub defective: bool,
}

impl Shutter {
    /// A regular shutter with default halfway height and travel time.
    #[must_use]
    pub fn new(presets: PresetRuleSet) -> Self {
        Self {
            id: presets.resource().clone(),
            room: None,
            presets,
            halfway: 50,
            travel_time: Duration::from_secs(30),
            defective: false,
        }
    }

    #[must_use]
    pub fn in_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into().to_lowercase());
        self
    }

    #[must_use]
    pub fn defective(mut self) -> Self {
        self.defective = true;
        self
    }

    /// Whether the shutter belongs to `room` (case-insensitive).
    #[must_use]
    pub fn is_in(&self, room: &str) -> bool {
        self.room
            .as_deref()
            .is_some_and(|own| own.eq_ignore_ascii_case(room))
    }

    /// Build the command moving this shutter to `position`.
    ///
    /// `current` is the last known closing percentage. `direct` orders come
    /// from a person at the wall switch and never use the slow procedure.
    #[must_use]
    pub fn plan(&self, position: ShutterPosition, current: Option<u8>, direct: bool) -> Command {
        let target = position.percent(self.halfway);
        let position = match position {
            ShutterPosition::Half(None) => ShutterPosition::Half(Some(target)),
            other => other,
        };
        let label = format!("{} {position}", self.id);
        let final_move = Instruction::MoveShutter { position };

        let may_jam = target > 0 && current.is_none_or(|c| c < SAFE_PERCENT && c < target);
        if !self.defective || direct || !may_jam {
            return Command::single(label, final_move);
        }

        let open = Instruction::MoveShutter {
            position: ShutterPosition::Open,
        };
        let close = Instruction::MoveShutter {
            position: ShutterPosition::Closed,
        };
        let mut command = Command::new(format!("{label} (defective procedure)"))
            .then_apply(open.clone())
            .then_wait(self.travel_time);
        for _ in 0..JIGGLE_ROUNDS {
            command = command
                .then_apply(open.clone())
                .then_wait(JIGGLE_OPEN)
                .then_apply(close.clone())
                .then_wait(JIGGLE_CLOSE);
        }
        command.then_apply(final_move)
    }
}

/// Moves shutters through the command coordinator and tracks their
/// last known position.
pub struct ShutterController<D, N, C> {
    coordinator: Arc<CommandCoordinator<D, N, C>>,
    shutters: BTreeMap<ResourceId, Shutter>,
    positions: Arc<Mutex<HashMap<ResourceId, u8>>>,
}

impl<D, N, C> ShutterController<D, N, C>
where
    D: DeviceDriver + Send + Sync + 'static,
    N: NotificationSink + Send + Sync + 'static,
    C: Clock + Send + Sync + 'static,
{
    pub fn new(coordinator: Arc<CommandCoordinator<D, N, C>>, shutters: Vec<Shutter>) -> Self {
        Self {
            coordinator,
            shutters: shutters.into_iter().map(|s| (s.id.clone(), s)).collect(),
            positions: Arc::default(),
        }
    }

    /// Configured shutters, ordered by id.
    pub fn shutters(&self) -> impl Iterator<Item = &Shutter> {
        self.shutters.values()
    }

    #[must_use]
    pub fn get(&self, id: &ResourceId) -> Option<&Shutter> {
        self.shutters.get(id)
    }

    /// Last known closing percentage; `None` while moving or unknown.
    #[must_use]
    pub fn position(&self, id: &ResourceId) -> Option<u8> {
        self.positions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .copied()
    }

    fn shutter(&self, id: &ResourceId) -> Result<&Shutter, NotFoundError> {
        self.shutters.get(id).ok_or_else(|| NotFoundError {
            entity: "Shutter",
            id: id.to_string(),
        })
    }

    /// Move a shutter, superseding whatever it was doing.
    ///
    /// # Errors
    ///
    /// Returns [`BurrowError::NotFound`] for an unknown shutter.
    pub fn operate(
        &self,
        id: &ResourceId,
        position: ShutterPosition,
        direct: bool,
    ) -> Result<CommandHandle, BurrowError> {
        let shutter = self.shutter(id)?;
        let current = self.forget(id);
        let target = position.percent(shutter.halfway);
        let command = shutter.plan(position, current, direct);
        tracing::info!(shutter = %id, %position, direct, "operating shutter");
        Ok(self.track(self.coordinator.issue(id.clone(), command), Some(target)))
    }

    /// Halt a shutter where it is.
    ///
    /// # Errors
    ///
    /// Returns [`BurrowError::NotFound`] for an unknown shutter.
    pub fn stop(&self, id: &ResourceId) -> Result<CommandHandle, BurrowError> {
        self.shutter(id)?;
        self.forget(id);
        let command = Command::single(format!("{id} stop"), Instruction::StopShutter);
        Ok(self.track(self.coordinator.issue(id.clone(), command), None))
    }

    fn forget(&self, id: &ResourceId) -> Option<u8> {
        self.positions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    /// Record `target` once the command completes, if it is still the
    /// latest one for the shutter.
    fn track(&self, inner: CommandHandle, target: Option<u8>) -> CommandHandle {
        let id = inner.resource().clone();
        let epoch = inner.epoch();
        let coordinator = Arc::clone(&self.coordinator);
        let positions = Arc::clone(&self.positions);
        let task_id = id.clone();
        let task = tokio::spawn(async move {
            let outcome = inner.outcome().await;
            if let (Ok(CommandOutcome::Completed), Some(target)) = (&outcome, target)
                && coordinator.current_epoch(&task_id) == epoch
            {
                positions
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(task_id, target);
            }
            outcome
        });
        CommandHandle::new(id, epoch, task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;

    use burrow_domain::error::DeviceError;
    use burrow_domain::preset::ShutterPreset;

    use crate::coordinator::Step;
    use crate::ports::{Notification, TokioClock};

    // ── Fakes ──────────────────────────────────────────────────────

    #[derive(Default)]
    struct SpyDriver {
        applied: Mutex<Vec<Instruction>>,
    }

    impl DeviceDriver for SpyDriver {
        fn apply(
            &self,
            _resource: &ResourceId,
            instruction: &Instruction,
        ) -> impl Future<Output = Result<(), DeviceError>> + Send {
            self.applied.lock().unwrap().push(instruction.clone());
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

    fn shutter(name: &str) -> Shutter {
        let rules = PresetRuleSet::new(
            ResourceId::new(name),
            vec![ShutterPreset::fallback(ShutterPosition::Open)],
        )
        .unwrap();
        Shutter::new(rules)
    }

    fn moves(command: &Command) -> usize {
        command
            .steps()
            .iter()
            .filter(|s| matches!(s, Step::Apply(_)))
            .count()
    }

    fn make_controller(
        shutters: Vec<Shutter>,
    ) -> (
        ShutterController<Arc<SpyDriver>, NullSink, TokioClock>,
        Arc<SpyDriver>,
    ) {
        let driver = Arc::new(SpyDriver::default());
        let coordinator = Arc::new(CommandCoordinator::new(
            Arc::clone(&driver),
            NullSink,
            TokioClock::new(),
        ));
        (ShutterController::new(coordinator, shutters), driver)
    }

    // ── Tests ──────────────────────────────────────────────────────

    #[test]
    fn should_plan_single_move_for_regular_shutter() {
        let command = shutter("kitchen").plan(ShutterPosition::Closed, None, false);
        assert_eq!(
            command.steps(),
            &[Step::Apply(Instruction::MoveShutter {
                position: ShutterPosition::Closed
            })]
        );
    }

    #[test]
    fn should_resolve_halfway_height_in_plan() {
        let mut s = shutter("kitchen");
        s.halfway = 60;
        let command = s.plan(ShutterPosition::Half(None), None, false);
        assert_eq!(
            command.steps(),
            &[Step::Apply(Instruction::MoveShutter {
                position: ShutterPosition::Half(Some(60))
            })]
        );
    }

    #[test]
    fn should_plan_procedure_when_defective_shutter_goes_down_from_unknown() {
        let command = shutter("bedroom")
            .defective()
            .plan(ShutterPosition::Closed, None, false);
        assert_eq!(moves(&command), 2 + 2 * JIGGLE_ROUNDS);
        assert_eq!(command.steps().len(), 2 + 4 * JIGGLE_ROUNDS + 1);
        assert_eq!(
            command.steps().last(),
            Some(&Step::Apply(Instruction::MoveShutter {
                position: ShutterPosition::Closed
            }))
        );
    }

    #[test]
    fn should_skip_procedure_when_defective_shutter_already_low_enough() {
        let s = shutter("bedroom").defective();
        assert_eq!(moves(&s.plan(ShutterPosition::Closed, Some(40), false)), 1);
        assert_eq!(moves(&s.plan(ShutterPosition::Half(Some(20)), Some(25), false)), 1);
    }

    #[test]
    fn should_skip_procedure_for_direct_orders_and_opening() {
        let s = shutter("bedroom").defective();
        assert_eq!(moves(&s.plan(ShutterPosition::Closed, None, true)), 1);
        assert_eq!(moves(&s.plan(ShutterPosition::Open, None, false)), 1);
    }

    #[test]
    fn should_match_room_case_insensitively() {
        let s = shutter("bedroom").in_room("Parents");
        assert!(s.is_in("parents"));
        assert!(!s.is_in("kids"));
    }

    #[tokio::test(start_paused = true)]
    async fn should_record_position_when_move_completes() {
        let (controller, driver) = make_controller(vec![shutter("kitchen")]);
        let id = ResourceId::new("kitchen");

        let handle = controller
            .operate(&id, ShutterPosition::Half(Some(40)), false)
            .unwrap();
        assert_eq!(handle.outcome().await.unwrap(), CommandOutcome::Completed);

        assert_eq!(controller.position(&id), Some(40));
        assert_eq!(driver.applied.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_forget_position_when_stopped() {
        let (controller, driver) = make_controller(vec![shutter("kitchen")]);
        let id = ResourceId::new("kitchen");
        controller
            .operate(&id, ShutterPosition::Closed, false)
            .unwrap()
            .outcome()
            .await
            .unwrap();

        controller.stop(&id).unwrap().outcome().await.unwrap();

        assert_eq!(controller.position(&id), None);
        assert_eq!(
            driver.applied.lock().unwrap().last(),
            Some(&Instruction::StopShutter)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_interrupt_defective_procedure_when_new_order_arrives() {
        let (controller, driver) = make_controller(vec![shutter("bedroom").defective()]);
        let id = ResourceId::new("bedroom");

        let procedure = controller
            .operate(&id, ShutterPosition::Closed, false)
            .unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        let open = controller.operate(&id, ShutterPosition::Open, true).unwrap();

        assert!(matches!(
            procedure.outcome().await.unwrap(),
            CommandOutcome::Superseded { .. }
        ));
        open.outcome().await.unwrap();
        assert_eq!(
            *driver.applied.lock().unwrap(),
            vec![
                Instruction::MoveShutter {
                    position: ShutterPosition::Open
                },
                Instruction::MoveShutter {
                    position: ShutterPosition::Open
                },
            ]
        );
        assert_eq!(controller.position(&id), Some(0));
    }

    #[tokio::test]
    async fn should_reject_unknown_shutter() {
        let (controller, _) = make_controller(vec![]);
        let result = controller.operate(&ResourceId::new("ghost"), ShutterPosition::Open, false);
        assert!(matches!(result, Err(BurrowError::NotFound(_))));
    }
}
