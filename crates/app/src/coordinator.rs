//! Command-token coordinator: per-resource supersession of device commands.
//!
//! Every resource has an epoch counter. Issuing a command advances the
//! epoch; the running command re-checks it before each externally visible
//! step and before resuming from every wait slice, and stops as soon as a
//! newer command has been issued for the same resource. The epoch lock is
//! held for the increment or the comparison only, never across a device
//! call or a sleep.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use burrow_domain::error::{BurrowError, DeviceError};
use burrow_domain::id::ResourceId;
use burrow_domain::instruction::Instruction;

use crate::ports::notification::notify;
use crate::ports::{Clock, DeviceDriver, Notification, NotificationSink, Priority};

/// Longest uninterrupted sleep inside a [`Step::Wait`].
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One step of a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Send an instruction to the device driver.
    Apply(Instruction),
    /// Pause, interruptible by a newer command.
    Wait(Duration),
}

/// Labelled sequence of steps executed for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    label: String,
    steps: Vec<Step>,
}

impl Command {
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            steps: Vec::new(),
        }
    }

    /// A command made of a single instruction.
    #[must_use]
    pub fn single(label: impl Into<String>, instruction: Instruction) -> Self {
        Self::new(label).then_apply(instruction)
    }

    #[must_use]
    pub fn then_apply(mut self, instruction: Instruction) -> Self {
        self.steps.push(Step::Apply(instruction));
        self
    }

    #[must_use]
    pub fn then_wait(mut self, duration: Duration) -> Self {
        self.steps.push(Step::Wait(duration));
        self
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// How a command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Every step ran.
    Completed,
    /// A newer command took over after `executed_steps` steps.
    Superseded { executed_steps: usize },
}

/// A command running in the background.
#[derive(Debug)]
pub struct CommandHandle {
    resource: ResourceId,
    epoch: u64,
    task: JoinHandle<Result<CommandOutcome, BurrowError>>,
}

impl CommandHandle {
    pub(crate) fn new(
        resource: ResourceId,
        epoch: u64,
        task: JoinHandle<Result<CommandOutcome, BurrowError>>,
    ) -> Self {
        Self {
            resource,
            epoch,
            task,
        }
    }

    #[must_use]
    pub fn resource(&self) -> &ResourceId {
        &self.resource
    }

    /// Epoch the command was issued under.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Wait for the command to finish.
    ///
    /// # Errors
    ///
    /// Returns the device error that stopped the command, or
    /// [`BurrowError::Task`] if the task was cancelled by runtime shutdown.
    pub async fn outcome(self) -> Result<CommandOutcome, BurrowError> {
        match self.task.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => Err(BurrowError::Task(Box::new(err))),
        }
    }
}

/// Serialises commands per resource through epoch tokens.
pub struct CommandCoordinator<D, N, C> {
    driver: D,
    notifier: N,
    clock: C,
    epochs: Mutex<HashMap<ResourceId, Arc<Mutex<u64>>>>,
}

impl<D, N, C> CommandCoordinator<D, N, C>
where
    D: DeviceDriver + Send + Sync + 'static,
    N: NotificationSink + Send + Sync + 'static,
    C: Clock + Send + Sync + 'static,
{
    pub fn new(driver: D, notifier: N, clock: C) -> Self {
        Self {
            driver,
            notifier,
            clock,
            epochs: Mutex::new(HashMap::new()),
        }
    }

    /// Epoch cell of `resource`, created on first use.
    fn cell(&self, resource: &ResourceId) -> Arc<Mutex<u64>> {
        let mut epochs = self.epochs.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(epochs.entry(resource.clone()).or_default())
    }

    fn advance(&self, resource: &ResourceId) -> u64 {
        let cell = self.cell(resource);
        let mut epoch = cell.lock().unwrap_or_else(PoisonError::into_inner);
        *epoch += 1;
        *epoch
    }

    /// Current epoch of `resource`; zero if nothing was ever issued.
    #[must_use]
    pub fn current_epoch(&self, resource: &ResourceId) -> u64 {
        let cell = self.cell(resource);
        *cell.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, resource: &ResourceId, epoch: u64) -> bool {
        self.current_epoch(resource) == epoch
    }

    /// Supersede whatever runs on `resource` and start `command` in the
    /// background.
    ///
    /// The epoch is advanced before this returns, so a command issued
    /// afterwards always wins.
    pub fn issue(self: &Arc<Self>, resource: ResourceId, command: Command) -> CommandHandle {
        let epoch = self.advance(&resource);
        tracing::debug!(%resource, epoch, command = %command, "issuing command");
        let this = Arc::clone(self);
        let task_resource = resource.clone();
        let task =
            tokio::spawn(async move { this.run(&task_resource, epoch, &command).await });
        CommandHandle::new(resource, epoch, task)
    }

    /// Supersede whatever runs on `resource` and run `command` inline.
    ///
    /// # Errors
    ///
    /// Returns [`BurrowError::Device`] if the driver fails; remaining steps
    /// are skipped.
    pub async fn execute(
        &self,
        resource: &ResourceId,
        command: &Command,
    ) -> Result<CommandOutcome, BurrowError> {
        let epoch = self.advance(resource);
        tracing::debug!(%resource, epoch, %command, "executing command");
        self.run(resource, epoch, command).await
    }

    /// Supersede whatever runs on `resource` without starting anything.
    pub fn cancel(&self, resource: &ResourceId) {
        let epoch = self.advance(resource);
        tracing::debug!(%resource, epoch, "cancelled running command");
    }

    /// Run `command` under `epoch`, stopping once superseded.
    async fn run(
        &self,
        resource: &ResourceId,
        epoch: u64,
        command: &Command,
    ) -> Result<CommandOutcome, BurrowError> {
        for (index, step) in command.steps().iter().enumerate() {
            if !self.is_current(resource, epoch) {
                return Ok(superseded(resource, epoch, command, index));
            }
            match step {
                Step::Apply(instruction) => {
                    if let Err(err) = self.driver.apply(resource, instruction).await {
                        self.report_failure(resource, command, instruction, &err).await;
                        return Err(err.into());
                    }
                }
                Step::Wait(duration) => {
                    if !self.wait(resource, epoch, *duration).await {
                        return Ok(superseded(resource, epoch, command, index));
                    }
                }
            }
        }
        tracing::debug!(%resource, epoch, %command, "command completed");
        Ok(CommandOutcome::Completed)
    }

    /// Sleep for `duration` in slices of at most [`POLL_INTERVAL`].
    /// Returns `false` as soon as `epoch` is stale.
    async fn wait(&self, resource: &ResourceId, epoch: u64, duration: Duration) -> bool {
        let mut remaining = duration;
        while !remaining.is_zero() {
            let slice = remaining.min(POLL_INTERVAL);
            self.clock.sleep(slice).await;
            remaining -= slice;
            if !self.is_current(resource, epoch) {
                return false;
            }
        }
        true
    }

    async fn report_failure(
        &self,
        resource: &ResourceId,
        command: &Command,
        instruction: &Instruction,
        err: &DeviceError,
    ) {
        tracing::warn!(%err, %resource, %command, %instruction, "device command failed");
        let title = if err.is_transient() {
            "Device unreachable"
        } else {
            "Device error"
        };
        let notification = Notification::new(title, format!("{command} on {resource}: {err}"))
            .priority(Priority::High)
            .tag("warning");
        notify(&self.notifier, notification).await;
    }
}

fn superseded(
    resource: &ResourceId,
    epoch: u64,
    command: &Command,
    executed_steps: usize,
) -> CommandOutcome {
    tracing::debug!(%resource, epoch, %command, executed_steps, "command superseded");
    CommandOutcome::Superseded { executed_steps }
}
