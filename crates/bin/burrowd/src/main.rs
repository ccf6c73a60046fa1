//! # burrowd, the burrow daemon
//!
//! Composition root that wires all adapters together and runs the hub.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars) and validate it into domain settings
//! - Initialise structured logging
//! - Construct the virtual devices, the key-value store and the event bus
//! - Construct the command coordinator, shutter automation, monitors and alarm
//! - Feed stdin console commands in as sensor events
//! - Handle graceful shutdown (SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer. No domain logic belongs here.

mod config;
mod console;

use std::collections::HashSet;
use std::sync::Arc;

use burrow_adapter_storage_json::JsonFileStore;
use burrow_adapter_virtual::{TracingNotificationSink, VirtualCamera, VirtualDriver};
use burrow_app::alarm::AlarmSystem;
use burrow_app::coordinator::{Command, CommandCoordinator};
use burrow_app::daycycle_monitor::DaycycleMonitor;
use burrow_app::event_bus::EventBus;
use burrow_app::ports::TokioClock;
use burrow_app::shutter_automation::{AdjustScope, ShutterAutomation};
use burrow_app::shutters::ShutterController;
use burrow_app::temperature_monitor::TemperatureMonitor;
use burrow_domain::environment::{Conditions, TemperatureBand};
use burrow_domain::error::BurrowError;
use burrow_domain::id::ResourceId;
use burrow_domain::instruction::Instruction;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::console::{Console, Input};

type Driver = Arc<VirtualDriver<TokioClock>>;
type Coordinator = CommandCoordinator<Driver, TracingNotificationSink, TokioClock>;
type Controller = ShutterController<Driver, TracingNotificationSink, TokioClock>;
type Automation = ShutterAutomation<Driver, TracingNotificationSink, TokioClock>;
type Alarm =
    AlarmSystem<Arc<JsonFileStore>, TracingNotificationSink, VirtualCamera, Arc<EventBus>, TokioClock>;

/// Running services the console talks to.
struct Hub {
    bus: Arc<EventBus>,
    driver: Driver,
    coordinator: Arc<Coordinator>,
    controller: Arc<Controller>,
    automation: Arc<Automation>,
    alarm: Option<Arc<Alarm>>,
    lights: HashSet<ResourceId>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    let settings = config.settings()?;
    let clock = TokioClock::new();
    let bus = Arc::new(EventBus::new());

    // Devices
    let driver = settings
        .shutters
        .iter()
        .map(|s| s.id.clone())
        .fold(VirtualDriver::new(clock), VirtualDriver::with_shutter);
    let driver = Arc::new(
        settings
            .lights
            .iter()
            .cloned()
            .fold(driver, VirtualDriver::with_light),
    );
    let coordinator = Arc::new(CommandCoordinator::new(
        Arc::clone(&driver),
        TracingNotificationSink,
        clock,
    ));
    let controller = Arc::new(ShutterController::new(
        Arc::clone(&coordinator),
        settings.shutters,
    ));

    // Environment
    let daycycle = Arc::new(DaycycleMonitor::new(
        settings.almanac,
        Arc::clone(&bus),
        clock,
        settings.daycycle,
    ));
    let (day_phase, season) = daycycle.current()?;
    let automation = Arc::new(ShutterAutomation::new(
        Arc::clone(&controller),
        Conditions {
            day_phase,
            season,
            temperature: TemperatureBand::Normal,
        },
    ));
    automation.subscribe(&bus);
    tracing::info!(conditions = %automation.conditions(), "initial shutter adjustment");
    drop(automation.adjust(&AdjustScope::all()));

    let temperature = Arc::new(TemperatureMonitor::new(
        Arc::clone(&bus),
        settings.thresholds,
    ));
    temperature.subscribe(&bus);

    // Alarm
    let store = Arc::new(JsonFileStore::open(settings.storage_path).await?);
    let alarm = match settings.alarm {
        Some(alarm_config) => {
            let alarm = Arc::new(AlarmSystem::new(
                store,
                TracingNotificationSink,
                VirtualCamera::new(settings.cameras),
                Arc::clone(&bus),
                clock,
                alarm_config,
            ));
            let state = alarm.restore().await?;
            alarm.subscribe(&bus);
            tracing::info!(%state, "alarm ready");
            Some(alarm)
        }
        None => {
            tracing::warn!("no alarm code configured, alarm disabled");
            None
        }
    };

    let hub = Hub {
        bus,
        driver,
        coordinator,
        controller,
        automation,
        alarm,
        lights: settings.lights.into_iter().collect(),
    };
    let console = Console::new(settings.openings);

    let daycycle_task = tokio::spawn(async move { daycycle.run().await });
    let console_task = tokio::spawn(async move { run_console(&console, &hub).await });

    tracing::info!("burrowd running, type commands on stdin, Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    daycycle_task.abort();
    console_task.abort();
    Ok(())
}

async fn run_console(console: &Console, hub: &Hub) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match console.parse(&line) {
                Ok(Some(input)) => {
                    if let Err(err) = hub.apply(input) {
                        tracing::warn!(%err, %line, "console command failed");
                    }
                }
                Ok(None) => {}
                Err(err) => tracing::warn!(%err, %line, "invalid console command"),
            },
            Ok(None) => {
                tracing::info!("stdin closed, console stopped");
                return;
            }
            Err(err) => {
                tracing::error!(%err, "failed to read stdin");
                return;
            }
        }
    }
}

impl Hub {
    fn apply(&self, input: Input) -> Result<(), BurrowError> {
        match input {
            Input::Publish(event) => {
                tracing::debug!(kind = %event.kind, "console event");
                drop(EventBus::publish(&self.bus, event));
            }
            Input::MoveShutter { id, position } => {
                drop(self.controller.operate(&id, position, true)?);
            }
            Input::StopShutter(id) => {
                drop(self.controller.stop(&id)?);
            }
            Input::SwitchLight { id, setting } => {
                if !self.lights.contains(&id) {
                    tracing::warn!(light = %id, "unknown light");
                    return Ok(());
                }
                let instruction = Instruction::SwitchLight { setting };
                let command = Command::single(format!("{id} {instruction}"), instruction);
                drop(self.coordinator.issue(id, command));
            }
            Input::Status => self.status(),
        }
        Ok(())
    }

    fn status(&self) {
        let conditions = self.automation.conditions();
        let alarm = self.alarm.as_ref().map(|a| a.state().to_string());
        tracing::info!(%conditions, alarm = alarm.as_deref().unwrap_or("disabled"), "status");
        for shutter in self.controller.shutters() {
            tracing::info!(
                shutter = %shutter.id,
                percent = ?self.driver.shutter_percent(&shutter.id),
                "shutter"
            );
        }
        for light in &self.lights {
            tracing::info!(%light, setting = ?self.driver.light(light), "light");
        }
    }
}
