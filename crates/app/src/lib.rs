//! # burrow-app
//!
//! Application layer: services and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters implement:
//!   - `DeviceDriver`: apply an instruction to a shutter or light
//!   - `NotificationSink`: push messages to the occupants
//!   - `KeyValueStore`: durable state surviving restarts
//!   - `Camera`: snapshots and motion monitoring
//!   - `Almanac`: sunrise and sunset times
//!   - `Clock`: time and sleeping, paused in tests
//! - Provide **in-process infrastructure** that needs no IO: the event bus
//!   and the command-token coordinator
//! - Run the automations: shutter presets, day-cycle and temperature
//!   monitors, and the alarm
//!
//! ## Dependency rule
//! Depends on `burrow-domain` only (plus `tokio` for tasks and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod alarm;
pub mod coordinator;
pub mod daycycle_monitor;
pub mod event_bus;
pub mod ports;
pub mod retry;
pub mod shutter_automation;
pub mod shutters;
pub mod temperature_monitor;
