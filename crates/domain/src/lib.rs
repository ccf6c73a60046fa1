//! # burrow-domain
//!
//! Pure domain model for the burrow home automation hub.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Events** (immutable records fanned out by the event bus)
//! - Define **environment conditions** (day phase, season, temperature band)
//! - Define **shutter positions** and device **instructions**
//! - Define **presets** and the pure preset resolver
//! - Define the **alarm** code, keypad keys and session transition rules
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod alarm;
pub mod environment;
pub mod event;
pub mod instruction;
pub mod opening;
pub mod preset;
pub mod shutter;
