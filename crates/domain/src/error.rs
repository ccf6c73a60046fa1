//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`BurrowError`] via `#[from]`. Outcomes that are expected during normal
//! operation (a superseded command, a rejected keypad code, a lockout) are
//! not errors and are modelled as enums next to the code producing them.

use std::error::Error as StdError;

use crate::id::ResourceId;

/// Top-level error for every fallible operation in burrow.
#[derive(Debug, thiserror::Error)]
pub enum BurrowError {
    /// A value failed a domain invariant check.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A referenced resource does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// Static configuration is inconsistent. Fatal at startup.
    #[error("configuration error")]
    Configuration(#[from] ConfigurationError),

    /// A device driver call failed.
    #[error("device error")]
    Device(#[from] DeviceError),

    /// A notification could not be delivered.
    #[error("notification error")]
    Notification(#[source] Box<dyn StdError + Send + Sync>),

    /// The key-value store failed to read or persist a value.
    #[error("storage error")]
    Storage(#[source] Box<dyn StdError + Send + Sync>),

    /// A background task died before reporting its result.
    #[error("background task failed")]
    Task(#[source] Box<dyn StdError + Send + Sync>),
}

/// Invariant violations on individual values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("percentage {0} is out of range 0..=100")]
    PercentOutOfRange(i64),

    #[error("unknown shutter position: {0:?}")]
    UnknownShutterPosition(String),

    #[error("unknown keypad key: {0:?}")]
    UnknownKeypadKey(String),

    #[error("unknown value {value:?} for {field}")]
    UnknownValue { field: &'static str, value: String },
}

/// A lookup by name or id found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// Load-time configuration problems.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    /// Two presets of one shutter share an identical filter triple.
    #[error("shutter {resource}: presets #{first} and #{second} have identical filters ({filter})")]
    AmbiguousPresets {
        resource: ResourceId,
        filter: String,
        first: usize,
        second: usize,
    },

    #[error("alarm code too short: {len} digits, minimum {min}")]
    AlarmCodeTooShort { len: usize, min: usize },

    #[error("invalid alarm code digit: {0:?}")]
    AlarmCodeInvalidDigit(char),

    #[error("temperature thresholds must be strictly increasing: {0}")]
    UnorderedThresholds(String),

    #[error("day cycle offsets must be strictly increasing and below 100%: {0}")]
    UnorderedDaycycleOffsets(String),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("duplicate {kind} name: {name}")]
    DuplicateName { kind: &'static str, name: String },

    #[error("{kind} {name} references unknown {target} {reference}")]
    UnknownReference {
        kind: &'static str,
        name: String,
        target: &'static str,
        reference: String,
    },
}

/// Failures reported by device drivers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// The device could not be reached (connection refused, timeout, …).
    #[error("device {resource} unreachable")]
    Unreachable { resource: ResourceId },

    /// The device answered but refused the instruction.
    #[error("device {resource} rejected instruction: {reason}")]
    Rejected { resource: ResourceId, reason: String },
}

impl DeviceError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}
