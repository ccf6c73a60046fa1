//! Event: an immutable record of something that happened.
//!
//! Events are produced by sensor drivers (an opening changed, a temperature
//! was read), by monitors (the day phase changed) and by the core itself
//! (the alarm was armed). They are fanned out by the event bus to every
//! handler subscribed to the event's [`EventKind`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::alarm::KeypadKey;
use crate::environment::{DayPhase, Season, SensorLocation, TemperatureBand};
use crate::id::{EventId, ResourceId};
use crate::opening::OpenState;
use crate::time::{Timestamp, now};

/// Topic an event is published on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A door or window contact changed state.
    OpeningChanged,
    /// The day cycle entered a new phase.
    DayPhaseChanged,
    /// Raw temperature reading from a sensor or forecast.
    TemperatureData,
    /// A sensor crossed into a new temperature band.
    TemperatureChanged,
    /// A room's occupant went to sleep.
    Sleep,
    /// A room's occupant woke up.
    WakeUp,
    /// A keypad key was pressed.
    Keypad,
    AlarmArmed,
    AlarmDisarmed,
    AlarmTriggered,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OpeningChanged => "opening_changed",
            Self::DayPhaseChanged => "day_phase_changed",
            Self::TemperatureData => "temperature_data",
            Self::TemperatureChanged => "temperature_changed",
            Self::Sleep => "sleep",
            Self::WakeUp => "wake_up",
            Self::Keypad => "keypad",
            Self::AlarmArmed => "alarm_armed",
            Self::AlarmDisarmed => "alarm_disarmed",
            Self::AlarmTriggered => "alarm_triggered",
        })
    }
}

/// Kind-specific attributes of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    None,
    Opening {
        state: OpenState,
        /// Shutter fitted on the same window, if any.
        shutter: Option<ResourceId>,
        front_door: bool,
    },
    DayPhase {
        phase: DayPhase,
        season: Season,
    },
    TemperatureReading {
        celsius: f64,
        location: SensorLocation,
    },
    TemperatureBand {
        band: TemperatureBand,
        celsius: f64,
        location: SensorLocation,
    },
    Keypad {
        key: KeypadKey,
    },
    Alarm {
        /// Human readable context: which sensor, automatic resume, …
        reason: String,
    },
}

/// Immutable record published on the event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub kind: EventKind,
    /// Resource or sensor the event is about.
    pub subject: Option<ResourceId>,
    /// Occupant zone the event belongs to.
    pub room: Option<String>,
    pub payload: EventPayload,
    pub timestamp: Timestamp,
}

impl Event {
    /// Create a new event stamped with a fresh id and the current time.
    #[must_use]
    pub fn new(kind: EventKind, subject: Option<ResourceId>, payload: EventPayload) -> Self {
        Self {
            id: EventId::new(),
            kind,
            subject,
            room: None,
            payload,
            timestamp: now(),
        }
    }

    /// Attach an occupant zone.
    #[must_use]
    pub fn in_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    /// An opening (door/window) changed state.
    #[must_use]
    pub fn opening(
        opening: ResourceId,
        state: OpenState,
        shutter: Option<ResourceId>,
        front_door: bool,
    ) -> Self {
        Self::new(
            EventKind::OpeningChanged,
            Some(opening),
            EventPayload::Opening {
                state,
                shutter,
                front_door,
            },
        )
    }

    /// The day cycle moved to `phase`.
    #[must_use]
    pub fn day_phase(phase: DayPhase, season: Season) -> Self {
        Self::new(
            EventKind::DayPhaseChanged,
            None,
            EventPayload::DayPhase { phase, season },
        )
    }

    /// The occupants of `room` went to sleep.
    #[must_use]
    pub fn sleep(room: impl Into<String>) -> Self {
        Self::new(EventKind::Sleep, None, EventPayload::None).in_room(room)
    }

    /// The occupants of `room` got up.
    #[must_use]
    pub fn wake_up(room: impl Into<String>) -> Self {
        Self::new(EventKind::WakeUp, None, EventPayload::None).in_room(room)
    }

    /// A keypad key was pressed.
    #[must_use]
    pub fn keypad(key: KeypadKey) -> Self {
        Self::new(EventKind::Keypad, None, EventPayload::Keypad { key })
    }
}
