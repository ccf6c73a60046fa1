//! Openings: doors and windows fitted with contact sensors.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::id::ResourceId;

/// Last known state of a door or window contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenState {
    Open,
    Closed,
    #[default]
    Unknown,
}

impl OpenState {
    #[must_use]
    pub fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

/// A door or window contact and what it is linked to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpeningSensor {
    pub id: ResourceId,
    pub room: Option<String>,
    /// Shutter fitted on the same window.
    pub shutter: Option<ResourceId>,
    /// Openings of the front door get a grace delay before the alarm fires.
    pub front_door: bool,
}

impl OpeningSensor {
    #[must_use]
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            room: None,
            shutter: None,
            front_door: false,
        }
    }

    /// Event reporting that the contact now reads `state`.
    #[must_use]
    pub fn event(&self, state: OpenState) -> Event {
        let event = Event::opening(self.id.clone(), state, self.shutter.clone(), self.front_door);
        match &self.room {
            Some(room) => event.in_room(room.clone()),
            None => event,
        }
    }
}

impl fmt::Display for OpenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Unknown => "unknown",
        })
    }
}
