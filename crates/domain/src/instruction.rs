//! Instructions sent to device drivers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shutter::ShutterPosition;

/// Light switching parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightSetting {
    pub on: bool,
    /// Brightness in percent. `None` keeps the light's default.
    pub brightness: Option<u8>,
}

/// A single externally observable device operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Instruction {
    /// Move a shutter to a position.
    MoveShutter { position: ShutterPosition },
    /// Halt a moving shutter where it is.
    StopShutter,
    /// Switch a light.
    SwitchLight { setting: LightSetting },
    /// Driver-specific raw command (infrared code, PC agent command, …).
    Raw { command: String },
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MoveShutter { position } => write!(f, "move_shutter({position})"),
            Self::StopShutter => f.write_str("stop_shutter"),
            Self::SwitchLight { setting } => match (setting.on, setting.brightness) {
                (true, Some(b)) => write!(f, "switch_light(on, {b}%)"),
                (true, None) => f.write_str("switch_light(on)"),
                (false, _) => f.write_str("switch_light(off)"),
            },
            Self::Raw { command } => write!(f, "raw({command})"),
        }
    }
}
