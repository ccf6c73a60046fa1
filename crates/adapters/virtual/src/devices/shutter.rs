//! Virtual shutter: tracks the closing percentage it was last sent to.

use std::sync::{Mutex, PoisonError};

use burrow_domain::instruction::Instruction;

/// A simulated roller shutter. Moves are instantaneous.
pub struct VirtualShutter {
    halfway: u8,
    percent: Mutex<Option<u8>>,
}

impl Default for VirtualShutter {
    fn default() -> Self {
        Self {
            halfway: 50,
            percent: Mutex::new(None),
        }
    }
}

impl VirtualShutter {
    /// Closing percentage, `None` until the first move.
    #[must_use]
    pub fn percent(&self) -> Option<u8> {
        *self.percent.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `false` for instructions a shutter does not understand.
    pub fn apply(&self, instruction: &Instruction) -> bool {
        match instruction {
            Instruction::MoveShutter { position } => {
                *self.percent.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(position.percent(self.halfway));
                true
            }
            Instruction::StopShutter => true,
            _ => false,
        }
    }
}
