//! Virtual device implementations: shutter and light.

mod light;
mod shutter;

pub use light::VirtualLight;
pub use shutter::VirtualShutter;

use burrow_domain::error::DeviceError;
use burrow_domain::id::ResourceId;
use burrow_domain::instruction::Instruction;

/// Wrapper enum for the concrete virtual device types.
pub enum VirtualDevice {
    Shutter(VirtualShutter),
    Light(VirtualLight),
}

impl VirtualDevice {
    /// Apply an instruction to the simulated device.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Rejected`] if the device does not understand
    /// the instruction.
    pub fn apply(&self, resource: &ResourceId, instruction: &Instruction) -> Result<(), DeviceError> {
        if let Instruction::Raw { command } = instruction {
            tracing::debug!(%resource, command, "virtual raw command");
            return Ok(());
        }
        let handled = match self {
            Self::Shutter(d) => d.apply(instruction),
            Self::Light(d) => d.apply(instruction),
        };
        if handled {
            Ok(())
        } else {
            Err(DeviceError::Rejected {
                resource: resource.clone(),
                reason: format!("{instruction} not supported"),
            })
        }
    }
}
