//! Device driver port, the only way instructions reach hardware.

use std::future::Future;

use burrow_domain::error::DeviceError;
use burrow_domain::id::ResourceId;
use burrow_domain::instruction::Instruction;

/// Applies instructions to physical (or simulated) devices.
///
/// Implementations own their wire protocol and any small fixed retry
/// count; callers never retry on their own.
pub trait DeviceDriver {
    /// Apply `instruction` to `resource`.
    fn apply(
        &self,
        resource: &ResourceId,
        instruction: &Instruction,
    ) -> impl Future<Output = Result<(), DeviceError>> + Send;
}

impl<T: DeviceDriver + Send + Sync> DeviceDriver for std::sync::Arc<T> {
    fn apply(
        &self,
        resource: &ResourceId,
        instruction: &Instruction,
    ) -> impl Future<Output = Result<(), DeviceError>> + Send {
        (**self).apply(resource, instruction)
    }
}
