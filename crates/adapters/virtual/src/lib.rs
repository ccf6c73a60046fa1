//! # burrow-adapter-virtual
//!
//! Virtual integration that provides simulated devices for testing and
//! demonstration purposes.
//!
//! ## Provided adapters
//!
//! | Adapter | Port | Behaviour |
//! |---------|------|-----------|
//! | [`VirtualDriver`] | `DeviceDriver` | Shutters and lights held in memory, resources can be taken offline |
//! | [`VirtualCamera`] | `Camera` | Returns a tiny synthetic JPEG per capture |
//! | [`TracingNotificationSink`] | `NotificationSink` | Logs every notification |
//! | [`FixedAlmanac`] | `Almanac` | Same sunrise and sunset every day |
//!
//! ## Dependency rule
//!
//! Depends on `burrow-app` (port traits) and `burrow-domain` only.

mod almanac;
mod camera;
mod devices;
mod notifier;

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use burrow_app::ports::{Clock, DeviceDriver};
use burrow_app::retry::{RetryPolicy, retry};
use burrow_domain::error::DeviceError;
use burrow_domain::id::ResourceId;
use burrow_domain::instruction::{Instruction, LightSetting};

pub use almanac::FixedAlmanac;
pub use camera::VirtualCamera;
pub use notifier::TracingNotificationSink;

use devices::{VirtualDevice, VirtualLight, VirtualShutter};

/// Simulated device driver.
///
/// Unreachable resources are retried according to the driver's
/// [`RetryPolicy`] before the error is returned.
pub struct VirtualDriver<C> {
    clock: C,
    retry: RetryPolicy,
    devices: HashMap<ResourceId, VirtualDevice>,
    offline: Mutex<HashSet<ResourceId>>,
    history: Mutex<Vec<(ResourceId, Instruction)>>,
}

impl<C: Clock> VirtualDriver<C> {
    #[must_use]
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            retry: RetryPolicy::default(),
            devices: HashMap::new(),
            offline: Mutex::new(HashSet::new()),
            history: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_shutter(mut self, id: ResourceId) -> Self {
        self.devices
            .insert(id, VirtualDevice::Shutter(VirtualShutter::default()));
        self
    }

    #[must_use]
    pub fn with_light(mut self, id: ResourceId) -> Self {
        self.devices
            .insert(id, VirtualDevice::Light(VirtualLight::default()));
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Simulate a resource dropping off (or coming back to) the network.
    pub fn set_offline(&self, id: &ResourceId, offline: bool) {
        let mut set = self.offline.lock().unwrap_or_else(PoisonError::into_inner);
        if offline {
            set.insert(id.clone());
        } else {
            set.remove(id);
        }
    }

    /// Closing percentage of a simulated shutter.
    #[must_use]
    pub fn shutter_percent(&self, id: &ResourceId) -> Option<u8> {
        match self.devices.get(id) {
            Some(VirtualDevice::Shutter(shutter)) => shutter.percent(),
            _ => None,
        }
    }

    /// Current setting of a simulated light.
    #[must_use]
    pub fn light(&self, id: &ResourceId) -> Option<LightSetting> {
        match self.devices.get(id) {
            Some(VirtualDevice::Light(light)) => Some(light.setting()),
            _ => None,
        }
    }

    /// Every instruction applied successfully, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<(ResourceId, Instruction)> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn attempt(&self, resource: &ResourceId, instruction: &Instruction) -> Result<(), DeviceError> {
        let offline = self
            .offline
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(resource);
        if offline {
            return Err(DeviceError::Unreachable {
                resource: resource.clone(),
            });
        }
        let device = self
            .devices
            .get(resource)
            .ok_or_else(|| DeviceError::Rejected {
                resource: resource.clone(),
                reason: "unknown device".to_string(),
            })?;
        device.apply(resource, instruction)?;
        tracing::info!(%resource, %instruction, "virtual device updated");
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((resource.clone(), instruction.clone()));
        Ok(())
    }
}

impl<C: Clock + Send + Sync> DeviceDriver for VirtualDriver<C> {
    async fn apply(&self, resource: &ResourceId, instruction: &Instruction) -> Result<(), DeviceError> {
        let label = format!("{resource} {instruction}");
        retry(&self.clock, &self.retry, &label, || {
            std::future::ready(self.attempt(resource, instruction))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_app::ports::TokioClock;
    use burrow_domain::shutter::ShutterPosition;

    fn driver() -> VirtualDriver<TokioClock> {
        VirtualDriver::new(TokioClock::new())
            .with_shutter(ResourceId::new("living"))
            .with_light(ResourceId::new("desk"))
    }

    fn close() -> Instruction {
        Instruction::MoveShutter {
            position: ShutterPosition::Closed,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn should_move_virtual_shutter() {
        let driver = driver();
        let living = ResourceId::new("living");

        driver.apply(&living, &close()).await.unwrap();

        assert_eq!(driver.shutter_percent(&living), Some(100));
        assert_eq!(driver.history(), vec![(living, close())]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_switch_virtual_light() {
        let driver = driver();
        let desk = ResourceId::new("desk");
        let on = LightSetting {
            on: true,
            brightness: Some(80),
        };

        driver
            .apply(&desk, &Instruction::SwitchLight { setting: on })
            .await
            .unwrap();

        assert_eq!(driver.light(&desk), Some(on));
    }

    #[tokio::test(start_paused = true)]
    async fn should_reject_unknown_device() {
        let result = driver().apply(&ResourceId::new("garage"), &close()).await;
        assert!(matches!(result, Err(DeviceError::Rejected { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn should_reject_instruction_for_wrong_device_type() {
        let result = driver().apply(&ResourceId::new("desk"), &close()).await;
        assert!(matches!(result, Err(DeviceError::Rejected { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn should_report_unreachable_after_retries_when_offline() {
        let driver = driver();
        let living = ResourceId::new("living");
        driver.set_offline(&living, true);

        let result = driver.apply(&living, &close()).await;

        assert!(matches!(result, Err(DeviceError::Unreachable { .. })));
        assert!(driver.history().is_empty());

        driver.set_offline(&living, false);
        driver.apply(&living, &close()).await.unwrap();
        assert_eq!(driver.shutter_percent(&living), Some(100));
    }

    #[tokio::test(start_paused = true)]
    async fn should_accept_raw_command_on_any_device() {
        let driver = driver();
        driver
            .apply(
                &ResourceId::new("desk"),
                &Instruction::Raw {
                    command: "ir:power".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(driver.history().len(), 1);
    }
}
