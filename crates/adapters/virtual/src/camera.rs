//! Virtual camera: synthetic snapshots and a monitoring flag.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use burrow_app::ports::{Camera, Snapshot};
use burrow_domain::error::DeviceError;
use burrow_domain::id::ResourceId;
use burrow_domain::time::now;

/// JPEG start and end of image markers.
const FAKE_JPEG: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xD9];

/// A set of simulated cameras.
pub struct VirtualCamera {
    cameras: HashSet<ResourceId>,
    monitoring: Mutex<HashSet<ResourceId>>,
}

impl VirtualCamera {
    pub fn new(cameras: impl IntoIterator<Item = ResourceId>) -> Self {
        Self {
            cameras: cameras.into_iter().collect(),
            monitoring: Mutex::new(HashSet::new()),
        }
    }

    #[must_use]
    pub fn is_monitoring(&self, camera: &ResourceId) -> bool {
        self.monitoring
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(camera)
    }

    fn known(&self, camera: &ResourceId) -> Result<(), DeviceError> {
        if self.cameras.contains(camera) {
            Ok(())
        } else {
            Err(DeviceError::Unreachable {
                resource: camera.clone(),
            })
        }
    }

    fn set_monitoring(&self, camera: &ResourceId, enabled: bool) -> Result<(), DeviceError> {
        self.known(camera)?;
        let mut monitoring = self.monitoring.lock().unwrap_or_else(PoisonError::into_inner);
        if enabled {
            monitoring.insert(camera.clone());
        } else {
            monitoring.remove(camera);
        }
        tracing::debug!(%camera, enabled, "virtual camera monitoring");
        Ok(())
    }
}

impl Camera for VirtualCamera {
    fn capture(&self, camera: &ResourceId) -> impl Future<Output = Result<Snapshot, DeviceError>> + Send {
        let result = self.known(camera).map(|()| Snapshot {
            camera: camera.clone(),
            content_type: "image/jpeg".to_string(),
            data: FAKE_JPEG.to_vec(),
            taken_at: now(),
        });
        async { result }
    }

    fn start_monitoring(&self, camera: &ResourceId) -> impl Future<Output = Result<(), DeviceError>> + Send {
        let result = self.set_monitoring(camera, true);
        async { result }
    }

    fn stop_monitoring(&self, camera: &ResourceId) -> impl Future<Output = Result<(), DeviceError>> + Send {
        let result = self.set_monitoring(camera, false);
        async { result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn should_capture_jpeg_from_known_camera() {
        let cameras = VirtualCamera::new([ResourceId::new("hall")]);
        let snapshot = cameras.capture(&ResourceId::new("hall")).await.unwrap();
        assert_eq!(snapshot.content_type, "image/jpeg");
        assert_eq!(&snapshot.data[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn should_fail_for_unknown_camera() {
        let cameras = VirtualCamera::new([ResourceId::new("hall")]);
        assert!(cameras.capture(&ResourceId::new("garden")).await.is_err());
        assert!(cameras.start_monitoring(&ResourceId::new("garden")).await.is_err());
    }

    #[tokio::test]
    async fn should_toggle_monitoring() {
        let cameras = VirtualCamera::new([ResourceId::new("hall")]);
        let hall = ResourceId::new("hall");

        cameras.start_monitoring(&hall).await.unwrap();
        assert!(cameras.is_monitoring(&hall));

        cameras.stop_monitoring(&hall).await.unwrap();
        assert!(!cameras.is_monitoring(&hall));
    }
}
