//! Camera port: snapshots and motion monitoring.

use std::future::Future;

use burrow_domain::error::DeviceError;
use burrow_domain::id::ResourceId;
use burrow_domain::time::Timestamp;

use super::notification::Attachment;

/// A still image grabbed from a camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub camera: ResourceId,
    pub content_type: String,
    pub data: Vec<u8>,
    pub taken_at: Timestamp,
}

impl Snapshot {
    /// Turn the snapshot into a notification attachment.
    #[must_use]
    pub fn into_attachment(self) -> Attachment {
        Attachment {
            filename: format!(
                "{}-{}.jpg",
                self.camera,
                self.taken_at.format("%Y%m%d-%H%M%S")
            ),
            content_type: self.content_type,
            data: self.data,
        }
    }
}

/// Security cameras.
pub trait Camera {
    /// Grab a snapshot from `camera`.
    fn capture(
        &self,
        camera: &ResourceId,
    ) -> impl Future<Output = Result<Snapshot, DeviceError>> + Send;

    /// Turn on continuous monitoring (motion detection, recording).
    fn start_monitoring(
        &self,
        camera: &ResourceId,
    ) -> impl Future<Output = Result<(), DeviceError>> + Send;

    fn stop_monitoring(
        &self,
        camera: &ResourceId,
    ) -> impl Future<Output = Result<(), DeviceError>> + Send;
}

impl<T: Camera + Send + Sync> Camera for std::sync::Arc<T> {
    fn capture(
        &self,
        camera: &ResourceId,
    ) -> impl Future<Output = Result<Snapshot, DeviceError>> + Send {
        (**self).capture(camera)
    }

    fn start_monitoring(
        &self,
        camera: &ResourceId,
    ) -> impl Future<Output = Result<(), DeviceError>> + Send {
        (**self).start_monitoring(camera)
    }

    fn stop_monitoring(
        &self,
        camera: &ResourceId,
    ) -> impl Future<Output = Result<(), DeviceError>> + Send {
        (**self).stop_monitoring(camera)
    }
}
