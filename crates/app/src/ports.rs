//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the services and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod almanac;
pub mod camera;
pub mod clock;
pub mod device;
pub mod event_bus;
pub mod notification;
pub mod storage;

pub use almanac::Almanac;
pub use camera::{Camera, Snapshot};
pub use clock::{Clock, TokioClock};
pub use device::DeviceDriver;
pub use event_bus::EventPublisher;
pub use notification::{Attachment, Notification, NotificationSink, Priority};
pub use storage::KeyValueStore;
