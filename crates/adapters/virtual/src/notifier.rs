//! Notification sink that writes to the log instead of a push service.

use std::future::Future;

use burrow_app::ports::{Notification, NotificationSink, Priority};
use burrow_domain::error::BurrowError;

/// Logs each notification at a level matching its priority.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn send(&self, notification: Notification) -> impl Future<Output = Result<(), BurrowError>> + Send {
        let Notification {
            title,
            message,
            priority,
            tags,
            attachment,
        } = notification;
        let tags = tags.join(",");
        let attachment = attachment.map(|a| a.filename);
        match priority {
            Priority::High | Priority::Max => {
                tracing::warn!(%priority, tags = %tags, ?attachment, "{title}: {message}");
            }
            Priority::Default => tracing::info!(%priority, tags = %tags, ?attachment, "{title}: {message}"),
            Priority::Low | Priority::Min => {
                tracing::debug!(%priority, tags = %tags, ?attachment, "{title}: {message}");
            }
        }
        async { Ok(()) }
    }
}
