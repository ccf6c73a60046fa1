//! Notification port: best-effort push messages to the occupants.

use std::fmt;
use std::future::Future;

use burrow_domain::error::BurrowError;
use serde::{Deserialize, Serialize};

/// Urgency of a notification, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Min,
    Low,
    #[default]
    Default,
    High,
    Max,
}

impl Priority {
    /// One step less urgent, saturating at [`Min`](Self::Min).
    #[must_use]
    pub fn lower(self) -> Self {
        match self {
            Self::Max => Self::High,
            Self::High => Self::Default,
            Self::Default => Self::Low,
            Self::Low | Self::Min => Self::Min,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Min => "min",
            Self::Low => "low",
            Self::Default => "default",
            Self::High => "high",
            Self::Max => "max",
        })
    }
}

/// File attached to a notification, typically a camera snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// A message for the occupants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub attachment: Option<Attachment>,
}

impl Notification {
    #[must_use]
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            priority: Priority::Default,
            tags: Vec::new(),
            attachment: None,
        }
    }

    #[must_use]
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

/// Delivers notifications.
///
/// Failures are reported to the caller, which logs them and carries on.
pub trait NotificationSink {
    fn send(
        &self,
        notification: Notification,
    ) -> impl Future<Output = Result<(), BurrowError>> + Send;
}

impl<T: NotificationSink + Send + Sync> NotificationSink for std::sync::Arc<T> {
    fn send(
        &self,
        notification: Notification,
    ) -> impl Future<Output = Result<(), BurrowError>> + Send {
        (**self).send(notification)
    }
}

/// Send `notification`, logging instead of propagating failures.
pub async fn notify<N: NotificationSink>(sink: &N, notification: Notification) {
    let title = notification.title.clone();
    if let Err(err) = sink.send(notification).await {
        tracing::warn!(%err, %title, "failed to deliver notification");
    }
}
