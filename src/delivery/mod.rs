//! Delivery channel: permission handling plus immediate and timed display.

mod schedule;

pub use schedule::{ReminderSet, ScheduledDelivery};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{NotifyError, NotifyResult};
use crate::platform::{DisplayRequest, NotificationPlatform, Permission};
use crate::server::metrics;

/// Shows notifications through the host platform.
///
/// Cloning is cheap; clones share the same platform.
#[derive(Clone)]
pub struct DeliveryChannel {
    platform: Arc<dyn NotificationPlatform>,
}

impl DeliveryChannel {
    pub fn new(platform: Arc<dyn NotificationPlatform>) -> Self {
        Self { platform }
    }

    pub fn is_supported(&self) -> bool {
        self.platform.is_supported()
    }

    pub fn permission(&self) -> Permission {
        self.platform.permission()
    }

    /// Ask for notification permission.
    ///
    /// The user is prompted only while the permission is still `Default`; a
    /// settled answer is returned as-is.
    pub async fn request_permission(&self) -> NotifyResult<Permission> {
        if !self.platform.is_supported() {
            return Err(NotifyError::UnsupportedPlatform);
        }

        match self.platform.permission() {
            Permission::Default => {
                let answer = self.platform.prompt_permission().await;
                debug!("Notification permission prompt answered: {:?}", answer);
                Ok(answer)
            }
            settled => Ok(settled),
        }
    }

    /// Like `request_permission`, but anything short of `Granted` is an error.
    pub async fn ensure_permission(&self) -> NotifyResult<()> {
        match self.request_permission().await? {
            Permission::Granted => Ok(()),
            Permission::Denied | Permission::Default => Err(NotifyError::PermissionDenied),
        }
    }

    /// Display a notification right away.
    ///
    /// Returns whether the platform was asked to display it. Without a granted
    /// permission this does nothing.
    pub fn show_now(&self, title: &str, body: &str, metadata: serde_json::Value) -> bool {
        if !self.platform.is_supported() || self.platform.permission() != Permission::Granted {
            debug!("Skipping notification '{}': permission not granted", title);
            return false;
        }

        self.platform
            .display(DisplayRequest::new(title, body).with_data(metadata));
        metrics::record_notification_displayed("local");
        true
    }

    /// Display a notification at `at` using an in-process timer. `metadata` is
    /// attached to the displayed notification as with `show_now`.
    ///
    /// A time in the past fires as soon as possible. The timer does not survive
    /// the process; the returned handle cancels it.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime, since the timer is a spawned task.
    pub fn show_at(
        &self,
        title: &str,
        body: &str,
        at: DateTime<Utc>,
        metadata: serde_json::Value,
    ) -> ScheduledDelivery {
        ScheduledDelivery::spawn(
            self.clone(),
            title.to_string(),
            body.to_string(),
            metadata,
            at,
        )
    }
}
