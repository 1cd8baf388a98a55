//! The notification store: ordered collection plus unread count.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::backend::{DurableBackend, EphemeralBackend, NotificationBackend, StoreMode};
use super::models::{Notification, NotificationDraft, NotificationSnapshot};
use super::persistence::NotificationPersistence;
use crate::delivery::{DeliveryChannel, ScheduledDelivery};
use crate::error::{NotifyError, NotifyResult};
use crate::server::metrics;

/// Holds a user's notifications, newest first, and keeps the unread count in
/// step with them.
///
/// Reads and deletions of read-state are applied locally first and then
/// mirrored to the backend; a failed remote write is logged and left in place
/// until the next `list()` reconciles. Creation is the exception: a record is
/// only added once the backend has accepted it.
pub struct NotificationStore {
    backend: Box<dyn NotificationBackend>,
    state: watch::Sender<NotificationSnapshot>,
    toasts: Option<DeliveryChannel>,
}

impl NotificationStore {
    pub fn new(backend: Box<dyn NotificationBackend>) -> Self {
        let (state, _) = watch::channel(NotificationSnapshot::default());
        Self {
            backend,
            state,
            toasts: None,
        }
    }

    /// Store whose state lives only in this process.
    pub fn ephemeral() -> Self {
        Self::new(Box::new(EphemeralBackend))
    }

    /// Store mirrored to `persistence`, scoped to `owner_id`.
    pub fn durable(persistence: Arc<dyn NotificationPersistence>, owner_id: impl Into<String>) -> Self {
        Self::new(Box::new(DurableBackend::new(persistence, owner_id)))
    }

    /// Show a local toast for every notification created through this store.
    pub fn with_toasts(mut self, channel: DeliveryChannel) -> Self {
        self.toasts = Some(channel);
        self
    }

    pub fn mode(&self) -> StoreMode {
        self.backend.mode()
    }

    pub fn snapshot(&self) -> NotificationSnapshot {
        self.state.borrow().clone()
    }

    pub fn unread_count(&self) -> usize {
        self.state.borrow().unread_count
    }

    /// Observe every state change. Each value carries a list and the count
    /// that matches it.
    pub fn subscribe(&self) -> watch::Receiver<NotificationSnapshot> {
        self.state.subscribe()
    }

    /// Current collection, newest first.
    ///
    /// A durable store refetches the most recent records first. If that fetch
    /// fails the error is returned and the previous state is kept.
    pub async fn list(&self) -> NotifyResult<Vec<Notification>> {
        match self.backend.fetch().await {
            Ok(Some(records)) => {
                let snapshot = NotificationSnapshot::from_records(records);
                let notifications = snapshot.notifications.clone();
                self.state.send_replace(snapshot);
                Ok(notifications)
            }
            Ok(None) => Ok(self.state.borrow().notifications.clone()),
            Err(e) => {
                warn!("Failed to fetch notifications, keeping cached state: {}", e);
                metrics::record_store_remote_failure("list");
                Err(e)
            }
        }
    }

    /// Create a notification and put it at the head of the collection.
    pub async fn create(&self, draft: NotificationDraft) -> NotifyResult<Notification> {
        let notification = match self.backend.create(draft).await {
            Ok(notification) => notification,
            Err(e) => {
                warn!("Failed to create notification: {}", e);
                metrics::record_store_remote_failure("create");
                return Err(e);
            }
        };

        self.state.send_modify(|state| {
            if !notification.read {
                state.unread_count += 1;
            }
            state.notifications.insert(0, notification.clone());
        });
        debug!("Created notification {}", notification.id);

        if let Some(channel) = &self.toasts {
            channel.show_now(
                &notification.title,
                &notification.message,
                toast_metadata(&notification),
            );
        }

        Ok(notification)
    }

    /// Mark one notification as read. Unknown ids only reach the backend.
    pub async fn mark_read(&self, id: &str) -> NotifyResult<()> {
        self.state.send_if_modified(|state| {
            match state
                .notifications
                .iter_mut()
                .find(|n| n.id == id && !n.read)
            {
                Some(notification) => {
                    notification.read = true;
                    state.unread_count -= 1;
                    true
                }
                None => false,
            }
        });

        if let Err(e) = self.backend.mark_read(id).await {
            warn!("Failed to persist read state for notification {}: {}", id, e);
            metrics::record_store_remote_failure("mark_read");
        }
        Ok(())
    }

    pub async fn mark_all_read(&self) -> NotifyResult<()> {
        let mut unread_ids = Vec::new();
        self.state.send_if_modified(|state| {
            for notification in state.notifications.iter_mut().filter(|n| !n.read) {
                notification.read = true;
                unread_ids.push(notification.id.clone());
            }
            state.unread_count = 0;
            !unread_ids.is_empty()
        });

        if let Err(e) = self.backend.mark_all_read(&unread_ids).await {
            warn!(
                "Failed to persist read state for {} notifications: {}",
                unread_ids.len(),
                e
            );
            metrics::record_store_remote_failure("mark_all_read");
        }
        Ok(())
    }

    /// Remove a notification. Deleting an unknown id is not an error.
    pub async fn delete(&self, id: &str) -> NotifyResult<()> {
        self.state.send_if_modified(|state| {
            match state.notifications.iter().position(|n| n.id == id) {
                Some(index) => {
                    let removed = state.notifications.remove(index);
                    if !removed.read {
                        state.unread_count -= 1;
                    }
                    true
                }
                None => false,
            }
        });

        if let Err(e) = self.backend.delete(id).await {
            warn!("Failed to delete notification {} remotely: {}", id, e);
            metrics::record_store_remote_failure("delete");
        }
        Ok(())
    }

    /// Schedule a local reminder for `notification` at `at`, carrying the same
    /// metadata as the creation toast.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime; see `DeliveryChannel::show_at`.
    pub fn schedule_reminder(
        &self,
        notification: &Notification,
        at: DateTime<Utc>,
    ) -> NotifyResult<ScheduledDelivery> {
        let channel = self.toasts.as_ref().ok_or(NotifyError::UnsupportedPlatform)?;
        Ok(channel.show_at(
            &notification.title,
            &notification.message,
            at,
            toast_metadata(notification),
        ))
    }
}

fn toast_metadata(notification: &Notification) -> serde_json::Value {
    serde_json::json!({
        "id": notification.id,
        "kind": notification.kind,
        "related_entity_id": notification.related_entity_id,
    })
}
