//! Interchangeable backing strategies for `NotificationStore`.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::debug;

use super::models::{now_millis, Notification, NotificationDraft};
use super::persistence::{
    NotificationPersistence, RecordFilter, RecordOrder, RecordPatch, FETCH_LIMIT,
};
use crate::error::{NotifyError, NotifyResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// State lives only in process memory.
    Ephemeral,
    /// State is mirrored to a `NotificationPersistence`.
    Durable,
}

/// Remote side of each store operation.
///
/// The store applies local state changes itself; a backend only talks to the
/// source of truth (if there is one).
#[async_trait]
pub trait NotificationBackend: Send + Sync {
    fn mode(&self) -> StoreMode;

    /// Fetch the authoritative collection, newest first.
    /// `None` means local state is already authoritative.
    async fn fetch(&self) -> NotifyResult<Option<Vec<Notification>>>;

    /// Persist a draft and return the record with its assigned id and timestamp.
    async fn create(&self, draft: NotificationDraft) -> NotifyResult<Notification>;

    async fn mark_read(&self, id: &str) -> NotifyResult<()>;

    async fn mark_all_read(&self, ids: &[String]) -> NotifyResult<()>;

    async fn delete(&self, id: &str) -> NotifyResult<()>;
}

/// In-memory backend. Ids are random UUIDs and timestamps come from the local clock.
#[derive(Debug, Default)]
pub struct EphemeralBackend;

#[async_trait]
impl NotificationBackend for EphemeralBackend {
    fn mode(&self) -> StoreMode {
        StoreMode::Ephemeral
    }

    async fn fetch(&self) -> NotifyResult<Option<Vec<Notification>>> {
        Ok(None)
    }

    async fn create(&self, draft: NotificationDraft) -> NotifyResult<Notification> {
        Ok(draft.into_notification(uuid::Uuid::new_v4().to_string(), now_millis()))
    }

    async fn mark_read(&self, _id: &str) -> NotifyResult<()> {
        Ok(())
    }

    async fn mark_all_read(&self, _ids: &[String]) -> NotifyResult<()> {
        Ok(())
    }

    async fn delete(&self, _id: &str) -> NotifyResult<()> {
        Ok(())
    }
}

/// Backend mirroring every operation to an external store, scoped to one owner.
pub struct DurableBackend {
    persistence: Arc<dyn NotificationPersistence>,
    owner_id: String,
}

impl DurableBackend {
    pub fn new(persistence: Arc<dyn NotificationPersistence>, owner_id: impl Into<String>) -> Self {
        Self {
            persistence,
            owner_id: owner_id.into(),
        }
    }
}

#[async_trait]
impl NotificationBackend for DurableBackend {
    fn mode(&self) -> StoreMode {
        StoreMode::Durable
    }

    async fn fetch(&self) -> NotifyResult<Option<Vec<Notification>>> {
        let filter = RecordFilter::owned_by(&self.owner_id);
        let records = self
            .persistence
            .query(&filter, RecordOrder::CreatedAtDesc, FETCH_LIMIT)
            .await
            .map_err(NotifyError::remote_read)?;
        debug!(
            "Fetched {} notifications for owner {}",
            records.len(),
            self.owner_id
        );
        Ok(Some(records))
    }

    async fn create(&self, draft: NotificationDraft) -> NotifyResult<Notification> {
        self.persistence
            .insert(&self.owner_id, draft)
            .await
            .map_err(NotifyError::remote_write)
    }

    async fn mark_read(&self, id: &str) -> NotifyResult<()> {
        self.persistence
            .update(&self.owner_id, id, &RecordPatch::mark_read())
            .await
            .map_err(NotifyError::remote_write)
    }

    async fn mark_all_read(&self, ids: &[String]) -> NotifyResult<()> {
        let patch = RecordPatch::mark_read();
        let results = join_all(
            ids.iter()
                .map(|id| self.persistence.update(&self.owner_id, id, &patch)),
        )
        .await;

        let failures: Vec<String> = results
            .into_iter()
            .filter_map(|r| r.err())
            .map(|e| format!("{:#}", e))
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(NotifyError::RemoteWriteFailed(format!(
                "{} of {} updates failed: {}",
                failures.len(),
                ids.len(),
                failures.join("; ")
            )))
        }
    }

    async fn delete(&self, id: &str) -> NotifyResult<()> {
        self.persistence
            .delete(&self.owner_id, id)
            .await
            .map_err(NotifyError::remote_write)
    }
}
