//! Persistence interface consumed by the durable notification backend.

use anyhow::Result;
use async_trait::async_trait;

use super::models::{Notification, NotificationDraft};

/// Maximum number of records a durable `list()` pulls from the store.
pub const FETCH_LIMIT: usize = 50;

/// Query filter. Every filter is scoped to an owner; there is no way to build
/// an unscoped one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFilter {
    owner_id: String,
}

impl RecordFilter {
    pub fn owned_by(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }
}

/// Result ordering. Newest first, ties broken by insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordOrder {
    #[default]
    CreatedAtDesc,
}

/// Partial update applied to a stored record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub read: Option<bool>,
}

impl RecordPatch {
    pub fn mark_read() -> Self {
        Self { read: Some(true) }
    }
}

/// Durable store for notification records.
///
/// Implementations assign `id` and `created_at` on insert and must return the
/// stored record. `update` and `delete` on an id that doesn't exist (or belongs
/// to another owner) succeed without effect.
#[async_trait]
pub trait NotificationPersistence: Send + Sync {
    async fn query(
        &self,
        filter: &RecordFilter,
        order: RecordOrder,
        limit: usize,
    ) -> Result<Vec<Notification>>;

    async fn insert(&self, owner_id: &str, draft: NotificationDraft) -> Result<Notification>;

    async fn update(&self, owner_id: &str, id: &str, patch: &RecordPatch) -> Result<()>;

    async fn delete(&self, owner_id: &str, id: &str) -> Result<()>;
}
