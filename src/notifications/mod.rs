//! Notification records and the store that caches them for a view.

mod backend;
mod models;
mod persistence;
mod store;

pub use backend::{DurableBackend, EphemeralBackend, NotificationBackend, StoreMode};
pub use models::{Notification, NotificationDraft, NotificationKind, NotificationSnapshot, Priority};
pub use persistence::{NotificationPersistence, RecordFilter, RecordOrder, RecordPatch, FETCH_LIMIT};
pub use store::NotificationStore;

pub(crate) use models::now_millis;
