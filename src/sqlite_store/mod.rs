//! SQLite-backed durable store.
//!
//! Implements the persistence interface used by durable `NotificationStore`s
//! and the idempotent procedure that materializes deadline notifications.

mod schema;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

use crate::generation::{GenerationOutcome, NotificationGenerator};
use crate::notifications::{
    now_millis, Notification, NotificationDraft, NotificationKind, NotificationPersistence,
    Priority, RecordFilter, RecordOrder, RecordPatch,
};

const NOTIFICATION_COLUMNS: &str = "id, kind, title, message, related_entity_id, \
     related_entity_label, created_at, read, priority";

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    due_window: Duration,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path`. `due_window` is how far ahead
    /// of a deadline the generator raises a "due" notification.
    pub fn new<P: AsRef<Path>>(db_path: P, due_window: Duration) -> Result<Self> {
        let path = db_path.as_ref();
        let is_new_db = !path.exists();

        let mut conn = Connection::open(path).context("Failed to open notification database")?;

        if is_new_db {
            info!("Creating new notification database at {:?}", path);
            schema::create(&conn)?;
        } else {
            let db_version = schema::read_version(&conn)?;
            if db_version < 1 || db_version > schema::CURRENT_VERSION {
                bail!(
                    "Notification database version {} is invalid (expected 1..={})",
                    db_version,
                    schema::CURRENT_VERSION
                );
            }
            if db_version < schema::CURRENT_VERSION {
                info!(
                    "Migrating notification database from version {} to {}",
                    db_version,
                    schema::CURRENT_VERSION
                );
                schema::migrate(&mut conn, db_version)?;
            }
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            due_window,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("Notification database lock poisoned"))
    }

    /// Insert or replace a deadline. Deadline management lives elsewhere; this
    /// exists so the generator has data to work from.
    pub fn upsert_deadline(
        &self,
        id: &str,
        user_id: &str,
        title: &str,
        due_at: i64,
        completed: bool,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO deadlines (id, user_id, title, due_at, completed)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                user_id = excluded.user_id,
                title = excluded.title,
                due_at = excluded.due_at,
                completed = excluded.completed",
            params![id, user_id, title, due_at, completed],
        )?;
        Ok(())
    }

    /// Run the generation procedure at `now` (Unix millis).
    ///
    /// Every pending deadline gets at most one `deadline_due` and one
    /// `deadline_overdue` notification, however often this runs.
    pub fn generate_at(&self, now: i64) -> Result<u64> {
        let window = self.due_window.as_millis() as i64;
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let due = tx.execute(
            "INSERT OR IGNORE INTO notifications
                (id, user_id, kind, title, message, related_entity_id, related_entity_label,
                 created_at, read, priority, generated_key)
             SELECT lower(hex(randomblob(16))), d.user_id, 'deadline_due',
                    'Deadline approaching', d.title || ' is due soon', d.id, d.title,
                    ?1, 0, 'high', 'deadline_due:' || d.id
             FROM deadlines d
             WHERE d.completed = 0 AND d.due_at > ?1 AND d.due_at <= ?1 + ?2",
            params![now, window],
        )?;

        let overdue = tx.execute(
            "INSERT OR IGNORE INTO notifications
                (id, user_id, kind, title, message, related_entity_id, related_entity_label,
                 created_at, read, priority, generated_key)
             SELECT lower(hex(randomblob(16))), d.user_id, 'deadline_overdue',
                    'Deadline overdue', d.title || ' is past its due date', d.id, d.title,
                    ?1, 0, 'high', 'deadline_overdue:' || d.id
             FROM deadlines d
             WHERE d.completed = 0 AND d.due_at <= ?1",
            params![now],
        )?;

        tx.commit()?;
        debug!("Generated {} due and {} overdue notifications", due, overdue);
        Ok((due + overdue) as u64)
    }

    fn row_to_notification(row: &rusqlite::Row) -> rusqlite::Result<Notification> {
        let kind: String = row.get("kind")?;
        let priority: String = row.get("priority")?;
        Ok(Notification {
            id: row.get("id")?,
            kind: NotificationKind::parse(&kind).unwrap_or(NotificationKind::System),
            title: row.get("title")?,
            message: row.get("message")?,
            related_entity_id: row.get("related_entity_id")?,
            related_entity_label: row.get("related_entity_label")?,
            created_at: row.get("created_at")?,
            read: row.get("read")?,
            priority: Priority::parse(&priority).unwrap_or_default(),
        })
    }
}

#[async_trait]
impl NotificationPersistence for SqliteStore {
    async fn query(
        &self,
        filter: &RecordFilter,
        order: RecordOrder,
        limit: usize,
    ) -> Result<Vec<Notification>> {
        let order_sql = match order {
            RecordOrder::CreatedAtDesc => "created_at DESC, rowid DESC",
        };
        let sql = format!(
            "SELECT {} FROM notifications WHERE user_id = ?1 ORDER BY {} LIMIT ?2",
            NOTIFICATION_COLUMNS, order_sql
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(
                params![filter.owner_id(), limit as i64],
                Self::row_to_notification,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    async fn insert(&self, owner_id: &str, draft: NotificationDraft) -> Result<Notification> {
        let notification = draft.into_notification(uuid::Uuid::new_v4().to_string(), now_millis());

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO notifications
                (id, user_id, kind, title, message, related_entity_id, related_entity_label,
                 created_at, read, priority)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                notification.id,
                owner_id,
                notification.kind.as_str(),
                notification.title,
                notification.message,
                notification.related_entity_id,
                notification.related_entity_label,
                notification.created_at,
                notification.read,
                notification.priority.as_str(),
            ],
        )
        .context("Failed to insert notification")?;

        Ok(notification)
    }

    async fn update(&self, owner_id: &str, id: &str, patch: &RecordPatch) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE notifications SET read = COALESCE(?3, read) WHERE id = ?1 AND user_id = ?2",
            params![id, owner_id, patch.read],
        )
        .context("Failed to update notification")?;
        Ok(())
    }

    async fn delete(&self, owner_id: &str, id: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM notifications WHERE id = ?1 AND user_id = ?2",
            params![id, owner_id],
        )
        .context("Failed to delete notification")?;
        Ok(())
    }
}

#[async_trait]
impl NotificationGenerator for SqliteStore {
    async fn generate(&self) -> Result<GenerationOutcome> {
        let generated = self.generate_at(now_millis())?;
        Ok(GenerationOutcome {
            generated: Some(generated),
        })
    }
}
