//! SQLite schema for the notification database.

use anyhow::Result;
use rusqlite::Connection;

/// Offset added to the schema version stored in `PRAGMA user_version`, so a
/// foreign database is never mistaken for one of ours.
pub const BASE_DB_VERSION: i64 = 7000;

pub const CURRENT_VERSION: i64 = 2;

// =============================================================================
// Version 1 - Notifications and deadlines
// =============================================================================

const V1: &str = "
CREATE TABLE notifications (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    title TEXT NOT NULL,
    message TEXT NOT NULL,
    related_entity_id TEXT,
    related_entity_label TEXT,
    created_at INTEGER NOT NULL,
    read INTEGER NOT NULL DEFAULT 0,
    priority TEXT NOT NULL DEFAULT 'medium'
);
CREATE INDEX idx_notifications_user_created ON notifications (user_id, created_at DESC);

CREATE TABLE deadlines (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    title TEXT NOT NULL,
    due_at INTEGER NOT NULL,
    completed INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX idx_deadlines_due ON deadlines (completed, due_at);
";

// =============================================================================
// Version 2 - Generated notification dedup key
// =============================================================================

/// One generated notification per (kind, deadline). NULL for notifications
/// created directly, and SQLite lets NULLs repeat under a unique index.
const V2: &str = "
ALTER TABLE notifications ADD COLUMN generated_key TEXT;
CREATE UNIQUE INDEX idx_notifications_generated_key ON notifications (generated_key);
";

pub fn create(conn: &Connection) -> Result<()> {
    conn.execute_batch(V1)?;
    conn.execute_batch(V2)?;
    set_version(conn, CURRENT_VERSION)
}

pub fn migrate(conn: &mut Connection, from_version: i64) -> Result<()> {
    let tx = conn.transaction()?;
    if from_version < 2 {
        tx.execute_batch(V2)?;
    }
    set_version(&tx, CURRENT_VERSION)?;
    tx.commit()?;
    Ok(())
}

pub fn read_version(conn: &Connection) -> Result<i64> {
    let raw: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    Ok(raw - BASE_DB_VERSION)
}

fn set_version(conn: &Connection, version: i64) -> Result<()> {
    conn.execute_batch(&format!(
        "PRAGMA user_version = {};",
        BASE_DB_VERSION + version
    ))?;
    Ok(())
}
