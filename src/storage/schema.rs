//! Database schema definitions.
//!
//! This module contains the complete SQLite schema of the target content
//! store and seeds the two identities every store starts with.

use rusqlite::{Connection, OptionalExtension, Result};

use crate::model::{ANONYMOUS_ID, ROOT_ID, USER_TYPE};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema for the content store.
///
/// Note: record `changed_time` values are Unix seconds as carried in content
/// files; bookkeeping timestamps (`created_at`, `updated_at`) are Unix
/// milliseconds.
pub const SCHEMA_SQL: &str = r"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Content Records
-- ====================

-- Records: one row per record, all types share the table
CREATE TABLE IF NOT EXISTS records (
    type_id TEXT NOT NULL,
    local_id INTEGER NOT NULL,
    stable_id TEXT NOT NULL,
    bundle TEXT NOT NULL,
    label TEXT NOT NULL DEFAULT '',
    changed_time INTEGER,
    owner_id INTEGER,
    refs TEXT NOT NULL DEFAULT '[]',
    fields TEXT NOT NULL DEFAULT '{}',
    revision_id INTEGER,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (type_id, local_id)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_records_stable ON records(type_id, stable_id);
CREATE INDEX IF NOT EXISTS idx_records_bundle ON records(type_id, bundle);

-- Revisions: snapshots written when a revisionable record is saved
CREATE TABLE IF NOT EXISTS revisions (
    revision_id INTEGER PRIMARY KEY AUTOINCREMENT,
    type_id TEXT NOT NULL,
    local_id INTEGER NOT NULL,
    label TEXT NOT NULL DEFAULT '',
    changed_time INTEGER,
    fields TEXT NOT NULL DEFAULT '{}',
    actor TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_revisions_record ON revisions(type_id, local_id);

-- ====================
-- URL Aliases
-- ====================

CREATE TABLE IF NOT EXISTS path_aliases (
    pid INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    alias TEXT NOT NULL,
    langcode TEXT NOT NULL,
    UNIQUE(alias, langcode)
);

-- ====================
-- Audit Events
-- ====================

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    actor TEXT NOT NULL,
    old_value TEXT,
    new_value TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id);
";

/// Apply the schema to a database connection.
///
/// Safe to call on every open: all statements are idempotent and the seed
/// identities are only inserted when missing.
///
/// # Errors
///
/// Returns an error if the SQL execution fails or pragmas cannot be set.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    // Set pragmas before schema creation
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;
    seed_identities(conn)?;

    // Record schema version
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}

/// Insert the anonymous and privileged identities if they are missing.
fn seed_identities(conn: &Connection) -> Result<()> {
    for (local_id, name) in [(ANONYMOUS_ID, "anonymous"), (ROOT_ID, "admin")] {
        let exists = conn
            .query_row(
                "SELECT 1 FROM records WHERE type_id = ?1 AND local_id = ?2",
                rusqlite::params![USER_TYPE, local_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if exists {
            continue;
        }

        let now = chrono::Utc::now().timestamp_millis();
        conn.execute(
            "INSERT INTO records (type_id, local_id, stable_id, bundle, label, changed_time, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?1, ?4, ?5, ?6, ?6)",
            rusqlite::params![
                USER_TYPE,
                local_id,
                uuid::Uuid::new_v4().to_string(),
                name,
                now / 1000,
                now
            ],
        )?;
    }
    Ok(())
}
