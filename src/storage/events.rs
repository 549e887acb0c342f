//! Audit event storage and retrieval.
//!
//! Every mutation of the target store writes an event carrying the acting
//! identity, so imports run as the privileged account are traceable.

use rusqlite::{Connection, Result};

/// Event types for audit logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    RecordCreated,
    RecordUpdated,
    RecordDeleted,
    IdentityReassigned,
    AliasCreated,
}

impl EventType {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RecordCreated => "record_created",
            Self::RecordUpdated => "record_updated",
            Self::RecordDeleted => "record_deleted",
            Self::IdentityReassigned => "identity_reassigned",
            Self::AliasCreated => "alias_created",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "record_created" => Some(Self::RecordCreated),
            "record_updated" => Some(Self::RecordUpdated),
            "record_deleted" => Some(Self::RecordDeleted),
            "identity_reassigned" => Some(Self::IdentityReassigned),
            "alias_created" => Some(Self::AliasCreated),
            _ => None,
        }
    }
}

/// An audit event record.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: String,
    pub event_type: EventType,
    pub actor: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub created_at: i64,
}

impl Event {
    /// Create a new event (id will be assigned by database).
    #[must_use]
    pub fn new(entity_type: &str, entity_id: &str, event_type: EventType, actor: &str) -> Self {
        Self {
            id: 0,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            event_type,
            actor: actor.to_string(),
            old_value: None,
            new_value: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Add old/new values for field change tracking.
    #[must_use]
    pub fn with_values(mut self, old: Option<String>, new: Option<String>) -> Self {
        self.old_value = old;
        self.new_value = new;
        self
    }
}

/// Insert an event into the database.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_event(conn: &Connection, event: &Event) -> Result<i64> {
    conn.execute(
        "INSERT INTO events (entity_type, entity_id, event_type, actor, old_value, new_value, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            event.entity_type,
            event.entity_id,
            event.event_type.as_str(),
            event.actor,
            event.old_value,
            event.new_value,
            event.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get events for an entity, newest first.
///
/// Rows with an event type this build does not know are skipped.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_events(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
    limit: Option<u32>,
) -> Result<Vec<Event>> {
    let limit = limit.unwrap_or(100);
    let mut stmt = conn.prepare(
        "SELECT id, entity_type, entity_id, event_type, actor, old_value, new_value, created_at
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id DESC
         LIMIT ?3",
    )?;

    let rows = stmt.query_map(rusqlite::params![entity_type, entity_id, limit], |row| {
        let kind: String = row.get(3)?;
        let Some(event_type) = EventType::parse(&kind) else {
            return Ok(None);
        };
        Ok(Some(Event {
            id: row.get(0)?,
            entity_type: row.get(1)?,
            entity_id: row.get(2)?,
            event_type,
            actor: row.get(4)?,
            old_value: row.get(5)?,
            new_value: row.get(6)?,
            created_at: row.get(7)?,
        }))
    })?;

    let mut events = Vec::new();
    for row in rows {
        if let Some(event) = row? {
            events.push(event);
        }
    }
    Ok(events)
}
