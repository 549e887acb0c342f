//! SQLite storage implementation.
//!
//! This module provides the target content store using SQLite.
//! It follows the MutationContext pattern for transaction discipline and audit logging.

use crate::error::{Error, Result};
use crate::model::{Account, EntityRef, PathAlias, Record, TypeRegistry};
use crate::storage::events::{Event, EventType, insert_event};
use crate::storage::schema::apply_schema;
use crate::storage::store::RecordStore;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, Transaction};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

const RECORD_COLUMNS: &str =
    "type_id, local_id, stable_id, bundle, label, changed_time, owner_id, refs, fields";

/// SQLite-based target store.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
    /// Types whose saves write revisions.
    revisionable: HashSet<String>,
}

/// Context for a mutation operation, tracking side effects.
///
/// This struct is passed to mutation closures to record audit events,
/// which are written in the same transaction as the mutation.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Identity performing the operation.
    pub actor: String,
    /// Events to write at the end of the transaction.
    pub events: Vec<Event>,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(op_name: &str, actor: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            actor: actor.to_string(),
            events: Vec::new(),
        }
    }

    /// Record an event for this operation.
    pub fn record_event(&mut self, entity_type: &str, entity_id: &str, event_type: EventType) {
        self.events
            .push(Event::new(entity_type, entity_id, event_type, &self.actor));
    }

    /// Record an event with old/new values for field tracking.
    pub fn record_change(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: EventType,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        self.events.push(
            Event::new(entity_type, entity_id, event_type, &self.actor)
                .with_values(old_value, new_value),
        );
    }
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;

        if let Some(timeout) = timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        } else {
            // Default 5 second timeout
            conn.busy_timeout(Duration::from_secs(5))?;
        }

        apply_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        let mut storage = Self {
            conn,
            revisionable: HashSet::new(),
        };
        storage.use_registry(&TypeRegistry::with_defaults());
        storage
    }

    /// Take revision support for each type from a registry.
    pub fn use_registry(&mut self, registry: &TypeRegistry) {
        self.revisionable = registry
            .all()
            .filter(|t| t.supports_revisions)
            .map(|t| t.id.clone())
            .collect();
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// This method:
    /// 1. Begins an IMMEDIATE transaction (for write locking)
    /// 2. Executes the mutation closure
    /// 3. Writes audit events
    /// 4. Commits (or rolls back on error)
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The transaction is rolled back on error.
    pub fn mutate<F, R>(&mut self, op: &str, actor: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op, actor);

        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;

        Ok(result)
    }

    /// Number of records of a type.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_records(&self, type_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE type_id = ?1",
            [type_id],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Number of revisions stored for a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count_revisions(&self, type_id: &str, local_id: i64) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM revisions WHERE type_id = ?1 AND local_id = ?2",
            rusqlite::params![type_id, local_id],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn load_one(&self, sql: &str, params: impl rusqlite::Params) -> Result<Option<Record>> {
        let mut stmt = self.conn.prepare(sql)?;
        let record = stmt.query_row(params, record_from_row).optional()?;
        Ok(record)
    }
}

/// Decode a JSON column, reporting failures as a conversion error on `idx`.
fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    let references: Vec<EntityRef> = json_column(row, 7)?;
    let fields: Map<String, Value> = json_column(row, 8)?;
    let local_id: i64 = row.get(1)?;

    Ok(Record {
        type_id: row.get(0)?,
        local_id: Some(local_id),
        original_local_id: Some(local_id),
        stable_id: row.get(2)?,
        bundle: row.get(3)?,
        label: row.get(4)?,
        changed_time: row.get(5)?,
        owner_ref: None,
        owner_id: row.get(6)?,
        references,
        fields,
        is_new: false,
        new_revision: true,
    })
}

impl RecordStore for SqliteStorage {
    fn load_by_id(&self, type_id: &str, local_id: i64) -> Result<Option<Record>> {
        self.load_one(
            &format!("SELECT {RECORD_COLUMNS} FROM records WHERE type_id = ?1 AND local_id = ?2"),
            rusqlite::params![type_id, local_id],
        )
    }

    fn load_by_stable_id(&self, type_id: &str, stable_id: &str) -> Result<Option<Record>> {
        self.load_one(
            &format!("SELECT {RECORD_COLUMNS} FROM records WHERE type_id = ?1 AND stable_id = ?2"),
            rusqlite::params![type_id, stable_id],
        )
    }

    fn save(&mut self, record: &mut Record, actor: &Account) -> Result<i64> {
        if record.stable_id.is_empty() {
            record.stable_id = uuid::Uuid::new_v4().to_string();
        }
        let refs = serde_json::to_string(&record.references)?;
        let fields = serde_json::to_string(&record.fields)?;
        let with_revision = record.new_revision && self.revisionable.contains(&record.type_id);
        let now = chrono::Utc::now().timestamp_millis();
        let op = if record.is_new { "create_record" } else { "update_record" };
        let rec = &*record;

        let local_id = self.mutate(op, &actor.name, |tx, ctx| {
            let local_id = match rec.local_id {
                Some(id) => id,
                None => tx.query_row(
                    "SELECT COALESCE(MAX(local_id), 0) + 1 FROM records WHERE type_id = ?1",
                    [&rec.type_id],
                    |row| row.get(0),
                )?,
            };

            if rec.is_new {
                tx.execute(
                    "INSERT INTO records (type_id, local_id, stable_id, bundle, label, changed_time, owner_id, refs, fields, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
                    rusqlite::params![
                        rec.type_id,
                        local_id,
                        rec.stable_id,
                        rec.bundle,
                        rec.label,
                        rec.changed_time,
                        rec.owner_id,
                        refs,
                        fields,
                        now
                    ],
                )?;
                ctx.record_change(
                    &rec.type_id,
                    &rec.stable_id,
                    EventType::RecordCreated,
                    None,
                    Some(local_id.to_string()),
                );
            } else {
                let original = rec.original_local_id.unwrap_or(local_id);
                let rows = tx.execute(
                    "UPDATE records SET local_id = ?1, stable_id = ?2, bundle = ?3, label = ?4,
                       changed_time = ?5, owner_id = ?6, refs = ?7, fields = ?8, updated_at = ?9
                     WHERE type_id = ?10 AND local_id = ?11",
                    rusqlite::params![
                        local_id,
                        rec.stable_id,
                        rec.bundle,
                        rec.label,
                        rec.changed_time,
                        rec.owner_id,
                        refs,
                        fields,
                        now,
                        rec.type_id,
                        original
                    ],
                )?;
                if rows == 0 {
                    return Err(Error::RecordNotFound {
                        type_id: rec.type_id.clone(),
                        id: original.to_string(),
                    });
                }
                ctx.record_change(
                    &rec.type_id,
                    &rec.stable_id,
                    EventType::RecordUpdated,
                    Some(original.to_string()),
                    Some(local_id.to_string()),
                );
            }

            if with_revision {
                tx.execute(
                    "INSERT INTO revisions (type_id, local_id, label, changed_time, fields, actor, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    rusqlite::params![
                        rec.type_id,
                        local_id,
                        rec.label,
                        rec.changed_time,
                        fields,
                        ctx.actor,
                        now
                    ],
                )?;
                tx.execute(
                    "UPDATE records SET revision_id = ?1 WHERE type_id = ?2 AND local_id = ?3",
                    rusqlite::params![tx.last_insert_rowid(), rec.type_id, local_id],
                )?;
            }

            Ok(local_id)
        })?;

        record.local_id = Some(local_id);
        record.original_local_id = Some(local_id);
        record.is_new = false;
        Ok(local_id)
    }

    fn delete(&mut self, record: &Record, actor: &Account) -> Result<()> {
        let Some(local_id) = record.local_id else {
            return Ok(());
        };

        self.mutate("delete_record", &actor.name, |tx, ctx| {
            tx.execute(
                "DELETE FROM records WHERE type_id = ?1 AND local_id = ?2",
                rusqlite::params![record.type_id, local_id],
            )?;
            tx.execute(
                "DELETE FROM revisions WHERE type_id = ?1 AND local_id = ?2",
                rusqlite::params![record.type_id, local_id],
            )?;
            ctx.record_change(
                &record.type_id,
                &record.stable_id,
                EventType::RecordDeleted,
                Some(local_id.to_string()),
                None,
            );
            Ok(())
        })
    }

    fn set_new_revision(&self, record: &mut Record, enabled: bool) -> Result<()> {
        if !self.revisionable.contains(&record.type_id) {
            return Err(Error::Unsupported(format!(
                "Entity type \"{}\" does not keep revisions",
                record.type_id
            )));
        }
        record.new_revision = enabled;
        Ok(())
    }

    fn update_identity(
        &mut self,
        type_id: &str,
        local_id: i64,
        stable_id: &str,
        label: &str,
        actor: &Account,
    ) -> Result<()> {
        let previous = self
            .load_by_id(type_id, local_id)?
            .ok_or_else(|| Error::RecordNotFound {
                type_id: type_id.to_string(),
                id: local_id.to_string(),
            })?;
        let now = chrono::Utc::now().timestamp_millis();

        self.mutate("update_identity", &actor.name, |tx, ctx| {
            tx.execute(
                "UPDATE records SET stable_id = ?1, label = ?2, updated_at = ?3
                 WHERE type_id = ?4 AND local_id = ?5",
                rusqlite::params![stable_id, label, now, type_id, local_id],
            )?;
            ctx.record_change(
                type_id,
                stable_id,
                EventType::IdentityReassigned,
                Some(previous.stable_id.clone()),
                Some(stable_id.to_string()),
            );
            Ok(())
        })
    }

    fn list_ids(&self, type_id: &str, bundles: &[String]) -> Result<Vec<i64>> {
        let mut sql = String::from("SELECT local_id FROM records WHERE type_id = ?1");
        if !bundles.is_empty() {
            let placeholders: Vec<String> =
                (0..bundles.len()).map(|i| format!("?{}", i + 2)).collect();
            sql.push_str(&format!(" AND bundle IN ({})", placeholders.join(", ")));
        }
        sql.push_str(" ORDER BY local_id ASC");

        let params = std::iter::once(type_id).chain(bundles.iter().map(String::as_str));
        let mut stmt = self.conn.prepare(&sql)?;
        let ids = stmt
            .query_map(rusqlite::params_from_iter(params), |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    fn alias_exists(&self, alias: &str, langcode: &str) -> Result<bool> {
        let exists = self
            .conn
            .prepare("SELECT 1 FROM path_aliases WHERE alias = ?1 AND langcode = ?2")?
            .exists([alias, langcode])?;
        Ok(exists)
    }

    fn save_alias(&mut self, alias: &PathAlias, actor: &Account) -> Result<i64> {
        self.mutate("save_alias", &actor.name, |tx, ctx| {
            tx.execute(
                "INSERT INTO path_aliases (source, alias, langcode) VALUES (?1, ?2, ?3)",
                rusqlite::params![alias.source, alias.alias, alias.langcode],
            )?;
            let pid = tx.last_insert_rowid();
            ctx.record_change(
                "path_alias",
                &pid.to_string(),
                EventType::AliasCreated,
                None,
                Some(alias.alias.clone()),
            );
            Ok(pid)
        })
    }

    fn list_aliases(&self) -> Result<Vec<(i64, PathAlias)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT pid, source, alias, langcode FROM path_aliases ORDER BY pid ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get(0)?,
                PathAlias {
                    source: row.get(1)?,
                    alias: row.get(2)?,
                    langcode: row.get(3)?,
                },
            ))
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ROOT_ID, USER_TYPE};
    use crate::storage::events::get_events;
    use crate::storage::store::IdentityResolver;
    use tempfile::TempDir;

    fn admin() -> Account {
        Account::new(ROOT_ID, "admin")
    }

    #[test]
    fn test_open_seeds_identities() {
        let storage = SqliteStorage::open_memory().unwrap();
        let anonymous = storage.load_by_id(USER_TYPE, 0).unwrap().unwrap();
        let root = storage.load_by_id(USER_TYPE, 1).unwrap().unwrap();
        assert_eq!(anonymous.label, "anonymous");
        assert_eq!(root.label, "admin");
        assert_ne!(anonymous.stable_id, root.stable_id);
    }

    #[test]
    fn test_save_assigns_ids() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut record = Record::new("node", "article", "First");

        let id = storage.save(&mut record, &admin()).unwrap();

        assert_eq!(id, 1);
        assert_eq!(record.local_id, Some(1));
        assert!(!record.stable_id.is_empty());
        assert!(!record.is_new);

        let mut second = Record::new("node", "article", "Second");
        assert_eq!(storage.save(&mut second, &admin()).unwrap(), 2);
    }

    #[test]
    fn test_save_round_trips_payload() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut record = Record::new("node", "article", "Tagged")
            .with_stable_id("u1")
            .with_local_id(5)
            .with_changed_time(100)
            .with_reference("field_tags", "taxonomy_term", "t1")
            .with_field("body", serde_json::json!("Hello"));
        record.owner_id = Some(ROOT_ID);
        storage.save(&mut record, &admin()).unwrap();

        let loaded = storage.find_by_stable_id("node", "u1").unwrap().unwrap();
        assert_eq!(loaded.local_id, Some(5));
        assert_eq!(loaded.changed_time, Some(100));
        assert_eq!(loaded.owner_id, Some(ROOT_ID));
        assert_eq!(loaded.references.len(), 1);
        assert_eq!(loaded.field_str("body"), Some("Hello"));
        assert!(storage.find_by_stable_id("node", "").unwrap().is_none());
    }

    #[test]
    fn test_update_moves_row_and_writes_event() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut record = Record::new("node", "page", "Old").with_stable_id("u1");
        storage.save(&mut record, &admin()).unwrap();

        let mut replacement = Record::new("node", "page", "New")
            .with_stable_id("u1")
            .with_changed_time(200);
        replacement.assume_local_id(1);
        storage.save(&mut replacement, &admin()).unwrap();

        let loaded = storage.load_by_id("node", 1).unwrap().unwrap();
        assert_eq!(loaded.label, "New");
        assert_eq!(storage.count_records("node").unwrap(), 1);

        let events = get_events(storage.conn(), "node", "u1", None).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, EventType::RecordUpdated);
        assert_eq!(events[0].actor, "admin");
    }

    #[test]
    fn test_update_missing_row_fails() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut record = Record::new("node", "page", "Ghost").with_stable_id("u9");
        record.assume_local_id(42);

        let result = storage.save(&mut record, &admin());
        assert!(matches!(result, Err(Error::RecordNotFound { .. })));
    }

    #[test]
    fn test_revisions() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut node = Record::new("node", "page", "Rev");
        storage.save(&mut node, &admin()).unwrap();
        assert_eq!(storage.count_revisions("node", 1).unwrap(), 1);

        storage.set_new_revision(&mut node, false).unwrap();
        storage.save(&mut node, &admin()).unwrap();
        assert_eq!(storage.count_revisions("node", 1).unwrap(), 1);

        // menu links keep no revisions
        let mut link = Record::new("menu_link_content", "main", "Home");
        assert!(storage.set_new_revision(&mut link, false).is_err());
    }

    #[test]
    fn test_delete_and_update_identity() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut node = Record::new("node", "page", "Doomed").with_stable_id("old");
        storage.save(&mut node, &admin()).unwrap();

        storage.delete(&node, &admin()).unwrap();
        assert!(storage.load_by_id("node", 1).unwrap().is_none());

        storage
            .update_identity(USER_TYPE, ROOT_ID, "root-uuid", "root", &admin())
            .unwrap();
        let root = storage.load_by_id(USER_TYPE, ROOT_ID).unwrap().unwrap();
        assert_eq!(root.stable_id, "root-uuid");
        assert_eq!(root.label, "root");

        assert!(
            storage
                .update_identity(USER_TYPE, 99, "x", "x", &admin())
                .is_err()
        );
    }

    #[test]
    fn test_list_ids_by_bundle() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        for (bundle, label) in [("page", "A"), ("article", "B"), ("page", "C"), ("blog", "D")] {
            let mut record = Record::new("node", bundle, label);
            storage.save(&mut record, &admin()).unwrap();
        }

        assert_eq!(storage.list_ids("node", &[]).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(
            storage.list_ids("node", &["page".to_string()]).unwrap(),
            vec![1, 3]
        );
        assert_eq!(
            storage
                .list_ids("node", &["article".to_string(), "blog".to_string()])
                .unwrap(),
            vec![2, 4]
        );
    }

    #[test]
    fn test_aliases() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let alias = PathAlias {
            source: "/node/1".to_string(),
            alias: "/about".to_string(),
            langcode: "en".to_string(),
        };

        assert!(!storage.alias_exists("/about", "en").unwrap());
        storage.save_alias(&alias, &admin()).unwrap();
        assert!(storage.alias_exists("/about", "en").unwrap());
        assert!(!storage.alias_exists("/about", "de").unwrap());

        let all = storage.list_aliases().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].1, alias);
    }

    #[test]
    fn test_open_file_database() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("content.db");
        {
            let mut storage = SqliteStorage::open(&db_path).unwrap();
            let mut record = Record::new("node", "page", "Persisted").with_stable_id("p1");
            storage.save(&mut record, &admin()).unwrap();
        }

        let storage = SqliteStorage::open(&db_path).unwrap();
        assert!(storage.load_by_stable_id("node", "p1").unwrap().is_some());
    }
}
