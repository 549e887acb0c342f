//! Content import with reconciliation.
//!
//! This module imports a content folder into the target store. Files of
//! every content type are scanned into a dependency graph, ordered so that
//! referenced records come first, then each record is reconciled against
//! the store:
//!
//! 1. File records are skipped when no files directory is configured.
//! 2. A stable-id match is updated if the file is newer (identities always
//!    are), otherwise skipped.
//! 3. A local-id collision is skipped, or with `force_update` replaced
//!    (identities only get their stable id and name rewritten).
//! 4. Anything else is created.
//!
//! The run acts as the privileged account, which also becomes the owner of
//! records that have none.

use std::path::{Path, PathBuf};

use chrono::DateTime;
use tracing::{debug, info};

use crate::model::{Account, Record, TypeDescriptor, TypeRegistry, USER_TYPE};
use crate::storage::{IdentityResolver, RecordStore};
use crate::sync::account::{AccountSwitcher, SwitchGuard, privileged_account};
use crate::sync::codec::{Codec, JsonCodec};
use crate::sync::file::{atomic_write, contained_path};
use crate::sync::graph::{ImportContext, SourceFile};
use crate::sync::local_ids::RunIds;
use crate::sync::sort::dependency_order;
use crate::sync::types::{
    ImportLogEntry, ImportOptions, ImportReport, SaveMethod, SyncError, SyncResult,
};

/// Outcome of comparing one incoming record with the store.
#[derive(Debug)]
enum Decision {
    Create,
    Update,
    Skip,
    /// Delete the record holding the claimed local id, then create.
    Replace(Record),
    /// Rewrite the stable id and name of the identity at this local id.
    Reassign(i64),
}

/// Importer for content folders.
///
/// Reads content files and reconciles them with the target store using the
/// configured options.
pub struct Importer<'a, S: RecordStore + ?Sized> {
    storage: &'a mut S,
    registry: &'a TypeRegistry,
    accounts: &'a dyn AccountSwitcher,
    codec: Box<dyn Codec>,
    files_dir: Option<PathBuf>,
    options: ImportOptions,
}

impl<'a, S: RecordStore + ?Sized> Importer<'a, S> {
    /// Create a new importer with default options and the JSON codec.
    #[must_use]
    pub fn new(
        storage: &'a mut S,
        registry: &'a TypeRegistry,
        accounts: &'a dyn AccountSwitcher,
    ) -> Self {
        Self {
            storage,
            registry,
            accounts,
            codec: Box::new(JsonCodec),
            files_dir: None,
            options: ImportOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: ImportOptions) -> Self {
        self.options = options;
        self
    }

    /// Directory file binaries live in. Without one, file records are skipped.
    #[must_use]
    pub fn with_files_dir(mut self, files_dir: Option<PathBuf>) -> Self {
        self.files_dir = files_dir;
        self
    }

    #[must_use]
    pub fn with_codec(mut self, codec: Box<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// Import every content type folder below `content_dir`.
    ///
    /// In dry-run mode every decision is made and counted, but nothing is
    /// written to the store or the files directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The content folder does not exist
    /// - A file cannot be read or decoded
    /// - Two files claim the same stable id (with the default duplicate policy)
    /// - The store fails
    pub fn import(&mut self, content_dir: &Path) -> SyncResult<ImportReport> {
        if !content_dir.is_dir() {
            return Err(SyncError::FileNotFound(content_dir.display().to_string()));
        }

        let registry = self.registry;
        let types = registry.content_types();
        let ctx = ImportContext::build(
            content_dir,
            &types,
            self.codec.as_ref(),
            self.options.duplicate_policy,
        )?;
        let order = dependency_order(&ctx);
        info!(
            files = ctx.file_count(),
            dry_run = self.options.dry_run,
            "Importing content from {}",
            content_dir.display()
        );

        let privileged = privileged_account(&*self.storage)?;
        let accounts = self.accounts;
        let guard = SwitchGuard::new(accounts, privileged);

        let mut ids = RunIds::reserve(ctx.files());
        let mut report = ImportReport::default();
        for vertex in order {
            let stable_id = ctx.stable_id(vertex);
            let Some(source) = ctx.file(stable_id) else {
                debug!(stable_id, "Referenced content has no file, skipping");
                continue;
            };
            report.stats.processed += 1;
            self.reconcile(source, guard.account(), &mut ids, &mut report)?;
        }

        Ok(report)
    }

    fn reconcile(
        &mut self,
        source: &SourceFile,
        actor: &Account,
        ids: &mut RunIds,
        report: &mut ImportReport,
    ) -> SyncResult<()> {
        let registry = self.registry;
        let descriptor = registry
            .get(&source.type_id)
            .ok_or_else(|| SyncError::UnknownType(source.type_id.clone()))?;

        if descriptor.is_file() && self.files_dir.is_none() {
            debug!(file = %source.name(), "No files directory configured, skipping file");
            report.stats.skipped += 1;
            return Ok(());
        }

        let mut record = self
            .codec
            .deserialize(&source.bytes, descriptor)
            .map_err(|e| SyncError::InvalidRecord {
                path: source.path.clone(),
                message: e.to_string(),
            })?;

        if descriptor.is_file() {
            self.ensure_file_binary(&record, source, report)?;
        }

        let dry_run = self.options.dry_run;
        let method = match self.decide(descriptor, &mut record, ids)? {
            Decision::Skip => {
                report.stats.skipped += 1;
                return Ok(());
            }
            Decision::Reassign(local_id) => {
                if !dry_run {
                    self.storage.update_identity(
                        &descriptor.id,
                        local_id,
                        &record.stable_id,
                        &record.label,
                        actor,
                    )?;
                }
                record.local_id = Some(local_id);
                report.stats.updated += 1;
                Self::log_saved(&record, SaveMethod::Updated, source, !dry_run, report);
                return Ok(());
            }
            Decision::Replace(colliding) => {
                if !dry_run {
                    self.storage.delete(&colliding, actor)?;
                }
                record.is_new = true;
                SaveMethod::Created
            }
            Decision::Create => SaveMethod::Created,
            Decision::Update => SaveMethod::Updated,
        };

        if method == SaveMethod::Created {
            if let Some(local_id) = record.local_id {
                ids.mark_created(&descriptor.id, local_id);
            }
        }

        if descriptor.supports_owner {
            self.resolve_owner(&mut record, actor)?;
        }

        if !dry_run {
            self.storage.save(&mut record, actor)?;
        }

        match method {
            SaveMethod::Created => report.stats.created += 1,
            SaveMethod::Updated => report.stats.updated += 1,
        }
        Self::log_saved(&record, method, source, !dry_run, report);
        Ok(())
    }

    fn decide(
        &self,
        descriptor: &TypeDescriptor,
        record: &mut Record,
        ids: &mut RunIds,
    ) -> SyncResult<Decision> {
        if let Some(existing) = self
            .storage
            .find_by_stable_id(&descriptor.id, &record.stable_id)?
        {
            let local_id = existing.local_id.ok_or_else(|| {
                SyncError::Database(format!(
                    "stored {} \"{}\" has no local id",
                    descriptor.id, existing.stable_id
                ))
            })?;

            if descriptor.is_identity() {
                carry_over_fields(record, &existing);
                self.prepare_update(record, local_id);
                return Ok(Decision::Update);
            }

            debug!(
                stable_id = %record.stable_id,
                existing = %format_time(existing.changed_time),
                incoming = %format_time(record.changed_time),
                "Comparing changed times"
            );
            if is_newer(descriptor, &existing, record) {
                self.prepare_update(record, local_id);
                return Ok(Decision::Update);
            }
            return Ok(Decision::Skip);
        }

        let Some(claimed) = record.local_id else {
            record.local_id = Some(self.allocate_local_id(&descriptor.id, ids)?);
            return Ok(Decision::Create);
        };
        if ids.created_in_run(&descriptor.id, claimed) {
            let local_id = self.allocate_local_id(&descriptor.id, ids)?;
            debug!(
                stable_id = %record.stable_id,
                claimed,
                local_id,
                "Local id taken earlier in this run, creating under a new one"
            );
            record.local_id = Some(local_id);
            return Ok(Decision::Create);
        }
        let Some(colliding) = self.storage.find_by_local_id(&descriptor.id, claimed)? else {
            return Ok(Decision::Create);
        };

        debug!(
            stable_id = %record.stable_id,
            holder = %colliding.stable_id,
            local_id = claimed,
            "Local id already taken"
        );
        if !self.options.force_update {
            Ok(Decision::Skip)
        } else if descriptor.is_identity() {
            Ok(Decision::Reassign(claimed))
        } else {
            Ok(Decision::Replace(colliding))
        }
    }

    fn allocate_local_id(&self, type_id: &str, ids: &mut RunIds) -> SyncResult<i64> {
        ids.allocate(type_id, || {
            Ok(self.storage.list_ids(type_id, &[])?.into_iter().max().unwrap_or(0))
        })
    }

    /// Point an incoming record at the stored row it replaces.
    fn prepare_update(&self, record: &mut Record, local_id: i64) {
        record.assume_local_id(local_id);
        if let Err(e) = self.storage.set_new_revision(record, false) {
            debug!(error = %e, "Revision suppression rejected, updating anyway");
        }
    }

    /// Resolve the owner reference, falling back to the acting account.
    fn resolve_owner(&self, record: &mut Record, actor: &Account) -> SyncResult<()> {
        if let Some(owner_ref) = record.owner_ref.as_deref() {
            record.owner_id = self
                .storage
                .find_by_stable_id(USER_TYPE, owner_ref)?
                .and_then(|owner| owner.local_id);
        }
        if !record.has_owner() {
            record.owner_id = Some(actor.id);
        }
        Ok(())
    }

    /// Write a missing file binary from the record's `content` field.
    fn ensure_file_binary(
        &self,
        record: &Record,
        source: &SourceFile,
        report: &mut ImportReport,
    ) -> SyncResult<()> {
        let (Some(files_dir), Some(uri)) = (&self.files_dir, record.field_str("uri")) else {
            return Ok(());
        };
        let target = contained_path(files_dir, uri).ok_or_else(|| SyncError::InvalidRecord {
            path: source.path.clone(),
            message: format!("file uri \"{uri}\" is outside the files directory"),
        })?;
        if target.exists() {
            return Ok(());
        }

        if !self.options.dry_run {
            let content = record.field_str("content").unwrap_or_default();
            atomic_write(&target, content.as_bytes())?;
            info!(uri, "Created missing file");
        }
        report.stats.file_created += 1;
        Ok(())
    }

    fn log_saved(
        record: &Record,
        method: SaveMethod,
        source: &SourceFile,
        applied: bool,
        report: &mut ImportReport,
    ) {
        let entry = ImportLogEntry {
            type_id: record.type_id.clone(),
            bundle: record.bundle.clone(),
            stable_id: record.stable_id.clone(),
            local_id: record.local_id,
            method,
            file: source.name(),
            applied,
        };
        if applied {
            info!(
                entity_type = %entry.type_id,
                bundle = %entry.bundle,
                id = ?entry.local_id,
                method = %entry.method,
                file = %entry.file,
                "Entity {} successfully", entry.method
            );
        } else {
            debug!(entry = %entry, "Dry run");
        }
        report.log.push(entry);
    }
}

/// Whether the incoming record should replace the existing one.
///
/// Types without changed-time support always update.
fn is_newer(descriptor: &TypeDescriptor, existing: &Record, incoming: &Record) -> bool {
    if !descriptor.supports_changed_time {
        return true;
    }
    existing.changed_time.unwrap_or(0) < incoming.changed_time.unwrap_or(0)
}

/// Keep stored fields an identity file does not carry.
fn carry_over_fields(record: &mut Record, existing: &Record) {
    for (name, value) in &existing.fields {
        record
            .fields
            .entry(name.clone())
            .or_insert_with(|| value.clone());
    }
    if record.changed_time.is_none() {
        record.changed_time = existing.changed_time;
    }
}

fn format_time(timestamp: Option<i64>) -> String {
    timestamp
        .and_then(|t| DateTime::from_timestamp(t, 0))
        .map_or_else(|| "-".to_string(), |t| t.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ANONYMOUS_ID, ROOT_ID};
    use crate::storage::SqliteStorage;
    use crate::sync::account::AccountStack;
    use crate::sync::types::{DuplicatePolicy, ImportStats};
    use serde_json::{Value, json};
    use std::fs;
    use tempfile::TempDir;

    fn admin() -> Account {
        Account::new(ROOT_ID, "admin")
    }

    fn write_doc(root: &Path, type_id: &str, name: &str, doc: &Value) {
        let dir = root.join(type_id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), serde_json::to_string_pretty(doc).unwrap()).unwrap();
    }

    fn node(uuid: &str, changed: i64) -> Value {
        json!({"uuid": uuid, "type": "node", "bundle": "page", "label": uuid, "changed": changed})
    }

    fn run_with(
        storage: &mut SqliteStorage,
        root: &Path,
        options: ImportOptions,
        files_dir: Option<PathBuf>,
    ) -> SyncResult<ImportReport> {
        let registry = TypeRegistry::with_defaults();
        let accounts = AccountStack::default();
        Importer::new(storage, &registry, &accounts)
            .with_options(options)
            .with_files_dir(files_dir)
            .import(root)
    }

    fn run(storage: &mut SqliteStorage, root: &Path, options: ImportOptions) -> ImportStats {
        run_with(storage, root, options, None).unwrap().stats
    }

    fn stats(processed: usize, created: usize, updated: usize, skipped: usize) -> ImportStats {
        ImportStats {
            processed,
            created,
            updated,
            skipped,
            file_created: 0,
        }
    }

    #[test]
    fn test_create_into_empty_store() {
        let temp_dir = TempDir::new().unwrap();
        write_doc(temp_dir.path(), "node", "a.json", &node("u1", 100));
        let mut storage = SqliteStorage::open_memory().unwrap();

        let result = run(&mut storage, temp_dir.path(), ImportOptions::default());

        assert_eq!(result, stats(1, 1, 0, 0));
        let saved = storage.load_by_stable_id("node", "u1").unwrap().unwrap();
        assert_eq!(saved.changed_time, Some(100));
        assert_eq!(saved.owner_id, Some(ROOT_ID));
    }

    #[test]
    fn test_skip_when_existing_is_newer() {
        let temp_dir = TempDir::new().unwrap();
        write_doc(temp_dir.path(), "node", "a.json", &node("u1", 100));
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut existing = Record::new("node", "page", "Kept")
            .with_stable_id("u1")
            .with_changed_time(200);
        storage.save(&mut existing, &admin()).unwrap();

        let result = run(&mut storage, temp_dir.path(), ImportOptions::default());

        assert_eq!(result, stats(1, 0, 0, 1));
        let saved = storage.load_by_stable_id("node", "u1").unwrap().unwrap();
        assert_eq!(saved.label, "Kept");
    }

    #[test]
    fn test_skip_when_same_age() {
        let temp_dir = TempDir::new().unwrap();
        write_doc(temp_dir.path(), "node", "a.json", &node("u1", 100));
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut existing = Record::new("node", "page", "Kept")
            .with_stable_id("u1")
            .with_changed_time(100);
        storage.save(&mut existing, &admin()).unwrap();

        let result = run(&mut storage, temp_dir.path(), ImportOptions::default());
        assert_eq!(result, stats(1, 0, 0, 1));
    }

    #[test]
    fn test_update_when_existing_is_older() {
        let temp_dir = TempDir::new().unwrap();
        write_doc(temp_dir.path(), "node", "a.json", &node("u1", 300));
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut existing = Record::new("node", "page", "Old")
            .with_stable_id("u1")
            .with_local_id(4)
            .with_changed_time(200);
        storage.save(&mut existing, &admin()).unwrap();
        assert_eq!(storage.count_revisions("node", 4).unwrap(), 1);

        let report = run_with(&mut storage, temp_dir.path(), ImportOptions::default(), None)
            .unwrap();

        assert_eq!(report.stats, stats(1, 0, 1, 0));
        assert_eq!(report.log[0].local_id, Some(4));
        assert_eq!(report.log[0].method, SaveMethod::Updated);
        let saved = storage.load_by_id("node", 4).unwrap().unwrap();
        assert_eq!(saved.label, "u1");
        assert_eq!(saved.changed_time, Some(300));
        // update suppresses the new revision
        assert_eq!(storage.count_revisions("node", 4).unwrap(), 1);
    }

    #[test]
    fn test_update_without_revision_support() {
        let temp_dir = TempDir::new().unwrap();
        write_doc(
            temp_dir.path(),
            "menu_link_content",
            "home.json",
            &json!({"uuid": "m1", "type": "menu_link_content", "bundle": "main", "label": "Home", "changed": 20}),
        );
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut existing = Record::new("menu_link_content", "main", "Start")
            .with_stable_id("m1")
            .with_changed_time(10);
        storage.save(&mut existing, &admin()).unwrap();

        let result = run(&mut storage, temp_dir.path(), ImportOptions::default());
        assert_eq!(result, stats(1, 0, 1, 0));
    }

    #[test]
    fn test_missing_changed_time_forces_update() {
        let temp_dir = TempDir::new().unwrap();
        write_doc(
            temp_dir.path(),
            "paragraph",
            "p.json",
            &json!({"uuid": "p1", "type": "paragraph", "bundle": "text", "label": "Same"}),
        );
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut existing = Record::new("paragraph", "text", "Same").with_stable_id("p1");
        storage.save(&mut existing, &admin()).unwrap();

        let result = run(&mut storage, temp_dir.path(), ImportOptions::default());
        assert_eq!(result, stats(1, 0, 1, 0));
    }

    #[test]
    fn test_dependencies_are_imported_first() {
        let temp_dir = TempDir::new().unwrap();
        let mut a = node("u1", 100);
        a["_embedded"] = json!({"field_ref": [{"uuid": "u2", "type": "node"}]});
        write_doc(temp_dir.path(), "node", "a.json", &a);
        write_doc(temp_dir.path(), "node", "b.json", &node("u2", 100));
        let mut storage = SqliteStorage::open_memory().unwrap();

        let report = run_with(&mut storage, temp_dir.path(), ImportOptions::default(), None)
            .unwrap();

        assert_eq!(report.stats, stats(2, 2, 0, 0));
        let order: Vec<_> = report.log.iter().map(|e| e.stable_id.as_str()).collect();
        assert_eq!(order, vec!["u2", "u1"]);
        assert_eq!(report.log[0].file, "b.json");
    }

    #[test]
    fn test_dependency_in_other_type_imported_first() {
        let temp_dir = TempDir::new().unwrap();
        // node is scanned before taxonomy_term but references it
        let mut article = node("u1", 100);
        article["_embedded"] = json!({"field_tags": [{"uuid": "t1", "type": "taxonomy_term"}]});
        write_doc(temp_dir.path(), "node", "a.json", &article);
        write_doc(
            temp_dir.path(),
            "taxonomy_term",
            "t.json",
            &json!({"uuid": "t1", "type": "taxonomy_term", "bundle": "tags", "label": "Rust", "changed": 1}),
        );
        let mut storage = SqliteStorage::open_memory().unwrap();

        let report = run_with(&mut storage, temp_dir.path(), ImportOptions::default(), None)
            .unwrap();
        let order: Vec<_> = report.log.iter().map(|e| e.stable_id.as_str()).collect();
        assert_eq!(order, vec!["t1", "u1"]);
    }

    #[test]
    fn test_local_id_collision_skipped_without_force() {
        let temp_dir = TempDir::new().unwrap();
        let mut incoming = node("new-uuid", 100);
        incoming["id"] = json!(5);
        write_doc(temp_dir.path(), "node", "a.json", &incoming);
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut existing = Record::new("node", "page", "Existing")
            .with_stable_id("old-uuid")
            .with_local_id(5);
        storage.save(&mut existing, &admin()).unwrap();

        let result = run(&mut storage, temp_dir.path(), ImportOptions::default());

        assert_eq!(result, stats(1, 0, 0, 1));
        let holder = storage.load_by_id("node", 5).unwrap().unwrap();
        assert_eq!(holder.stable_id, "old-uuid");
    }

    #[test]
    fn test_local_id_collision_replaced_with_force() {
        let temp_dir = TempDir::new().unwrap();
        let mut incoming = node("new-uuid", 100);
        incoming["id"] = json!(5);
        write_doc(temp_dir.path(), "node", "a.json", &incoming);
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut existing = Record::new("node", "page", "Existing")
            .with_stable_id("old-uuid")
            .with_local_id(5);
        storage.save(&mut existing, &admin()).unwrap();

        let result = run(
            &mut storage,
            temp_dir.path(),
            ImportOptions::default().force_update(true),
        );

        assert_eq!(result, stats(1, 1, 0, 0));
        let holder = storage.load_by_id("node", 5).unwrap().unwrap();
        assert_eq!(holder.stable_id, "new-uuid");
        assert!(storage.load_by_stable_id("node", "old-uuid").unwrap().is_none());
        assert_eq!(storage.count_records("node").unwrap(), 1);
    }

    #[test]
    fn test_identity_always_updated_and_keeps_fields() {
        let temp_dir = TempDir::new().unwrap();
        write_doc(
            temp_dir.path(),
            "user",
            "editor.json",
            &json!({"uuid": "user-2", "type": "user", "bundle": "user", "label": "renamed", "changed": 100}),
        );
        let mut storage = SqliteStorage::open_memory().unwrap();
        let mut existing = Record::new("user", "user", "editor")
            .with_stable_id("user-2")
            .with_changed_time(500)
            .with_field("pass", json!("secret"));
        storage.save(&mut existing, &admin()).unwrap();

        let result = run(&mut storage, temp_dir.path(), ImportOptions::default());

        assert_eq!(result, stats(1, 0, 1, 0));
        let saved = storage.load_by_stable_id("user", "user-2").unwrap().unwrap();
        assert_eq!(saved.label, "renamed");
        assert_eq!(saved.field_str("pass"), Some("secret"));
        assert_eq!(saved.changed_time, Some(100));
    }

    #[test]
    fn test_identity_collision_rewrites_identity_with_force() {
        let temp_dir = TempDir::new().unwrap();
        write_doc(
            temp_dir.path(),
            "user",
            "root.json",
            &json!({"uuid": "site-root", "type": "user", "bundle": "user", "id": 1, "label": "root"}),
        );
        let mut storage = SqliteStorage::open_memory().unwrap();

        let result = run(&mut storage, temp_dir.path(), ImportOptions::default());
        assert_eq!(result, stats(1, 0, 0, 1));
        assert_eq!(storage.load_by_id("user", 1).unwrap().unwrap().label, "admin");

        let result = run(
            &mut storage,
            temp_dir.path(),
            ImportOptions::default().force_update(true),
        );
        assert_eq!(result, stats(1, 0, 1, 0));
        let root = storage.load_by_id("user", 1).unwrap().unwrap();
        assert_eq!(root.stable_id, "site-root");
        assert_eq!(root.label, "root");
        assert_eq!(storage.count_records("user").unwrap(), 2);
    }

    #[test]
    fn test_idempotent_second_run() {
        let temp_dir = TempDir::new().unwrap();
        let mut a = node("u1", 100);
        a["_embedded"] = json!({"field_ref": [{"uuid": "u2", "type": "node"}]});
        write_doc(temp_dir.path(), "node", "a.json", &a);
        write_doc(temp_dir.path(), "node", "b.json", &node("u2", 100));
        let mut storage = SqliteStorage::open_memory().unwrap();

        let first = run(&mut storage, temp_dir.path(), ImportOptions::default());
        assert_eq!(first, stats(2, 2, 0, 0));

        let second = run(&mut storage, temp_dir.path(), ImportOptions::default());
        assert_eq!(second, stats(2, 0, 0, 2));
    }

    fn mixed_fixture(storage: &mut SqliteStorage, root: &Path) {
        write_doc(root, "node", "a.json", &node("fresh", 100));
        write_doc(root, "node", "b.json", &node("older", 300));
        write_doc(root, "node", "c.json", &node("newer", 100));
        let mut incoming = node("claims-9", 100);
        incoming["id"] = json!(9);
        write_doc(root, "node", "d.json", &incoming);

        for (stable_id, local_id, changed) in [("older", 1, 200), ("newer", 2, 500), ("holder", 9, 1)] {
            let mut record = Record::new("node", "page", stable_id)
                .with_stable_id(stable_id)
                .with_local_id(local_id)
                .with_changed_time(changed);
            storage.save(&mut record, &admin()).unwrap();
        }
    }

    #[test]
    fn test_dry_run_matches_write_run() {
        let temp_dir = TempDir::new().unwrap();
        let mut preview_store = SqliteStorage::open_memory().unwrap();
        let mut write_store = SqliteStorage::open_memory().unwrap();
        mixed_fixture(&mut preview_store, temp_dir.path());
        mixed_fixture(&mut write_store, temp_dir.path());

        for force in [false, true] {
            let options = ImportOptions::default().force_update(force);
            let preview = run_with(
                &mut preview_store,
                temp_dir.path(),
                options.dry_run(true),
                None,
            )
            .unwrap();

            assert_eq!(preview_store.count_records("node").unwrap(), 3);
            assert!(preview.log.iter().all(|e| !e.applied));

            if force {
                let written = run(&mut write_store, temp_dir.path(), options);
                assert_eq!(preview.stats, written);
                assert_eq!(written, stats(4, 2, 1, 1));
            } else {
                assert_eq!(preview.stats, stats(4, 1, 1, 2));
            }
        }

        let holder = preview_store.load_by_id("node", 9).unwrap().unwrap();
        assert_eq!(holder.stable_id, "holder");
        let older = preview_store.load_by_id("node", 1).unwrap().unwrap();
        assert_eq!(older.changed_time, Some(200));
    }

    #[test]
    fn test_local_ids_claimed_later_in_run_are_reserved() {
        let temp_dir = TempDir::new().unwrap();
        write_doc(temp_dir.path(), "node", "a.json", &node("A", 100));
        let mut claims_one = node("B", 100);
        claims_one["id"] = json!(1);
        write_doc(temp_dir.path(), "node", "b.json", &claims_one);

        for force in [false, true] {
            let mut storage = SqliteStorage::open_memory().unwrap();
            let options = ImportOptions::default().force_update(force);

            let preview = run(&mut storage, temp_dir.path(), options.dry_run(true));
            let written = run(&mut storage, temp_dir.path(), options);

            assert_eq!(preview, written);
            assert_eq!(written, stats(2, 2, 0, 0));
            assert_eq!(storage.count_records("node").unwrap(), 2);
            let a = storage.load_by_stable_id("node", "A").unwrap().unwrap();
            let b = storage.load_by_stable_id("node", "B").unwrap().unwrap();
            assert_eq!(b.local_id, Some(1));
            assert_eq!(a.local_id, Some(2));
        }
    }

    #[test]
    fn test_duplicate_stable_id_aborts_before_saving() {
        let temp_dir = TempDir::new().unwrap();
        write_doc(temp_dir.path(), "node", "a.json", &node("u1", 100));
        write_doc(temp_dir.path(), "node", "b.json", &node("u1", 200));
        write_doc(temp_dir.path(), "node", "c.json", &node("u3", 200));
        let mut storage = SqliteStorage::open_memory().unwrap();

        let err = run_with(&mut storage, temp_dir.path(), ImportOptions::default(), None)
            .unwrap_err();

        match err {
            SyncError::DuplicateIdentity { first, second, .. } => {
                assert!(first.ends_with("a.json"));
                assert!(second.ends_with("b.json"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(storage.count_records("node").unwrap(), 0);
    }

    #[test]
    fn test_duplicate_keep_first() {
        let temp_dir = TempDir::new().unwrap();
        write_doc(temp_dir.path(), "node", "a.json", &node("u1", 100));
        let mut second = node("u1", 200);
        second["label"] = json!("second");
        write_doc(temp_dir.path(), "node", "b.json", &second);
        let mut storage = SqliteStorage::open_memory().unwrap();

        let options = ImportOptions::default().duplicate_policy(DuplicatePolicy::KeepFirst);
        let result = run(&mut storage, temp_dir.path(), options);

        assert_eq!(result, stats(1, 1, 0, 0));
        let saved = storage.load_by_stable_id("node", "u1").unwrap().unwrap();
        assert_eq!(saved.label, "u1");
    }

    #[test]
    fn test_dangling_reference_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let mut a = node("u1", 100);
        a["_embedded"] = json!({"field_ref": [{"uuid": "ghost", "type": "node"}]});
        write_doc(temp_dir.path(), "node", "a.json", &a);
        let mut storage = SqliteStorage::open_memory().unwrap();

        let result = run(&mut storage, temp_dir.path(), ImportOptions::default());
        assert_eq!(result, stats(1, 1, 0, 0));
    }

    #[test]
    fn test_cycle_imports_every_record() {
        let temp_dir = TempDir::new().unwrap();
        let mut a = node("a", 100);
        a["_embedded"] = json!({"field_ref": [{"uuid": "b", "type": "node"}]});
        let mut b = node("b", 100);
        b["_embedded"] = json!({"field_ref": [{"uuid": "a", "type": "node"}]});
        write_doc(temp_dir.path(), "node", "a.json", &a);
        write_doc(temp_dir.path(), "node", "b.json", &b);
        let mut storage = SqliteStorage::open_memory().unwrap();

        let report = run_with(&mut storage, temp_dir.path(), ImportOptions::default(), None)
            .unwrap();

        assert_eq!(report.stats, stats(2, 2, 0, 0));
        let order: Vec<_> = report.log.iter().map(|e| e.stable_id.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn test_config_types_are_not_imported() {
        let temp_dir = TempDir::new().unwrap();
        write_doc(
            temp_dir.path(),
            "node_type",
            "page.json",
            &json!({"uuid": "cfg", "type": "node_type"}),
        );
        let mut storage = SqliteStorage::open_memory().unwrap();

        let result = run(&mut storage, temp_dir.path(), ImportOptions::default());
        assert_eq!(result, ImportStats::default());
    }

    #[test]
    fn test_owner_never_anonymous() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = SqliteStorage::open_memory().unwrap();
        let anonymous = storage.load_by_id(USER_TYPE, ANONYMOUS_ID).unwrap().unwrap();
        let mut author = Record::new("user", "user", "author").with_stable_id("author");
        let author_id = storage.save(&mut author, &admin()).unwrap();

        let mut by_anonymous = node("n1", 100);
        by_anonymous["owner"] = json!(anonymous.stable_id);
        let mut by_unknown = node("n2", 100);
        by_unknown["owner"] = json!("nobody");
        let mut by_author = node("n3", 100);
        by_author["owner"] = json!("author");
        write_doc(temp_dir.path(), "node", "1.json", &by_anonymous);
        write_doc(temp_dir.path(), "node", "2.json", &by_unknown);
        write_doc(temp_dir.path(), "node", "3.json", &by_author);

        run(&mut storage, temp_dir.path(), ImportOptions::default());

        let owner = |id: &str| {
            storage
                .load_by_stable_id("node", id)
                .unwrap()
                .unwrap()
                .owner_id
        };
        assert_eq!(owner("n1"), Some(ROOT_ID));
        assert_eq!(owner("n2"), Some(ROOT_ID));
        assert_eq!(owner("n3"), Some(author_id));
    }

    #[test]
    fn test_file_records_skipped_without_files_dir() {
        let temp_dir = TempDir::new().unwrap();
        write_doc(
            temp_dir.path(),
            "file",
            "f.json",
            &json!({"uuid": "f1", "type": "file", "bundle": "file", "fields": {"uri": "a.txt"}}),
        );
        let mut storage = SqliteStorage::open_memory().unwrap();

        let result = run(&mut storage, temp_dir.path(), ImportOptions::default());

        assert_eq!(result, stats(1, 0, 0, 1));
        assert_eq!(storage.count_records("file").unwrap(), 0);
    }

    #[test]
    fn test_missing_file_binary_is_created() {
        let temp_dir = TempDir::new().unwrap();
        let content_dir = temp_dir.path().join("content");
        let files_dir = temp_dir.path().join("files");
        write_doc(
            &content_dir,
            "file",
            "f.json",
            &json!({
                "uuid": "f1", "type": "file", "bundle": "file", "changed": 10,
                "fields": {"uri": "docs/readme.txt", "content": "hello"}
            }),
        );
        let mut storage = SqliteStorage::open_memory().unwrap();
        let binary = files_dir.join("docs").join("readme.txt");

        let preview = run_with(
            &mut storage,
            &content_dir,
            ImportOptions::default().dry_run(true),
            Some(files_dir.clone()),
        )
        .unwrap();
        assert_eq!(preview.stats.file_created, 1);
        assert!(!binary.exists());

        let written = run_with(
            &mut storage,
            &content_dir,
            ImportOptions::default(),
            Some(files_dir.clone()),
        )
        .unwrap();
        assert_eq!(written.stats.file_created, 1);
        assert_eq!(written.stats.created, 1);
        assert_eq!(fs::read_to_string(&binary).unwrap(), "hello");

        let again = run_with(&mut storage, &content_dir, ImportOptions::default(), Some(files_dir))
            .unwrap();
        assert_eq!(again.stats.file_created, 0);
        assert_eq!(again.stats.skipped, 1);
    }

    #[test]
    fn test_privileged_account_restored_after_error() {
        let temp_dir = TempDir::new().unwrap();
        let files_dir = temp_dir.path().join("files");
        let content_dir = temp_dir.path().join("content");
        write_doc(
            &content_dir,
            "file",
            "f.json",
            &json!({"uuid": "f1", "type": "file", "fields": {"uri": "../escape.txt"}}),
        );
        let mut storage = SqliteStorage::open_memory().unwrap();
        let registry = TypeRegistry::with_defaults();
        let accounts = AccountStack::default();

        let result = Importer::new(&mut storage, &registry, &accounts)
            .with_files_dir(Some(files_dir))
            .import(&content_dir);

        assert!(matches!(result, Err(SyncError::InvalidRecord { .. })));
        assert!(accounts.current().is_anonymous());
        assert_eq!(accounts.depth(), 0);
    }

    #[test]
    fn test_missing_content_dir() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = SqliteStorage::open_memory().unwrap();

        let result = run_with(
            &mut storage,
            &temp_dir.path().join("missing"),
            ImportOptions::default(),
            None,
        );
        assert!(matches!(result, Err(SyncError::FileNotFound(_))));
    }
}
