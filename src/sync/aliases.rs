//! URL alias import and export.
//!
//! Aliases travel in a single `<content>/aliases/aliases.json` file, an
//! object keyed by alias id:
//!
//! ```json
//! { "1": { "source": "/node/1", "alias": "/about", "langcode": "en" } }
//! ```
//!
//! A plain array of aliases is accepted on import as well.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::model::{Account, PathAlias};
use crate::storage::RecordStore;
use crate::sync::file::atomic_write;
use crate::sync::types::{AliasImportStats, SyncError, SyncResult};

/// Folder of the alias file inside the content folder.
pub const ALIAS_DIR: &str = "aliases";

const ALIAS_FILE: &str = "aliases.json";

#[derive(Deserialize)]
#[serde(untagged)]
enum AliasFile {
    Keyed(BTreeMap<String, PathAlias>),
    List(Vec<PathAlias>),
}

impl AliasFile {
    /// Aliases in id order; non-numeric keys sort last.
    fn into_aliases(self) -> Vec<PathAlias> {
        match self {
            Self::List(aliases) => aliases,
            Self::Keyed(map) => {
                let mut entries: Vec<_> = map.into_iter().collect();
                entries.sort_by_key(|(key, _)| (key.parse::<i64>().unwrap_or(i64::MAX), key.clone()));
                entries.into_iter().map(|(_, alias)| alias).collect()
            }
        }
    }
}

/// Path of the alias file.
#[must_use]
pub fn alias_file(content_dir: &Path) -> PathBuf {
    content_dir.join(ALIAS_DIR).join(ALIAS_FILE)
}

/// Import URL aliases, skipping those whose alias and language exist.
///
/// A missing alias file imports nothing.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or the store fails.
pub fn import_aliases<S: RecordStore + ?Sized>(
    storage: &mut S,
    content_dir: &Path,
    actor: &Account,
    dry_run: bool,
) -> SyncResult<AliasImportStats> {
    let path = alias_file(content_dir);
    let mut stats = AliasImportStats::default();
    if !path.exists() {
        debug!(path = %path.display(), "No alias file");
        return Ok(stats);
    }

    let raw = fs::read(&path)?;
    let file: AliasFile = serde_json::from_slice(&raw).map_err(|e| SyncError::InvalidRecord {
        path: path.clone(),
        message: e.to_string(),
    })?;

    // aliases a dry run would have saved, so repeats in the file still skip
    let mut pending: HashSet<(String, String)> = HashSet::new();
    for alias in file.into_aliases() {
        let key = (alias.alias.clone(), alias.langcode.clone());
        if pending.contains(&key) || storage.alias_exists(&alias.alias, &alias.langcode)? {
            stats.skipped += 1;
            continue;
        }
        if !dry_run {
            storage.save_alias(&alias, actor)?;
        }
        pending.insert(key);
        stats.imported += 1;
    }

    info!(
        imported = stats.imported,
        skipped = stats.skipped,
        dry_run,
        "Imported URL aliases"
    );
    Ok(stats)
}

/// Export every URL alias to the alias file, returning how many were written.
///
/// # Errors
///
/// Returns an error if the store query or the file write fails.
pub fn export_aliases<S: RecordStore + ?Sized>(
    storage: &S,
    content_dir: &Path,
) -> SyncResult<usize> {
    let aliases = storage.list_aliases()?;
    let keyed: BTreeMap<String, &PathAlias> = aliases
        .iter()
        .map(|(pid, alias)| (pid.to_string(), alias))
        .collect();

    let mut content = serde_json::to_string_pretty(&keyed)?;
    content.push('\n');
    atomic_write(&alias_file(content_dir), content.as_bytes())?;
    Ok(aliases.len())
}
