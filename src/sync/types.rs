//! Sync types for content import and export.
//!
//! This module defines the options, counters, log entries and errors shared
//! by the importer, the exporter and the alias side channel.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What to do when two files claim the same stable id in one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Abort the run with `SyncError::DuplicateIdentity`.
    #[default]
    Abort,
    /// Log a warning and keep the first file seen.
    KeepFirst,
}

/// Options for one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Replace existing records that hold the same local id under a
    /// different stable id.
    pub force_update: bool,
    /// Compute and count every decision without writing anything.
    pub dry_run: bool,
    pub duplicate_policy: DuplicatePolicy,
}

impl ImportOptions {
    #[must_use]
    pub fn force_update(mut self, force: bool) -> Self {
        self.force_update = force;
        self
    }

    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }
}

/// How a record reached the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveMethod {
    Created,
    Updated,
}

impl fmt::Display for SaveMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
        }
    }
}

/// Counters for an import run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    /// Records with a backing file that reached reconciliation.
    pub processed: usize,
    /// Number of new records created.
    pub created: usize,
    /// Number of existing records updated.
    pub updated: usize,
    /// Number of records left untouched.
    pub skipped: usize,
    /// Number of file binaries synthesized because they were missing.
    pub file_created: usize,
}

impl ImportStats {
    /// Number of changes a write run would apply.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.created + self.updated + self.file_created
    }

    /// Returns true if a write run would change nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.pending() == 0
    }
}

/// One saved (or, in dry-run mode, would-be saved) record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportLogEntry {
    pub type_id: String,
    pub bundle: String,
    pub stable_id: String,
    /// Local id after the save, or the one a dry run would use.
    pub local_id: Option<i64>,
    pub method: SaveMethod,
    /// Name of the source file.
    pub file: String,
    /// False for dry-run entries.
    pub applied: bool,
}

impl fmt::Display for ImportLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self
            .local_id
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        write!(
            f,
            "{}/{}, id {}, {} from {}",
            self.type_id, self.bundle, id, self.method, self.file
        )
    }
}

/// Result of an import run: counters plus the per-record log.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ImportReport {
    #[serde(flatten)]
    pub stats: ImportStats,
    pub log: Vec<ImportLogEntry>,
}

/// Counters for the URL alias side channel.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AliasImportStats {
    pub imported: usize,
    pub skipped: usize,
}

/// Statistics for an export operation.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ExportStats {
    /// Records written, per type.
    pub exported: BTreeMap<String, usize>,
    /// Records whose file already held identical content.
    pub unchanged: usize,
    /// Aliases written.
    pub aliases: usize,
}

impl ExportStats {
    /// Total number of records exported (written or already current).
    #[must_use]
    pub fn total(&self) -> usize {
        self.exported.values().sum::<usize>() + self.unchanged
    }

    /// Returns true if nothing was exported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0 && self.aliases == 0
    }

    pub(crate) fn record(&mut self, type_id: &str, written: bool) {
        if written {
            *self.exported.entry(type_id.to_string()).or_default() += 1;
        } else {
            self.unchanged += 1;
        }
    }
}

/// Sync-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error reported by the target store.
    #[error("Database error: {0}")]
    Database(String),

    /// Content folder or file not found.
    #[error("Content not found: {0}")]
    FileNotFound(String),

    /// A content file could not be decoded.
    #[error("Invalid record in {}: {message}", path.display())]
    InvalidRecord {
        /// File the record was read from.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Two files claim the same stable id.
    #[error(
        "Content with uuid \"{stable_id}\" exists twice: \"{}\" \"{}\"",
        first.display(),
        second.display()
    )]
    DuplicateIdentity {
        stable_id: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// A record names a type the registry does not know.
    #[error("Entity type \"{0}\" does not exist")]
    UnknownType(String),
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<crate::error::Error> for SyncError {
    fn from(err: crate::error::Error) -> Self {
        match err {
            crate::error::Error::Sync(inner) => inner,
            crate::error::Error::Io(inner) => Self::Io(inner),
            other => Self::Database(other.to_string()),
        }
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
