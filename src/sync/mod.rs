//! Content sync operations.
//!
//! This module moves content between the target store and a folder of
//! portable content files:
//!
//! - **Import**: content files → store, reconciled record by record
//! - **Export**: store → content files, optionally with everything referenced
//! - **Aliases**: URL aliases, imported and exported as one side file
//! - **Identities**: uuids of the anonymous and admin users, kept equal across sites
//!
//! # Import pipeline
//!
//! 1. The scanner lists `<content>/<type>/*.json` for every content type
//! 2. The codec decodes each file's stable id and embedded references
//! 3. The graph builder turns those into an [`ImportContext`]
//! 4. The sorter orders it dependencies first
//! 5. The [`Importer`] reconciles each record as the privileged account
//!
//! # Example
//!
//! ```ignore
//! use dcd::sync::{AccountStack, ImportOptions, Importer};
//!
//! let accounts = AccountStack::default();
//! let report = Importer::new(&mut storage, &registry, &accounts)
//!     .with_options(ImportOptions::default().dry_run(true))
//!     .import(&content_dir)?;
//! println!("{} to create", report.stats.created);
//! ```

mod account;
pub mod aliases;
mod codec;
mod export;
mod file;
mod graph;
mod hash;
mod identity;
mod import;
mod local_ids;
mod sort;
mod types;

// Re-export main types and functions
pub use account::{AccountStack, AccountSwitcher, SwitchGuard, privileged_account};
pub use aliases::{alias_file, export_aliases, import_aliases};
pub use codec::{Codec, Document, JsonCodec, OWNER_RELATION};
pub use export::Exporter;
pub use file::{atomic_write, scan_type_dir};
pub use graph::{ImportContext, SourceFile, VertexId};
pub use hash::{content_hash, has_changed};
pub use identity::{IdentityInfo, IdentitySync, IdentityUpdate, identity_info, sync_identities};
pub use import::Importer;
pub use sort::{dependency_order, sorted_stable_ids};
pub use types::{
    AliasImportStats, DuplicatePolicy, ExportStats, ImportLogEntry, ImportOptions, ImportReport,
    ImportStats, SaveMethod, SyncError, SyncResult,
};
