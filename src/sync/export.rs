//! Content export.
//!
//! This module writes records from the store to the content folder, one
//! file per record at `<content>/<type>/<stable id>.json`.
//!
//! # Selection
//!
//! Records are selected by bundle and/or explicit local ids (everything of
//! the type when neither is given), minus the skipped ids.
//!
//! # Unchanged files
//!
//! Files already holding the exact serialized content are not rewritten,
//! so re-exporting an unchanged site leaves the content folder untouched.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{Record, TypeDescriptor, TypeRegistry, USER_TYPE};
use crate::storage::RecordStore;
use crate::sync::aliases;
use crate::sync::codec::{Codec, JsonCodec};
use crate::sync::file::{CONTENT_EXTENSION, atomic_write, type_dir};
use crate::sync::hash::{content_hash, file_hash, has_changed};
use crate::sync::types::ExportStats;

/// Exporter for content folders.
pub struct Exporter<'a, S: RecordStore + ?Sized> {
    storage: &'a S,
    registry: &'a TypeRegistry,
    codec: Box<dyn Codec>,
    content_dir: PathBuf,
}

impl<'a, S: RecordStore + ?Sized> Exporter<'a, S> {
    /// Create a new exporter writing below `content_dir`.
    #[must_use]
    pub fn new(storage: &'a S, registry: &'a TypeRegistry, content_dir: PathBuf) -> Self {
        Self {
            storage,
            registry,
            codec: Box::new(JsonCodec),
            content_dir,
        }
    }

    #[must_use]
    pub fn with_codec(mut self, codec: Box<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// Get the content directory.
    #[must_use]
    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    /// Export the selected records of one type.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is unknown or not a content type, or a
    /// query or file write fails.
    pub fn export(
        &self,
        type_id: &str,
        bundles: &[String],
        ids: &[i64],
        skip: &[i64],
    ) -> Result<ExportStats> {
        let descriptor = self.descriptor(type_id)?;
        let mut stats = ExportStats::default();

        for local_id in self.select_ids(descriptor, bundles, ids, skip)? {
            if let Some(record) = self.storage.load_by_id(type_id, local_id)? {
                self.write_record(record, &mut stats)?;
            } else {
                debug!(type_id, local_id, "Record not found, skipping");
            }
        }

        info!(type_id, exported = stats.total(), "Exported content");
        Ok(stats)
    }

    /// Export the selected records plus everything they reference.
    ///
    /// References are followed transitively, owners included; each record
    /// goes to its own type folder and is written once.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is unknown or not a content type, or a
    /// query or file write fails.
    pub fn export_with_references(
        &self,
        type_id: &str,
        bundles: &[String],
        ids: &[i64],
        skip: &[i64],
    ) -> Result<ExportStats> {
        let descriptor = self.descriptor(type_id)?;
        let mut stats = ExportStats::default();
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut queue: VecDeque<Record> = VecDeque::new();

        for local_id in self.select_ids(descriptor, bundles, ids, skip)? {
            if let Some(record) = self.storage.load_by_id(type_id, local_id)? {
                queue.push_back(record);
            }
        }

        while let Some(record) = queue.pop_front() {
            if !seen.insert((record.type_id.clone(), record.stable_id.clone())) {
                continue;
            }
            let record = self.write_record(record, &mut stats)?;

            for reference in &record.references {
                if !self.is_exportable(&reference.type_id) {
                    continue;
                }
                match self
                    .storage
                    .load_by_stable_id(&reference.type_id, &reference.stable_id)?
                {
                    Some(target) => queue.push_back(target),
                    None => debug!(
                        type_id = %reference.type_id,
                        stable_id = %reference.stable_id,
                        "Referenced record not found"
                    ),
                }
            }
            if let Some(owner) = &record.owner_ref {
                if let Some(user) = self.storage.load_by_stable_id(USER_TYPE, owner)? {
                    queue.push_back(user);
                }
            }
        }

        info!(type_id, exported = stats.total(), "Exported content with references");
        Ok(stats)
    }

    /// Export every content type except `skip_types`, then the URL aliases.
    ///
    /// `add_types` names further registered types to include.
    ///
    /// # Errors
    ///
    /// Returns an error if a query or file write fails.
    pub fn export_site(&self, add_types: &[String], skip_types: &[String]) -> Result<ExportStats> {
        let mut types: Vec<&str> = self
            .registry
            .content_types()
            .into_iter()
            .map(|t| t.id.as_str())
            .collect();
        for extra in add_types {
            if self.is_exportable(extra) && !types.contains(&extra.as_str()) {
                types.push(extra);
            }
        }

        let mut stats = ExportStats::default();
        for type_id in types {
            if skip_types.iter().any(|s| s == type_id) {
                debug!(type_id, "Skipping type");
                continue;
            }
            let type_stats = self.export(type_id, &[], &[], &[])?;
            for (exported_type, count) in type_stats.exported {
                *stats.exported.entry(exported_type).or_default() += count;
            }
            stats.unchanged += type_stats.unchanged;
        }

        stats.aliases = self.export_aliases()?;
        Ok(stats)
    }

    /// Export every URL alias, returning how many were written.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query or the file write fails.
    pub fn export_aliases(&self) -> Result<usize> {
        let count = aliases::export_aliases(self.storage, &self.content_dir)?;
        info!(count, "Exported URL aliases");
        Ok(count)
    }

    fn descriptor(&self, type_id: &str) -> Result<&'a TypeDescriptor> {
        let registry = self.registry;
        let descriptor = registry.get(type_id).ok_or_else(|| Error::UnknownType {
            type_id: type_id.to_string(),
            available: registry
                .content_types()
                .iter()
                .map(|t| t.id.clone())
                .collect(),
        })?;
        if !descriptor.is_content() {
            return Err(Error::InvalidArgument(format!(
                "\"{type_id}\" is a configuration type and has no content to export"
            )));
        }
        Ok(descriptor)
    }

    fn is_exportable(&self, type_id: &str) -> bool {
        self.registry.get(type_id).is_some_and(TypeDescriptor::is_content)
    }

    /// Local ids selected by bundle and explicit id, minus skipped ones.
    fn select_ids(
        &self,
        descriptor: &TypeDescriptor,
        bundles: &[String],
        ids: &[i64],
        skip: &[i64],
    ) -> Result<Vec<i64>> {
        let mut selected = Vec::new();
        if !bundles.is_empty() {
            selected.extend(self.storage.list_ids(&descriptor.id, bundles)?);
        }
        selected.extend_from_slice(ids);
        if selected.is_empty() {
            selected = self.storage.list_ids(&descriptor.id, &[])?;
        }

        let mut unique = HashSet::new();
        selected.retain(|id| !skip.contains(id) && unique.insert(*id));
        Ok(selected)
    }

    /// Serialize one record to its file, returning it with its owner filled in.
    fn write_record(&self, mut record: Record, stats: &mut ExportStats) -> Result<Record> {
        let supports_owner = self
            .registry
            .get(&record.type_id)
            .is_some_and(|t| t.supports_owner);
        if supports_owner && record.has_owner() {
            if let Some(owner_id) = record.owner_id {
                record.owner_ref = self
                    .storage
                    .load_by_id(USER_TYPE, owner_id)?
                    .map(|owner| owner.stable_id);
            }
        }

        let content = self.codec.serialize(&record)?;
        let path = type_dir(&self.content_dir, &record.type_id).join(format!(
            "{}.{CONTENT_EXTENSION}",
            file_stem(&record.stable_id)
        ));

        let written = has_changed(&content_hash(&content), file_hash(&path)?.as_deref());
        if written {
            atomic_write(&path, content.as_bytes())?;
            debug!(path = %path.display(), "Wrote content file");
        }
        stats.record(&record.type_id, written);
        Ok(record)
    }
}

/// File stem for a stable id, keeping only path-safe characters.
fn file_stem(stable_id: &str) -> String {
    stable_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
