//! Dependency graph of one import run.
//!
//! [`ImportContext`] is an arena: every stable id seen, as a file or as a
//! reference, gets a `VertexId` once, and edges are stored by vertex. The
//! context is owned by a single import invocation and dropped with it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::model::TypeDescriptor;
use crate::sync::codec::{Codec, Document};
use crate::sync::file::{file_name, read_file, scan_type_dir};
use crate::sync::types::{DuplicatePolicy, SyncError, SyncResult};

/// Handle of a stable id inside one [`ImportContext`].
pub type VertexId = usize;

/// A scanned content file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub type_id: String,
    /// Local id the file claims, if any.
    pub local_id: Option<i64>,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    #[must_use]
    pub fn name(&self) -> String {
        file_name(&self.path)
    }
}

/// Vertices, edges and the file map of one import run.
#[derive(Debug, Default)]
pub struct ImportContext {
    stable_ids: Vec<String>,
    vertices: HashMap<String, VertexId>,
    /// Out-edges per vertex, in insertion order. `A -> B` means A depends on B.
    edges: Vec<Vec<VertexId>>,
    files: HashMap<String, SourceFile>,
}

impl ImportContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan the directory of every given type, in order, and build the graph.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::InvalidRecord` for an undecodable file and
    /// `SyncError::DuplicateIdentity` when two files share a stable id under
    /// [`DuplicatePolicy::Abort`].
    pub fn build(
        content_dir: &Path,
        types: &[&TypeDescriptor],
        codec: &dyn Codec,
        policy: DuplicatePolicy,
    ) -> SyncResult<Self> {
        let mut ctx = Self::new();

        for descriptor in types {
            let files = scan_type_dir(content_dir, &descriptor.id)?;
            if files.is_empty() {
                continue;
            }
            debug!(type_id = %descriptor.id, files = files.len(), "Scanning content type");

            for path in files {
                let bytes = read_file(&path)?;
                let doc = codec
                    .decode(&bytes)
                    .map_err(|e| SyncError::InvalidRecord {
                        path: path.clone(),
                        message: e.to_string(),
                    })?;
                let source = SourceFile {
                    path,
                    type_id: descriptor.id.clone(),
                    local_id: doc.local_id,
                    bytes,
                };
                ctx.add_document(doc, source, policy)?;
            }
        }

        Ok(ctx)
    }

    /// Add one decoded file: its vertex, its edges and its file map entry.
    ///
    /// Returns false when the file was ignored as a duplicate.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::DuplicateIdentity` for a second file with the same
    /// stable id under [`DuplicatePolicy::Abort`].
    pub fn add_document(
        &mut self,
        doc: Document,
        source: SourceFile,
        policy: DuplicatePolicy,
    ) -> SyncResult<bool> {
        if let Some(first) = self.files.get(&doc.stable_id) {
            match policy {
                DuplicatePolicy::Abort => {
                    return Err(SyncError::DuplicateIdentity {
                        stable_id: doc.stable_id,
                        first: first.path.clone(),
                        second: source.path,
                    });
                }
                DuplicatePolicy::KeepFirst => {
                    warn!(
                        stable_id = %doc.stable_id,
                        first = %first.path.display(),
                        ignored = %source.path.display(),
                        "Content exists twice, ignoring the second file"
                    );
                    return Ok(false);
                }
            }
        }

        let vertex = self.vertex(&doc.stable_id);
        for reference in &doc.references {
            let target = self.vertex(&reference.stable_id);
            self.add_edge(vertex, target);
        }
        self.files.insert(doc.stable_id, source);
        Ok(true)
    }

    /// The vertex of a stable id, created on first sight.
    pub fn vertex(&mut self, stable_id: &str) -> VertexId {
        if let Some(&id) = self.vertices.get(stable_id) {
            return id;
        }
        let id = self.stable_ids.len();
        self.stable_ids.push(stable_id.to_string());
        self.vertices.insert(stable_id.to_string(), id);
        self.edges.push(Vec::new());
        id
    }

    /// Record that `from` depends on `to`. Repeated edges are kept once.
    pub fn add_edge(&mut self, from: VertexId, to: VertexId) {
        let out = &mut self.edges[from];
        if !out.contains(&to) {
            out.push(to);
        }
    }

    /// Number of vertices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stable_ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stable_ids.is_empty()
    }

    /// Dependencies of a vertex, in insertion order.
    #[must_use]
    pub fn dependencies(&self, vertex: VertexId) -> &[VertexId] {
        self.edges.get(vertex).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn stable_id(&self, vertex: VertexId) -> &str {
        &self.stable_ids[vertex]
    }

    /// The file a stable id was read from, if it has one.
    #[must_use]
    pub fn file(&self, stable_id: &str) -> Option<&SourceFile> {
        self.files.get(stable_id)
    }

    /// Every scanned file kept, in no particular order.
    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    /// Number of scanned files kept.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}
