//! Record type descriptors and the type registry.
//!
//! The registry is the classification table consulted by import and export:
//! it says which types are content (importable) and which are configuration
//! (never touched), and which optional capabilities each type carries.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Type id of the identity (user) record type.
pub const USER_TYPE: &str = "user";

/// Type id of the binary file attachment record type.
pub const FILE_TYPE: &str = "file";

/// Whether a record type holds content or site configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    #[default]
    Content,
    Config,
}

/// Special handling a record type receives during reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRole {
    /// Ordinary content.
    #[default]
    Standard,
    /// Identity records: always updated in place, never recreated.
    Identity,
    /// Binary file attachments: need the target's file capability.
    File,
}

/// Describes one record type and the capabilities its records support.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Type id, also the directory name under the content folder.
    pub id: String,

    #[serde(default)]
    pub kind: TypeKind,

    #[serde(default)]
    pub role: TypeRole,

    /// Name of the field holding the bundle (used for export selection).
    #[serde(default = "default_bundle_key")]
    pub bundle_key: String,

    /// Records carry a changed timestamp that can be compared.
    #[serde(default = "default_true")]
    pub supports_changed_time: bool,

    /// Records carry an owner reference.
    #[serde(default)]
    pub supports_owner: bool,

    /// Saves create revisions unless suppressed.
    #[serde(default)]
    pub supports_revisions: bool,
}

fn default_bundle_key() -> String {
    "type".to_string()
}

fn default_true() -> bool {
    true
}

impl TypeDescriptor {
    /// A content type with changed-time support and no other capabilities.
    #[must_use]
    pub fn content(id: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: TypeKind::Content,
            role: TypeRole::Standard,
            bundle_key: default_bundle_key(),
            supports_changed_time: true,
            supports_owner: false,
            supports_revisions: false,
        }
    }

    /// A configuration type. Import and export ignore these.
    #[must_use]
    pub fn config(id: &str) -> Self {
        Self {
            kind: TypeKind::Config,
            supports_changed_time: false,
            ..Self::content(id)
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: TypeRole) -> Self {
        self.role = role;
        self
    }

    #[must_use]
    pub fn with_bundle_key(mut self, key: &str) -> Self {
        self.bundle_key = key.to_string();
        self
    }

    #[must_use]
    pub fn with_owner(mut self) -> Self {
        self.supports_owner = true;
        self
    }

    #[must_use]
    pub fn with_revisions(mut self) -> Self {
        self.supports_revisions = true;
        self
    }

    #[must_use]
    pub fn without_changed_time(mut self) -> Self {
        self.supports_changed_time = false;
        self
    }

    #[must_use]
    pub fn is_content(&self) -> bool {
        self.kind == TypeKind::Content
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.role == TypeRole::Identity
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        self.role == TypeRole::File
    }
}

/// Classification table of every record type known to the target.
///
/// Types are kept sorted by id so that enumeration (and with it the order
/// in which type directories are scanned) is deterministic.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: BTreeMap<String, TypeDescriptor>,
}

impl TypeRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in table of content and configuration types.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(TypeDescriptor::content("block_content").with_revisions());
        registry.register(
            TypeDescriptor::content("comment")
                .with_bundle_key("comment_type")
                .with_owner(),
        );
        registry.register(
            TypeDescriptor::content(FILE_TYPE)
                .with_role(TypeRole::File)
                .with_owner(),
        );
        registry.register(
            TypeDescriptor::content("media")
                .with_bundle_key("bundle")
                .with_owner()
                .with_revisions(),
        );
        registry.register(
            TypeDescriptor::content("menu_link_content").with_bundle_key("menu_name"),
        );
        registry.register(TypeDescriptor::content("node").with_owner().with_revisions());
        registry.register(
            TypeDescriptor::content("paragraph")
                .without_changed_time()
                .with_revisions(),
        );
        registry.register(
            TypeDescriptor::content("taxonomy_term")
                .with_bundle_key("vid")
                .with_revisions(),
        );
        registry.register(TypeDescriptor::content(USER_TYPE).with_role(TypeRole::Identity));

        registry.register(TypeDescriptor::config("menu"));
        registry.register(TypeDescriptor::config("node_type"));
        registry.register(TypeDescriptor::config("taxonomy_vocabulary"));
        registry
    }

    /// Add or replace a type descriptor.
    pub fn register(&mut self, descriptor: TypeDescriptor) {
        self.types.insert(descriptor.id.clone(), descriptor);
    }

    #[must_use]
    pub fn get(&self, type_id: &str) -> Option<&TypeDescriptor> {
        self.types.get(type_id)
    }

    #[must_use]
    pub fn contains(&self, type_id: &str) -> bool {
        self.types.contains_key(type_id)
    }

    /// All known types, sorted by id.
    pub fn all(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.values()
    }

    /// Content types only, sorted by id.
    #[must_use]
    pub fn content_types(&self) -> Vec<&TypeDescriptor> {
        self.types.values().filter(|t| t.is_content()).collect()
    }
}
