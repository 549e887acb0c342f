//! Content record model.
//!
//! A record is identified two ways: by its `stable_id`, which survives
//! export and import across systems, and by its `local_id`, which only means
//! something inside one store and is reassigned when a record is recreated.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Local id of the anonymous identity.
pub const ANONYMOUS_ID: i64 = 0;

/// Local id of the privileged identity imports run as.
pub const ROOT_ID: i64 = 1;

/// A reference from one record to another, by stable id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    /// Relation (field) name the reference lives under.
    pub relation: String,
    /// Type of the referenced record.
    pub type_id: String,
    /// Stable id of the referenced record.
    pub stable_id: String,
}

/// A typed content record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub type_id: String,
    pub bundle: String,

    /// Cross-system identity. Empty until the store assigns one.
    pub stable_id: String,

    /// Store-local identity. `None` lets the store pick the next free id.
    pub local_id: Option<i64>,

    /// Local id the record was loaded under, when it replaces an existing row.
    pub original_local_id: Option<i64>,

    /// Display name.
    pub label: String,

    /// Changed timestamp (Unix seconds), for types that track it.
    pub changed_time: Option<i64>,

    /// Stable id of the owning identity, as carried in files.
    pub owner_ref: Option<String>,

    /// Local id of the owning identity, as stored.
    pub owner_id: Option<i64>,

    /// Records this one depends on.
    pub references: Vec<EntityRef>,

    /// Remaining payload fields, stored opaquely.
    pub fields: Map<String, Value>,

    /// Save inserts instead of updating.
    pub is_new: bool,

    /// Save writes a new revision, for types that keep revisions.
    pub new_revision: bool,
}

impl Record {
    /// Create a new, unsaved record.
    #[must_use]
    pub fn new(type_id: &str, bundle: &str, label: &str) -> Self {
        Self {
            type_id: type_id.to_string(),
            bundle: bundle.to_string(),
            stable_id: String::new(),
            local_id: None,
            original_local_id: None,
            label: label.to_string(),
            changed_time: None,
            owner_ref: None,
            owner_id: None,
            references: Vec::new(),
            fields: Map::new(),
            is_new: true,
            new_revision: true,
        }
    }

    #[must_use]
    pub fn with_stable_id(mut self, stable_id: &str) -> Self {
        self.stable_id = stable_id.to_string();
        self
    }

    #[must_use]
    pub fn with_local_id(mut self, local_id: i64) -> Self {
        self.local_id = Some(local_id);
        self
    }

    #[must_use]
    pub fn with_changed_time(mut self, changed: i64) -> Self {
        self.changed_time = Some(changed);
        self
    }

    #[must_use]
    pub fn with_reference(mut self, relation: &str, type_id: &str, stable_id: &str) -> Self {
        self.references.push(EntityRef {
            relation: relation.to_string(),
            type_id: type_id.to_string(),
            stable_id: stable_id.to_string(),
        });
        self
    }

    #[must_use]
    pub fn with_field(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    /// True when an owner is set and it is not the anonymous identity.
    #[must_use]
    pub fn has_owner(&self) -> bool {
        matches!(self.owner_id, Some(id) if id != ANONYMOUS_ID)
    }

    /// Replace the local id, remembering the id of the row being replaced.
    pub fn assume_local_id(&mut self, local_id: i64) {
        self.local_id = Some(local_id);
        self.original_local_id = Some(local_id);
        self.is_new = false;
    }

    /// A string field from the payload, if present.
    #[must_use]
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// The identity an operation is performed as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Account {
    pub id: i64,
    pub name: String,
}

impl Account {
    #[must_use]
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
        }
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(ANONYMOUS_ID, "anonymous")
    }

    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.id == ANONYMOUS_ID
    }
}

/// A URL alias mapping a system path to a friendly path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathAlias {
    pub source: String,
    pub alias: String,
    pub langcode: String,
}
