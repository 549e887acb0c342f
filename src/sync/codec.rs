//! Content file codec.
//!
//! Content files are HAL-style JSON documents:
//!
//! ```json
//! {
//!   "uuid": "5f0c…",
//!   "type": "node",
//!   "bundle": "article",
//!   "id": 5,
//!   "label": "Hello",
//!   "changed": 1700000000,
//!   "owner": "9a1e…",
//!   "fields": { "body": "…" },
//!   "_embedded": {
//!     "field_tags": [ { "uuid": "77b2…", "type": "taxonomy_term" } ]
//!   }
//! }
//! ```
//!
//! Embedded sub-documents only contribute references; they are never
//! imported as payloads of their own.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{EntityRef, Record, TypeDescriptor};
use crate::sync::types::{SyncError, SyncResult};

/// Relation the owning identity is embedded under.
pub const OWNER_RELATION: &str = "owner";

/// The parts of a content file the dependency graph needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub stable_id: String,
    pub type_id: String,
    /// Local id the file claims, if any.
    pub local_id: Option<i64>,
    /// Every embedded reference, owner included.
    pub references: Vec<EntityRef>,
}

/// Turns content file bytes into records and back.
pub trait Codec {
    /// Decode the stable id and embedded references of a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid document.
    fn decode(&self, bytes: &[u8]) -> SyncResult<Document>;

    /// Decode a full record of the given type.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid document.
    fn deserialize(&self, bytes: &[u8], descriptor: &TypeDescriptor) -> SyncResult<Record>;

    /// Encode a record, embedding its references and owner.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn serialize(&self, record: &Record) -> SyncResult<String>;
}

#[derive(Debug, Serialize, Deserialize)]
struct WireDocument {
    uuid: String,
    #[serde(rename = "type")]
    type_id: String,
    #[serde(default)]
    bundle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    #[serde(default)]
    label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    changed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    fields: Map<String, Value>,
    #[serde(rename = "_embedded", default, skip_serializing_if = "BTreeMap::is_empty")]
    embedded: BTreeMap<String, Vec<WireLink>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireLink {
    uuid: String,
    #[serde(rename = "type")]
    type_id: String,
}

impl WireDocument {
    fn parse(bytes: &[u8]) -> SyncResult<Self> {
        let doc: Self = serde_json::from_slice(bytes)?;
        if doc.uuid.trim().is_empty() {
            return Err(SyncError::Json(serde::de::Error::custom(
                "document has an empty uuid",
            )));
        }
        Ok(doc)
    }

    fn references(&self) -> impl Iterator<Item = EntityRef> + '_ {
        self.embedded.iter().flat_map(|(relation, links)| {
            links.iter().map(move |link| EntityRef {
                relation: relation.clone(),
                type_id: link.type_id.clone(),
                stable_id: link.uuid.clone(),
            })
        })
    }
}

/// JSON codec for content files.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn decode(&self, bytes: &[u8]) -> SyncResult<Document> {
        let doc = WireDocument::parse(bytes)?;
        Ok(Document {
            references: doc.references().collect(),
            local_id: doc.id,
            stable_id: doc.uuid,
            type_id: doc.type_id,
        })
    }

    fn deserialize(&self, bytes: &[u8], descriptor: &TypeDescriptor) -> SyncResult<Record> {
        let doc = WireDocument::parse(bytes)?;
        let references = doc
            .references()
            .filter(|r| r.relation != OWNER_RELATION)
            .collect();

        let mut record = Record::new(&descriptor.id, &doc.bundle, &doc.label);
        record.stable_id = doc.uuid;
        record.local_id = doc.id;
        record.changed_time = doc.changed.filter(|_| descriptor.supports_changed_time);
        record.owner_ref = doc.owner.filter(|_| descriptor.supports_owner);
        record.references = references;
        record.fields = doc.fields;
        Ok(record)
    }

    fn serialize(&self, record: &Record) -> SyncResult<String> {
        let mut embedded: BTreeMap<String, Vec<WireLink>> = BTreeMap::new();
        for reference in &record.references {
            embedded
                .entry(reference.relation.clone())
                .or_default()
                .push(WireLink {
                    uuid: reference.stable_id.clone(),
                    type_id: reference.type_id.clone(),
                });
        }
        if let Some(owner) = &record.owner_ref {
            embedded
                .entry(OWNER_RELATION.to_string())
                .or_default()
                .push(WireLink {
                    uuid: owner.clone(),
                    type_id: crate::model::USER_TYPE.to_string(),
                });
        }

        let doc = WireDocument {
            uuid: record.stable_id.clone(),
            type_id: record.type_id.clone(),
            bundle: record.bundle.clone(),
            id: record.local_id,
            label: record.label.clone(),
            changed: record.changed_time,
            owner: record.owner_ref.clone(),
            fields: record.fields.clone(),
            embedded,
        };
        let mut out = serde_json::to_string_pretty(&doc)?;
        out.push('\n');
        Ok(out)
    }
}
