//! Storage capability consumed by import and export.
//!
//! The importer never talks to SQLite directly: it is written against
//! [`RecordStore`], and identity lookups go through [`IdentityResolver`],
//! which every store gets for free.

use crate::error::Result;
use crate::model::{Account, PathAlias, Record};

/// Load, save and delete records in a target store.
pub trait RecordStore {
    /// Load a record by its store-local id.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn load_by_id(&self, type_id: &str, local_id: i64) -> Result<Option<Record>>;

    /// Load a record by its stable id within the type's bucket.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn load_by_stable_id(&self, type_id: &str, stable_id: &str) -> Result<Option<Record>>;

    /// Persist a record as `actor`.
    ///
    /// New records without a local id get the next free id; records without
    /// a stable id get a fresh one. Both are written back into `record`,
    /// which is marked not-new afterwards. Returns the local id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn save(&mut self, record: &mut Record, actor: &Account) -> Result<i64>;

    /// Delete a record as `actor`.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete(&mut self, record: &Record, actor: &Account) -> Result<()>;

    /// Enable or disable new-revision creation for the next save.
    ///
    /// # Errors
    ///
    /// Returns an error if the record's type does not keep revisions.
    fn set_new_revision(&self, record: &mut Record, enabled: bool) -> Result<()>;

    /// Rewrite only the stable id and display name of a stored record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not exist or the write fails.
    fn update_identity(
        &mut self,
        type_id: &str,
        local_id: i64,
        stable_id: &str,
        label: &str,
        actor: &Account,
    ) -> Result<()>;

    /// Local ids of a type, optionally restricted to some bundles, ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_ids(&self, type_id: &str, bundles: &[String]) -> Result<Vec<i64>>;

    /// Whether an alias already exists for a language.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn alias_exists(&self, alias: &str, langcode: &str) -> Result<bool>;

    /// Store an alias, returning its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn save_alias(&mut self, alias: &PathAlias, actor: &Account) -> Result<i64>;

    /// All aliases keyed by id, ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_aliases(&self) -> Result<Vec<(i64, PathAlias)>>;
}

/// Find the existing target record for an incoming one.
///
/// Pure lookups with no side effects.
pub trait IdentityResolver {
    /// The record holding `stable_id` in the type's bucket, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn find_by_stable_id(&self, type_id: &str, stable_id: &str) -> Result<Option<Record>>;

    /// The record currently holding `local_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn find_by_local_id(&self, type_id: &str, local_id: i64) -> Result<Option<Record>>;
}

impl<S: RecordStore + ?Sized> IdentityResolver for S {
    fn find_by_stable_id(&self, type_id: &str, stable_id: &str) -> Result<Option<Record>> {
        if stable_id.is_empty() {
            return Ok(None);
        }
        self.load_by_stable_id(type_id, stable_id)
    }

    fn find_by_local_id(&self, type_id: &str, local_id: i64) -> Result<Option<Record>> {
        self.load_by_id(type_id, local_id)
    }
}
