//! Local ids handed out during one import run.
//!
//! Files may claim a local id. Those ids are reserved up front, so a record
//! without one is never created on an id a later file claims. Ids created
//! by the run are remembered, so a later file never mistakes the run's own
//! work for existing content. A dry run keeps the same ledger, which keeps
//! its decisions equal to those of a write run.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::sync::graph::SourceFile;
use crate::sync::types::SyncResult;

#[derive(Debug, Default)]
pub(crate) struct RunIds {
    /// Ids named by scanned files, per type.
    claimed: HashMap<String, BTreeSet<i64>>,
    /// Ids of records this run created, per type.
    created: HashMap<String, HashSet<i64>>,
    /// Next id to try, per type, once the store has been consulted.
    next: HashMap<String, i64>,
}

impl RunIds {
    /// Reserve the local id of every file that claims one.
    pub(crate) fn reserve<'a>(files: impl IntoIterator<Item = &'a SourceFile>) -> Self {
        let mut ids = Self::default();
        for file in files {
            if let Some(local_id) = file.local_id {
                ids.claimed
                    .entry(file.type_id.clone())
                    .or_default()
                    .insert(local_id);
            }
        }
        ids
    }

    /// Whether this run created the record at `local_id`.
    pub(crate) fn created_in_run(&self, type_id: &str, local_id: i64) -> bool {
        self.created
            .get(type_id)
            .is_some_and(|ids| ids.contains(&local_id))
    }

    pub(crate) fn mark_created(&mut self, type_id: &str, local_id: i64) {
        self.created
            .entry(type_id.to_string())
            .or_default()
            .insert(local_id);
    }

    /// A fresh id above everything stored and claimed.
    ///
    /// `stored_max` is asked once per type, for the highest id in the store.
    pub(crate) fn allocate<F>(&mut self, type_id: &str, stored_max: F) -> SyncResult<i64>
    where
        F: FnOnce() -> SyncResult<i64>,
    {
        let start = match self.next.get(type_id) {
            Some(&next) => next,
            None => {
                let highest_claimed = self
                    .claimed
                    .get(type_id)
                    .and_then(|ids| ids.last().copied())
                    .unwrap_or(0);
                stored_max()?.max(highest_claimed) + 1
            }
        };

        let mut local_id = start;
        while self.is_taken(type_id, local_id) {
            local_id += 1;
        }
        self.next.insert(type_id.to_string(), local_id + 1);
        Ok(local_id)
    }

    fn is_taken(&self, type_id: &str, local_id: i64) -> bool {
        self.created_in_run(type_id, local_id)
            || self
                .claimed
                .get(type_id)
                .is_some_and(|ids| ids.contains(&local_id))
    }
}
