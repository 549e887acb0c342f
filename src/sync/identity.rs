//! The two fixed identities: anonymous (local id 0) and admin (local id 1).
//!
//! Sites sharing a content folder need the same uuids on both, or content
//! owned by them will not line up. [`identity_info`] reads them and
//! [`sync_identities`] rewrites them, along with the admin's name.

use serde::Serialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::model::{ANONYMOUS_ID, Account, ROOT_ID, Record, USER_TYPE};
use crate::storage::RecordStore;

/// Current uuids of the fixed identities and the admin's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityInfo {
    pub anonymous_uuid: String,
    pub admin_uuid: String,
    pub admin_name: String,
}

/// Values to set. `None` leaves a value as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityUpdate {
    pub anonymous_uuid: Option<String>,
    pub admin_uuid: Option<String>,
    pub admin_name: Option<String>,
}

/// Outcome of [`sync_identities`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentitySync {
    pub before: IdentityInfo,
    pub after: IdentityInfo,
    /// Names of the values that differ between `before` and `after`.
    pub changed: Vec<&'static str>,
}

/// Read the uuids of the anonymous and admin identities and the admin's name.
///
/// # Errors
///
/// Returns [`Error::RecordNotFound`] if either identity is missing.
pub fn identity_info<S: RecordStore + ?Sized>(store: &S) -> Result<IdentityInfo> {
    let anonymous = load_identity(store, ANONYMOUS_ID)?;
    let admin = load_identity(store, ROOT_ID)?;
    Ok(IdentityInfo {
        anonymous_uuid: anonymous.stable_id,
        admin_uuid: admin.stable_id,
        admin_name: admin.label,
    })
}

/// Set the uuids of the fixed identities and the admin's name.
///
/// Values equal to the current ones are left alone. With `dry_run`, the
/// result describes the change without writing it.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for an empty value or a uuid another
/// user already holds, [`Error::RecordNotFound`] if an identity is missing,
/// or the store's error if the write fails.
pub fn sync_identities<S: RecordStore + ?Sized>(
    store: &mut S,
    update: &IdentityUpdate,
    actor: &Account,
    dry_run: bool,
) -> Result<IdentitySync> {
    let before = identity_info(store)?;
    let mut after = before.clone();
    if let Some(uuid) = &update.anonymous_uuid {
        after.anonymous_uuid.clone_from(uuid);
    }
    if let Some(uuid) = &update.admin_uuid {
        after.admin_uuid.clone_from(uuid);
    }
    if let Some(name) = &update.admin_name {
        after.admin_name.clone_from(name);
    }

    if after.anonymous_uuid == after.admin_uuid {
        return Err(Error::InvalidArgument(format!(
            "anonymous and admin cannot share uuid \"{}\"",
            after.admin_uuid
        )));
    }
    for value in [&after.anonymous_uuid, &after.admin_uuid, &after.admin_name] {
        if value.trim().is_empty() {
            return Err(Error::InvalidArgument("values cannot be empty".to_string()));
        }
    }
    check_uuid_free(store, &after.anonymous_uuid, ANONYMOUS_ID)?;
    check_uuid_free(store, &after.admin_uuid, ROOT_ID)?;

    let mut changed = Vec::new();
    if after.anonymous_uuid != before.anonymous_uuid {
        changed.push("anonymous_uuid");
    }
    if after.admin_uuid != before.admin_uuid {
        changed.push("admin_uuid");
    }
    if after.admin_name != before.admin_name {
        changed.push("admin_name");
    }

    if dry_run || changed.is_empty() {
        return Ok(IdentitySync {
            before,
            after,
            changed,
        });
    }

    if after.anonymous_uuid != before.anonymous_uuid {
        let anonymous = load_identity(store, ANONYMOUS_ID)?;
        store.update_identity(
            USER_TYPE,
            ANONYMOUS_ID,
            &after.anonymous_uuid,
            &anonymous.label,
            actor,
        )?;
    }
    if after.admin_uuid != before.admin_uuid || after.admin_name != before.admin_name {
        store.update_identity(USER_TYPE, ROOT_ID, &after.admin_uuid, &after.admin_name, actor)?;
    }
    info!(changed = ?changed, "Identities updated");

    Ok(IdentitySync {
        before,
        after: identity_info(store)?,
        changed,
    })
}

fn load_identity<S: RecordStore + ?Sized>(store: &S, local_id: i64) -> Result<Record> {
    store
        .load_by_id(USER_TYPE, local_id)?
        .ok_or_else(|| Error::RecordNotFound {
            type_id: USER_TYPE.to_string(),
            id: local_id.to_string(),
        })
}

fn check_uuid_free<S: RecordStore + ?Sized>(store: &S, uuid: &str, owner: i64) -> Result<()> {
    match store.load_by_stable_id(USER_TYPE, uuid)? {
        Some(holder) if holder.local_id != Some(owner) => Err(Error::InvalidArgument(format!(
            "uuid \"{uuid}\" already belongs to user {}",
            holder.local_id.map_or_else(|| "-".to_string(), |id| id.to_string())
        ))),
        _ => Ok(()),
    }
}
