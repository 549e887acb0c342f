//! `uuid-info` and `uuid-sync`: the anonymous and admin identities.

use colored::Colorize;
use serde::Serialize;

use crate::cli::Cli;
use crate::cli::commands::Workspace;
use crate::error::Result;
use crate::sync::{
    AccountStack, IdentityInfo, IdentityUpdate, SwitchGuard, identity_info, privileged_account,
    sync_identities,
};

#[derive(Serialize)]
struct SyncOutput<'a> {
    dry_run: bool,
    changed: &'a [&'static str],
    before: &'a IdentityInfo,
    after: &'a IdentityInfo,
}

/// Print the anonymous and admin uuids and the admin's name.
///
/// # Errors
///
/// Returns an error if the database is missing or lacks either identity.
pub fn execute_info(cli: &Cli, json: bool) -> Result<()> {
    let workspace = Workspace::resolve(cli)?;
    let storage = workspace.open_storage()?;
    let info = identity_info(&storage)?;

    if json {
        println!("{}", serde_json::to_string(&info)?);
    } else {
        print_info(&info);
    }
    Ok(())
}

/// Set the anonymous and admin uuids and the admin's name, then print the
/// resulting values.
///
/// # Errors
///
/// Returns an error if the database is missing, a value is rejected, or
/// the write fails.
pub fn execute_sync(
    cli: &Cli,
    anonymous: Option<&str>,
    admin: Option<&str>,
    name: Option<&str>,
    json: bool,
) -> Result<()> {
    let workspace = Workspace::resolve(cli)?;
    let mut storage = workspace.open_storage()?;
    let accounts = AccountStack::default();
    let update = IdentityUpdate {
        anonymous_uuid: anonymous.map(str::to_string),
        admin_uuid: admin.map(str::to_string),
        admin_name: name.map(str::to_string),
    };

    let actor = privileged_account(&storage)?;
    let result = {
        let guard = SwitchGuard::new(&accounts, actor);
        sync_identities(&mut storage, &update, guard.account(), cli.dry_run)?
    };

    if json {
        let output = SyncOutput {
            dry_run: cli.dry_run,
            changed: &result.changed,
            before: &result.before,
            after: &result.after,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if result.changed.is_empty() {
        println!("No change.");
    } else {
        let verb = if cli.dry_run { "Would change" } else { "Changed" };
        println!("{verb}: {}", result.changed.join(", ").green());
    }
    print_info(&result.after);
    Ok(())
}

fn print_info(info: &IdentityInfo) {
    println!("Anonymous user UUID = {}", info.anonymous_uuid);
    println!("Admin UUID = {}", info.admin_uuid);
    println!("Admin's name = {}", info.admin_name.bold());
}
