//! URL alias commands.

use colored::Colorize;

use crate::cli::Cli;
use crate::cli::commands::Workspace;
use crate::error::Result;
use crate::sync::{
    AccountStack, Exporter, SwitchGuard, alias_file, import_aliases, privileged_account,
};

/// Import the URL aliases of the content folder.
///
/// # Errors
///
/// Returns an error if the database is missing, the alias file is invalid,
/// or the store fails.
pub fn execute_import(cli: &Cli, json: bool) -> Result<()> {
    let workspace = Workspace::resolve(cli)?;
    let mut storage = workspace.open_storage()?;
    let accounts = AccountStack::default();

    let actor = privileged_account(&storage)?;
    let stats = {
        let guard = SwitchGuard::new(&accounts, actor);
        import_aliases(&mut storage, &workspace.content_dir, guard.account(), cli.dry_run)?
    };

    if json {
        let output = serde_json::json!({
            "dry_run": cli.dry_run,
            "stats": stats,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        let verb = if cli.dry_run { "Would import" } else { "Imported" };
        println!(
            "{verb} {} URL aliases, skipped {}",
            stats.imported.to_string().green(),
            stats.skipped
        );
    }
    Ok(())
}

/// Export every URL alias to the content folder.
///
/// # Errors
///
/// Returns an error if the database is missing or the file write fails.
pub fn execute_export(cli: &Cli, json: bool) -> Result<()> {
    let workspace = Workspace::resolve(cli)?;
    let storage = workspace.open_storage()?;
    let exporter = Exporter::new(&storage, &workspace.registry, workspace.content_dir.clone());

    let count = exporter.export_aliases()?;
    let path = alias_file(exporter.content_dir());

    if json {
        let output = serde_json::json!({
            "aliases": count,
            "path": path.display().to_string(),
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Exported {count} URL aliases to {}", path.display());
    }
    Ok(())
}
