//! Import command implementation.
//!
//! The import first runs in dry-run mode and prints what would change.
//! When nothing would change it stops there. Otherwise it asks for
//! confirmation (or takes `--yes`), imports for real and finishes with the
//! URL aliases.

use std::io::{self, BufRead, IsTerminal, Write};

use colored::Colorize;
use serde::Serialize;

use crate::cli::Cli;
use crate::cli::commands::Workspace;
use crate::error::Result;
use crate::storage::SqliteStorage;
use crate::sync::{
    AccountStack, AliasImportStats, ImportOptions, ImportReport, ImportStats, Importer,
    SwitchGuard, import_aliases, privileged_account,
};

#[derive(Serialize)]
struct ImportOutput {
    preview: ImportStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    applied: Option<ImportReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aliases: Option<AliasImportStats>,
}

/// Execute the import command.
///
/// # Errors
///
/// Returns an error if the database is missing, the content folder cannot
/// be read, two files claim one uuid, or the store fails.
pub fn execute(cli: &Cli, force_update: bool, yes: bool, json: bool) -> Result<()> {
    let workspace = Workspace::resolve(cli)?;
    let mut storage = workspace.open_storage()?;
    let accounts = AccountStack::default();

    let defaults = workspace.config.import_options();
    let options = defaults.force_update(defaults.force_update || force_update);

    let preview = run(&mut storage, &workspace, &accounts, options.dry_run(true))?;
    let mut output = ImportOutput {
        preview: preview.stats,
        applied: None,
        aliases: None,
    };

    if !json {
        print_preview(&preview.stats);
    }

    if preview.stats.is_noop() {
        if !json {
            println!("Nothing to do.");
        }
        return finish(&output, json);
    }

    if cli.dry_run || !confirmed(yes, json)? {
        return finish(&output, json);
    }

    let report = run(&mut storage, &workspace, &accounts, options.dry_run(false))?;

    let actor = privileged_account(&storage)?;
    let aliases = {
        let guard = SwitchGuard::new(&accounts, actor);
        import_aliases(&mut storage, &workspace.content_dir, guard.account(), false)?
    };

    if !json {
        print_applied(&report.stats, &aliases);
    }
    output.applied = Some(report);
    output.aliases = Some(aliases);
    finish(&output, json)
}

fn run(
    storage: &mut SqliteStorage,
    workspace: &Workspace,
    accounts: &AccountStack,
    options: ImportOptions,
) -> Result<ImportReport> {
    let report = Importer::new(storage, &workspace.registry, accounts)
        .with_options(options)
        .with_files_dir(workspace.files_dir.clone())
        .import(&workspace.content_dir)?;
    Ok(report)
}

/// Whether to go ahead with the write run.
///
/// Without `--yes`, only an interactive terminal can confirm.
fn confirmed(yes: bool, json: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    if json || !io::stdin().is_terminal() {
        if !json {
            println!("Run again with --yes to import.");
        }
        return Ok(false);
    }

    print!("Do you want to continue? [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    let accepted = matches!(answer.trim().to_lowercase().as_str(), "y" | "yes");
    if !accepted {
        println!("Aborted.");
    }
    Ok(accepted)
}

fn finish(output: &ImportOutput, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(output)?);
    }
    Ok(())
}

fn print_preview(stats: &ImportStats) {
    for line in preview_lines(stats) {
        println!("{line}");
    }
    println!();
}

fn preview_lines(stats: &ImportStats) -> Vec<String> {
    let mut lines = vec![
        "Content to import".bold().to_string(),
        format!("{} entities will be processed.", stats.processed),
        format!("  Created:       {}", count(stats.created)),
        format!("  Updated:       {}", count(stats.updated)),
        format!("  Skipped:       {}", stats.skipped),
    ];
    if stats.file_created > 0 {
        lines.push(format!("  Missing files: {}", count(stats.file_created)));
    }
    lines
}

fn print_applied(stats: &ImportStats, aliases: &AliasImportStats) {
    println!("{}", "Import complete".green().bold());
    println!(
        "  {} created, {} updated, {} skipped",
        stats.created, stats.updated, stats.skipped
    );
    if stats.file_created > 0 {
        println!("  Missing files created: {}", stats.file_created);
    }
    println!(
        "  URL aliases: {} imported, {} skipped",
        aliases.imported, aliases.skipped
    );
}

fn count(n: usize) -> String {
    if n > 0 {
        n.to_string().green().to_string()
    } else {
        n.to_string()
    }
}
