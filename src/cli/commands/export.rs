//! Export command implementations.

use colored::Colorize;

use crate::cli::{Cli, ExportArgs};
use crate::cli::commands::Workspace;
use crate::error::Result;
use crate::sync::{ExportStats, Exporter};

/// Export the selected records of one type.
///
/// # Errors
///
/// Returns an error if the type is unknown or not content, the database is
/// missing, or a write fails.
pub fn execute(cli: &Cli, args: &ExportArgs, with_references: bool, json: bool) -> Result<()> {
    let workspace = Workspace::resolve(cli)?;
    let storage = workspace.open_storage()?;
    let exporter = Exporter::new(&storage, &workspace.registry, workspace.content_dir.clone());

    let stats = if with_references {
        exporter.export_with_references(
            &args.entity_type,
            &args.bundle,
            &args.entity_id,
            &args.skip_entities,
        )?
    } else {
        exporter.export(
            &args.entity_type,
            &args.bundle,
            &args.entity_id,
            &args.skip_entities,
        )?
    };

    report(&stats, &workspace, json)
}

/// Export all content and the URL aliases.
///
/// # Errors
///
/// Returns an error if the database is missing or a write fails.
pub fn execute_site(
    cli: &Cli,
    add_types: &[String],
    skip_types: &[String],
    json: bool,
) -> Result<()> {
    let workspace = Workspace::resolve(cli)?;
    let storage = workspace.open_storage()?;
    let exporter = Exporter::new(&storage, &workspace.registry, workspace.content_dir.clone());

    let stats = exporter.export_site(add_types, skip_types)?;
    report(&stats, &workspace, json)
}

fn report(stats: &ExportStats, workspace: &Workspace, json: bool) -> Result<()> {
    if json {
        let output = serde_json::json!({
            "content_dir": workspace.content_dir.display().to_string(),
            "total": stats.total(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if stats.is_empty() {
        println!("No content exported.");
        return Ok(());
    }

    println!("{}", "Export complete".green().bold());
    for (type_id, count) in &stats.exported {
        println!("  {type_id:<20} {count}");
    }
    if stats.unchanged > 0 {
        println!("  {:<20} {}", "unchanged".dimmed(), stats.unchanged);
    }
    if stats.aliases > 0 {
        println!("  {:<20} {}", "URL aliases", stats.aliases);
    }
    println!();
    println!("  Total: {} records", stats.total());
    println!("  Location: {}", workspace.content_dir.display());
    Ok(())
}
