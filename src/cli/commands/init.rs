//! Create the target database and the content folder.
//!
//! The database gets its schema and the two seeded identities (anonymous
//! and the privileged account) on creation. The content folder is where
//! exports write and imports read.

use crate::cli::Cli;
use crate::cli::commands::Workspace;
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct InitOutput {
    database: PathBuf,
    content_dir: PathBuf,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns an error if the database exists and `force` is not set, or the
/// directory or database cannot be created.
pub fn execute(cli: &Cli, force: bool, json: bool) -> Result<()> {
    let workspace = Workspace::resolve(cli)?;
    let output = initialize(&workspace.db_path, &workspace.content_dir, force)?;

    if json {
        let payload = serde_json::to_string(&output)?;
        println!("{payload}");
    } else {
        println!("Initialized content deploy");
        println!("  Database:       {}", output.database.display());
        println!("  Content folder: {}", output.content_dir.display());
        println!();
        println!("Next: run 'dcd export-site' on the source or 'dcd import' on the target.");
    }

    Ok(())
}

fn initialize(db_path: &Path, content_dir: &Path, force: bool) -> Result<InitOutput> {
    if db_path.exists() {
        if !force {
            return Err(Error::AlreadyInitialized {
                path: db_path.to_path_buf(),
            });
        }
        fs::remove_file(db_path)?;
    }

    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::create_dir_all(content_dir)?;

    // Opening applies the schema and seeds the identities.
    SqliteStorage::open(db_path)?;

    Ok(InitOutput {
        database: db_path.to_path_buf(),
        content_dir: content_dir.to_path_buf(),
    })
}
