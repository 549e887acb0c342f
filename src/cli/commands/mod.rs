//! Command implementations.

pub mod aliases;
pub mod completions;
pub mod entity_list;
pub mod export;
pub mod import;
pub mod init;
pub mod identity;
pub mod version;

use std::path::PathBuf;

use crate::cli::Cli;
use crate::config::{
    DeployConfig, load_config, resolve_content_dir, resolve_db_path, resolve_files_dir,
};
use crate::error::{Error, Result};
use crate::model::TypeRegistry;
use crate::storage::SqliteStorage;

/// Locations and settings every content command works with.
#[derive(Debug)]
pub struct Workspace {
    pub config: DeployConfig,
    pub registry: TypeRegistry,
    pub db_path: PathBuf,
    pub content_dir: PathBuf,
    pub files_dir: Option<PathBuf>,
}

impl Workspace {
    /// Resolve paths from the global flags, the environment and the config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file is invalid or no home directory
    /// can be found for the defaults.
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let config = load_config()?;
        let db_path = resolve_db_path(cli.db.as_deref()).ok_or(Error::NotInitialized)?;
        let content_dir = resolve_content_dir(cli.content_dir.as_deref(), &config)
            .ok_or_else(|| Error::Config("Could not determine the content folder".to_string()))?;
        let files_dir = resolve_files_dir(cli.files_dir.as_deref(), &config);
        let registry = config.registry();

        Ok(Self {
            config,
            registry,
            db_path,
            content_dir,
            files_dir,
        })
    }

    /// Open the target database, which `dcd init` must have created.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotInitialized` if the database file is missing.
    pub fn open_storage(&self) -> Result<SqliteStorage> {
        if !self.db_path.exists() {
            return Err(Error::NotInitialized);
        }
        let mut storage = SqliteStorage::open(&self.db_path)?;
        storage.use_registry(&self.registry);
        Ok(storage)
    }
}
