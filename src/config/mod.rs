//! Configuration management.
//!
//! This module resolves the database path, the content folder and the files
//! directory, and loads the optional config file.
//!
//! # Layout
//!
//! Everything defaults to a single home directory, `~/.dcd/`:
//! - **Database**: `~/.dcd/data/content.db`
//! - **Content folder**: `~/.dcd/content/`
//! - **Config file**: `~/.dcd/config.json`
//!
//! The files directory has no default. Without one, the target has no
//! file-attachment capability and file records are skipped on import.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{TypeDescriptor, TypeRegistry};
use crate::sync::{DuplicatePolicy, ImportOptions};

/// Environment variable overriding the database path.
pub const ENV_DB: &str = "DCD_DB";
/// Environment variable overriding the content folder.
pub const ENV_CONTENT_DIR: &str = "DCD_CONTENT_DIR";
/// Environment variable naming the files directory.
pub const ENV_FILES_DIR: &str = "DCD_FILES_DIR";

/// Settings read from `~/.dcd/config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub content_dir: Option<PathBuf>,
    pub files_dir: Option<PathBuf>,
    pub force_update: bool,
    pub duplicate_policy: DuplicatePolicy,
    /// Extra or overridden type descriptors.
    pub types: Vec<TypeDescriptor>,
}

impl DeployConfig {
    /// The built-in type table with this config's types applied on top.
    #[must_use]
    pub fn registry(&self) -> TypeRegistry {
        let mut registry = TypeRegistry::with_defaults();
        for descriptor in &self.types {
            registry.register(descriptor.clone());
        }
        registry
    }

    /// Import options from the config, before command-line overrides.
    #[must_use]
    pub fn import_options(&self) -> ImportOptions {
        ImportOptions::default()
            .force_update(self.force_update)
            .duplicate_policy(self.duplicate_policy)
    }
}

/// Get the global dcd directory location (`~/.dcd/`).
#[must_use]
pub fn global_dcd_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".dcd"))
}

/// Get the config file path.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_path() -> Result<PathBuf> {
    global_dcd_dir()
        .map(|dir| dir.join("config.json"))
        .ok_or_else(|| Error::Config("Could not determine home directory".into()))
}

/// Load the config file, or defaults if there is none.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config() -> Result<DeployConfig> {
    load_config_from(&config_path()?)
}

/// Load a config file from an explicit path, or defaults if it is missing.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config_from(path: &Path) -> Result<DeployConfig> {
    if !path.exists() {
        return Ok(DeployConfig::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `DCD_DB` environment variable
/// 3. Global location: `~/.dcd/data/content.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    first_path(
        explicit_path,
        env_path(ENV_DB),
        None,
        global_dcd_dir().map(|dir| dir.join("data").join("content.db")),
    )
}

/// Resolve the content folder.
///
/// Priority: explicit path, `DCD_CONTENT_DIR`, config file, `~/.dcd/content`.
#[must_use]
pub fn resolve_content_dir(explicit_path: Option<&Path>, config: &DeployConfig) -> Option<PathBuf> {
    first_path(
        explicit_path,
        env_path(ENV_CONTENT_DIR),
        config.content_dir.clone(),
        global_dcd_dir().map(|dir| dir.join("content")),
    )
}

/// Resolve the files directory. There is no default.
///
/// Priority: explicit path, `DCD_FILES_DIR`, config file.
#[must_use]
pub fn resolve_files_dir(explicit_path: Option<&Path>, config: &DeployConfig) -> Option<PathBuf> {
    first_path(
        explicit_path,
        env_path(ENV_FILES_DIR),
        config.files_dir.clone(),
        None,
    )
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

fn first_path(
    explicit: Option<&Path>,
    from_env: Option<PathBuf>,
    from_config: Option<PathBuf>,
    default: Option<PathBuf>,
) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or(from_env)
        .or(from_config)
        .or(default)
}
