//! File operations for content folders.
//!
//! This module provides the file scanner and safe file writes:
//! - Scanning: `*.json` files directly inside `<content>/<type>/`, by name
//! - Atomic writes: write to temp file, sync to disk, then rename

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use crate::sync::types::{SyncError, SyncResult};

/// Extension of content files.
pub const CONTENT_EXTENSION: &str = "json";

/// Directory holding the content files of one type.
#[must_use]
pub fn type_dir(content_dir: &Path, type_id: &str) -> PathBuf {
    content_dir.join(type_id)
}

/// List the content files of one type, sorted by file name.
///
/// A missing type directory yields an empty list. Subdirectories and files
/// with other extensions are ignored.
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be read.
pub fn scan_type_dir(content_dir: &Path, type_id: &str) -> SyncResult<Vec<PathBuf>> {
    let dir = type_dir(content_dir, type_id);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == CONTENT_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Read a content file.
///
/// # Errors
///
/// Returns `SyncError::FileNotFound` if the file does not exist, or an IO
/// error if it cannot be read.
pub fn read_file(path: &Path) -> SyncResult<Vec<u8>> {
    if !path.exists() {
        return Err(SyncError::FileNotFound(path.display().to_string()));
    }
    Ok(fs::read(path)?)
}

/// File name of a path, for log lines.
#[must_use]
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// Join a relative path below `base`, refusing absolute paths and `..`.
#[must_use]
pub fn contained_path(base: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    let safe = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    (safe && !relative.as_os_str().is_empty()).then(|| base.join(relative))
}

/// Write content to a file atomically.
///
/// This function:
/// 1. Writes content to a temporary file (same path with `.tmp` extension)
/// 2. Calls `fsync` to ensure data is on disk
/// 3. Atomically renames the temp file to the target path
///
/// If any step fails, the original file (if any) remains untouched.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(path: &Path, content: &[u8]) -> SyncResult<()> {
    let temp_path = path.with_extension("tmp");

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    // Write to temp file
    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content)?;
        writer.flush()?;
        // Sync to disk before rename
        writer.get_ref().sync_all()?;
    }

    // Atomic rename
    fs::rename(&temp_path, path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("node").join("u1.json");

        atomic_write(&path, b"{\"uuid\":\"u1\"}").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\"uuid\":\"u1\"}");
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_scan_type_dir_sorted_and_filtered() {
        let temp_dir = TempDir::new().unwrap();
        let node_dir = temp_dir.path().join("node");
        fs::create_dir_all(node_dir.join("nested")).unwrap();
        fs::write(node_dir.join("b.json"), "{}").unwrap();
        fs::write(node_dir.join("a.json"), "{}").unwrap();
        fs::write(node_dir.join("notes.txt"), "").unwrap();
        fs::write(node_dir.join("nested").join("c.json"), "{}").unwrap();

        let files = scan_type_dir(temp_dir.path(), "node").unwrap();
        let names: Vec<_> = files.iter().map(|p| file_name(p)).collect();
        assert_eq!(names, vec!["a.json", "b.json"]);

        assert!(scan_type_dir(temp_dir.path(), "user").unwrap().is_empty());
    }

    #[test]
    fn test_file_not_found() {
        let result = read_file(Path::new("/nonexistent/file.json"));
        assert!(matches!(result, Err(SyncError::FileNotFound(_))));
    }

    #[test]
    fn test_contained_path() {
        let base = Path::new("/srv/files");
        assert_eq!(
            contained_path(base, "images/a.png"),
            Some(PathBuf::from("/srv/files/images/a.png"))
        );
        assert!(contained_path(base, "../etc/passwd").is_none());
        assert!(contained_path(base, "/etc/passwd").is_none());
        assert!(contained_path(base, "").is_none());
    }
}
