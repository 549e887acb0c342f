//! Content hashing for sync operations.
//!
//! SHA256 over a serialized content file lets the exporter leave files
//! alone when a record has not changed since the last export.

use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::sync::types::SyncResult;

/// Compute a SHA256 hash of serialized content.
#[must_use]
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hash of a file on disk, or `None` if it does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn file_hash(path: &Path) -> SyncResult<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(content_hash(&content)))
}

/// Check if content has changed since it was last written.
///
/// Returns `true` if:
/// - There is no stored hash (never written)
/// - The current hash differs from the stored hash
///
/// Returns `false` if the hashes match (no change).
#[must_use]
pub fn has_changed(current_hash: &str, stored_hash: Option<&str>) -> bool {
    stored_hash.is_none_or(|h| h != current_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_content_hash_deterministic() {
        let hash1 = content_hash(r#"{"uuid":"u1"}"#);
        let hash2 = content_hash(r#"{"uuid":"u1"}"#);

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64); // SHA256 produces 64 hex chars
        assert_ne!(hash1, content_hash(r#"{"uuid":"u2"}"#));
    }

    #[test]
    fn test_file_hash() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.json");
        assert!(file_hash(&path).unwrap().is_none());

        fs::write(&path, "{}").unwrap();
        assert_eq!(file_hash(&path).unwrap(), Some(content_hash("{}")));
    }

    #[test]
    fn test_has_changed() {
        assert!(has_changed("abc123", None));
        assert!(has_changed("abc123", Some("xyz789")));
        assert!(!has_changed("abc123", Some("abc123")));
    }
}
