//! Error types for content deploy.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, etc.)
//! - Retryability flags for scripted callers
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

use crate::sync::SyncError;

/// Result type alias for content deploy operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    AlreadyInitialized,
    DatabaseError,

    // Not Found (exit 3)
    RecordNotFound,
    UnknownType,

    // Validation (exit 4)
    InvalidArgument,
    InvalidRecord,

    // Sync (exit 6)
    SyncError,
    DuplicateIdentity,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::RecordNotFound => "RECORD_NOT_FOUND",
            Self::UnknownType => "UNKNOWN_TYPE",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::InvalidRecord => "INVALID_RECORD",
            Self::SyncError => "SYNC_ERROR",
            Self::DuplicateIdentity => "DUPLICATE_IDENTITY",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::AlreadyInitialized | Self::DatabaseError => 2,
            Self::RecordNotFound | Self::UnknownType => 3,
            Self::InvalidArgument | Self::InvalidRecord => 4,
            Self::SyncError | Self::DuplicateIdentity => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether a caller should retry after correcting its input.
    ///
    /// True for bad arguments and for content problems that are fixed by
    /// editing the source files (duplicates, malformed records).
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument
                | Self::InvalidRecord
                | Self::UnknownType
                | Self::DuplicateIdentity
                | Self::DatabaseError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in content deploy operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `dcd init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("Record not found: {type_id} {id}")]
    RecordNotFound { type_id: String, id: String },

    #[error("Entity type \"{type_id}\" does not exist")]
    UnknownType {
        type_id: String,
        /// Content types the registry does know, for hint display.
        available: Vec<String>,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::RecordNotFound { .. } => ErrorCode::RecordNotFound,
            Self::UnknownType { .. } => ErrorCode::UnknownType,
            Self::Sync(e) => match e {
                SyncError::DuplicateIdentity { .. } => ErrorCode::DuplicateIdentity,
                SyncError::UnknownType(_) => ErrorCode::UnknownType,
                SyncError::InvalidRecord { .. } => ErrorCode::InvalidRecord,
                SyncError::Io(_) => ErrorCode::IoError,
                SyncError::Json(_) => ErrorCode::JsonError,
                SyncError::Database(_) => ErrorCode::DatabaseError,
                SyncError::FileNotFound(_) => ErrorCode::SyncError,
            },
            Self::InvalidArgument(_) | Self::Unsupported(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint for scripts and humans.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => Some("Run `dcd init` to create the target database".to_string()),

            Self::AlreadyInitialized { path } => Some(format!(
                "Database already exists at {}. Use `--force` to reinitialize.",
                path.display()
            )),

            Self::RecordNotFound { type_id, .. } => Some(format!(
                "Check the ids passed for '{type_id}'. Skipped ids never fail an export."
            )),

            Self::UnknownType { available, .. } => {
                if available.is_empty() {
                    None
                } else {
                    Some(format!("Content entity types: {}", available.join(",")))
                }
            }

            Self::Sync(SyncError::DuplicateIdentity { first, second, .. }) => Some(format!(
                "Remove one of the two files and run the import again:\n    {}\n    {}",
                first.display(),
                second.display()
            )),

            Self::Sync(SyncError::InvalidRecord { path, .. }) => Some(format!(
                "Fix or remove {} and run the import again.",
                path.display()
            )),

            Self::Sync(SyncError::UnknownType(_)) => {
                Some("Use `dcd entity-list` to see the content entity types.".to_string())
            }

            Self::Sync(SyncError::FileNotFound(_)) => {
                Some("Run `dcd export-site` first to create content files.".to_string())
            }

            Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Sync(_)
            | Self::InvalidArgument(_)
            | Self::Unsupported(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_identity_is_sync_category() {
        let err = Error::from(SyncError::DuplicateIdentity {
            stable_id: "u1".to_string(),
            first: PathBuf::from("content/node/a.json"),
            second: PathBuf::from("content/node/b.json"),
        });

        assert_eq!(err.error_code(), ErrorCode::DuplicateIdentity);
        assert_eq!(err.exit_code(), 6);

        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "DUPLICATE_IDENTITY");
        let hint = json["error"]["hint"].as_str().unwrap();
        assert!(hint.contains("content/node/a.json"));
        assert!(hint.contains("content/node/b.json"));
    }

    #[test]
    fn test_unknown_type_lists_available() {
        let err = Error::UnknownType {
            type_id: "nod".to_string(),
            available: vec!["node".to_string(), "user".to_string()],
        };
        assert_eq!(err.exit_code(), 3);
        assert_eq!(err.hint().unwrap(), "Content entity types: node,user");
    }
}
