//! Error types for the library module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by [`Library`](super::Library) operations.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// The database cannot be created, opened or read.
    #[error("Cannot open database {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    /// The file is not a library database.
    #[error("Invalid database {path}: {reason}")]
    InvalidDatabase { path: PathBuf, reason: String },

    /// The database was written by another schema version.
    #[error("Invalid database version: {found} ({expected} expected)")]
    VersionMismatch { found: i64, expected: i64 },

    /// An item with the same checksum is already in the library.
    #[error("Item {md5} is already in the library as {existing_name:?}")]
    Conflict { md5: String, existing_name: String },

    /// The item lacks data the operation requires.
    #[error("Invalid item: {0}")]
    InvalidItem(String),

    #[error("Library is closed")]
    Closed,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LibraryError {
    pub fn open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Open {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_database(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::InvalidDatabase {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Errors the application cannot continue after.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Open { .. } | Self::InvalidDatabase { .. } | Self::VersionMismatch { .. }
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(LibraryError::open("/x", "denied").is_fatal());
        assert!(LibraryError::invalid_database("/x", "no db_meta").is_fatal());
        assert!(LibraryError::VersionMismatch {
            found: 0,
            expected: 1
        }
        .is_fatal());

        let conflict = LibraryError::Conflict {
            md5: "abc123".to_string(),
            existing_name: "sine".to_string(),
        };
        assert!(!conflict.is_fatal());
        assert!(conflict.is_conflict());
        assert!(!LibraryError::Closed.is_fatal());
    }

    #[test]
    fn test_messages() {
        let err = LibraryError::VersionMismatch {
            found: 3,
            expected: 1,
        };
        assert_eq!(err.to_string(), "Invalid database version: 3 (1 expected)");
    }
}
