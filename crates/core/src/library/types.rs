//! Types for the library module.

use serde::Serialize;

/// A tag and the number of library items carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagInfo {
    pub name: String,
    pub item_count: i64,
}

/// A file skipped because its checksum is already present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportConflict {
    pub path: String,
    pub md5: String,
    pub existing_name: String,
}

/// A file skipped for any other reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportFailure {
    pub path: String,
    pub reason: String,
}

/// Outcome of a batch import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// `(source path, new item id)` of every imported file.
    pub imported: Vec<(String, i64)>,
    pub conflicts: Vec<ImportConflict>,
    pub failed: Vec<ImportFailure>,
}

impl ImportReport {
    pub fn skipped(&self) -> usize {
        self.conflicts.len() + self.failed.len()
    }
}
