//! Mock analyzer for testing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::analyzer::{AnalyzeError, FileAnalyzer, FileInfo};

/// Mock implementation of the FileAnalyzer trait.
///
/// Returns preset results per path and records every call. Paths without a
/// preset result are reported as [`AnalyzeError::NotAFile`].
///
/// # Example
///
/// ```rust,ignore
/// use sampledrawer_core::testing::MockAnalyzer;
///
/// let analyzer = MockAnalyzer::new();
/// analyzer.set_info("/music/kick.wav", info);
/// analyzer.analyze(Path::new("/music/kick.wav"))?;
/// assert_eq!(analyzer.calls().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MockAnalyzer {
    infos: Mutex<HashMap<PathBuf, FileInfo>>,
    calls: Mutex<Vec<PathBuf>>,
}

impl MockAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Result returned for `path`.
    pub fn set_info(&self, path: impl Into<PathBuf>, info: FileInfo) {
        self.infos
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), info);
    }

    /// Paths analyzed so far, in call order.
    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl FileAnalyzer for MockAnalyzer {
    fn name(&self) -> &str {
        "mock"
    }

    fn analyze(&self, path: &Path) -> Result<FileInfo, AnalyzeError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_path_buf());
        self.infos
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
            .ok_or_else(|| AnalyzeError::NotAFile {
                path: path.to_path_buf(),
            })
    }
}
