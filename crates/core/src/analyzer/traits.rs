//! Trait definitions for the analyzer module.

use std::path::Path;

use super::error::AnalyzeError;
use super::types::FileInfo;

/// Something that can describe an audio file.
pub trait FileAnalyzer: Send + Sync {
    /// Returns the name of this analyzer implementation.
    fn name(&self) -> &str;

    /// Analyze the file at `path`.
    fn analyze(&self, path: &Path) -> Result<FileInfo, AnalyzeError>;
}
