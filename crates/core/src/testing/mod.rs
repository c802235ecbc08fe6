//! Testing utilities and mock implementations.
//!
//! This module provides mocks for the analyzer and verifier seams plus
//! fixtures that put sample files on disk and into a library.
//!
//! # Example
//!
//! ```rust,ignore
//! use sampledrawer_core::testing::fixtures;
//!
//! let dir = tempfile::TempDir::new()?;
//! let library = Library::open(dir.path().join("library"))?;
//! let (kick, id) = fixtures::import_sample(&library, dir.path(), "kick", b"kick", &["drums"], true);
//! ```

mod mock_analyzer;
mod mock_observer;

pub use mock_analyzer::MockAnalyzer;
pub use mock_observer::ScriptedObserver;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::fs;
    use std::path::{Path, PathBuf};

    use crate::analyzer::{BasicAnalyzer, FileAnalyzer};
    use crate::library::Library;
    use crate::metadata::Metadata;

    /// Write `body` to `<dir>/<name>.wav`.
    pub fn write_sample(dir: &Path, name: &str, body: &[u8]) -> PathBuf {
        let path = dir.join(format!("{}.wav", name));
        fs::write(&path, body).expect("write sample file");
        path
    }

    /// Analyze a file written by [`write_sample`] and name it.
    pub fn sample_metadata(path: &Path, name: &str, tags: &[&str]) -> Metadata {
        let info = BasicAnalyzer::new().analyze(path).expect("analyze sample");
        let mut metadata = Metadata::from_file_info(&info);
        metadata.set_name(Some(name.to_string()));
        metadata.set_tags(tags.iter().copied());
        metadata
    }

    /// Write a sample and import it. Returns its metadata and item id.
    pub fn import_sample(
        library: &Library,
        dir: &Path,
        name: &str,
        body: &[u8],
        tags: &[&str],
        copy: bool,
    ) -> (Metadata, i64) {
        let path = write_sample(dir, name, body);
        let metadata = sample_metadata(&path, name, tags);
        let id = library.import_file(&metadata, copy).expect("import sample");
        (metadata, id)
    }
}
