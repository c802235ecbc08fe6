//! Types for the analyzer module.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::error::AnalyzeError;

/// Flat description of an analyzed file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
    /// Downsampled peak envelope, when the analyzer computes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waveform: Option<Vec<f32>>,
}

/// Identity of a file version: a rewritten or touched file gets a new key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileKey {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

impl FileKey {
    pub fn for_path(path: &Path) -> Result<Self, AnalyzeError> {
        let canonical = path
            .canonicalize()
            .map_err(|e| AnalyzeError::read_failed(path, e))?;
        let meta = canonical
            .metadata()
            .map_err(|e| AnalyzeError::read_failed(path, e))?;
        if !meta.is_file() {
            return Err(AnalyzeError::NotAFile {
                path: path.to_path_buf(),
            });
        }
        Ok(Self {
            path: canonical,
            size: meta.len(),
            modified: meta.modified().ok(),
        })
    }
}
