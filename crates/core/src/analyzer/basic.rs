//! Checksum-only analyzer.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::debug;

use super::error::AnalyzeError;
use super::traits::FileAnalyzer;
use super::types::FileInfo;

const BUFFER_SIZE: usize = 64 * 1024;

/// Hex MD5 digest of a file, streamed in fixed-size chunks.
pub fn checksum_file(path: &Path) -> Result<String, AnalyzeError> {
    let file = File::open(path).map_err(|e| AnalyzeError::read_failed(path, e))?;
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, file);
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut context = md5::Context::new();
    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| AnalyzeError::read_failed(path, e))?;
        if bytes_read == 0 {
            break;
        }
        context.consume(&buffer[..bytes_read]);
    }
    Ok(format!("{:x}", context.compute()))
}

/// Computes the checksum and takes the format from the file extension.
#[derive(Debug, Clone, Default)]
pub struct BasicAnalyzer;

impl BasicAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl FileAnalyzer for BasicAnalyzer {
    fn name(&self) -> &str {
        "basic"
    }

    fn analyze(&self, path: &Path) -> Result<FileInfo, AnalyzeError> {
        if !path.is_file() {
            return Err(AnalyzeError::NotAFile {
                path: path.to_path_buf(),
            });
        }
        let md5 = checksum_file(path)?;
        let format = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_uppercase())
            .filter(|ext| !ext.is_empty());
        debug!(target: "analyzer", path = %path.display(), %md5, "Analyzed file");
        Ok(FileInfo {
            path: path.to_string_lossy().into_owned(),
            format,
            md5: Some(md5),
            ..FileInfo::default()
        })
    }
}
