//! Content-addressed blob layout: `<base>/<h0>/<h1h2>/<md5><ext>`.

use std::path::{Path, PathBuf};

/// File extension for a format: `.wav` for `WAV`, `.bin` without one.
pub fn blob_extension(format: Option<&str>) -> String {
    match format.filter(|f| !f.is_empty()) {
        Some(format) => format!(".{}", format.to_lowercase()),
        None => ".bin".to_string(),
    }
}

/// Where the blob for `md5` lives below `base`.
///
/// Checksums shorter than three characters are laid out as far as they go.
pub fn object_path(base: &Path, md5: &str, format: Option<&str>) -> PathBuf {
    let first = md5.get(..1).unwrap_or_default();
    let second = md5.get(1..3).unwrap_or_default();
    base.join(first)
        .join(second)
        .join(format!("{}{}", md5, blob_extension(format)))
}

/// A display name made safe for use as a file name.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

/// File name of the human-readable alias for an item.
pub fn pretty_file_name(name: Option<&str>, md5: &str, format: Option<&str>) -> String {
    let stem = name.map(sanitize_file_name).filter(|s| !s.is_empty());
    format!(
        "{}{}",
        stem.as_deref().unwrap_or(md5),
        blob_extension(format)
    )
}
