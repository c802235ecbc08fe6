//! LRU-memoized analyzer wrapper.

use std::path::Path;

use tracing::debug;

use super::error::AnalyzeError;
use super::traits::FileAnalyzer;
use super::types::{FileInfo, FileKey};
use crate::cache::{CacheStats, LruCache};

/// Wraps another analyzer and remembers its results per file version.
pub struct CachedAnalyzer<A> {
    inner: A,
    cache: LruCache<FileKey, FileInfo>,
}

impl<A: FileAnalyzer> CachedAnalyzer<A> {
    pub fn new(inner: A, capacity: usize) -> Self {
        Self {
            inner,
            cache: LruCache::new(capacity),
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl<A: FileAnalyzer> FileAnalyzer for CachedAnalyzer<A> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn analyze(&self, path: &Path) -> Result<FileInfo, AnalyzeError> {
        let key = FileKey::for_path(path)?;
        if let Some(mut info) = self.cache.get(&key) {
            debug!(target: "analyzer", path = %path.display(), "Cache hit");
            info.path = path.to_string_lossy().into_owned();
            return Ok(info);
        }
        let info = self.inner.analyze(path)?;
        self.cache.put(key, info.clone());
        Ok(info)
    }
}
