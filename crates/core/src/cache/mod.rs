//! In-memory caching.

mod lru;

pub use lru::{CacheStats, LruCache, DEFAULT_MAXSIZE};
