pub mod analyzer;
pub mod cache;
pub mod config;
pub mod library;
pub mod metadata;
pub mod metrics;
pub mod search;
pub mod testing;
pub mod verifier;

pub use analyzer::{BasicAnalyzer, CachedAnalyzer, FileAnalyzer, FileInfo};
pub use cache::LruCache;
pub use config::{load_config, load_config_from_str, load_config_or_default, validate_config, Config, ConfigError};
pub use library::{ImportReport, Library, LibraryError, TagInfo};
pub use metadata::{FieldValue, FixedField, Metadata, RewriteRule};
pub use search::{CompletionQuery, Condition, Scope, SearchQuery, SqlOptions, SqlQuery};
pub use verifier::{Answer, LibraryVerifier, VerifyObserver, VerifyReport};
