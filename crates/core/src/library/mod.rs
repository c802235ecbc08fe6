//! Content-addressed sample library backed by SQLite.
//!
//! # Layout
//!
//! ```text
//! <base>/database.db            items, tags, custom values, full-text index
//! <base>/<h0>/<h1h2>/<md5><ext> one blob per checksum
//! <base>/tmp.<pid>.<seq>/       export aliases of one open instance
//! ```

mod blob;
mod cleanup;
mod error;
mod schema;
mod store;
mod types;

pub use blob::{blob_extension, object_path, pretty_file_name, sanitize_file_name};
pub use cleanup::CleanupScheduler;
pub use error::LibraryError;
pub use schema::SCHEMA_VERSION;
pub use store::{fts_document, Library, DATABASE_FILE, TMP_DIR_PREFIX};
pub use types::{ImportConflict, ImportFailure, ImportReport, TagInfo};
