//! File analysis seam feeding the import flow.
//!
//! An analyzer turns a file on disk into a [`FileInfo`] mapping, which
//! [`Metadata::from_file_info`](crate::metadata::Metadata::from_file_info)
//! consumes. [`BasicAnalyzer`] only computes the checksum and derives the
//! format from the extension; decoding analyzers plug in behind the same
//! [`FileAnalyzer`] trait.
//!
//! # Example
//!
//! ```ignore
//! use sampledrawer_core::analyzer::{BasicAnalyzer, CachedAnalyzer, FileAnalyzer};
//!
//! let analyzer = CachedAnalyzer::new(BasicAnalyzer::new(), 100);
//! let info = analyzer.analyze(Path::new("/music/kick.wav"))?;
//! println!("{} -> {:?}", info.path, info.md5);
//! ```

mod basic;
mod cached;
mod error;
mod traits;
mod types;

pub use basic::{checksum_file, BasicAnalyzer};
pub use cached::CachedAnalyzer;
pub use error::AnalyzeError;
pub use traits::FileAnalyzer;
pub use types::{FileInfo, FileKey};
