//! Query language, SQL compilation and autocompletion.
//!
//! A query is split shell-style into tokens, each token becomes one
//! [`Condition`]:
//!
//! - `?tag`, `?/` (or `+tag`): item carries any of the included tags
//! - `-tag`, `-/`: item carries none of the excluded tags
//! - `key<op>value`: fixed (`_name`) or custom (`bpm`) field comparison
//! - anything else: free text matched against the full-text index

mod completion;
mod condition;
mod query;
mod sql;
mod tokenize;

pub use completion::{
    fts_words, parse_offsets, CompletionQuery, TermOffset, COMPLETION_COLUMNS, FTS_DELIMITER,
};
pub use condition::{Condition, KeyTarget, MetadataCondition, Operator, ROOT_TAG};
pub use query::SearchQuery;
pub use sql::{Scope, SqlOptions, SqlQuery, ITEM_COLUMNS};
pub use tokenize::{quote, split, split_lenient, TokenizeError};
