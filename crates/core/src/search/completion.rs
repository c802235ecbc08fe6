//! Autocompletion of the word being typed.

use std::collections::BTreeSet;

use rusqlite::types::Value;

use super::condition::{parse_metadata, parse_tag_exclude, parse_tag_include};
use super::query::SearchQuery;
use super::sql::{QueryBuilder, SqlOptions, SqlQuery};
use super::tokenize::{quote, scan, TokenizeError};

/// Separator between values in the full-text document.
pub const FTS_DELIMITER: &str = "~~~";

/// Columns the completion statement selects.
pub const COMPLETION_COLUMNS: [&str; 3] = ["item.id", "offsets(fts)", "fts.content"];

/// One entry of an `offsets()` report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TermOffset {
    pub offset: usize,
    pub term: usize,
    pub column: usize,
    pub size: usize,
}

/// Parse the space-separated quadruples `offsets()` returns.
pub fn parse_offsets(offsets: &str) -> Vec<TermOffset> {
    let numbers: Vec<usize> = offsets
        .split_whitespace()
        .filter_map(|n| n.parse().ok())
        .collect();
    numbers
        .chunks_exact(4)
        .map(|q| TermOffset {
            column: q[0],
            term: q[1],
            offset: q[2],
            size: q[3],
        })
        .collect()
}

/// Split text into full-text tokens: runs of ASCII alphanumerics and
/// non-ASCII characters.
pub fn fts_words(text: &str) -> Vec<String> {
    text.split(|c: char| c.is_ascii() && !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// A base query plus the partial word to complete.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionQuery {
    base: SearchQuery,
    text: String,
    start_index: usize,
    prefix: String,
    words: Vec<String>,
    quoted: bool,
    trailing_space: bool,
}

impl CompletionQuery {
    /// Find the partial token at the end of `text`.
    ///
    /// Returns `None` when there is nothing to complete: the text is empty,
    /// ends in whitespace, or its last token is a tag or field condition.
    pub fn from_text(text: &str) -> Option<Self> {
        let scanned = scan(text);
        let quoted = match scanned.error {
            Some(TokenizeError::UnterminatedQuote) => true,
            Some(TokenizeError::TrailingEscape) => return None,
            None => {
                if text.ends_with(|c: char| c.is_whitespace()) {
                    return None;
                }
                false
            }
        };
        let partial = scanned.tokens.last()?;
        let prefix = partial.value.as_str();
        if parse_tag_include(prefix).is_some()
            || parse_tag_exclude(prefix).is_some()
            || parse_metadata(prefix).is_some()
        {
            return None;
        }
        let words = fts_words(prefix);
        if words.is_empty() {
            return None;
        }
        Some(Self {
            base: SearchQuery::parse(&text[..partial.start]),
            text: text.to_string(),
            start_index: partial.start,
            prefix: prefix.to_string(),
            words,
            quoted,
            trailing_space: quoted && prefix.ends_with(char::is_whitespace),
        })
    }

    pub fn base(&self) -> &SearchQuery {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut SearchQuery {
        &mut self.base
    }

    /// The partial token as typed, unquoted.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Byte offset of the partial token in the original text.
    pub fn start_index(&self) -> usize {
        self.start_index
    }

    pub fn is_quoted(&self) -> bool {
        self.quoted
    }

    /// Full-text phrase matching the partial words.
    pub fn phrase(&self) -> String {
        let words = self.words.join(" ");
        if self.trailing_space {
            format!("\"{}\"", words)
        } else {
            format!("\"{}*\"", words)
        }
    }

    pub fn as_sql(&self, options: &SqlOptions) -> SqlQuery {
        let options = options.clone().with_columns(COMPLETION_COLUMNS);
        let mut builder = QueryBuilder::new();
        builder.join("JOIN fts ON fts.docid = item.id");
        self.base.compile_into(&mut builder, &options);
        builder.clause("fts MATCH ?", [Value::Text(self.phrase())]);
        builder.build(&options)
    }

    /// Suggestions from one result row.
    pub fn suggestions(&self, offsets: &str, content: &str) -> Vec<String> {
        let mut offsets = parse_offsets(offsets);
        offsets.sort();
        let n = self.words.len();
        let mut found = Vec::new();
        for (i, first) in offsets.iter().enumerate() {
            if first.term != 0 || i + n > offsets.len() {
                continue;
            }
            let run = &offsets[i..i + n];
            if run.iter().enumerate().any(|(k, o)| o.term != k) {
                continue;
            }
            let last = run[n - 1];
            let end = self.extend_span(content, last.offset + last.size);
            let Some(span) = content.get(first.offset..end) else {
                continue;
            };
            if !span.contains(FTS_DELIMITER) {
                found.push(span.to_string());
            }
        }
        found
    }

    /// With a trailing space, stretch the span over the next word.
    fn extend_span(&self, content: &str, end: usize) -> usize {
        if !self.trailing_space {
            return end;
        }
        let Some(rest) = content.get(end..) else {
            return end;
        };
        let trimmed = rest.trim_start();
        let word = trimmed.split(char::is_whitespace).next().unwrap_or("");
        if word.is_empty() || word == FTS_DELIMITER {
            return end;
        }
        end + (rest.len() - trimmed.len()) + word.len()
    }

    /// Deduplicated, sorted suggestions over all rows.
    pub fn collect<'a, I>(&self, rows: I) -> Vec<String>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let all: BTreeSet<String> = rows
            .into_iter()
            .flat_map(|(offsets, content)| self.suggestions(offsets, content))
            .collect();
        all.into_iter().collect()
    }

    /// The input text with the partial token replaced by `suggestion`.
    pub fn complete(&self, suggestion: &str) -> String {
        format!("{}{}", &self.text[..self.start_index], quote(suggestion))
    }
}
