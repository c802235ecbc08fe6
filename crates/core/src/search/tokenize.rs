//! Shell-style splitting of query text.
//!
//! POSIX rules: whitespace separates words, `'...'` is literal, `"..."`
//! honours `\"` and `\\`, and an unquoted backslash escapes the next char.

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenizeError {
    #[error("No closing quotation")]
    UnterminatedQuote,

    #[error("No escaped character")]
    TrailingEscape,
}

/// A word and the byte offset where it starts in the scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub value: String,
    pub start: usize,
}

/// Result of scanning. On error the last token holds whatever was read of
/// the unfinished word.
#[derive(Debug)]
pub(crate) struct Scan {
    pub tokens: Vec<Token>,
    pub error: Option<TokenizeError>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Between,
    Word,
    Single,
    Double,
}

fn is_separator(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

pub(crate) fn scan(text: &str) -> Scan {
    let mut tokens = Vec::new();
    let mut error = None;
    let mut state = State::Between;
    let mut current = String::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match state {
            State::Between | State::Word => {
                if is_separator(c) {
                    if state == State::Word {
                        tokens.push(Token {
                            value: std::mem::take(&mut current),
                            start,
                        });
                        state = State::Between;
                    }
                    continue;
                }
                if state == State::Between {
                    start = i;
                    state = State::Word;
                }
                match c {
                    '\'' => state = State::Single,
                    '"' => state = State::Double,
                    '\\' => match chars.next() {
                        Some((_, escaped)) => current.push(escaped),
                        None => {
                            error = Some(TokenizeError::TrailingEscape);
                            break;
                        }
                    },
                    c => current.push(c),
                }
            }
            State::Single => match c {
                '\'' => state = State::Word,
                c => current.push(c),
            },
            State::Double => match c {
                '"' => state = State::Word,
                '\\' => match chars.peek() {
                    Some(&(_, next)) if next == '"' || next == '\\' => {
                        current.push(next);
                        chars.next();
                    }
                    _ => current.push('\\'),
                },
                c => current.push(c),
            },
        }
    }

    if matches!(state, State::Single | State::Double) {
        error = Some(TokenizeError::UnterminatedQuote);
    }
    if state != State::Between {
        tokens.push(Token {
            value: current,
            start,
        });
    }

    Scan { tokens, error }
}

/// Split `text` into words.
pub fn split(text: &str) -> Result<Vec<String>, TokenizeError> {
    let scan = scan(text);
    match scan.error {
        Some(err) => Err(err),
        None => Ok(scan.tokens.into_iter().map(|t| t.value).collect()),
    }
}

/// Split `text`, falling back to plain whitespace splitting with quotes and
/// backslashes removed when it cannot be tokenized.
pub fn split_lenient(text: &str) -> Vec<String> {
    split(text).unwrap_or_else(|err| {
        warn!(target: "search", "Could not parse {:?}: {}", text, err);
        text.replace(['"', '\'', '\\'], "")
            .split_whitespace()
            .map(str::to_string)
            .collect()
    })
}

/// Quote a query part with `"` when splitting would otherwise break it up.
pub fn quote(part: &str) -> String {
    let needs_quotes =
        part.is_empty() || part.contains(|c: char| is_separator(c) || matches!(c, '"' | '\'' | '\\'));
    if !needs_quotes {
        return part.to_string();
    }
    let mut quoted = String::with_capacity(part.len() + 2);
    quoted.push('"');
    for c in part.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}
