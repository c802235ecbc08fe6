//! Typed query conditions and the token parsers that produce them.

use std::fmt;

use crate::metadata::{is_valid_custom_key, is_valid_tag, FixedField};

use super::tokenize::quote;

/// The tag naming every library item.
pub const ROOT_TAG: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Operator {
    /// Spellings tried at one position, longest first.
    const SPELLINGS: [(&'static str, Operator); 8] = [
        ("==", Operator::Eq),
        ("<=", Operator::Le),
        (">=", Operator::Ge),
        ("!=", Operator::Ne),
        ("<>", Operator::Ne),
        ("=", Operator::Eq),
        ("<", Operator::Lt),
        (">", Operator::Gt),
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
        }
    }

    pub fn is_ordering(self) -> bool {
        matches!(self, Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge)
    }

    /// First operator occurrence in `text`: `(byte offset, spelling length, op)`.
    fn find(text: &str) -> Option<(usize, usize, Operator)> {
        text.char_indices().find_map(|(i, _)| {
            Self::SPELLINGS
                .iter()
                .find(|(spelling, _)| text[i..].starts_with(spelling))
                .map(|(spelling, op)| (i, spelling.len(), *op))
        })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a metadata comparison key refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyTarget {
    Fixed(FixedField),
    Custom(String),
    /// A bare key that is also a fixed field name: matches either.
    Either(FixedField, String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataCondition {
    pub key: String,
    pub op: Operator,
    pub value: String,
}

impl MetadataCondition {
    pub fn target(&self) -> KeyTarget {
        if let Some(field) = FixedField::from_key(&self.key) {
            return KeyTarget::Fixed(field);
        }
        match FixedField::from_name(&self.key) {
            Some(field) => KeyTarget::Either(field, self.key.clone()),
            None => KeyTarget::Custom(self.key.clone()),
        }
    }
}

/// One parsed query term.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Item carries the tag. Grouped: any of the included tags matches.
    TagInclude(String),
    /// Item does not carry the tag. Grouped: none of the excluded tags.
    TagExclude(String),
    /// Field comparison. Each one is its own AND term.
    Metadata(MetadataCondition),
    /// Free-text term. Grouped into one full-text match.
    Text(String),
}

/// Buckets for conditions compiled together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Group {
    TagInclude,
    TagExclude,
    Text,
}

impl Condition {
    pub(crate) fn group(&self) -> Option<Group> {
        match self {
            Condition::TagInclude(_) => Some(Group::TagInclude),
            Condition::TagExclude(_) => Some(Group::TagExclude),
            Condition::Metadata(_) => None,
            Condition::Text(_) => Some(Group::Text),
        }
    }

    /// Query text for this condition, quoted where needed.
    pub fn as_string(&self) -> String {
        match self {
            Condition::TagInclude(tag) => format!("?{}", tag),
            Condition::TagExclude(tag) => format!("-{}", tag),
            Condition::Metadata(cond) => {
                format!("{}{}{}", quote(&cond.key), cond.op, quote(&cond.value))
            }
            Condition::Text(text) => quote(text),
        }
    }
}

fn tag_argument(token: &str, prefixes: &[char]) -> Option<String> {
    let rest = token.strip_prefix(prefixes)?;
    if rest == ROOT_TAG || is_valid_tag(rest) {
        Some(rest.to_string())
    } else {
        None
    }
}

/// `?tag`, `?/` or the older `+tag`.
pub(crate) fn parse_tag_include(token: &str) -> Option<Condition> {
    tag_argument(token, &['?', '+']).map(Condition::TagInclude)
}

/// `-tag` or `-/`.
pub(crate) fn parse_tag_exclude(token: &str) -> Option<Condition> {
    tag_argument(token, &['-']).map(Condition::TagExclude)
}

/// `key<op>value`.
pub(crate) fn parse_metadata(token: &str) -> Option<Condition> {
    let (pos, len, op) = Operator::find(token)?;
    let key = token[..pos].trim().to_lowercase();
    let value = token[pos + len..].to_string();
    let valid = match key.strip_prefix('_') {
        Some(_) => FixedField::from_key(&key).is_some(),
        None => is_valid_custom_key(&key),
    };
    valid.then(|| Condition::Metadata(MetadataCondition { key, op, value }))
}

/// Anything with at least one word character.
pub(crate) fn parse_text(token: &str) -> Option<Condition> {
    token
        .chars()
        .any(|c| c.is_alphanumeric() || c == '_')
        .then(|| Condition::Text(token.to_string()))
}

/// Parsers in the order they are tried; the first match wins.
pub(crate) const PARSERS: [fn(&str) -> Option<Condition>; 4] =
    [parse_tag_include, parse_tag_exclude, parse_metadata, parse_text];

pub(crate) fn parse_token(token: &str) -> Option<Condition> {
    PARSERS.iter().find_map(|parse| parse(token))
}
