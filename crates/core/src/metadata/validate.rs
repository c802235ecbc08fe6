//! Validation of tags and custom keys.
//!
//! Word characters follow the usual regex `\w` class in its Unicode form:
//! letters, digits and `_`.

use std::collections::BTreeSet;

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_tag_char(c: char) -> bool {
    is_word_char(c) || c == '-'
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(is_tag_char)
}

/// Check a tag against `^((/[\w-]+)*/)?[\w-]+$`.
pub fn is_valid_tag(tag: &str) -> bool {
    match tag.strip_prefix('/') {
        Some(rest) => rest.split('/').all(is_valid_segment),
        None => is_valid_segment(tag),
    }
}

/// Check a custom key against `^[^\W_][\w -]+$`.
pub fn is_valid_custom_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_alphanumeric() => {}
        _ => return false,
    }
    let mut rest = chars.peekable();
    rest.peek().is_some() && rest.all(|c| is_word_char(c) || c == ' ' || c == '-')
}

/// Replace every character that cannot appear in a tag path with `_`.
pub fn sanitize_tag_path(path: &str) -> String {
    path.chars()
        .map(|c| if is_tag_char(c) || c == '/' { c } else { '_' })
        .collect()
}

/// Ancestors of a hierarchical tag, nearest first: `/a/b/c` gives `/a/b`, `/a`.
pub fn parent_tags(tag: &str) -> Vec<String> {
    let mut parents = Vec::new();
    if !tag.starts_with('/') {
        return parents;
    }
    let mut current = tag;
    while let Some((parent, _)) = current.rsplit_once('/') {
        if parent.is_empty() {
            break;
        }
        parents.push(parent.to_string());
        current = parent;
    }
    parents
}

/// The tag set plus every implied parent tag.
pub fn expand_tags<'a, I>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut expanded = BTreeSet::new();
    for tag in tags {
        expanded.extend(parent_tags(tag));
        expanded.insert(tag.clone());
    }
    expanded
}

/// Drop tags that are implied by a more specific tag in the same set.
pub fn leaf_tags(tags: &BTreeSet<String>) -> BTreeSet<String> {
    tags.iter()
        .filter(|tag| {
            let prefix = format!("{}/", tag);
            !tags.iter().any(|other| other.starts_with(&prefix))
        })
        .cloned()
        .collect()
}
