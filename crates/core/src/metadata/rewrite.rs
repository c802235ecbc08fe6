//! Rule-based metadata rewriting applied on import.

use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};

use regex_lite::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use super::fields::{FieldValue, FixedField};
use super::template;
use super::types::{Metadata, TAGS_KEY};
use super::validate::{is_valid_custom_key, sanitize_tag_path};

/// Synthetic flat-view key exposing the folder-derived category.
pub const AUTO_CATEGORY_KEY: &str = "_auto_category";

/// Name of the rule set used when none is selected.
pub const DEFAULT_RULE_SET: &str = "default";

/// Rules of the `default` set: name from filename, tags from folder.
pub const DEFAULT_RULES: &[(&str, &str, &[(&str, &str)])] = &[
    ("_path", r"^(.*/)?([^/]*?)(\.[^/.]*)?$", &[("_name", "{2}")]),
    (AUTO_CATEGORY_KEY, r"^/.*$", &[("_tags", "{_tags} {0}")]),
];

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("invalid rewrite pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex_lite::Error,
    },
}

/// One `(field, regex, {target: template})` rule.
#[derive(Debug, Clone)]
pub struct RewriteRule {
    field: String,
    regex: Regex,
    substitutions: Vec<(String, String)>,
}

impl RewriteRule {
    pub fn new<I, K, V>(field: &str, pattern: &str, substitutions: I) -> Result<Self, RewriteError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let regex = Regex::new(pattern).map_err(|source| RewriteError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            field: field.to_string(),
            regex,
            substitutions: substitutions
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    pub fn substitutions(&self) -> &[(String, String)] {
        &self.substitutions
    }
}

/// Compile the built-in `default` rule set.
pub fn default_rules() -> Vec<RewriteRule> {
    DEFAULT_RULES
        .iter()
        .filter_map(|(field, pattern, substs)| {
            RewriteRule::new(field, pattern, substs.iter().copied()).ok()
        })
        .collect()
}

fn target_allowed(target: &str) -> bool {
    if target == TAGS_KEY {
        return true;
    }
    match FixedField::from_key(target) {
        Some(field) if field.is_editable() => true,
        Some(_) => {
            warn!(target: "metadata::rewrite", "{:?} is not editable, not substituting", target);
            false
        }
        None if target.starts_with('_') => {
            warn!(target: "metadata::rewrite", "{:?} is not a known field, not substituting", target);
            false
        }
        None if !is_valid_custom_key(target) => {
            warn!(target: "metadata::rewrite", "Invalid meta-data key: {:?}", target);
            false
        }
        None => true,
    }
}

/// Lexical normalisation: drops `.` and resolves `..` without touching the disk.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Category tag for a sample below `root`, e.g. `/loops/808_kit`.
pub fn auto_category(path: &str, root: &Path) -> Option<String> {
    let root = normalize(root);
    let directory = normalize(Path::new(path).parent()?);
    let Ok(relative) = directory.strip_prefix(&root) else {
        debug!(target: "metadata::rewrite", "{:?} not under {:?}", path, root);
        return None;
    };
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        debug!(target: "metadata::rewrite", "No category in path");
        return None;
    }
    Some(format!("/{}", sanitize_tag_path(&parts.join("/"))))
}

impl Metadata {
    /// Return a copy rewritten by `rules`. `self` is left untouched.
    ///
    /// With a `root`, samples stored below it get an `_auto_category` value
    /// derived from their folder, available to the rules as a source field.
    pub fn rewrite(&self, rules: &[RewriteRule], root: Option<&Path>) -> Metadata {
        let mut data = self.fields();
        let tags: Vec<&str> = self.tags().iter().map(String::as_str).collect();
        data.insert(TAGS_KEY.to_string(), tags.join(" "));

        if let (Some(root), Some(path)) = (root, self.path()) {
            if let Some(category) = auto_category(path, root) {
                data.insert(AUTO_CATEGORY_KEY.to_string(), category);
            }
        }

        for rule in rules {
            apply_rule(rule, &mut data);
        }

        data.remove(AUTO_CATEGORY_KEY);
        let tags = data.remove(TAGS_KEY).unwrap_or_default();
        Metadata::from_fields(
            data.into_iter().map(|(k, v)| (k, FieldValue::Text(v))),
            tags.split_whitespace(),
        )
    }
}

fn apply_rule(rule: &RewriteRule, data: &mut BTreeMap<String, String>) {
    let Some(value) = data.get(&rule.field) else {
        debug!(target: "metadata::rewrite", field = %rule.field, "Ignoring rule, no value");
        return;
    };
    let Some(captures) = rule.regex.captures(value) else {
        return;
    };
    if captures.get(0).map(|m| m.start()) != Some(0) {
        return;
    }

    let positional: Vec<String> = (0..captures.len())
        .map(|i| {
            captures
                .get(i)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        })
        .collect();
    let mut named: HashMap<String, String> =
        data.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    for name in rule.regex.capture_names().flatten() {
        let group = captures
            .name(name)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        named.insert(name.to_string(), group);
    }

    for (target, pattern) in &rule.substitutions {
        if !target_allowed(target) {
            continue;
        }
        match template::render(pattern, &positional, &named) {
            Ok(new_value) => {
                debug!(target: "metadata::rewrite", %target, %new_value, "Substituted");
                data.insert(target.clone(), new_value);
            }
            Err(err) => {
                warn!(target: "metadata::rewrite", "{:?} substitution failed: {}", pattern, err);
            }
        }
    }
}
