use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::DEFAULT_MAXSIZE;
use crate::metadata::{default_rules, RewriteError, RewriteRule, DEFAULT_RULES, DEFAULT_RULE_SET};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default = "default_rule_sets")]
    pub rewrite_rules: BTreeMap<String, RuleSetConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            library: LibraryConfig::default(),
            search: SearchConfig::default(),
            export: ExportConfig::default(),
            analyzer: AnalyzerConfig::default(),
            rewrite_rules: default_rule_sets(),
        }
    }
}

impl Config {
    /// Compiled rules of the set `name`.
    ///
    /// The built-in `default` set is available even when the file replaces
    /// the rule table without redefining it.
    pub fn rule_set(&self, name: &str) -> Result<Option<Vec<RewriteRule>>, RewriteError> {
        match self.rewrite_rules.get(name) {
            Some(set) => set.compile().map(Some),
            None if name == DEFAULT_RULE_SET => Ok(Some(default_rules())),
            None => Ok(None),
        }
    }
}

/// Library location
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    #[serde(default = "default_library_path")]
    pub path: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            path: default_library_path(),
        }
    }
}

fn default_library_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sample-drawer")
        .join("library")
}

/// Search limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_completion_limit")]
    pub completion_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            completion_limit: default_completion_limit(),
        }
    }
}

fn default_limit() -> usize {
    100
}

fn default_completion_limit() -> usize {
    20
}

/// Export (pretty path) settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportConfig {
    #[serde(default = "default_pretty_path_timeout")]
    pub pretty_path_timeout_secs: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            pretty_path_timeout_secs: default_pretty_path_timeout(),
        }
    }
}

impl ExportConfig {
    pub fn pretty_path_timeout(&self) -> Duration {
        Duration::from_secs(self.pretty_path_timeout_secs)
    }
}

fn default_pretty_path_timeout() -> u64 {
    60
}

/// File analyzer settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalyzerConfig {
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
        }
    }
}

fn default_cache_capacity() -> usize {
    DEFAULT_MAXSIZE
}

/// A named, ordered list of rewrite rules
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RuleSetConfig {
    /// Display name
    pub name: String,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl RuleSetConfig {
    pub fn compile(&self) -> Result<Vec<RewriteRule>, RewriteError> {
        self.rules.iter().map(RuleConfig::compile).collect()
    }
}

/// One rule: when `pattern` matches `field`, render each substitution
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RuleConfig {
    pub field: String,
    pub pattern: String,
    #[serde(default)]
    pub substitutions: BTreeMap<String, String>,
}

impl RuleConfig {
    pub fn compile(&self) -> Result<RewriteRule, RewriteError> {
        RewriteRule::new(&self.field, &self.pattern, self.substitutions.clone())
    }
}

fn default_rule_sets() -> BTreeMap<String, RuleSetConfig> {
    let rules = DEFAULT_RULES
        .iter()
        .map(|(field, pattern, substitutions)| RuleConfig {
            field: field.to_string(),
            pattern: pattern.to_string(),
            substitutions: substitutions
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
        .collect();
    BTreeMap::from([(
        DEFAULT_RULE_SET.to_string(),
        RuleSetConfig {
            name: "Default".to_string(),
            rules,
        },
    )])
}
