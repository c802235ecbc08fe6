use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Search limits are not 0
/// - Analyzer cache capacity is not 0
/// - Pretty path timeout is not 0
/// - Every rewrite rule pattern compiles
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.search.default_limit == 0 {
        return Err(ConfigError::ValidationError(
            "search.default_limit cannot be 0".to_string(),
        ));
    }
    if config.search.completion_limit == 0 {
        return Err(ConfigError::ValidationError(
            "search.completion_limit cannot be 0".to_string(),
        ));
    }
    if config.analyzer.cache_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "analyzer.cache_capacity cannot be 0".to_string(),
        ));
    }
    if config.export.pretty_path_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "export.pretty_path_timeout_secs cannot be 0".to_string(),
        ));
    }

    for (key, set) in &config.rewrite_rules {
        set.compile().map_err(|e| {
            ConfigError::ValidationError(format!("rewrite_rules.{}: {}", key, e))
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RuleConfig, RuleSetConfig};
    use std::collections::BTreeMap;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_zero_limit_fails() {
        let mut config = Config::default();
        config.search.default_limit = 0;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_zero_timeout_fails() {
        let mut config = Config::default();
        config.export.pretty_path_timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_bad_pattern_fails() {
        let mut config = Config::default();
        config.rewrite_rules.insert(
            "broken".to_string(),
            RuleSetConfig {
                name: "Broken".to_string(),
                rules: vec![RuleConfig {
                    field: "_path".to_string(),
                    pattern: "(".to_string(),
                    substitutions: BTreeMap::new(),
                }],
            },
        );
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("rewrite_rules.broken"));
    }
}
