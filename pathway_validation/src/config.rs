//! Validator configuration, loadable from TOML.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::findings::ScoringWeights;

/// Result cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,

    /// Maximum number of cached results.
    pub capacity: usize,

    /// How long a cached result stays valid, in seconds.
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 1000,
            ttl_secs: 300,
        }
    }
}

/// Configuration for a [`crate::PathwayValidator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub cache: CacheConfig,

    /// Pathways longer than this get a performance warning.
    pub max_pathway_length: usize,

    /// Pathways shorter than this get a balance suggestion.
    pub min_recommended_items: usize,

    /// Maximum alternatives listed on a conflict resolution.
    pub max_alternatives: usize,

    /// Attach the dependency chain to each result.
    pub include_dependency_chain: bool,

    pub scoring: ScoringWeights,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            max_pathway_length: 50,
            min_recommended_items: 3,
            max_alternatives: 3,
            include_dependency_chain: false,
            scoring: ScoringWeights::default(),
        }
    }
}

impl ValidatorConfig {
    /// Parse a configuration from TOML. Missing keys take their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: ValidatorConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Check that the values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.capacity == 0 {
            return Err(ConfigError::Invalid(
                "cache.capacity must be at least 1".to_string(),
            ));
        }
        if self.max_pathway_length == 0 {
            return Err(ConfigError::Invalid(
                "max_pathway_length must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Disable result caching.
    pub fn without_cache(mut self) -> Self {
        self.cache.enabled = false;
        self
    }

    /// Attach dependency chains to results.
    pub fn with_dependency_chain(mut self) -> Self {
        self.include_dependency_chain = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ValidatorConfig::default();
        assert_eq!(config.cache.capacity, 1000);
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
        assert_eq!(config.max_pathway_length, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = ValidatorConfig::from_toml_str(
            r#"
            max_alternatives = 5

            [cache]
            ttl_secs = 60

            [scoring]
            clean_bonus = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.max_alternatives, 5);
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.cache.capacity, 1000);
        assert_eq!(config.scoring.clean_bonus, 0);
        assert_eq!(config.scoring.errors.critical, 25);
        assert_eq!(config.scoring.warnings.low, 2);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config = ValidatorConfig::from_toml_str("").unwrap();
        assert_eq!(config, ValidatorConfig::default());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = ValidatorConfig::from_toml_str("[cache]\ncapacity = 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_bad_toml_rejected() {
        let result = ValidatorConfig::from_toml_str("max_pathway_length = \"lots\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = ValidatorConfig::from_file("/nonexistent/pathway-validator.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
