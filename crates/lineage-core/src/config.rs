//! Engine configuration
//!
//! Loaded from TOML; every section and key is optional.
//!
//! ```toml
//! [coverage]
//! low_confidence_threshold = 0.8
//!
//! [traversal]
//! budget_multiplier = 2
//!
//! [logging]
//! filter = "lineage_graph=debug,info"
//! json = true
//! ```

use crate::error::ConfigError;
use lineage_criticality::DEFAULT_LOW_CONFIDENCE_THRESHOLD;
use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Coverage reporting
    pub coverage: CoverageConfig,
    /// Traversal limits
    pub traversal: TraversalConfig,
    /// Log output
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// Reject out-of-range values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.coverage.low_confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid {
                key: "coverage.low_confidence_threshold",
                reason: format!("{threshold} is outside [0, 1]"),
            });
        }
        if self.traversal.budget_multiplier == 0 {
            return Err(ConfigError::Invalid {
                key: "traversal.budget_multiplier",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "logging.filter",
                reason: "empty filter directive".to_owned(),
            });
        }
        Ok(())
    }

    /// With coverage threshold
    #[inline]
    #[must_use]
    pub fn with_low_confidence_threshold(mut self, threshold: f64) -> Self {
        self.coverage.low_confidence_threshold = threshold;
        self
    }

    /// With traversal budget multiplier
    #[inline]
    #[must_use]
    pub fn with_budget_multiplier(mut self, multiplier: usize) -> Self {
        self.traversal.budget_multiplier = multiplier;
        self
    }
}

/// Coverage reporting settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoverageConfig {
    /// Candidates below this confidence await analyst review
    pub low_confidence_threshold: f64,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            low_confidence_threshold: DEFAULT_LOW_CONFIDENCE_THRESHOLD,
        }
    }
}

/// Traversal settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TraversalConfig {
    /// Step budget per traversal is node count times this value
    pub budget_multiplier: usize,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self { budget_multiplier: 1 }
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive string
    pub filter: String,
    /// Emit JSON lines instead of the compact text format
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn parses_partial_sections() {
        let config = EngineConfig::from_toml_str(
            "[coverage]\nlow_confidence_threshold = 0.85\n\n[logging]\njson = true\n",
        )
        .unwrap();
        assert_eq!(config.coverage.low_confidence_threshold, 0.85);
        assert_eq!(config.traversal.budget_multiplier, 1);
        assert!(config.logging.json);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let err = EngineConfig::from_toml_str("[coverage]\nlow_confidence_threshold = 1.5\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "coverage.low_confidence_threshold", .. }));
    }

    #[test]
    fn rejects_zero_budget() {
        let err = EngineConfig::new().with_budget_multiplier(0).validate().unwrap_err();
        assert!(err.to_string().contains("traversal.budget_multiplier"));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(matches!(
            EngineConfig::from_toml_str("[coverage]\nthreshold = 0.5\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn renders_back_to_toml() {
        let config = EngineConfig::new().with_low_confidence_threshold(0.6);
        let rendered = config.to_toml_string().unwrap();
        assert_eq!(EngineConfig::from_toml_str(&rendered).unwrap(), config);
    }

    proptest! {
        #[test]
        fn threshold_validates_iff_in_unit_interval(threshold in -2.0f64..2.0) {
            let result = EngineConfig::new().with_low_confidence_threshold(threshold).validate();
            prop_assert_eq!(result.is_ok(), (0.0..=1.0).contains(&threshold));
        }
    }
}
