//! Error types for the lineage service
//!
//! Distinguishes a graph that is invalid (build failure, the prior
//! snapshot stays published) from a broken internal invariant (fatal for
//! the request). Not-found is never an error: queries return `None` or an
//! empty collection.

use lineage_criticality::{HintRegistryError, OverrideError};
use lineage_graph::{GraphIntegrityError, InvariantViolationError};

/// Main service error type
#[derive(Debug, thiserror::Error)]
pub enum LineageError {
    /// Build input failed integrity validation
    #[error("graph rejected: {0}")]
    GraphIntegrity(#[from] GraphIntegrityError),

    /// An internal invariant broke while serving a request
    #[error("invariant violated: {0}")]
    InvariantViolation(#[from] InvariantViolationError),

    /// Override request rejected
    #[error("override rejected: {0}")]
    Override(#[from] OverrideError),

    /// Hint registry input rejected
    #[error("hint registry rejected: {0}")]
    HintRegistry(#[from] HintRegistryError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Background rebuild task did not complete
    #[error("rebuild task failed: {0}")]
    RebuildTask(String),
}

impl LineageError {
    /// Check if the request must be abandoned because engine state is suspect
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation(_) | Self::RebuildTask(_))
    }

    /// Check if a rebuild was rejected and the prior snapshot kept
    #[inline]
    #[must_use]
    pub fn is_build_failure(&self) -> bool {
        matches!(self, Self::GraphIntegrity(_) | Self::HintRegistry(_))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML did not parse or did not match the schema
    #[error("invalid configuration document: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration could not be rendered
    #[error("cannot render configuration: {0}")]
    Render(#[from] toml::ser::Error),

    /// A value is out of range
    #[error("invalid value for {key}: {reason}")]
    Invalid {
        /// Dotted key
        key: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// The global tracing subscriber could not be installed
    #[error("cannot install tracing subscriber: {0}")]
    Telemetry(String),
}
