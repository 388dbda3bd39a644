//! Lineage service (lineage-core)
//!
//! Publishes lineage snapshots built by [`lineage_graph`] and classified by
//! [`lineage_criticality`], coordinates rebuilds, and serves the read-only
//! query facade.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lineage_core::prelude::*;
//!
//! let config = EngineConfig::from_toml_str(include_str!("lineage.toml"))?;
//! init_tracing(&config.logging)?;
//!
//! let service = LineageService::new(config)?;
//! service.rebuild(RebuildRequest::new(input).with_hints(hints))?;
//!
//! let query = service.query();
//! let mapping = query.lineage_trace("LB.HBA1C");
//! let coverage = query.coverage_report();
//! ```

pub mod config;
pub mod error;
pub mod facade;
pub mod published;
pub mod service;
pub mod telemetry;

pub use config::{CoverageConfig, EngineConfig, LoggingConfig, TraversalConfig};
pub use error::{ConfigError, LineageError};
pub use facade::LineageQuery;
pub use published::{PublishedState, SnapshotCell};
pub use service::{LineageService, RebuildRequest};
pub use telemetry::init_tracing;

/// Common imports
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::error::LineageError;
    pub use crate::facade::LineageQuery;
    pub use crate::service::{LineageService, RebuildRequest};
    pub use crate::telemetry::init_tracing;
    pub use lineage_criticality::prelude::*;
    pub use lineage_graph::prelude::*;
}
