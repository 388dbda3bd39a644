//! Criticality classification (lineage-criticality)
//!
//! Derives criticality tiers from a [`lineage_graph::GraphSnapshot`],
//! records analyst overrides as audit events and reports how well the
//! critical data point registry is covered by collected fields.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lineage_criticality::prelude::*;
//!
//! let classification = TierClassifier::new().classify(&snapshot)?;
//! let overrides = OverrideLog::new();
//! let assessments = assess(&classification, &overrides.view());
//! let coverage = CoverageReporter::default().report(&hints, &snapshot, |id| {
//!     classification.derived_tier(id.as_str())
//! });
//! ```

pub mod classifier;
pub mod coverage;
pub mod error;
pub mod hints;
pub mod mapping;
pub mod overrides;

pub use classifier::{derive_tier, Classification, RoleSource, TierClassifier, TierDerivation};
pub use coverage::{
    CoverageReport, CoverageReporter, HintResolution, TierBreakdown, UnmappedItem, UnmappedReason,
    DEFAULT_LOW_CONFIDENCE_THRESHOLD,
};
pub use error::{HintRegistryError, OverrideError};
pub use hints::{CriticalDataHint, HintMapping, HintRegistry};
pub use mapping::{default_narrative, trace_field, CriticalityMapping, MappedField};
pub use overrides::{
    assess, assess_field, OverrideAction, OverrideEvent, OverrideLog, OverrideRequest,
    OverrideState, TierAssessment, TierDivergenceNotice,
};

/// Common imports
pub mod prelude {
    pub use crate::classifier::{Classification, TierClassifier};
    pub use crate::coverage::{CoverageReport, CoverageReporter, UnmappedReason};
    pub use crate::hints::{CriticalDataHint, HintMapping, HintRegistry};
    pub use crate::mapping::CriticalityMapping;
    pub use crate::overrides::{assess, OverrideLog, OverrideRequest, TierAssessment};
}
