//! Lineage graph (lineage-graph)
//!
//! Immutable, validated graph connecting raw data-collection fields through
//! derivations, methods and populations to clinical estimands.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lineage_graph::prelude::*;
//!
//! let input = GraphInput::new()
//!     .node(NodeRecord::new("SRC1", NodeType::SourceVariable, "HbA1c"))
//!     .node(NodeRecord::new("EST1", NodeType::Estimand, "Primary estimand"))
//!     .edge("EST1", "SRC1", Relationship::DerivedFrom);
//!
//! let outcome = GraphBuilder::new().build(input)?;
//! let traversal = Traversal::new(&outcome.snapshot);
//! let impacted = traversal.reachable_backward("SRC1")?;
//! ```

pub mod builder;
pub mod error;
pub mod store;
pub mod traversal;
pub mod types;

pub use builder::{BuildOutcome, BuildReport, BuildWarning, GraphBuilder, PendingBuild};
pub use error::{DanglingRef, GraphIntegrityError, InvariantViolationError};
pub use store::GraphSnapshot;
pub use traversal::{Direction, Traversal};
pub use types::*;

/// Common imports
pub mod prelude {
    pub use crate::builder::{BuildOutcome, BuildWarning, GraphBuilder};
    pub use crate::error::{GraphIntegrityError, InvariantViolationError};
    pub use crate::store::GraphSnapshot;
    pub use crate::traversal::{Direction, Traversal};
    pub use crate::types::{
        AttributeValue, Edge, GraphInput, Node, NodeId, NodeRecord, NodeType, ObjectiveType,
        Relationship, Tier, VariableRole,
    };
}
