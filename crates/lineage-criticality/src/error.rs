//! Error types for criticality classification and reporting

use lineage_graph::{InvalidTier, NodeId, NodeType};

/// Rejected analyst override
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverrideError {
    /// Tier number outside 1..=3
    #[error("invalid override: {0}")]
    InvalidTier(#[from] InvalidTier),

    /// The field is not in the current snapshot
    #[error("cannot override unknown field {0}")]
    UnknownField(NodeId),

    /// Only source-level nodes carry tiers
    #[error("cannot override {field_id}: {node_type:?} nodes are not tiered")]
    NotTiered {
        /// Target node
        field_id: NodeId,
        /// Its type
        node_type: NodeType,
    },

    /// An override needs a named analyst
    #[error("override for {0} has no analyst")]
    MissingAnalyst(NodeId),
}

/// Invalid hint registry input
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HintRegistryError {
    /// Two hints share an id
    #[error("duplicate critical data point hint {0}")]
    DuplicateHint(String),

    /// Confidence outside [0, 1]
    #[error("hint {hint_id}: mapping confidence {confidence} outside [0, 1]")]
    InvalidConfidence {
        /// Hint id
        hint_id: String,
        /// Offending value
        confidence: f64,
    },
}
