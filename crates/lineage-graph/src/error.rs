//! Error types for lineage graphs
//!
//! Two families, kept apart so callers can tell them apart:
//! - [`GraphIntegrityError`]: a candidate graph was rejected at build time.
//!   The previously published snapshot stays authoritative.
//! - [`InvariantViolationError`]: a validated snapshot turned out to break
//!   an invariant at query time. This is a builder bug, never a user error.

use crate::types::{Edge, NodeId};

/// Edge endpoint that names an undeclared node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingRef {
    /// Offending edge
    pub edge: Edge,
    /// Id that was not declared
    pub missing: NodeId,
}

/// Build-fatal integrity failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphIntegrityError {
    /// Edges reference nodes that were never declared
    #[error("dangling reference: {} edge endpoint(s) name undeclared nodes (first: {})", .references.len(), first_dangling(.references))]
    DanglingReference {
        /// Every dangling endpoint found
        references: Vec<DanglingRef>,
    },

    /// The same node id was declared more than once
    #[error("duplicate node ids: {ids:?}")]
    DuplicateNode {
        /// Each id declared more than once
        ids: Vec<NodeId>,
    },

    /// Topological sort failed
    #[error("cyclic graph: {}", format_cycle(.cycle))]
    CyclicGraph {
        /// Node ids of one cycle, first node repeated at the end
        cycle: Vec<NodeId>,
    },
}

impl GraphIntegrityError {
    /// Stable name of the failure category
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            GraphIntegrityError::DanglingReference { .. } => "DanglingReferenceError",
            GraphIntegrityError::DuplicateNode { .. } => "DuplicateNodeError",
            GraphIntegrityError::CyclicGraph { .. } => "CyclicGraphError",
        }
    }

    /// Node ids the caller needs to fix
    #[must_use]
    pub fn offending_ids(&self) -> Vec<NodeId> {
        match self {
            GraphIntegrityError::DanglingReference { references } => {
                references.iter().map(|r| r.missing.clone()).collect()
            }
            GraphIntegrityError::DuplicateNode { ids } => ids.clone(),
            GraphIntegrityError::CyclicGraph { cycle } => cycle.clone(),
        }
    }
}

fn first_dangling(references: &[DanglingRef]) -> String {
    references
        .first()
        .map(|r| format!("{} in {}", r.missing, r.edge))
        .unwrap_or_default()
}

fn format_cycle(cycle: &[NodeId]) -> String {
    cycle
        .iter()
        .map(NodeId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Query-time invariant violation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolationError {
    /// An edge contradicts the snapshot's topological order
    #[error("invariant violation: cycle detected through edge {from} -> {to}")]
    CycleDetected {
        /// Edge source
        from: NodeId,
        /// Edge target
        to: NodeId,
    },

    /// An index entry points at a node the snapshot does not hold
    #[error("invariant violation: index references missing node {node_id}")]
    MissingIndex {
        /// Referenced id
        node_id: NodeId,
    },

    /// A walk took more steps than the graph can support
    #[error("invariant violation: traversal budget of {budget} steps exceeded")]
    TraversalBudgetExceeded {
        /// Step budget
        budget: usize,
    },
}
