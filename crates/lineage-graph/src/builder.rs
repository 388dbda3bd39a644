//! Graph Builder
//!
//! Validates raw extraction output and compiles it into an immutable
//! [`GraphSnapshot`]. Checks run in a fixed order and the first failing
//! category rejects the whole candidate:
//!
//! 1. every edge endpoint names a declared node
//! 2. no node id is declared twice
//! 3. the graph admits a topological order (no cycles, no self-loops)
//!
//! Estimands with no incoming lineage from a source variable or
//! intercurrent event are reported as warnings; the snapshot still builds.
//! Publishing the snapshot is the caller's job.

use crate::error::{DanglingRef, GraphIntegrityError};
use crate::store::{lineage_graph, GraphSnapshot, LineageGraph};
use crate::traversal::find_cycle;
use crate::types::{
    attr, Edge, GraphInput, Node, NodeId, NodeRecord, NodeType, ObjectiveType, VariableRole,
};
use petgraph::algo::toposort;
use petgraph::graph::NodeIndex;
use petgraph::visit::Dfs;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Non-fatal findings attached to a successful build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildWarning {
    /// No source variable or intercurrent event feeds this estimand yet
    UnreachableEstimand {
        /// Estimand id
        estimand_id: NodeId,
    },
    /// The same `(from, to, relationship)` edge was declared more than once
    DuplicateEdge {
        /// The collapsed edge
        edge: Edge,
    },
    /// A well-known attribute carries a value the engine does not understand
    UnrecognizedAttribute {
        /// Node carrying the attribute
        node_id: NodeId,
        /// Attribute key
        key: String,
        /// Value as rendered text
        value: String,
    },
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildWarning::UnreachableEstimand { estimand_id } => {
                write!(f, "estimand {estimand_id} has no source lineage")
            }
            BuildWarning::DuplicateEdge { edge } => write!(f, "duplicate edge {edge}"),
            BuildWarning::UnrecognizedAttribute { node_id, key, value } => {
                write!(f, "node {node_id}: unrecognized {key} value {value:?}")
            }
        }
    }
}

/// Summary of a successful build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Version assigned to the snapshot
    pub version: u64,
    /// Node count
    pub node_count: usize,
    /// Edge count after duplicate collapse
    pub edge_count: usize,
    /// Node count per type
    pub nodes_by_type: BTreeMap<NodeType, usize>,
    /// Wall time spent validating and indexing
    pub build_duration_ms: u64,
}

/// A validated snapshot plus everything the build learned about it
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// The new, not yet published snapshot
    pub snapshot: GraphSnapshot,
    /// Non-fatal findings
    pub warnings: Vec<BuildWarning>,
    /// Build summary
    pub report: BuildReport,
}

/// A validated snapshot that has not been given its version yet.
///
/// The snapshot carries the version it will receive if committed next. Drop
/// it to abandon the build without consuming a version number.
#[derive(Debug, Clone)]
pub struct PendingBuild {
    snapshot: GraphSnapshot,
    warnings: Vec<BuildWarning>,
    nodes_by_type: BTreeMap<NodeType, usize>,
    started: Instant,
}

impl PendingBuild {
    /// The candidate snapshot
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> &GraphSnapshot {
        &self.snapshot
    }

    /// Non-fatal findings so far
    #[must_use]
    pub fn warnings(&self) -> &[BuildWarning] {
        &self.warnings
    }
}

/// Builder for validated lineage snapshots
///
/// Usage:
/// ```rust,ignore
/// let builder = GraphBuilder::new();
/// let outcome = builder.build(input)?;
/// for warning in &outcome.warnings {
///     eprintln!("{warning}");
/// }
/// let snapshot = outcome.snapshot;
/// ```
#[derive(Debug)]
pub struct GraphBuilder {
    last_version: AtomicU64,
}

impl GraphBuilder {
    /// Builder whose first snapshot is version 1
    #[must_use]
    pub fn new() -> Self {
        Self::starting_after(0)
    }

    /// Builder whose next snapshot follows `version`
    #[must_use]
    pub fn starting_after(version: u64) -> Self {
        Self {
            last_version: AtomicU64::new(version),
        }
    }

    /// Version of the most recent successful build
    #[must_use]
    pub fn last_version(&self) -> u64 {
        self.last_version.load(Ordering::Acquire)
    }

    /// Validate `input` and compile it into a new snapshot.
    ///
    /// A failed build consumes no version number.
    pub fn build(&self, input: GraphInput) -> Result<BuildOutcome, GraphIntegrityError> {
        Ok(self.commit(self.prepare(input)?))
    }

    /// Validate and compile `input` without assigning a version.
    ///
    /// Lets a caller run further checks on the candidate before
    /// [`GraphBuilder::commit`] hands out the version number.
    pub fn prepare(&self, input: GraphInput) -> Result<PendingBuild, GraphIntegrityError> {
        let started = Instant::now();
        let GraphInput { nodes, edges } = input;
        debug!(nodes = nodes.len(), edges = edges.len(), "validating lineage graph input");

        let declared: HashSet<NodeId> = nodes.iter().map(|n| n.id.clone()).collect();
        check_dangling(&declared, &edges)?;
        check_duplicates(&nodes)?;

        let mut warnings = Vec::new();
        let edges = collapse_duplicate_edges(edges, &mut warnings);
        let nodes: Vec<Node> = nodes.into_iter().map(|r| r.into_node()).collect();

        let graph = lineage_graph(nodes, edges);
        let order = toposort(&graph, None).map_err(|cycle| {
            let cycle = find_cycle(&graph).unwrap_or_else(|| vec![graph[cycle.node_id()].id.clone()]);
            GraphIntegrityError::CyclicGraph { cycle }
        })?;

        for ix in graph.node_indices() {
            let node = &graph[ix];
            check_attributes(node, &mut warnings);
            if node.node_type == NodeType::Estimand && !has_source_lineage(&graph, ix) {
                warnings.push(BuildWarning::UnreachableEstimand {
                    estimand_id: node.id.clone(),
                });
            }
        }

        let mut nodes_by_type = BTreeMap::new();
        for node in graph.node_weights() {
            *nodes_by_type.entry(node.node_type).or_insert(0) += 1;
        }

        Ok(PendingBuild {
            snapshot: GraphSnapshot::assemble(self.last_version() + 1, graph, &order),
            warnings,
            nodes_by_type,
            started,
        })
    }

    /// Assign the next version to a prepared snapshot.
    ///
    /// Commits are numbered in the order they happen, so a pending snapshot
    /// overtaken by another commit is renumbered here.
    pub fn commit(&self, pending: PendingBuild) -> BuildOutcome {
        let PendingBuild {
            snapshot,
            warnings,
            nodes_by_type,
            started,
        } = pending;
        let version = self.last_version.fetch_add(1, Ordering::AcqRel) + 1;
        let snapshot = snapshot.with_version(version);
        let report = BuildReport {
            version,
            node_count: snapshot.node_count(),
            edge_count: snapshot.edge_count(),
            nodes_by_type,
            build_duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        for warning in &warnings {
            warn!(version, %warning, "lineage build warning");
        }
        info!(
            version,
            nodes = report.node_count,
            edges = report.edge_count,
            warnings = warnings.len(),
            "lineage graph built"
        );

        BuildOutcome {
            snapshot,
            warnings,
            report,
        }
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn check_dangling(declared: &HashSet<NodeId>, edges: &[Edge]) -> Result<(), GraphIntegrityError> {
    let mut references = Vec::new();
    for edge in edges {
        for endpoint in [&edge.from, &edge.to] {
            if !declared.contains(endpoint) {
                references.push(DanglingRef {
                    edge: edge.clone(),
                    missing: endpoint.clone(),
                });
            }
        }
    }
    if references.is_empty() {
        Ok(())
    } else {
        Err(GraphIntegrityError::DanglingReference { references })
    }
}

fn check_duplicates(nodes: &[NodeRecord]) -> Result<(), GraphIntegrityError> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for node in nodes {
        if !seen.insert(&node.id) && !ids.contains(&node.id) {
            ids.push(node.id.clone());
        }
    }
    if ids.is_empty() {
        Ok(())
    } else {
        Err(GraphIntegrityError::DuplicateNode { ids })
    }
}

fn collapse_duplicate_edges(edges: Vec<Edge>, warnings: &mut Vec<BuildWarning>) -> Vec<Edge> {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(edges.len());
    for edge in edges {
        if seen.contains(&edge) {
            warnings.push(BuildWarning::DuplicateEdge { edge });
        } else {
            seen.insert(edge.clone());
            kept.push(edge);
        }
    }
    kept
}

fn check_attributes(node: &Node, warnings: &mut Vec<BuildWarning>) {
    let known: [(&str, fn(&str) -> bool); 2] = [
        (attr::VARIABLE_ROLE, |v| VariableRole::parse(v).is_some()),
        (attr::OBJECTIVE_TYPE, |v| ObjectiveType::parse(v).is_some()),
    ];
    for (key, recognised) in known {
        if let Some(value) = node.attribute(key) {
            if !value.as_text().is_some_and(recognised) {
                warnings.push(BuildWarning::UnrecognizedAttribute {
                    node_id: node.id.clone(),
                    key: key.to_owned(),
                    value: value.to_string(),
                });
            }
        }
    }
}

/// Whether a source variable or intercurrent event lies upstream of `start`
fn has_source_lineage(graph: &LineageGraph, start: NodeIndex) -> bool {
    let mut dfs = Dfs::new(graph, start);
    while let Some(ix) = dfs.next(graph) {
        if ix != start && graph[ix].node_type.is_lineage_origin() {
            return true;
        }
    }
    false
}
