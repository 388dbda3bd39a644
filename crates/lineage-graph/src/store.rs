//! Graph Store - immutable, indexed snapshot
//!
//! A [`GraphSnapshot`] can only be produced by [`crate::GraphBuilder`]
//! (or re-tiered from an existing snapshot). It has no mutation methods;
//! a changed graph is always a new snapshot.

use crate::types::{Edge, Node, NodeId, NodeType, Relationship, Tier};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction::{Incoming, Outgoing};
use std::collections::HashMap;

/// Lineage graph as stored: node weights are nodes, edge weights are edges
pub(crate) type LineageGraph = DiGraph<Node, Edge>;

/// Immutable lineage graph snapshot with O(1) id and adjacency lookups
#[derive(Debug, Clone)]
pub struct GraphSnapshot {
    version: u64,
    graph: LineageGraph,
    index: HashMap<NodeId, NodeIndex>,
    by_type: HashMap<NodeType, Vec<NodeIndex>>,
    by_relationship: HashMap<Relationship, Vec<EdgeIndex>>,
    /// node index -> position in topological order (stored edge direction)
    topo_rank: Vec<usize>,
}

impl GraphSnapshot {
    /// Assemble a snapshot from a validated graph.
    ///
    /// `topo_order` holds node indices such that every edge `from -> to`
    /// has `from` before `to`. Callers outside the builder must not use this.
    pub(crate) fn assemble(version: u64, graph: LineageGraph, topo_order: &[NodeIndex]) -> Self {
        let mut index = HashMap::with_capacity(graph.node_count());
        let mut by_type: HashMap<NodeType, Vec<NodeIndex>> = HashMap::new();
        for ix in graph.node_indices() {
            let node = &graph[ix];
            index.insert(node.id.clone(), ix);
            by_type.entry(node.node_type).or_default().push(ix);
        }

        let mut by_relationship: HashMap<Relationship, Vec<EdgeIndex>> = HashMap::new();
        for edge in graph.edge_references() {
            by_relationship
                .entry(edge.weight().relationship)
                .or_default()
                .push(edge.id());
        }

        let mut topo_rank = vec![usize::MAX; graph.node_count()];
        for (rank, ix) in topo_order.iter().enumerate() {
            if let Some(r) = topo_rank.get_mut(ix.index()) {
                *r = rank;
            }
        }

        Self {
            version,
            graph,
            index,
            by_type,
            by_relationship,
            topo_rank,
        }
    }

    /// An empty snapshot (version 0), published before the first build
    #[must_use]
    pub fn empty() -> Self {
        Self::assemble(0, LineageGraph::new(), &[])
    }

    /// Snapshot version, strictly increasing across successful builds
    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of nodes
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges
    #[inline]
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether the snapshot holds no nodes
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Look up a node by id
    #[must_use]
    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&ix| &self.graph[ix])
    }

    /// Whether a node with this id exists
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// All nodes, in declaration order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.graph.node_weights()
    }

    /// All edges, in declaration order
    pub fn edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.graph.edge_weights()
    }

    /// Edges where `id` is the dependent (`from`) side
    pub fn out_edges<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.adjacent(id, Outgoing)
    }

    /// Edges where `id` is the dependency (`to`) side
    pub fn in_edges<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.adjacent(id, Incoming)
    }

    /// Outgoing edges of one relationship type
    pub fn out_edges_of<'a>(
        &'a self,
        id: &str,
        relationship: Relationship,
    ) -> impl Iterator<Item = &'a Edge> + 'a {
        self.out_edges(id)
            .filter(move |e| e.relationship == relationship)
    }

    /// Incoming edges of one relationship type
    pub fn in_edges_of<'a>(
        &'a self,
        id: &str,
        relationship: Relationship,
    ) -> impl Iterator<Item = &'a Edge> + 'a {
        self.in_edges(id)
            .filter(move |e| e.relationship == relationship)
    }

    /// Every edge of one relationship type
    pub fn edges_of(&self, relationship: Relationship) -> impl Iterator<Item = &Edge> + '_ {
        self.by_relationship
            .get(&relationship)
            .into_iter()
            .flatten()
            .map(|&ix| &self.graph[ix])
    }

    /// Every node of one type, in declaration order
    pub fn nodes_of_type(&self, node_type: NodeType) -> impl Iterator<Item = &Node> + '_ {
        self.by_type
            .get(&node_type)
            .into_iter()
            .flatten()
            .map(|&ix| &self.graph[ix])
    }

    /// Copy of this snapshot with derived tiers stamped onto its nodes.
    ///
    /// Nodes absent from `tiers` keep `None`. The version is unchanged: the
    /// graph structure is the same, only its classification is attached.
    #[must_use]
    pub fn with_tiers(&self, tiers: &HashMap<NodeId, Tier>) -> Self {
        let mut next = self.clone();
        for node in next.graph.node_weights_mut() {
            node.criticality_tier = tiers.get(&node.id).copied();
        }
        next
    }

    fn adjacent<'a>(
        &'a self,
        id: &str,
        direction: petgraph::Direction,
    ) -> impl Iterator<Item = &'a Edge> + 'a {
        self.index
            .get(id)
            .into_iter()
            .flat_map(move |&ix| self.graph.edges_directed(ix, direction))
            .map(|edge| edge.weight())
    }

    pub(crate) fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    // Index-level accessors used by the traversal engine.

    pub(crate) fn digraph(&self) -> &LineageGraph {
        &self.graph
    }

    pub(crate) fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub(crate) fn node_at(&self, ix: NodeIndex) -> &Node {
        &self.graph[ix]
    }

    pub(crate) fn topo_rank(&self, ix: NodeIndex) -> usize {
        self.topo_rank.get(ix.index()).copied().unwrap_or(usize::MAX)
    }
}

/// Load nodes and edges into a petgraph graph, node index = declaration slot.
///
/// Edges naming undeclared nodes are skipped; the builder rejects those
/// before it gets here.
pub(crate) fn lineage_graph(nodes: Vec<Node>, edges: Vec<Edge>) -> LineageGraph {
    let mut graph = LineageGraph::with_capacity(nodes.len(), edges.len());
    let mut slots: HashMap<NodeId, NodeIndex> = HashMap::with_capacity(nodes.len());
    for node in nodes {
        let id = node.id.clone();
        slots.insert(id, graph.add_node(node));
    }
    for edge in edges {
        if let (Some(&from), Some(&to)) = (slots.get(&edge.from), slots.get(&edge.to)) {
            graph.add_edge(from, to, edge);
        }
    }
    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeRecord;

    fn snapshot() -> GraphSnapshot {
        let nodes = vec![
            NodeRecord::new("EST1", NodeType::Estimand, "Primary estimand").into_node(),
            NodeRecord::new("MTH1", NodeType::Method, "MMRM").into_node(),
            NodeRecord::new("POP1", NodeType::Population, "ITT").into_node(),
        ];
        let edges = vec![
            Edge::new("EST1", "MTH1", Relationship::TargetedBy),
            Edge::new("MTH1", "POP1", Relationship::AnalyzedOn),
        ];
        let order: Vec<NodeIndex> = (0..3).map(NodeIndex::new).collect();
        GraphSnapshot::assemble(7, lineage_graph(nodes, edges), &order)
    }

    #[test]
    fn indexes_adjacency_both_ways() {
        let g = snapshot();
        assert_eq!(g.version(), 7);
        assert_eq!(g.out_edges("MTH1").count(), 1);
        assert_eq!(g.in_edges("MTH1").count(), 1);
        assert_eq!(g.in_edges("EST1").count(), 0);
        assert_eq!(g.out_edges("UNKNOWN").count(), 0);
    }

    #[test]
    fn adjacency_serves_the_declared_edges() {
        let g = snapshot();
        let out: Vec<_> = g.out_edges("MTH1").cloned().collect();
        assert_eq!(out, vec![Edge::new("MTH1", "POP1", Relationship::AnalyzedOn)]);
        let incoming: Vec<_> = g.in_edges("MTH1").cloned().collect();
        assert_eq!(incoming, vec![Edge::new("EST1", "MTH1", Relationship::TargetedBy)]);
        let all: Vec<_> = g.edges().map(|e| (e.from.as_str(), e.to.as_str())).collect();
        assert_eq!(all, vec![("EST1", "MTH1"), ("MTH1", "POP1")]);
        let declared: Vec<_> = g.nodes().map(|n| n.id.as_str()).collect();
        assert_eq!(declared, vec!["EST1", "MTH1", "POP1"]);
    }

    #[test]
    fn indexes_by_relationship_and_type() {
        let g = snapshot();
        assert_eq!(g.edges_of(Relationship::AnalyzedOn).count(), 1);
        assert_eq!(g.edges_of(Relationship::Handles).count(), 0);
        assert_eq!(g.out_edges_of("EST1", Relationship::TargetedBy).count(), 1);
        assert_eq!(g.out_edges_of("EST1", Relationship::Handles).count(), 0);
        let methods: Vec<_> = g.nodes_of_type(NodeType::Method).map(|n| n.id.as_str()).collect();
        assert_eq!(methods, vec!["MTH1"]);
    }

    #[test]
    fn with_tiers_leaves_original_untouched() {
        let g = snapshot();
        let mut tiers = HashMap::new();
        tiers.insert(NodeId::new("POP1"), Tier::Supportive);
        let tiered = g.with_tiers(&tiers);
        assert_eq!(tiered.get_node("POP1").unwrap().criticality_tier, Some(Tier::Supportive));
        assert_eq!(g.get_node("POP1").unwrap().criticality_tier, None);
        assert_eq!(tiered.version(), g.version());
    }

    #[test]
    fn empty_snapshot_has_version_zero() {
        let g = GraphSnapshot::empty();
        assert_eq!(g.version(), 0);
        assert!(g.is_empty());
        assert!(g.get_node("anything").is_none());
    }
}
