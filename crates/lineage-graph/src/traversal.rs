//! Traversal Engine
//!
//! Pure graph algorithms over one [`GraphSnapshot`]. Every walk checks each
//! edge it crosses against the snapshot's topological order; an edge that
//! points backwards can only exist if the builder let a cycle through, and is
//! reported as [`InvariantViolationError::CycleDetected`].
//!
//! | Operation | Algorithm |
//! |-----------|-----------|
//! | `neighbors` | `neighbors_undirected` |
//! | `reachable_forward` / `reachable_backward` | [`Bfs`], over [`Reversed`] for data flow |
//! | `reachable_within` | unit-weight [`dijkstra`] cut at the hop limit |
//! | `canonical_path` | hop distances to the target, then greedy smallest-id walk |
//! | `verify_acyclic` | [`is_cyclic_directed`], cycle recovered from [`tarjan_scc`] |

use crate::error::InvariantViolationError;
use crate::store::{GraphSnapshot, LineageGraph};
use crate::types::{NodeId, NodeType, ObjectiveType};
use petgraph::algo::{dijkstra, is_cyclic_directed, tarjan_scc};
use petgraph::graph::NodeIndex;
use petgraph::visit::{Bfs, EdgeRef, IntoNeighbors, Reversed, Visitable};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Walk direction relative to stored edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Follow edges as stored: towards what a node depends on
    Dependencies,
    /// Against stored edges: towards what depends on a node (data flow)
    Dependents,
}

impl Direction {
    /// The opposite direction
    #[inline]
    #[must_use]
    pub fn reverse(self) -> Self {
        match self {
            Direction::Dependencies => Direction::Dependents,
            Direction::Dependents => Direction::Dependencies,
        }
    }

    fn petgraph(self) -> petgraph::Direction {
        match self {
            Direction::Dependencies => petgraph::Direction::Outgoing,
            Direction::Dependents => petgraph::Direction::Incoming,
        }
    }
}

/// Traversal engine bound to one snapshot
#[derive(Debug, Clone, Copy)]
pub struct Traversal<'g> {
    graph: &'g GraphSnapshot,
    budget: usize,
}

impl<'g> Traversal<'g> {
    /// Engine with a step budget equal to the node count
    #[must_use]
    pub fn new(graph: &'g GraphSnapshot) -> Self {
        Self::with_budget_multiplier(graph, 1)
    }

    /// Engine with a step budget of `node count * multiplier`
    #[must_use]
    pub fn with_budget_multiplier(graph: &'g GraphSnapshot, multiplier: usize) -> Self {
        Self {
            graph,
            budget: graph.node_count().saturating_mul(multiplier.max(1)),
        }
    }

    /// The snapshot this engine reads
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &'g GraphSnapshot {
        self.graph
    }

    /// Nodes sharing a direct edge with `id`, in either direction
    #[must_use]
    pub fn neighbors(&self, id: &str) -> BTreeSet<NodeId> {
        let Some(ix) = self.graph.node_index(id) else {
            return BTreeSet::new();
        };
        self.graph
            .digraph()
            .neighbors_undirected(ix)
            .map(|n| self.graph.node_at(n).id.clone())
            .collect()
    }

    /// Everything `id` depends on, following stored edge direction
    pub fn reachable_forward(&self, id: &str) -> Result<BTreeSet<NodeId>, InvariantViolationError> {
        self.reachable(id, Direction::Dependencies)
    }

    /// Everything that ultimately depends on `id`
    pub fn reachable_backward(&self, id: &str) -> Result<BTreeSet<NodeId>, InvariantViolationError> {
        self.reachable(id, Direction::Dependents)
    }

    /// Full reachable set from `id` in `direction`, excluding `id` itself.
    ///
    /// An unknown id yields an empty set.
    pub fn reachable(
        &self,
        id: &str,
        direction: Direction,
    ) -> Result<BTreeSet<NodeId>, InvariantViolationError> {
        let Some(start) = self.graph.node_index(id) else {
            return Ok(BTreeSet::new());
        };
        Ok(self
            .reachable_indices(start, direction)?
            .into_iter()
            .map(|ix| self.graph.node_at(ix).id.clone())
            .collect())
    }

    /// Reachable nodes within `max_hops`, with their shortest hop distance
    pub fn reachable_within(
        &self,
        id: &str,
        direction: Direction,
        max_hops: usize,
    ) -> Result<BTreeMap<NodeId, usize>, InvariantViolationError> {
        let Some(start) = self.graph.node_index(id) else {
            return Ok(BTreeMap::new());
        };
        Ok(self
            .distances(start, direction)?
            .into_iter()
            .filter(|&(ix, hops)| ix != start && hops <= max_hops)
            .map(|(ix, hops)| (self.graph.node_at(ix).id.clone(), hops))
            .collect())
    }

    /// Estimands whose lineage includes `id`
    pub fn impacted_estimands(&self, id: &str) -> Result<BTreeSet<NodeId>, InvariantViolationError> {
        self.filtered(id, Direction::Dependents, |t| t == NodeType::Estimand)
    }

    /// Source-level nodes (source variables, intercurrent events,
    /// deviations) that feed `id`
    pub fn upstream_sources(&self, id: &str) -> Result<BTreeSet<NodeId>, InvariantViolationError> {
        self.filtered(id, Direction::Dependencies, NodeType::is_source_level)
    }

    /// One deterministic directed path from `from` to `to`.
    ///
    /// Data-flow direction (against stored edges) is tried first, so
    /// `canonical_path(field, estimand)` reads source -> estimand. If `to`
    /// is not downstream of `from`, stored edge direction is tried. Among
    /// candidate paths the fewest edges win, then the lexicographically
    /// smallest id sequence. `None` when no path exists.
    pub fn canonical_path(
        &self,
        from: &str,
        to: &str,
    ) -> Result<Option<Vec<NodeId>>, InvariantViolationError> {
        let (Some(from), Some(to)) = (self.graph.node_index(from), self.graph.node_index(to)) else {
            return Ok(None);
        };
        for direction in [Direction::Dependents, Direction::Dependencies] {
            if let Some(path) = self.shortest_smallest(from, to, direction)? {
                return Ok(Some(self.ids(&path)));
            }
        }
        Ok(None)
    }

    /// Canonical path from `id` to the most important estimand it impacts.
    ///
    /// Candidates are ranked by the endpoint estimand's objective (PRIMARY,
    /// then KEY_SECONDARY, then SECONDARY; an undeclared objective counts
    /// as SECONDARY), then by edge count, then by id sequence.
    pub fn canonical_lineage(&self, id: &str) -> Result<Option<Vec<NodeId>>, InvariantViolationError> {
        let Some(start) = self.graph.node_index(id) else {
            return Ok(None);
        };
        if self.graph.node_at(start).node_type == NodeType::Estimand {
            return Ok(Some(vec![self.graph.node_at(start).id.clone()]));
        }

        let mut best: Option<(ObjectiveType, Vec<NodeId>)> = None;
        for ix in self.reachable_indices(start, Direction::Dependents)? {
            let node = self.graph.node_at(ix);
            if node.node_type != NodeType::Estimand {
                continue;
            }
            let Some(path) = self.shortest_smallest(start, ix, Direction::Dependents)? else {
                continue;
            };
            let candidate = (
                node.objective_type().unwrap_or(ObjectiveType::Secondary),
                self.ids(&path),
            );
            let better = match &best {
                None => true,
                Some((objective, path)) => {
                    (candidate.0, candidate.1.len(), &candidate.1) < (*objective, path.len(), path)
                }
            };
            if better {
                best = Some(candidate);
            }
        }
        Ok(best.map(|(_, path)| path))
    }

    /// Node ids in topological order (every edge `from -> to` has `from` first)
    #[must_use]
    pub fn topological_order(&self) -> Vec<NodeId> {
        let mut order: Vec<NodeIndex> = self.graph.digraph().node_indices().collect();
        order.sort_by_key(|&ix| self.graph.topo_rank(ix));
        self.ids(&order)
    }

    /// Defensive re-check that the snapshot is still a DAG
    pub fn verify_acyclic(&self) -> Result<(), InvariantViolationError> {
        let graph = self.graph.digraph();
        if !is_cyclic_directed(graph) {
            return Ok(());
        }
        match find_cycle(graph).as_deref() {
            Some([.., from, to]) => Err(InvariantViolationError::CycleDetected {
                from: from.clone(),
                to: to.clone(),
            }),
            _ => Ok(()),
        }
    }

    fn filtered(
        &self,
        id: &str,
        direction: Direction,
        keep: impl Fn(NodeType) -> bool,
    ) -> Result<BTreeSet<NodeId>, InvariantViolationError> {
        let Some(start) = self.graph.node_index(id) else {
            return Ok(BTreeSet::new());
        };
        Ok(self
            .reachable_indices(start, direction)?
            .into_iter()
            .map(|ix| self.graph.node_at(ix))
            .filter(|node| keep(node.node_type))
            .map(|node| node.id.clone())
            .collect())
    }

    /// Breadth-first walk from `start`, excluding `start`.
    ///
    /// Each visited node's edges in `direction` are checked against the
    /// topological order; the walk fails once it visits more nodes than the
    /// budget allows.
    fn reachable_indices(
        &self,
        start: NodeIndex,
        direction: Direction,
    ) -> Result<Vec<NodeIndex>, InvariantViolationError> {
        let mut reached = Vec::new();
        let mut expanded = 0usize;
        let mut visit = |ix: NodeIndex| -> Result<(), InvariantViolationError> {
            expanded += 1;
            if expanded > self.budget {
                return Err(InvariantViolationError::TraversalBudgetExceeded {
                    budget: self.budget,
                });
            }
            self.check_steps(ix, direction)?;
            if ix != start {
                reached.push(ix);
            }
            Ok(())
        };
        let graph = self.graph.digraph();
        match direction {
            Direction::Dependencies => bfs_each(graph, start, &mut visit)?,
            Direction::Dependents => bfs_each(Reversed(graph), start, &mut visit)?,
        }
        Ok(reached)
    }

    /// Shortest hop distance from `start` to every node it reaches
    fn distances(
        &self,
        start: NodeIndex,
        direction: Direction,
    ) -> Result<HashMap<NodeIndex, usize>, InvariantViolationError> {
        self.reachable_indices(start, direction)?;
        let graph = self.graph.digraph();
        Ok(match direction {
            Direction::Dependencies => dijkstra(graph, start, None, |_| 1usize),
            Direction::Dependents => dijkstra(Reversed(graph), start, None, |_| 1usize),
        })
    }

    /// Shortest path from `from` to `to` walking `direction`, ties broken
    /// by the smallest id at each position.
    fn shortest_smallest(
        &self,
        from: NodeIndex,
        to: NodeIndex,
        direction: Direction,
    ) -> Result<Option<Vec<NodeIndex>>, InvariantViolationError> {
        if from == to {
            return Ok(Some(vec![from]));
        }
        // Distances to `to`: walk from the target the other way.
        let to_target = self.distances(to, direction.reverse())?;
        let Some(&remaining) = to_target.get(&from) else {
            return Ok(None);
        };

        let graph = self.graph.digraph();
        let mut path = vec![from];
        let mut current = from;
        for remaining in (0..remaining).rev() {
            let chosen = graph
                .neighbors_directed(current, direction.petgraph())
                .filter(|n| to_target.get(n) == Some(&remaining))
                .min_by(|&a, &b| self.graph.node_at(a).id.cmp(&self.graph.node_at(b).id))
                .ok_or_else(|| InvariantViolationError::MissingIndex {
                    node_id: self.graph.node_at(current).id.clone(),
                })?;
            path.push(chosen);
            current = chosen;
        }
        Ok(Some(path))
    }

    /// Check every edge leaving `ix` in `direction` against topological order
    fn check_steps(&self, ix: NodeIndex, direction: Direction) -> Result<(), InvariantViolationError> {
        for edge in self.graph.digraph().edges_directed(ix, direction.petgraph()) {
            if self.graph.topo_rank(edge.source()) >= self.graph.topo_rank(edge.target()) {
                let edge = edge.weight();
                return Err(InvariantViolationError::CycleDetected {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                });
            }
        }
        Ok(())
    }

    fn ids(&self, indices: &[NodeIndex]) -> Vec<NodeId> {
        indices
            .iter()
            .map(|&ix| self.graph.node_at(ix).id.clone())
            .collect()
    }
}

/// Breadth-first visit of everything reachable from `start` in `graph`
fn bfs_each<G, E>(
    graph: G,
    start: G::NodeId,
    visit: &mut impl FnMut(G::NodeId) -> Result<(), E>,
) -> Result<(), E>
where
    G: IntoNeighbors + Visitable,
{
    let mut bfs = Bfs::new(graph, start);
    while let Some(ix) = bfs.next(graph) {
        visit(ix)?;
    }
    Ok(())
}

/// Find one directed cycle in `graph`.
///
/// Returns the node ids along the cycle with the first id repeated at the
/// end, or `None` for an acyclic graph. The cycle lies in the strongly
/// connected component holding the smallest cycling id; it starts there and
/// always steps to the smallest-id successor inside the component, so the
/// report is deterministic.
pub(crate) fn find_cycle(graph: &LineageGraph) -> Option<Vec<NodeId>> {
    let id = move |ix: NodeIndex| &graph[ix].id;
    let component = tarjan_scc(graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .min_by(|a, b| {
            let smallest = |scc: &[NodeIndex]| scc.iter().map(|&ix| id(ix)).min().cloned();
            smallest(a.as_slice()).cmp(&smallest(b.as_slice()))
        })?;
    let members: HashSet<NodeIndex> = component.iter().copied().collect();

    let mut current = component.iter().copied().min_by(|&a, &b| id(a).cmp(id(b)))?;
    let mut path: Vec<NodeIndex> = Vec::new();
    loop {
        if let Some(pos) = path.iter().position(|&ix| ix == current) {
            let mut cycle: Vec<NodeId> = path[pos..].iter().map(|&ix| id(ix).clone()).collect();
            cycle.push(id(current).clone());
            return Some(cycle);
        }
        path.push(current);
        current = graph
            .neighbors(current)
            .filter(|n| members.contains(n))
            .min_by(|&a, &b| id(a).cmp(id(b)))?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::lineage_graph;
    use crate::types::{Edge, NodeRecord, Relationship};
    use pretty_assertions::assert_eq;

    fn ids(list: &[&str]) -> Vec<NodeId> {
        list.iter().map(|s| NodeId::new(*s)).collect()
    }

    fn set(list: &[&str]) -> BTreeSet<NodeId> {
        list.iter().map(|s| NodeId::new(*s)).collect()
    }

    /// Hand-assembled snapshot; `order` must be a topological order of slots
    fn assemble(nodes: Vec<NodeRecord>, edges: Vec<Edge>, order: &[usize]) -> GraphSnapshot {
        let order: Vec<NodeIndex> = order.iter().copied().map(NodeIndex::new).collect();
        let nodes = nodes.into_iter().map(NodeRecord::into_node).collect();
        GraphSnapshot::assemble(1, lineage_graph(nodes, edges), &order)
    }

    /// Diamond: EST -> M1 -> D1 -> SRC and EST -> M2 -> D2 -> SRC
    fn diamond() -> GraphSnapshot {
        assemble(
            vec![
                NodeRecord::new("EST", NodeType::Estimand, "e"),
                NodeRecord::new("M1", NodeType::Method, "m1"),
                NodeRecord::new("M2", NodeType::Method, "m2"),
                NodeRecord::new("D2", NodeType::DerivedVariable, "d2"),
                NodeRecord::new("D1", NodeType::DerivedVariable, "d1"),
                NodeRecord::new("SRC", NodeType::SourceVariable, "s"),
            ],
            vec![
                Edge::new("EST", "M1", Relationship::TargetedBy),
                Edge::new("EST", "M2", Relationship::TargetedBy),
                Edge::new("M2", "D2", Relationship::DerivedFrom),
                Edge::new("M1", "D1", Relationship::DerivedFrom),
                Edge::new("D1", "SRC", Relationship::DerivedFrom),
                Edge::new("D2", "SRC", Relationship::DerivedFrom),
            ],
            &[0, 1, 2, 3, 4, 5],
        )
    }

    #[test]
    fn neighbors_cover_both_directions() {
        let g = diamond();
        let t = Traversal::new(&g);
        assert_eq!(t.neighbors("M1"), set(&["EST", "D1"]));
        assert_eq!(t.neighbors("SRC"), set(&["D1", "D2"]));
        assert!(t.neighbors("NOPE").is_empty());
    }

    #[test]
    fn reachability_follows_direction() {
        let g = diamond();
        let t = Traversal::new(&g);
        assert_eq!(t.reachable_backward("SRC").unwrap(), set(&["D1", "D2", "M1", "M2", "EST"]));
        assert_eq!(t.reachable_forward("M2").unwrap(), set(&["D2", "SRC"]));
        assert!(t.reachable_forward("SRC").unwrap().is_empty());
        assert!(t.reachable_backward("missing").unwrap().is_empty());
    }

    #[test]
    fn reachable_within_reports_hops() {
        let g = diamond();
        let t = Traversal::new(&g);
        let near = t.reachable_within("SRC", Direction::Dependents, 2).unwrap();
        assert_eq!(near.len(), 4);
        assert_eq!(near[&NodeId::new("D1")], 1);
        assert_eq!(near[&NodeId::new("M2")], 2);
        assert!(!near.contains_key(&NodeId::new("EST")));
    }

    #[test]
    fn canonical_path_breaks_ties_lexicographically() {
        let g = diamond();
        let t = Traversal::new(&g);
        assert_eq!(
            t.canonical_path("SRC", "EST").unwrap(),
            Some(ids(&["SRC", "D1", "M1", "EST"]))
        );
        // Stored direction when the target is upstream
        assert_eq!(
            t.canonical_path("EST", "SRC").unwrap(),
            Some(ids(&["EST", "M1", "D1", "SRC"]))
        );
        assert_eq!(t.canonical_path("D1", "D2").unwrap(), None);
        assert_eq!(t.canonical_path("SRC", "SRC").unwrap(), Some(ids(&["SRC"])));
    }

    #[test]
    fn canonical_path_prefers_fewer_edges() {
        let g = assemble(
            vec![
                NodeRecord::new("EST", NodeType::Estimand, "e"),
                NodeRecord::new("A", NodeType::Method, "long way"),
                NodeRecord::new("B", NodeType::DerivedVariable, "long way"),
                NodeRecord::new("Z", NodeType::Method, "short way"),
                NodeRecord::new("SRC", NodeType::SourceVariable, "s"),
            ],
            vec![
                Edge::new("EST", "A", Relationship::TargetedBy),
                Edge::new("A", "B", Relationship::DerivedFrom),
                Edge::new("B", "SRC", Relationship::DerivedFrom),
                Edge::new("EST", "Z", Relationship::TargetedBy),
                Edge::new("Z", "SRC", Relationship::DerivedFrom),
            ],
            &[0, 1, 2, 3, 4],
        );
        let t = Traversal::new(&g);
        assert_eq!(
            t.canonical_path("SRC", "EST").unwrap(),
            Some(ids(&["SRC", "Z", "EST"]))
        );
    }

    #[test]
    fn canonical_lineage_prefers_primary_estimand() {
        let g = assemble(
            vec![
                NodeRecord::new("EST_A", NodeType::Estimand, "secondary, one hop")
                    .with_attribute("objective_type", "SECONDARY"),
                NodeRecord::new("EST_B", NodeType::Estimand, "primary, two hops")
                    .with_attribute("objective_type", "PRIMARY"),
                NodeRecord::new("MTH", NodeType::Method, "m"),
                NodeRecord::new("SRC", NodeType::SourceVariable, "s"),
            ],
            vec![
                Edge::new("EST_A", "SRC", Relationship::DerivedFrom),
                Edge::new("EST_B", "MTH", Relationship::TargetedBy),
                Edge::new("MTH", "SRC", Relationship::DerivedFrom),
            ],
            &[0, 1, 2, 3],
        );
        let t = Traversal::new(&g);
        assert_eq!(
            t.canonical_lineage("SRC").unwrap(),
            Some(ids(&["SRC", "MTH", "EST_B"]))
        );
        assert_eq!(t.impacted_estimands("SRC").unwrap(), set(&["EST_A", "EST_B"]));
        assert_eq!(t.canonical_lineage("EST_A").unwrap(), Some(ids(&["EST_A"])));
        assert_eq!(t.canonical_lineage("nobody").unwrap(), None);
    }

    #[test]
    fn upstream_sources_skip_intermediate_nodes() {
        let g = diamond();
        let t = Traversal::new(&g);
        assert_eq!(t.upstream_sources("EST").unwrap(), set(&["SRC"]));
    }

    #[test]
    fn topological_order_puts_dependents_first() {
        let g = diamond();
        let order = Traversal::new(&g).topological_order();
        assert_eq!(order.first(), Some(&NodeId::new("EST")));
        assert_eq!(order.last(), Some(&NodeId::new("SRC")));
    }

    #[test]
    fn cycle_in_unchecked_snapshot_is_an_invariant_violation() {
        // Bypass the builder: A -> B -> A with an arbitrary order.
        let g = assemble(
            vec![
                NodeRecord::new("A", NodeType::DerivedVariable, "a"),
                NodeRecord::new("B", NodeType::DerivedVariable, "b"),
            ],
            vec![
                Edge::new("A", "B", Relationship::DerivedFrom),
                Edge::new("B", "A", Relationship::DerivedFrom),
            ],
            &[0, 1],
        );
        let t = Traversal::new(&g);
        assert_eq!(
            t.reachable_forward("B"),
            Err(InvariantViolationError::CycleDetected {
                from: "B".into(),
                to: "A".into()
            })
        );
        assert!(t.verify_acyclic().is_err());
    }

    fn raw(ids: &[&str], edges: Vec<Edge>) -> LineageGraph {
        let nodes = ids
            .iter()
            .map(|id| NodeRecord::new(*id, NodeType::DerivedVariable, "n").into_node())
            .collect();
        lineage_graph(nodes, edges)
    }

    #[test]
    fn find_cycle_reports_closed_path() {
        let edges = vec![
            Edge::new("A", "B", Relationship::DerivedFrom),
            Edge::new("B", "C", Relationship::DerivedFrom),
            Edge::new("C", "A", Relationship::DerivedFrom),
        ];
        assert_eq!(
            find_cycle(&raw(&["C", "B", "A"], edges.clone())),
            Some(ids(&["A", "B", "C", "A"]))
        );
        assert_eq!(find_cycle(&raw(&["A", "B", "C"], edges[..2].to_vec())), None);
    }

    #[test]
    fn find_cycle_detects_self_loop() {
        let edges = vec![Edge::new("SRC1", "SRC1", Relationship::DerivedFrom)];
        assert_eq!(find_cycle(&raw(&["SRC1"], edges)), Some(ids(&["SRC1", "SRC1"])));
    }

    #[test]
    fn find_cycle_walks_real_edges_from_a_tangle() {
        // Two loops sharing B, plus an acyclic tail hanging off C.
        let edges = vec![
            Edge::new("B", "D", Relationship::DerivedFrom),
            Edge::new("D", "B", Relationship::DerivedFrom),
            Edge::new("B", "C", Relationship::DerivedFrom),
            Edge::new("C", "B", Relationship::DerivedFrom),
            Edge::new("C", "E", Relationship::DerivedFrom),
            Edge::new("A", "B", Relationship::DerivedFrom),
        ];
        let graph = raw(&["A", "B", "C", "D", "E"], edges.clone());
        let cycle = find_cycle(&graph).unwrap();
        assert_eq!(cycle, ids(&["B", "C", "B"]));
        for pair in cycle.windows(2) {
            assert!(edges.iter().any(|e| e.from == pair[0] && e.to == pair[1]));
        }
    }

    #[test]
    fn verify_acyclic_passes_built_shape() {
        assert_eq!(Traversal::new(&diamond()).verify_acyclic(), Ok(()));
    }
}
