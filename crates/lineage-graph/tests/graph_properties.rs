//! Property tests for the graph builder and traversal engine

use lineage_graph::{
    GraphBuilder, GraphInput, GraphIntegrityError, NodeId, NodeRecord, NodeType, Relationship,
    Traversal,
};
use proptest::prelude::*;

const TYPES: [NodeType; 7] = NodeType::ALL;

/// Random DAG: edges only run from a lower to a higher index.
fn dag_input() -> impl Strategy<Value = GraphInput> {
    (2..16usize).prop_flat_map(|n| {
        (
            proptest::collection::vec(0..TYPES.len(), n),
            proptest::collection::vec((0..n, 0..n), 0..40),
        )
            .prop_map(move |(types, pairs)| {
                let mut input = GraphInput::new();
                for (i, t) in types.iter().enumerate() {
                    input = input.node(NodeRecord::new(format!("N{i:02}"), TYPES[*t], "node"));
                }
                for (a, b) in pairs {
                    if a < b {
                        input = input.edge(format!("N{a:02}"), format!("N{b:02}"), Relationship::DerivedFrom);
                    }
                }
                input
            })
    })
}

proptest! {
    #[test]
    fn prop_reachability_is_symmetric(input in dag_input()) {
        let outcome = GraphBuilder::new().build(input).unwrap();
        let graph = outcome.snapshot;
        let t = Traversal::new(&graph);
        let ids: Vec<NodeId> = graph.nodes().map(|n| n.id.clone()).collect();

        for a in &ids {
            let forward = t.reachable_forward(a.as_str()).unwrap();
            for b in &ids {
                let backward = t.reachable_backward(b.as_str()).unwrap();
                prop_assert_eq!(forward.contains(b), backward.contains(a));
            }
        }
    }

    #[test]
    fn prop_back_edge_is_rejected(input in dag_input()) {
        prop_assume!(!input.edges.is_empty());
        let first = input.edges[0].clone();
        let cyclic = input.edge(first.to.clone(), first.from.clone(), Relationship::MappedTo);

        let err = GraphBuilder::new().build(cyclic).unwrap_err();
        let is_cycle = matches!(err, GraphIntegrityError::CyclicGraph { .. });
        prop_assert!(is_cycle);
    }

    #[test]
    fn prop_canonical_path_is_deterministic(input in dag_input()) {
        let first = GraphBuilder::new().build(input.clone()).unwrap().snapshot;
        let second = GraphBuilder::new().build(input).unwrap().snapshot;
        let ids: Vec<NodeId> = first.nodes().map(|n| n.id.clone()).collect();

        for a in &ids {
            for b in &ids {
                let p1 = Traversal::new(&first).canonical_path(a.as_str(), b.as_str()).unwrap();
                let p2 = Traversal::new(&first).canonical_path(a.as_str(), b.as_str()).unwrap();
                let p3 = Traversal::new(&second).canonical_path(a.as_str(), b.as_str()).unwrap();
                prop_assert_eq!(&p1, &p2);
                prop_assert_eq!(&p1, &p3);
                if let Some(path) = p1 {
                    prop_assert_eq!(path.first(), Some(a));
                    prop_assert_eq!(path.last(), Some(b));
                }
            }
        }
    }

    #[test]
    fn prop_neighbors_are_one_hop_reachable(input in dag_input()) {
        let graph = GraphBuilder::new().build(input).unwrap().snapshot;
        let t = Traversal::new(&graph);
        for node in graph.nodes() {
            let id = node.id.as_str();
            let forward = t.reachable_forward(id).unwrap();
            let backward = t.reachable_backward(id).unwrap();
            for n in t.neighbors(id) {
                prop_assert!(forward.contains(&n) || backward.contains(&n));
            }
        }
    }
}
