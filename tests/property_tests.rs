//! Property-based tests for the dependency scheduler.
//!
//! These tests use proptest to verify scheduling invariants hold across
//! randomly generated dependency sets.

use std::collections::{BTreeSet, HashMap};

use proptest::prelude::*;

use stagehand::core::graph::DependencyGraph;
use stagehand::core::types::{DependencyNode, ObjectKind};

/// Strategy for picking an object kind.
fn any_kind() -> impl Strategy<Value = ObjectKind> {
    prop::sample::select(ObjectKind::ALL.to_vec())
}

/// Strategy for an acyclic node set.
///
/// Nodes are named `n0..n{count-1}` and edges only point from a node to
/// lower-indexed nodes, which rules out cycles by construction.
fn acyclic_nodes() -> impl Strategy<Value = Vec<DependencyNode>> {
    (1usize..12).prop_flat_map(|count| {
        let kinds = prop::collection::vec(any_kind(), count);
        let edges = prop::collection::vec(prop::collection::vec(any::<bool>(), count), count);
        (kinds, edges).prop_map(move |(kinds, edges)| {
            (0..count)
                .map(|i| {
                    let mut deps = BTreeSet::new();
                    for j in 0..i {
                        if edges[i][j] {
                            deps.insert(format!("n{}", j));
                        }
                    }
                    DependencyNode {
                        id: format!("n{}", i),
                        kind: kinds[i],
                        depends_on: deps,
                    }
                })
                .collect()
        })
    })
}

/// Strategy for a node set that may contain cycles and dangling ids.
fn arbitrary_nodes() -> impl Strategy<Value = Vec<DependencyNode>> {
    (1usize..10).prop_flat_map(|count| {
        let kinds = prop::collection::vec(any_kind(), count);
        // Any node may depend on any node, including itself and ids that
        // do not exist in the set.
        let deps = prop::collection::vec(
            prop::collection::vec(0usize..(count + 3), 0..4),
            count,
        );
        (kinds, deps).prop_map(move |(kinds, deps)| {
            (0..count)
                .map(|i| DependencyNode {
                    id: format!("n{}", i),
                    kind: kinds[i],
                    depends_on: deps[i].iter().map(|j| format!("n{}", j)).collect(),
                })
                .collect()
        })
    })
}

proptest! {
    /// For acyclic sets, every node comes after all of its in-set
    /// dependencies.
    #[test]
    fn acyclic_order_respects_dependencies(nodes in acyclic_nodes()) {
        let graph = DependencyGraph::from_nodes(nodes.clone());
        let schedule = graph.execution_order();
        prop_assert!(!schedule.had_cycle());

        let position: HashMap<&str, usize> = schedule
            .order()
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        for node in &nodes {
            for dep in &node.depends_on {
                prop_assert!(
                    position[dep.as_str()] < position[node.id.as_str()],
                    "{} scheduled before its dependency {}",
                    node.id,
                    dep
                );
            }
        }
    }

    /// The order is deterministic: scheduling the same set twice gives
    /// the same sequence.
    #[test]
    fn order_is_deterministic(nodes in arbitrary_nodes()) {
        let first = DependencyGraph::from_nodes(nodes.clone()).execution_order();
        let second = DependencyGraph::from_nodes(nodes).execution_order();
        prop_assert_eq!(first.order(), second.order());
    }

    /// Even with cycles and dangling ids, the output is a permutation of
    /// the input ids: nothing dropped, nothing duplicated.
    #[test]
    fn cyclic_sets_still_yield_a_permutation(nodes in arbitrary_nodes()) {
        let expected: BTreeSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        let schedule = DependencyGraph::from_nodes(nodes.clone()).execution_order();

        prop_assert_eq!(schedule.order().len(), expected.len());
        let seen: BTreeSet<&str> = schedule.order().iter().map(String::as_str).collect();
        prop_assert_eq!(seen, expected);
    }

    /// Nodes with no dependencies are emitted in (kind priority, id)
    /// order.
    #[test]
    fn independent_nodes_sort_by_priority_then_id(kinds in prop::collection::vec(any_kind(), 1..8)) {
        let nodes: Vec<DependencyNode> = kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| DependencyNode::new(format!("n{}", i), *kind))
            .collect();
        let keys: HashMap<String, (u8, String)> = nodes
            .iter()
            .map(|n| (n.id.clone(), (n.kind.priority(), n.id.clone())))
            .collect();

        let schedule = DependencyGraph::from_nodes(nodes).execution_order();
        let ordered_keys: Vec<&(u8, String)> =
            schedule.order().iter().map(|id| &keys[id]).collect();
        prop_assert!(ordered_keys.windows(2).all(|w| w[0] <= w[1]));
    }
}
