//! core::graph
//!
//! Dependency-ordered scheduling of development objects.
//!
//! # Architecture
//!
//! The dependency graph is built from [`DependencyNode`] records: edges
//! point from a node to the ids it depends on. The scheduler runs Kahn's
//! algorithm with a deterministic ready set ordered by
//! `(kind priority, id)`, so structural containers are emitted before the
//! leaf objects that reference them and ties break lexically.
//!
//! # Invariants
//!
//! - Dangling `depends_on` ids (not present in the set) are ignored
//! - Cycles are tolerated, not rejected: leftover nodes are appended in
//!   `(priority, id)` order and reported via [`Schedule::cycle_ids`]
//! - The output is always a permutation of the input ids
//! - For a fixed input set the output order is deterministic

use super::types::{DependencyNode, ObjectKind};
use std::collections::{BTreeSet, HashMap};

/// The result of one scheduling run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    /// All input ids in execution order.
    order: Vec<String>,
    /// Ids that were part of a dependency cycle, in emission order.
    cycle_ids: Vec<String>,
}

impl Schedule {
    /// Ids in execution order. Always a permutation of the input ids.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Ids that could not be topologically placed because of a cycle.
    ///
    /// These are still present in [`Schedule::order`]; dependency data is
    /// advisory metadata, so a cycle degrades to priority order instead of
    /// failing the run.
    pub fn cycle_ids(&self) -> &[String] {
        &self.cycle_ids
    }

    /// Whether a dependency cycle was tolerated in this run.
    pub fn had_cycle(&self) -> bool {
        !self.cycle_ids.is_empty()
    }

    /// Consume the schedule, yielding the execution order.
    pub fn into_order(self) -> Vec<String> {
        self.order
    }
}

/// Dependency-aware scheduler over a set of [`DependencyNode`]s.
///
/// # Example
///
/// ```
/// use stagehand::core::graph::DependencyGraph;
/// use stagehand::core::types::{DependencyNode, ObjectKind};
///
/// let mut graph = DependencyGraph::new();
/// graph.add(DependencyNode::new("cls", ObjectKind::Class).depends_on("pkg"));
/// graph.add(DependencyNode::new("pkg", ObjectKind::Package));
///
/// let schedule = graph.execution_order();
/// assert_eq!(schedule.order(), ["pkg", "cls"]);
/// assert!(!schedule.had_cycle());
/// ```
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: HashMap<String, DependencyNode>,
}

/// Ready-set key: priority first, then id, so iteration order is the
/// deterministic tie-break order.
type ReadyKey = (u8, String);

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node. A node with a duplicate id replaces the earlier one.
    pub fn add(&mut self, node: DependencyNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    /// Build a graph from an iterator of nodes.
    pub fn from_nodes(nodes: impl IntoIterator<Item = DependencyNode>) -> Self {
        let mut graph = Self::new();
        for node in nodes {
            graph.add(node);
        }
        graph
    }

    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node's kind.
    pub fn kind_of(&self, id: &str) -> Option<ObjectKind> {
        self.nodes.get(id).map(|n| n.kind)
    }

    /// Compute the execution order via Kahn's algorithm.
    ///
    /// In-degrees count only edges whose target exists in the set; dangling
    /// dependencies are ignored. The ready set is a `BTreeSet` keyed by
    /// `(priority, id)`, so dequeue order is the total tie-break order and
    /// newly-ready nodes slot into position automatically. If nodes remain
    /// after the ready set drains (a cycle), they are appended in the same
    /// `(priority, id)` order.
    pub fn execution_order(&self) -> Schedule {
        // In-degree per node, restricted to in-set edges.
        let mut in_degree: HashMap<&str, usize> = HashMap::new();
        // Reverse adjacency: id -> ids that depend on it.
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

        for node in self.nodes.values() {
            in_degree.entry(node.id.as_str()).or_insert(0);
            for dep in &node.depends_on {
                if !self.nodes.contains_key(dep.as_str()) {
                    continue; // dangling dependency, advisory only
                }
                *in_degree.entry(node.id.as_str()).or_insert(0) += 1;
                dependents
                    .entry(dep.as_str())
                    .or_default()
                    .push(node.id.as_str());
            }
        }

        let mut ready: BTreeSet<ReadyKey> = self
            .nodes
            .values()
            .filter(|n| in_degree[n.id.as_str()] == 0)
            .map(|n| (n.kind.priority(), n.id.clone()))
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(key) = ready.iter().next().cloned() {
            ready.remove(&key);
            let (_, id) = key;
            if let Some(next) = dependents.get(id.as_str()) {
                for &dependent in next {
                    let degree = in_degree.get_mut(dependent).expect("known node");
                    *degree -= 1;
                    if *degree == 0 {
                        let kind = self.nodes[dependent].kind;
                        ready.insert((kind.priority(), dependent.to_string()));
                    }
                }
            }
            order.push(id);
        }

        // Cycle remainder: everything not yet emitted, in (priority, id) order.
        let mut cycle_ids: Vec<String> = Vec::new();
        if order.len() < self.nodes.len() {
            let emitted: BTreeSet<&str> = order.iter().map(String::as_str).collect();
            let mut leftover: Vec<ReadyKey> = self
                .nodes
                .values()
                .filter(|n| !emitted.contains(n.id.as_str()))
                .map(|n| (n.kind.priority(), n.id.clone()))
                .collect();
            leftover.sort();
            for (_, id) in leftover {
                cycle_ids.push(id.clone());
                order.push(id);
            }
        }

        Schedule { order, cycle_ids }
    }
}
