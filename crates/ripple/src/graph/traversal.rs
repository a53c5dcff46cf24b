//! Breadth-first reachability over the forward and reverse adjacency.

use super::inner::GraphInner;
use petgraph::Direction;
use petgraph::stable_graph::NodeIndex;
use std::collections::{HashSet, VecDeque};

/// Every node reachable from `start` following `direction`.
///
/// `Outgoing` walks dependencies, `Incoming` walks dependents. The start node
/// is excluded from the result even when a cycle leads back to it.
pub(super) fn reachable(
    inner: &GraphInner,
    start: NodeIndex,
    direction: Direction,
) -> Vec<NodeIndex> {
    let mut visited = HashSet::from([start]);
    let mut queue = VecDeque::from([start]);
    let mut result = Vec::new();

    while let Some(current) = queue.pop_front() {
        for next in inner.graph.neighbors_directed(current, direction) {
            if visited.insert(next) {
                result.push(next);
                queue.push_back(next);
            }
        }
    }

    result
}

/// Direct neighbours of `start`, deduplicated across parallel edges.
pub(super) fn adjacent(
    inner: &GraphInner,
    start: NodeIndex,
    direction: Direction,
) -> Vec<NodeIndex> {
    let mut seen = HashSet::new();
    inner
        .graph
        .neighbors_directed(start, direction)
        .filter(|n| *n != start && seen.insert(*n))
        .collect()
}
