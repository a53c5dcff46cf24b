//! Cycle detection via strongly connected components.
//!
//! Uses Tarjan's algorithm with an explicit DFS stack instead of recursion,
//! so very deep dependency chains cannot overflow the thread stack. Runs in
//! O(V + E).
//!
//! A strongly connected component is reported as a cycle when it has more
//! than one member, or when its single member has an edge to itself.

use crate::domain::Cycle;
use crate::graph::GraphStore;
use petgraph::visit::{IntoNeighbors, IntoNodeIdentifiers, NodeIndexable};

const UNVISITED: usize = usize::MAX;

/// Find every cycle in a graph store.
///
/// The store may legitimately contain cycles; they are reported, not
/// rejected. Each cycle lists its members sorted by id, and cycles are
/// ordered by their first member.
#[must_use]
pub fn find_cycles(graph: &GraphStore) -> Vec<Cycle> {
    let inner = graph.read();
    let cycles = strongly_connected_cycles(&inner.graph, |index| {
        inner.graph[index].id.to_string()
    });
    if !cycles.is_empty() {
        tracing::debug!(count = cycles.len(), "dependency cycles found");
    }
    cycles
}

/// Whether the store contains at least one cycle.
#[must_use]
pub fn has_cycle(graph: &GraphStore) -> bool {
    !find_cycles(graph).is_empty()
}

/// Per-node bookkeeping for Tarjan's algorithm.
struct Tarjan {
    index: Vec<usize>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    next_index: usize,
}

impl Tarjan {
    fn new(bound: usize) -> Self {
        Self {
            index: vec![UNVISITED; bound],
            lowlink: vec![UNVISITED; bound],
            on_stack: vec![false; bound],
            next_index: 0,
        }
    }

    fn discover(&mut self, ix: usize) {
        self.index[ix] = self.next_index;
        self.lowlink[ix] = self.next_index;
        self.on_stack[ix] = true;
        self.next_index += 1;
    }
}

/// Find cycles in any petgraph graph, naming members with `label`.
///
/// Used for the artifact graph and for task batches alike.
pub fn strongly_connected_cycles<G, F>(graph: G, label: F) -> Vec<Cycle>
where
    G: IntoNeighbors + IntoNodeIdentifiers + NodeIndexable,
    F: Fn(G::NodeId) -> String,
{
    let mut state = Tarjan::new(graph.node_bound());
    let mut component_stack: Vec<G::NodeId> = Vec::new();
    let mut cycles = Vec::new();

    for root in graph.node_identifiers() {
        if state.index[graph.to_index(root)] != UNVISITED {
            continue;
        }

        state.discover(graph.to_index(root));
        component_stack.push(root);
        let mut dfs: Vec<(G::NodeId, G::Neighbors)> = vec![(root, graph.neighbors(root))];

        loop {
            let Some((node, neighbors)) = dfs.last_mut() else {
                break;
            };
            let node = *node;
            let next = neighbors.next();
            let v = graph.to_index(node);

            if let Some(succ) = next {
                let w = graph.to_index(succ);
                if state.index[w] == UNVISITED {
                    state.discover(w);
                    component_stack.push(succ);
                    dfs.push((succ, graph.neighbors(succ)));
                } else if state.on_stack[w] {
                    state.lowlink[v] = state.lowlink[v].min(state.index[w]);
                }
                continue;
            }

            // All successors of `node` explored.
            dfs.pop();
            if let Some((parent, _)) = dfs.last() {
                let p = graph.to_index(*parent);
                state.lowlink[p] = state.lowlink[p].min(state.lowlink[v]);
            }

            if state.lowlink[v] == state.index[v] {
                let mut members = Vec::new();
                while let Some(member) = component_stack.pop() {
                    state.on_stack[graph.to_index(member)] = false;
                    members.push(member);
                    if member == node {
                        break;
                    }
                }

                let is_cycle = members.len() > 1
                    || graph.neighbors(node).any(|succ| succ == node);
                if is_cycle {
                    let mut names: Vec<String> = members.into_iter().map(&label).collect();
                    names.sort();
                    cycles.push(Cycle(names));
                }
            }
        }
    }

    cycles.sort();
    cycles
}
