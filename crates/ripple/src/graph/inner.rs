//! Unsynchronized graph storage.
//!
//! [`GraphInner`] holds the data; [`GraphStore`](super::GraphStore) wraps it
//! in a `RwLock`. Analysis code borrows a `&GraphInner` through a read guard
//! so a whole query sees one consistent graph.

use crate::domain::{Edge, EdgeKind, GraphBatch, Node, NodeId};
use crate::error::GraphError;
use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Edge payload stored in the petgraph graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct EdgeData {
    pub(crate) kind: EdgeKind,
    pub(crate) weight: f64,
}

/// Graph data without locking.
///
/// # Graph Representation
///
/// Edges point from **dependent to dependency**: `from -> to` means `from`
/// depends on `to`. Dependents of a node are therefore its incoming
/// neighbours. A `StableDiGraph` is used so removing a node never
/// invalidates the indices held in `node_map`.
#[derive(Debug, Default)]
pub(crate) struct GraphInner {
    /// Nodes carry the full artifact record.
    pub(crate) graph: StableDiGraph<Node, EdgeData>,

    /// Mapping from `NodeId` to graph index. Every node in `graph` has an entry.
    pub(crate) node_map: HashMap<NodeId, NodeIndex>,
}

impl GraphInner {
    pub(crate) fn index_of(&self, id: &NodeId) -> Result<NodeIndex, GraphError> {
        self.node_map
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))
    }

    /// Upsert by id. Returns `true` when the node was new.
    pub(crate) fn upsert_node(&mut self, node: Node) -> bool {
        if let Some(&index) = self.node_map.get(&node.id) {
            let existing = &mut self.graph[index];
            if *existing != node {
                debug!(node = %node.id, version = %node.version, "updating node");
                *existing = node;
            }
            return false;
        }

        let id = node.id.clone();
        let index = self.graph.add_node(node);
        self.node_map.insert(id, index);
        true
    }

    /// Checks an edge against the current graph without inserting it.
    fn check_edge(&self, edge: &Edge) -> Result<(NodeIndex, NodeIndex), GraphError> {
        if edge.from == edge.to {
            return Err(GraphError::InvalidEdge(edge.from.clone()));
        }
        Ok((self.index_of(&edge.from)?, self.index_of(&edge.to)?))
    }

    fn has_edge(&self, from: NodeIndex, to: NodeIndex, kind: EdgeKind) -> bool {
        self.graph
            .edges_directed(from, Direction::Outgoing)
            .any(|e| e.target() == to && e.weight().kind == kind)
    }

    /// Inserts an edge. Returns `false` when the same `(from, to, kind)` exists.
    pub(crate) fn insert_edge(&mut self, edge: &Edge) -> Result<bool, GraphError> {
        let (from, to) = self.check_edge(edge)?;
        if self.has_edge(from, to, edge.kind) {
            debug!("{}", GraphError::DuplicateEdgeIgnored(edge.to_string()));
            return Ok(false);
        }
        self.graph.add_edge(
            from,
            to,
            EdgeData {
                kind: edge.kind,
                weight: edge.weight,
            },
        );
        Ok(true)
    }

    /// Removes a node and every incident edge.
    pub(crate) fn remove_node(&mut self, id: &NodeId) -> Result<Node, GraphError> {
        let index = self.index_of(id)?;
        self.node_map.remove(id);
        self.graph
            .remove_node(index)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))
    }

    /// Validates a whole batch against the graph as it would look after the
    /// batch's nodes are inserted. Nothing is mutated.
    pub(crate) fn check_batch(&self, batch: &GraphBatch) -> Result<(), GraphError> {
        let incoming: HashSet<&NodeId> = batch.nodes.iter().map(|n| &n.id).collect();
        let known = |id: &NodeId| self.node_map.contains_key(id) || incoming.contains(id);
        for edge in &batch.edges {
            if edge.from == edge.to {
                return Err(GraphError::InvalidEdge(edge.from.clone()));
            }
            for endpoint in [&edge.from, &edge.to] {
                if !known(endpoint) {
                    return Err(GraphError::NodeNotFound(endpoint.clone()));
                }
            }
        }
        Ok(())
    }

    /// Builds the public `Edge` value for a stored edge.
    pub(crate) fn edge_view(&self, from: NodeIndex, to: NodeIndex, data: EdgeData) -> Edge {
        Edge {
            from: self.graph[from].id.clone(),
            to: self.graph[to].id.clone(),
            kind: data.kind,
            weight: data.weight,
        }
    }

    /// Edges incident to `index` in the given direction.
    pub(crate) fn incident_edges(&self, index: NodeIndex, direction: Direction) -> Vec<Edge> {
        self.graph
            .edges_directed(index, direction)
            .map(|e| self.edge_view(e.source(), e.target(), *e.weight()))
            .collect()
    }

    pub(crate) fn all_edges(&self) -> Vec<Edge> {
        self.graph
            .edge_indices()
            .filter_map(|e| {
                let (from, to) = self.graph.edge_endpoints(e)?;
                Some(self.edge_view(from, to, self.graph[e]))
            })
            .collect()
    }
}
