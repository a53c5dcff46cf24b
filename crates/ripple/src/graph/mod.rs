//! The artifact dependency graph.
//!
//! [`GraphStore`] owns nodes and edges reported by external scanners and
//! offers mutation and traversal primitives. There is no process-wide graph:
//! callers create a store and pass it by reference (or inside an `Arc`) to
//! [`find_cycles`](crate::cycles::find_cycles) and
//! [`ImpactAnalyzer`](crate::impact::ImpactAnalyzer).
//!
//! # Edge Direction
//!
//! `from -> to` means `from` depends on `to`. [`GraphStore::dependencies`]
//! follows edges forward, [`GraphStore::dependents`] follows them backward.
//!
//! # Thread Safety
//!
//! Mutations take a write lock and reads take a read lock, so any number of
//! traversals can run together but never alongside a mutation. Each mutation
//! completes before its guard is released, which is why a poisoned lock is
//! simply recovered.

mod inner;
mod traversal;

pub(crate) use inner::GraphInner;

use crate::domain::{Edge, GraphBatch, Node, NodeId};
use crate::error::GraphError;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt::{self, Write as _};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// Counts reported by [`GraphStore::apply_batch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// Nodes that did not exist before
    pub nodes_added: usize,
    /// Existing nodes that were upserted
    pub nodes_updated: usize,
    /// New edges
    pub edges_added: usize,
    /// Edges ignored as duplicates
    pub duplicate_edges: usize,
}

/// A canonical, serializable copy of the graph.
///
/// Nodes are ordered by id and edges by `(from, to, kind)`, so two graphs
/// with the same content produce identical snapshots regardless of the order
/// in which they were built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// All nodes, ordered by id
    pub nodes: Vec<Node>,
    /// All edges, ordered by `(from, to, kind)`
    pub edges: Vec<Edge>,
}

impl GraphSnapshot {
    /// Hex-encoded SHA-256 of the snapshot's JSON form.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(canonical_bytes(self));
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(hex, "{byte:02x}");
        }
        hex
    }
}

/// JSON form of `value`, or a marked `Debug` rendering if serialization
/// fails, so an unserializable value never hashes to the empty input.
fn canonical_bytes<T: Serialize + fmt::Debug>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_else(|error| {
        warn!(%error, "snapshot did not serialize, fingerprinting its debug form");
        format!("!debug:{value:?}").into_bytes()
    })
}

impl From<GraphSnapshot> for GraphBatch {
    fn from(snapshot: GraphSnapshot) -> Self {
        GraphBatch {
            nodes: snapshot.nodes,
            edges: snapshot.edges,
        }
    }
}

/// Thread-safe owner of the node/edge graph.
#[derive(Debug, Default)]
pub struct GraphStore {
    inner: RwLock<GraphInner>,
}

impl GraphStore {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a scanner batch.
    ///
    /// # Errors
    ///
    /// See [`apply_batch`](Self::apply_batch).
    pub fn from_batch(batch: GraphBatch) -> Result<Self, GraphError> {
        let store = Self::new();
        store.apply_batch(batch)?;
        Ok(store)
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, GraphInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, GraphInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a node, or update kind/version/metadata of an existing one.
    ///
    /// Returns `true` when the node was new.
    pub fn add_node(&self, node: Node) -> bool {
        self.write().upsert_node(node)
    }

    /// Add a dependency edge.
    ///
    /// Returns `Ok(false)` when the same `(from, to, kind)` edge already
    /// exists; the duplicate is logged and otherwise ignored.
    ///
    /// # Errors
    ///
    /// - [`GraphError::InvalidEdge`] if `from == to`
    /// - [`GraphError::NodeNotFound`] if either endpoint is unknown
    pub fn add_edge(&self, edge: Edge) -> Result<bool, GraphError> {
        self.write().insert_edge(&edge)
    }

    /// Remove a node together with all edges touching it.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NodeNotFound`] if the node does not exist.
    pub fn remove_node(&self, id: &NodeId) -> Result<Node, GraphError> {
        let removed = self.write().remove_node(id)?;
        debug!(node = %id, "removed node and incident edges");
        Ok(removed)
    }

    /// Apply a scanner batch: nodes first, then edges.
    ///
    /// The batch is validated up front, so a bad edge leaves the graph
    /// untouched.
    ///
    /// # Errors
    ///
    /// - [`GraphError::InvalidEdge`] for a self-edge
    /// - [`GraphError::NodeNotFound`] for an edge endpoint that is neither in
    ///   the graph nor in the batch
    pub fn apply_batch(&self, batch: GraphBatch) -> Result<BatchStats, GraphError> {
        let mut inner = self.write();
        inner.check_batch(&batch)?;

        let mut stats = BatchStats::default();
        for node in batch.nodes {
            if inner.upsert_node(node) {
                stats.nodes_added += 1;
            } else {
                stats.nodes_updated += 1;
            }
        }
        for edge in &batch.edges {
            if inner.insert_edge(edge)? {
                stats.edges_added += 1;
            } else {
                stats.duplicate_edges += 1;
            }
        }

        info!(
            nodes_added = stats.nodes_added,
            nodes_updated = stats.nodes_updated,
            edges_added = stats.edges_added,
            duplicate_edges = stats.duplicate_edges,
            "applied graph batch"
        );
        Ok(stats)
    }

    /// Nodes `id` depends on: direct neighbours, or everything reachable when
    /// `transitive` is set.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NodeNotFound`] if the node does not exist.
    pub fn dependencies(
        &self,
        id: &NodeId,
        transitive: bool,
    ) -> Result<BTreeSet<NodeId>, GraphError> {
        self.neighbourhood(id, transitive, Direction::Outgoing)
    }

    /// Nodes that depend on `id`: direct, or transitive when `transitive` is set.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NodeNotFound`] if the node does not exist.
    pub fn dependents(
        &self,
        id: &NodeId,
        transitive: bool,
    ) -> Result<BTreeSet<NodeId>, GraphError> {
        self.neighbourhood(id, transitive, Direction::Incoming)
    }

    fn neighbourhood(
        &self,
        id: &NodeId,
        transitive: bool,
        direction: Direction,
    ) -> Result<BTreeSet<NodeId>, GraphError> {
        let inner = self.read();
        let start = inner.index_of(id)?;
        let found = if transitive {
            traversal::reachable(&inner, start, direction)
        } else {
            traversal::adjacent(&inner, start, direction)
        };
        Ok(found
            .into_iter()
            .map(|index| inner.graph[index].id.clone())
            .collect())
    }

    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<Node> {
        let inner = self.read();
        let index = inner.node_map.get(id)?;
        Some(inner.graph[*index].clone())
    }

    /// Whether the node exists.
    #[must_use]
    pub fn contains(&self, id: &NodeId) -> bool {
        self.read().node_map.contains_key(id)
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.read().graph.node_count()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.read().graph.edge_count()
    }

    /// Outgoing edges of `id` (what it depends on, with kinds and weights).
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NodeNotFound`] if the node does not exist.
    pub fn edges_from(&self, id: &NodeId) -> Result<Vec<Edge>, GraphError> {
        let inner = self.read();
        let index = inner.index_of(id)?;
        Ok(inner.incident_edges(index, Direction::Outgoing))
    }

    /// Incoming edges of `id` (who depends on it).
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NodeNotFound`] if the node does not exist.
    pub fn edges_into(&self, id: &NodeId) -> Result<Vec<Edge>, GraphError> {
        let inner = self.read();
        let index = inner.index_of(id)?;
        Ok(inner.incident_edges(index, Direction::Incoming))
    }

    /// Canonical copy of the whole graph.
    #[must_use]
    pub fn snapshot(&self) -> GraphSnapshot {
        let inner = self.read();
        let mut nodes: Vec<Node> = inner.graph.node_weights().cloned().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut edges = inner.all_edges();
        edges.sort_by(|a, b| (&a.from, &a.to, a.kind).cmp(&(&b.from, &b.to, b.kind)));

        GraphSnapshot { nodes, edges }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EdgeKind, NodeKind};

    fn ids(values: &[&str]) -> BTreeSet<NodeId> {
        values.iter().map(|v| NodeId::new(*v)).collect()
    }

    /// ```text
    /// app -> auth -> db
    ///   \            ^
    ///    -> cache ---'
    /// ```
    fn layered() -> GraphStore {
        let graph = GraphStore::new();
        for id in ["app", "auth", "cache", "db"] {
            graph.add_node(Node::new(id, NodeKind::File));
        }
        for (from, to) in [("app", "auth"), ("app", "cache"), ("auth", "db"), ("cache", "db")] {
            graph.add_edge(Edge::new(from, to, EdgeKind::Imports)).unwrap();
        }
        graph
    }

    #[test]
    fn direct_and_transitive_dependencies() {
        let graph = layered();
        let app = NodeId::new("app");

        assert_eq!(graph.dependencies(&app, false).unwrap(), ids(&["auth", "cache"]));
        assert_eq!(
            graph.dependencies(&app, true).unwrap(),
            ids(&["auth", "cache", "db"])
        );
    }

    #[test]
    fn direct_and_transitive_dependents() {
        let graph = layered();
        let db = NodeId::new("db");

        assert_eq!(graph.dependents(&db, false).unwrap(), ids(&["auth", "cache"]));
        assert_eq!(
            graph.dependents(&db, true).unwrap(),
            ids(&["app", "auth", "cache"])
        );
    }

    #[test]
    fn self_edge_is_rejected() {
        let graph = layered();
        let err = graph
            .add_edge(Edge::new("db", "db", EdgeKind::Calls))
            .unwrap_err();
        assert_eq!(err, GraphError::InvalidEdge(NodeId::new("db")));
    }

    #[test]
    fn edge_to_unknown_node_is_rejected() {
        let graph = layered();
        let err = graph
            .add_edge(Edge::new("app", "ghost", EdgeKind::Calls))
            .unwrap_err();
        assert_eq!(err, GraphError::NodeNotFound(NodeId::new("ghost")));
    }

    #[test]
    fn remove_node_cascades_edges() {
        let graph = layered();
        graph.remove_node(&NodeId::new("auth")).unwrap();

        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(
            graph.dependents(&NodeId::new("db"), true).unwrap(),
            ids(&["app", "cache"])
        );
        assert!(graph.remove_node(&NodeId::new("auth")).is_err());
    }

    #[test]
    fn add_node_updates_version_and_metadata() {
        let graph = layered();
        let updated = Node::new("db", NodeKind::File)
            .with_version("v2")
            .with_metadata("owner", "storage-team");

        assert!(!graph.add_node(updated.clone()));
        assert_eq!(graph.node(&NodeId::new("db")), Some(updated));
        assert_eq!(graph.edge_count(), 4);
    }

    #[test]
    fn apply_batch_is_all_or_nothing() {
        let graph = layered();
        let batch = GraphBatch {
            nodes: vec![Node::new("new", NodeKind::Task)],
            edges: vec![
                Edge::new("new", "db", EdgeKind::ConfigRef),
                Edge::new("new", "missing", EdgeKind::ConfigRef),
            ],
        };

        assert!(graph.apply_batch(batch).is_err());
        assert!(!graph.contains(&NodeId::new("new")));
        assert_eq!(graph.edge_count(), 4);
    }

    struct Unserializable(u8);

    impl fmt::Debug for Unserializable {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "Unserializable({})", self.0)
        }
    }

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("not serializable"))
        }
    }

    #[test]
    fn canonical_bytes_fall_back_to_distinct_debug_form() {
        let a = canonical_bytes(&Unserializable(1));
        let b = canonical_bytes(&Unserializable(2));
        assert!(!a.is_empty());
        assert_ne!(a, b);
        assert!(a.starts_with(b"!debug:"));
    }

    #[test]
    fn fingerprint_hashes_the_json_form() {
        let graph = GraphStore::new();
        graph.add_node(Node::new("a", NodeKind::File));
        let snapshot = graph.snapshot();
        assert_eq!(canonical_bytes(&snapshot), serde_json::to_vec(&snapshot).unwrap());
        assert_ne!(snapshot.fingerprint(), GraphSnapshot::default().fingerprint());
    }

    #[test]
    fn snapshot_fingerprint_ignores_insertion_order() {
        let forward = layered();

        let reversed = GraphStore::new();
        for id in ["db", "cache", "auth", "app"] {
            reversed.add_node(Node::new(id, NodeKind::File));
        }
        for (from, to) in [("cache", "db"), ("auth", "db"), ("app", "cache"), ("app", "auth")] {
            reversed.add_edge(Edge::new(from, to, EdgeKind::Imports)).unwrap();
        }

        assert_eq!(forward.snapshot(), reversed.snapshot());
        assert_eq!(forward.snapshot().fingerprint(), reversed.snapshot().fingerprint());
        assert_eq!(forward.snapshot().fingerprint().len(), 64);
    }
}
