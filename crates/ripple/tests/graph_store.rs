//! Integration tests for the graph store.

use ripple::domain::{Edge, EdgeKind, Node, NodeId, NodeKind};
use ripple::error::GraphError;
use ripple::graph::GraphStore;
use rstest::{fixture, rstest};
use std::collections::BTreeSet;
use std::sync::Arc;

mod common;
use common::batch;

// ============================================================================
// Test Fixtures
// ============================================================================

/// `api -> auth -> db`, `api -> config`, `worker -> db`
#[fixture]
fn service_graph() -> GraphStore {
    GraphStore::from_batch(batch(
        &["api", "auth", "db", "config", "worker"],
        &[
            ("api", "auth", EdgeKind::Imports),
            ("auth", "db", EdgeKind::Calls),
            ("api", "config", EdgeKind::ConfigRef),
            ("worker", "db", EdgeKind::Calls),
        ],
    ))
    .unwrap()
}

fn ids(names: &[&str]) -> BTreeSet<NodeId> {
    names.iter().map(|n| NodeId::new(*n)).collect()
}

// ============================================================================
// Queries
// ============================================================================

#[rstest]
fn test_direct_and_transitive_dependencies(service_graph: GraphStore) {
    let api = NodeId::new("api");
    assert_eq!(
        service_graph.dependencies(&api, false).unwrap(),
        ids(&["auth", "config"])
    );
    assert_eq!(
        service_graph.dependencies(&api, true).unwrap(),
        ids(&["auth", "config", "db"])
    );
}

#[rstest]
fn test_transitive_dependents(service_graph: GraphStore) {
    let db = NodeId::new("db");
    assert_eq!(
        service_graph.dependents(&db, false).unwrap(),
        ids(&["auth", "worker"])
    );
    assert_eq!(
        service_graph.dependents(&db, true).unwrap(),
        ids(&["api", "auth", "worker"])
    );
}

#[rstest]
fn test_unknown_node_query_fails(service_graph: GraphStore) {
    let err = service_graph
        .dependents(&NodeId::new("ghost"), true)
        .unwrap_err();
    assert_eq!(err, GraphError::NodeNotFound(NodeId::new("ghost")));
}

// ============================================================================
// Mutation
// ============================================================================

#[rstest]
fn test_reapplying_a_batch_is_idempotent(service_graph: GraphStore) {
    let before = service_graph.snapshot();

    let stats = service_graph
        .apply_batch(before.clone().into())
        .unwrap();

    assert_eq!(stats.nodes_added, 0);
    assert_eq!(stats.edges_added, 0);
    assert_eq!(stats.duplicate_edges, 4);
    assert_eq!(service_graph.snapshot().fingerprint(), before.fingerprint());
}

#[test]
fn test_fingerprint_ignores_insertion_order() {
    let forward = GraphStore::from_batch(batch(
        &["a", "b", "c"],
        &[("a", "b", EdgeKind::Imports), ("b", "c", EdgeKind::Calls)],
    ))
    .unwrap();
    let backward = GraphStore::from_batch(batch(
        &["c", "b", "a"],
        &[("b", "c", EdgeKind::Calls), ("a", "b", EdgeKind::Imports)],
    ))
    .unwrap();

    assert_eq!(
        forward.snapshot().fingerprint(),
        backward.snapshot().fingerprint()
    );
}

#[rstest]
fn test_bad_edge_leaves_graph_untouched(service_graph: GraphStore) {
    let before = service_graph.snapshot();
    let mut bad = batch(&["new"], &[("new", "api", EdgeKind::Imports)]);
    bad.edges.push(Edge::new("new", "missing", EdgeKind::Calls));

    let err = service_graph.apply_batch(bad).unwrap_err();

    assert_eq!(err, GraphError::NodeNotFound(NodeId::new("missing")));
    assert_eq!(service_graph.snapshot(), before);
}

#[rstest]
fn test_remove_node_drops_incident_edges(service_graph: GraphStore) {
    service_graph.remove_node(&NodeId::new("auth")).unwrap();

    assert!(!service_graph.contains(&NodeId::new("auth")));
    assert_eq!(service_graph.edge_count(), 2);
    assert_eq!(
        service_graph.dependents(&NodeId::new("db"), true).unwrap(),
        ids(&["worker"])
    );
}

#[test]
fn test_concurrent_writers_and_readers() {
    let graph = Arc::new(GraphStore::new());
    graph.add_node(Node::new("root", NodeKind::Component));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let graph = Arc::clone(&graph);
            std::thread::spawn(move || {
                for i in 0..25 {
                    let id = format!("n{t}-{i}");
                    graph.add_node(Node::new(id.as_str(), NodeKind::File));
                    graph
                        .add_edge(Edge::new(id.as_str(), "root", EdgeKind::Imports))
                        .unwrap();
                    let _ = graph.dependents(&NodeId::new("root"), false).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(graph.node_count(), 201);
    assert_eq!(
        graph.dependents(&NodeId::new("root"), false).unwrap().len(),
        200
    );
}
