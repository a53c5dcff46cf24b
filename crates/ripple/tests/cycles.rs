//! Property and scenario tests for cycle detection.

use proptest::prelude::*;
use ripple::cycles::{find_cycles, has_cycle};
use ripple::domain::{Cycle, EdgeKind};
use ripple::graph::GraphStore;

mod common;
use common::batch;

/// Node names `n00`, `n01`, ... sort in index order.
fn name(i: usize) -> String {
    format!("n{i:02}")
}

/// A DAG over `n` nodes: every edge points from a lower to a higher index.
fn dag_edges() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (2usize..24).prop_flat_map(|n| {
        let edges = prop::collection::vec((0..n, 0..n), 0..n * 3).prop_map(|pairs| {
            pairs
                .into_iter()
                .filter(|(a, b)| a != b)
                .map(|(a, b)| (a.min(b), a.max(b)))
                .collect::<Vec<_>>()
        });
        (Just(n), edges)
    })
}

fn build(n: usize, edges: &[(usize, usize)]) -> GraphStore {
    let names: Vec<String> = (0..n).map(name).collect();
    let node_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let edge_refs: Vec<(&str, &str, EdgeKind)> = edges
        .iter()
        .map(|&(a, b)| (names[a].as_str(), names[b].as_str(), EdgeKind::Imports))
        .collect();
    GraphStore::from_batch(batch(&node_refs, &edge_refs)).unwrap()
}

proptest! {
    #[test]
    fn forward_only_graphs_have_no_cycles((n, edges) in dag_edges()) {
        let graph = build(n, &edges);
        prop_assert!(find_cycles(&graph).is_empty());
        prop_assert!(!has_cycle(&graph));
    }

    #[test]
    fn a_back_edge_in_a_dag_closes_a_cycle(
        (n, mut edges) in dag_edges(),
        len in 2usize..6,
    ) {
        let len = len.min(n);
        edges.extend((1..len).map(|i| (i - 1, i)));
        edges.push((len - 1, 0));
        let graph = build(n, &edges);

        let cycles = find_cycles(&graph);
        prop_assert!(has_cycle(&graph));
        // Forward edges may pull extra nodes into the same component.
        prop_assert!(
            cycles
                .iter()
                .any(|cycle| (0..len).all(|i| cycle.contains(&name(i)))),
            "no cycle holds the whole chain: {:?}",
            cycles
        );
    }

    #[test]
    fn a_back_edge_closes_exactly_the_path((n, _) in dag_edges(), len in 2usize..6) {
        let len = len.min(n);
        // Chain n00 -> n01 -> ... -> n(len-1), then back to n00.
        let mut edges: Vec<(usize, usize)> = (1..len).map(|i| (i - 1, i)).collect();
        edges.push((len - 1, 0));
        let graph = build(n, &edges);

        let cycles = find_cycles(&graph);
        prop_assert_eq!(cycles.len(), 1);
        let expected: Vec<String> = (0..len).map(name).collect();
        prop_assert_eq!(cycles[0].members(), expected.as_slice());
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_three_node_cycle_is_reported_once() {
    let graph = GraphStore::from_batch(batch(
        &["A", "B", "C", "D"],
        &[
            ("A", "B", EdgeKind::Imports),
            ("B", "C", EdgeKind::Calls),
            ("C", "A", EdgeKind::ConfigRef),
            ("D", "A", EdgeKind::Imports),
        ],
    ))
    .unwrap();

    assert_eq!(
        find_cycles(&graph),
        vec![Cycle(vec!["A".into(), "B".into(), "C".into()])]
    );
}

#[test]
fn test_disjoint_cycles_are_ordered() {
    let graph = GraphStore::from_batch(batch(
        &["x", "y", "a", "b"],
        &[
            ("x", "y", EdgeKind::Imports),
            ("y", "x", EdgeKind::Imports),
            ("b", "a", EdgeKind::Calls),
            ("a", "b", EdgeKind::Calls),
        ],
    ))
    .unwrap();

    let cycles = find_cycles(&graph);
    assert_eq!(cycles.len(), 2);
    assert_eq!(cycles[0].members(), ["a", "b"]);
    assert_eq!(cycles[1].members(), ["x", "y"]);
}

#[test]
fn test_deep_chain_does_not_overflow() {
    let n = 20_000;
    let names: Vec<String> = (0..n).map(|i| format!("c{i}")).collect();
    let node_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let mut edge_refs: Vec<(&str, &str, EdgeKind)> = names
        .windows(2)
        .map(|w| (w[0].as_str(), w[1].as_str(), EdgeKind::Imports))
        .collect();
    edge_refs.push((names[n - 1].as_str(), names[0].as_str(), EdgeKind::Imports));
    let graph = GraphStore::from_batch(batch(&node_refs, &edge_refs)).unwrap();

    let cycles = find_cycles(&graph);
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].len(), n);
}
