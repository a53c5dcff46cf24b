//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use ripple::domain::{Edge, EdgeKind, GraphBatch, Node, NodeKind};
use ripple::error::ActionError;
use ripple::executor::ExecutionTask;
use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Run the ripple binary in the specified directory
pub fn run_ripple_in_dir(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ripple"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute ripple")
}

/// Build a batch of file nodes and edges given as `(from, to, kind)`.
pub fn batch(nodes: &[&str], edges: &[(&str, &str, EdgeKind)]) -> GraphBatch {
    GraphBatch {
        nodes: nodes
            .iter()
            .map(|id| Node::new(*id, NodeKind::File))
            .collect(),
        edges: edges
            .iter()
            .map(|(from, to, kind)| Edge::new(*from, *to, *kind))
            .collect(),
    }
}

/// A task that sleeps, then succeeds.
pub fn sleeper(id: &str, millis: u64) -> ExecutionTask {
    ExecutionTask::function(id, move |_ctx| async move {
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(())
    })
}

/// A task that always fails.
pub fn failing(id: &str) -> ExecutionTask {
    ExecutionTask::function(id, |_ctx| async { Err::<(), _>(ActionError::failed("always fails")) })
}

/// A task that counts how many times it was invoked.
pub fn counted(id: &str, counter: &Arc<AtomicUsize>) -> ExecutionTask {
    let counter = Arc::clone(counter);
    ExecutionTask::function(id, move |_ctx| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
}

/// The diamond `A -> {B, C} -> D`, built from the given tasks in that order.
pub fn diamond(a: ExecutionTask, b: ExecutionTask, c: ExecutionTask, d: ExecutionTask) -> Vec<ExecutionTask> {
    vec![
        a,
        b.depends_on("A"),
        c.depends_on("A"),
        d.depends_on("B").depends_on("C"),
    ]
}
