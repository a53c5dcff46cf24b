//! Error types for ripple.
//!
//! Errors fall into two groups:
//!
//! - **Structural** errors ([`GraphError`], [`ValidationError`]) abort the
//!   operation that hit them and are returned to the caller immediately.
//! - **Task-level** problems ([`ExecutionError`], [`ActionError`]) never
//!   escape the executor. They are retried according to policy and the final
//!   one is attached to the task's outcome in the execution result.

use crate::domain::{Cycle, NodeId};
use serde::Serialize;
use std::io;
use thiserror::Error;

/// Errors raised by [`GraphStore`](crate::graph::GraphStore) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The `(from, to, kind)` edge already exists. Non-fatal: callers log it.
    #[error("duplicate edge ignored: {0}")]
    DuplicateEdgeIgnored(String),

    /// Self-edges are not allowed.
    #[error("invalid edge: {0} cannot depend on itself")]
    InvalidEdge(NodeId),

    /// The node does not exist in the graph.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),
}

/// Reasons a task batch cannot be planned. No task runs when one occurs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The batch's dependency graph contains a cycle.
    #[error("cycle detected: {0}")]
    CycleDetected(Cycle),

    /// Two tasks share an id.
    #[error("duplicate task id: {0}")]
    DuplicateTask(String),

    /// A task depends on an id that is not in the batch.
    #[error("task {task} depends on unknown task {dependency}")]
    UnknownDependency {
        /// The task declaring the dependency
        task: String,
        /// The missing dependency
        dependency: String,
    },
}

/// Failure of a single attempt of a task's action.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ActionError {
    /// The action reported a failure.
    #[error("{0}")]
    Failed(String),

    /// A shell command exited unsuccessfully.
    #[error("command exited with {0}")]
    ExitStatus(String),

    /// A shell command could not be started.
    #[error("failed to spawn command: {0}")]
    Spawn(String),

    /// The attempt exceeded the task timeout.
    #[error("timed out after {0} ms")]
    TimedOut(u64),

    /// The action observed cancellation and stopped.
    #[error("cancelled")]
    Cancelled,
}

impl ActionError {
    /// Convenience constructor for [`ActionError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Why a task did not succeed. Recorded on the task outcome, never thrown.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionError {
    /// The action failed on every allowed attempt.
    #[error("task failed after {attempts} attempt(s): {last_error}")]
    TaskFailed {
        /// Attempts made
        attempts: u32,
        /// Error of the final attempt
        last_error: ActionError,
    },

    /// The task was skipped because a dependency did not succeed.
    #[error("skipped: dependency {dependency} did not succeed")]
    DependencySkipped {
        /// The dependency that failed or was itself skipped
        dependency: String,
    },

    /// The run was cancelled before the task could finish.
    #[error("cancelled")]
    Cancelled,
}

/// Top-level error type for ripple operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Graph mutation or lookup failed.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Task batch failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML (de)serialization failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Snapshot recording failed.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] ripple_jsonl::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// A specialized Result type for ripple operations.
pub type Result<T> = std::result::Result<T, Error>;
