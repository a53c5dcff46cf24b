//! Task descriptors and status.

use super::retry::RetryPolicy;
use super::runnable::{FnAction, Runnable, ShellCommand, TaskContext};
use crate::error::ActionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Identifier of a task within one batch.
pub type TaskId = String;

/// Lifecycle state of a task.
///
/// `Succeeded`, `Skipped` and `Cancelled` are always terminal. `Failed` is
/// terminal once the retry policy is exhausted; every `Failed` status in an
/// [`ExecutionResult`](super::ExecutionResult) is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for dependencies
    Pending,
    /// Eligible for dispatch
    Ready,
    /// An attempt is in progress
    Running,
    /// The action completed successfully
    Succeeded,
    /// The action failed
    Failed,
    /// Not run because of a dependency
    Skipped,
    /// Not run, or stopped, because the run was cancelled
    Cancelled,
}

impl TaskStatus {
    /// Whether the status can no longer change at the end of a run.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Skipped | Self::Cancelled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// A unit of work submitted to the scheduler.
///
/// The action is an opaque capability: the executor only orchestrates it.
#[derive(Clone)]
pub struct ExecutionTask {
    /// Unique id within the batch
    pub id: TaskId,
    /// Ids of tasks that must finish first
    pub dependencies: BTreeSet<TaskId>,
    /// What to run
    pub action: Arc<dyn Runnable>,
    /// Retry behaviour for failed attempts
    pub retry: RetryPolicy,
    /// Limit for a single attempt
    pub timeout: Option<Duration>,
}

impl ExecutionTask {
    /// Create a task with no dependencies and a single attempt.
    pub fn new(id: impl Into<TaskId>, action: Arc<dyn Runnable>) -> Self {
        Self {
            id: id.into(),
            dependencies: BTreeSet::new(),
            action,
            retry: RetryPolicy::default(),
            timeout: None,
        }
    }

    /// Create a task that runs an external command.
    pub fn shell(id: impl Into<TaskId>, command: ShellCommand) -> Self {
        Self::new(id, Arc::new(command))
    }

    /// Create a task that runs an in-process async function.
    pub fn function<F, Fut>(id: impl Into<TaskId>, func: F) -> Self
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
    {
        let id = id.into();
        let action = FnAction::new(id.clone(), func);
        Self::new(id, Arc::new(action))
    }

    /// Add one dependency.
    #[must_use]
    pub fn depends_on(mut self, dependency: impl Into<TaskId>) -> Self {
        self.dependencies.insert(dependency.into());
        self
    }

    /// Add several dependencies.
    #[must_use]
    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskId>,
    {
        self.dependencies
            .extend(dependencies.into_iter().map(Into::into));
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set a per-attempt timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl fmt::Debug for ExecutionTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionTask")
            .field("id", &self.id)
            .field("dependencies", &self.dependencies)
            .field("action", &self.action.describe())
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .finish()
    }
}
