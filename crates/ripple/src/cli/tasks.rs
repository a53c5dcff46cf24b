//! Task batch files.
//!
//! ```yaml
//! defaults:
//!   timeout-ms: 60000
//!   retry: { max-attempts: 2, backoff: exponential }
//! tasks:
//!   - id: build
//!     command: cargo build
//!   - id: test
//!     depends-on: [build]
//!     command: cargo
//!     args: [test, --workspace]
//!     workdir: crates/core
//!     env: { RUST_LOG: debug }
//! ```
//!
//! A `command` without `args` is run through the platform shell. A relative
//! `workdir` is resolved against the directory holding the batch file.

use super::input::read_document;
use crate::error::Result;
use crate::executor::{ExecutionTask, RetryPolicy, ShellCommand};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings applied to every task that does not override them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct TaskDefaults {
    /// Retry policy; falls back to the configuration file
    pub retry: Option<RetryPolicy>,
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: Option<u64>,
}

/// One task entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct TaskSpec {
    /// Unique task id
    pub id: String,
    /// Ids of tasks that must finish first
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Program, or a full shell line when `args` is empty
    pub command: String,
    /// Arguments passed to `command` without a shell
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory
    #[serde(default)]
    pub workdir: Option<PathBuf>,
    /// Extra environment variables
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Retry override
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
    /// Timeout override in milliseconds
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// A task batch document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskBatchFile {
    /// Batch-wide defaults
    #[serde(default)]
    pub defaults: TaskDefaults,
    /// Tasks in any order
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
}

impl TaskBatchFile {
    /// Read a batch from a YAML or JSON file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self> {
        read_document(path).await
    }

    /// Build executable tasks.
    ///
    /// `base_dir` anchors relative working directories; `fallback_retry`
    /// applies when neither the task nor the batch defaults set a policy.
    #[must_use]
    pub fn into_tasks(self, base_dir: &Path, fallback_retry: RetryPolicy) -> Vec<ExecutionTask> {
        let defaults = self.defaults;
        self.tasks
            .into_iter()
            .map(|spec| {
                let mut command = if spec.args.is_empty() {
                    ShellCommand::script(spec.command)
                } else {
                    ShellCommand::new(spec.command).args(spec.args)
                };
                if let Some(dir) = spec.workdir {
                    command = command.current_dir(base_dir.join(dir));
                }
                for (key, value) in spec.env {
                    command = command.env(key, value);
                }

                let retry = spec.retry.or(defaults.retry).unwrap_or(fallback_retry);
                let mut task = ExecutionTask::shell(spec.id, command)
                    .with_dependencies(spec.depends_on)
                    .with_retry(retry);
                if let Some(ms) = spec.timeout_ms.or(defaults.timeout_ms) {
                    task = task.with_timeout(Duration::from_millis(ms));
                }
                task
            })
            .collect()
    }
}
