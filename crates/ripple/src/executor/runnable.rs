//! The capability a task runs.
//!
//! [`Runnable`] has a single method. The executor never looks inside an
//! action; it only times it, applies the task timeout and interprets the
//! returned `Result`. Two implementations cover the usual cases:
//!
//! - [`ShellCommand`] spawns an external process
//! - [`FnAction`] wraps an in-process async closure

use super::task::TaskId;
use crate::error::ActionError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Maximum number of stderr bytes kept in an exit-status error.
const STDERR_TAIL: usize = 512;

/// What an action sees while it runs.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// The task being run
    pub task_id: TaskId,
    /// Attempt number, starting at 1
    pub attempt: u32,
    /// Signalled when the run is cancelled
    pub cancel: CancellationToken,
}

impl TaskContext {
    /// Whether the run has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// An executable action.
///
/// Implementations should return [`ActionError::Cancelled`] when they stop
/// early because `ctx.cancel` fired.
#[async_trait]
pub trait Runnable: Send + Sync {
    /// Run one attempt.
    async fn execute(&self, ctx: &TaskContext) -> Result<(), ActionError>;

    /// Short human-readable description, used in logs.
    fn describe(&self) -> String {
        "action".to_string()
    }
}

/// Runs an external program.
///
/// The child is killed if the run is cancelled or the attempt times out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    program: String,
    args: Vec<String>,
    workdir: Option<PathBuf>,
    env: BTreeMap<String, String>,
}

impl ShellCommand {
    /// Run `program` directly, without a shell.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            workdir: None,
            env: BTreeMap::new(),
        }
    }

    /// Run a command line through the platform shell (`sh -c` or `cmd /C`).
    pub fn script(line: impl Into<String>) -> Self {
        if cfg!(windows) {
            Self::new("cmd").arg("/C").arg(line)
        } else {
            Self::new("sh").arg("-c").arg(line)
        }
    }

    /// Append an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    /// Set an environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[async_trait]
impl Runnable for ShellCommand {
    async fn execute(&self, ctx: &TaskContext) -> Result<(), ActionError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.workdir {
            command.current_dir(dir);
        }

        let child = command
            .spawn()
            .map_err(|e| ActionError::Spawn(format!("{self}: {e}")))?;
        debug!(task = %ctx.task_id, attempt = ctx.attempt, command = %self, "spawned");

        let output = tokio::select! {
            output = child.wait_with_output() => {
                output.map_err(|e| ActionError::Spawn(format!("{self}: {e}")))?
            }
            () = ctx.cancel.cancelled() => return Err(ActionError::Cancelled),
        };

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if stderr.is_empty() {
            Err(ActionError::ExitStatus(output.status.to_string()))
        } else {
            let start = stderr
                .char_indices()
                .rev()
                .nth(STDERR_TAIL)
                .map_or(0, |(i, _)| i);
            Err(ActionError::ExitStatus(format!(
                "{}: {}",
                output.status,
                &stderr[start..]
            )))
        }
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

type ActionFuture = Pin<Box<dyn Future<Output = Result<(), ActionError>> + Send>>;

/// Runs an in-process async closure.
#[derive(Clone)]
pub struct FnAction {
    name: String,
    func: Arc<dyn Fn(TaskContext) -> ActionFuture + Send + Sync>,
}

impl FnAction {
    /// Wrap `func`. `name` appears in logs.
    pub fn new<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(move |ctx| -> ActionFuture { Box::pin(func(ctx)) }),
        }
    }
}

impl fmt::Debug for FnAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAction").field("name", &self.name).finish()
    }
}

#[async_trait]
impl Runnable for FnAction {
    async fn execute(&self, ctx: &TaskContext) -> Result<(), ActionError> {
        (self.func)(ctx.clone()).await
    }

    fn describe(&self) -> String {
        format!("fn {}", self.name)
    }
}
