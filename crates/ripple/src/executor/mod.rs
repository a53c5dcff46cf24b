//! Parallel execution of an [`ExecutionPlan`].
//!
//! # Architecture
//!
//! ```text
//!             dispatch channel               event channel
//!  arbiter  ------------------->  workers  ------------------>  arbiter
//!  (owns all task state)          (N tasks)   Finished / RetryReady
//! ```
//!
//! A single arbiter loop owns every task status, dependency counter and the
//! ready queue. It dispatches ready tasks to a fixed pool of `max_workers`
//! workers and then blocks on the event channel. Workers only run actions
//! and report back; they never touch scheduling state. Retry delays are
//! timers that post a `RetryReady` event when they expire.
//!
//! # Failure Policy
//!
//! - [`FailurePolicy::StopOnFail`]: a terminally failed task skips all of
//!   its transitive dependents at once. Independent branches continue.
//! - [`FailurePolicy::ContinueOnFail`]: a task waits until every dependency
//!   is terminal, then runs if at least one of them succeeded. With no
//!   succeeded dependency it is skipped, and the skip propagates by the same
//!   rule.
//!
//! # Cancellation
//!
//! Once the [`CancellationToken`] fires, nothing new is dispatched. Ready,
//! pending and backing-off tasks become `Cancelled`; running attempts are
//! awaited and are not retried.

mod arbiter;
mod result;
mod retry;
mod runnable;
mod task;

pub use result::{ExecutionResult, StatusCounts, TaskOutcome};
pub use retry::{Backoff, RetryPolicy};
pub use runnable::{FnAction, Runnable, ShellCommand, TaskContext};
pub use task::{ExecutionTask, TaskId, TaskStatus};

pub(crate) use retry::duration_ms;

use crate::error::{ActionError, ValidationError};
use crate::scheduler::{ExecutionPlan, Scheduler};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

/// What happens to dependents when a task fails for good.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Skip every transitive dependent of a failed task
    #[default]
    StopOnFail,
    /// Run a task if any of its dependencies succeeded
    ContinueOnFail,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StopOnFail => write!(f, "stop-on-fail"),
            Self::ContinueOnFail => write!(f, "continue-on-fail"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stop-on-fail" => Ok(Self::StopOnFail),
            "continue-on-fail" => Ok(Self::ContinueOnFail),
            other => Err(format!(
                "unknown failure policy '{other}' (expected stop-on-fail or continue-on-fail)"
            )),
        }
    }
}

/// Executor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExecutorOptions {
    /// Size of the worker pool
    pub max_workers: usize,
    /// Dependent handling after a terminal failure
    pub failure_policy: FailurePolicy,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            max_workers: 4,
            failure_policy: FailurePolicy::StopOnFail,
        }
    }
}

/// Runs execution plans on a bounded worker pool.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    options: ExecutorOptions,
}

impl Executor {
    /// Create an executor. A `max_workers` of 0 is treated as 1.
    #[must_use]
    pub fn new(options: ExecutorOptions) -> Self {
        Self {
            options: ExecutorOptions {
                max_workers: options.max_workers.max(1),
                ..options
            },
        }
    }

    /// The settings in use.
    #[must_use]
    pub fn options(&self) -> ExecutorOptions {
        self.options
    }

    /// Run every task of `plan`.
    ///
    /// Task-level failures never surface as errors: each task's terminal
    /// status and reason are in the returned result.
    pub async fn run(&self, plan: &ExecutionPlan, cancel: CancellationToken) -> ExecutionResult {
        arbiter::Arbiter::new(plan, self.options, cancel).run().await
    }

    /// Validate `tasks`, then run them.
    ///
    /// # Errors
    ///
    /// Returns the planning error when the batch is invalid. No task runs in
    /// that case.
    pub async fn plan_and_run(
        &self,
        tasks: Vec<ExecutionTask>,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult, ValidationError> {
        let plan = Scheduler::plan(tasks)?;
        Ok(self.run(&plan, cancel).await)
    }
}

/// One attempt handed to a worker.
struct Dispatch {
    index: usize,
    action: Arc<dyn Runnable>,
    timeout: Option<Duration>,
    ctx: TaskContext,
}

/// Messages the arbiter waits on.
enum Event {
    Finished {
        index: usize,
        started: Instant,
        finished: Instant,
        result: Result<(), ActionError>,
    },
    RetryReady {
        index: usize,
    },
}

/// Worker loop: take a dispatch, run it, report, repeat until the dispatch
/// channel closes.
async fn worker(
    queue: Arc<Mutex<mpsc::Receiver<Dispatch>>>,
    events: mpsc::UnboundedSender<Event>,
) {
    loop {
        let next = queue.lock().await.recv().await;
        let Some(job) = next else {
            break;
        };

        let started = Instant::now();
        let result = run_attempt(job.action, job.ctx, job.timeout).await;
        let finished = Instant::now();

        let event = Event::Finished {
            index: job.index,
            started,
            finished,
            result,
        };
        if events.send(event).is_err() {
            break;
        }
    }
}

/// Runs one attempt on its own task so a panicking action or an expired
/// timeout cannot take the worker down with it.
async fn run_attempt(
    action: Arc<dyn Runnable>,
    ctx: TaskContext,
    timeout: Option<Duration>,
) -> Result<(), ActionError> {
    let mut handle = tokio::spawn(async move { action.execute(&ctx).await });
    let joined = match timeout {
        Some(limit) => {
            if let Ok(joined) = tokio::time::timeout(limit, &mut handle).await {
                joined
            } else {
                handle.abort();
                return Err(ActionError::TimedOut(duration_ms(limit)));
            }
        }
        None => handle.await,
    };
    joined.unwrap_or_else(|err| Err(ActionError::failed(format!("action panicked: {err}"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("stop-on-fail", FailurePolicy::StopOnFail)]
    #[case("continue-on-fail", FailurePolicy::ContinueOnFail)]
    fn failure_policy_round_trips_through_strings(
        #[case] text: &str,
        #[case] policy: FailurePolicy,
    ) {
        assert_eq!(text.parse::<FailurePolicy>().unwrap(), policy);
        assert_eq!(policy.to_string(), text);
    }

    #[test]
    fn zero_workers_is_clamped() {
        let executor = Executor::new(ExecutorOptions {
            max_workers: 0,
            ..ExecutorOptions::default()
        });
        assert_eq!(executor.options().max_workers, 1);
    }

    #[tokio::test]
    async fn panicking_action_becomes_a_failed_attempt() {
        let action: Arc<dyn Runnable> =
            Arc::new(FnAction::new("boom", |ctx: TaskContext| async move {
                assert!(ctx.attempt > 1, "boom");
                Ok(())
            }));
        let ctx = TaskContext {
            task_id: "boom".to_string(),
            attempt: 1,
            cancel: CancellationToken::new(),
        };
        let err = run_attempt(action, ctx, None).await.unwrap_err();
        assert!(matches!(err, ActionError::Failed(_)));
    }

    #[tokio::test]
    async fn slow_action_times_out() {
        let action: Arc<dyn Runnable> = Arc::new(FnAction::new("slow", |_| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }));
        let ctx = TaskContext {
            task_id: "slow".to_string(),
            attempt: 1,
            cancel: CancellationToken::new(),
        };
        let err = run_attempt(action, ctx, Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert_eq!(err, ActionError::TimedOut(20));
    }
}
