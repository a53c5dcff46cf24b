//! Integration tests for the DAG executor.
//!
//! Timing-based assertions use generous margins; they check ordering and
//! overlap, not absolute speed.

use ripple::error::{ActionError, ExecutionError, ValidationError};
use ripple::executor::{
    ExecutionResult, ExecutionTask, Executor, ExecutorOptions, FailurePolicy, RetryPolicy,
    TaskStatus,
};
use ripple::scheduler::Scheduler;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

mod common;
use common::{counted, diamond, failing, sleeper};

fn executor(max_workers: usize, failure_policy: FailurePolicy) -> Executor {
    Executor::new(ExecutorOptions {
        max_workers,
        failure_policy,
    })
}

async fn run(tasks: Vec<ExecutionTask>, workers: usize, policy: FailurePolicy) -> ExecutionResult {
    executor(workers, policy)
        .plan_and_run(tasks, CancellationToken::new())
        .await
        .unwrap()
}

// ============================================================================
// Failure Policies
// ============================================================================

#[tokio::test]
async fn test_stop_on_fail_skips_only_the_failed_branch() {
    let tasks = diamond(
        sleeper("A", 5),
        failing("B"),
        sleeper("C", 5),
        sleeper("D", 5),
    );

    let result = run(tasks, 4, FailurePolicy::StopOnFail).await;

    assert_eq!(result.status_of("A"), Some(TaskStatus::Succeeded));
    assert_eq!(result.status_of("B"), Some(TaskStatus::Failed));
    assert_eq!(result.status_of("C"), Some(TaskStatus::Succeeded));
    assert_eq!(result.status_of("D"), Some(TaskStatus::Skipped));
    assert_eq!(result.outcome("D").unwrap().attempts, 0);
    assert!(result.has_failures());
}

#[tokio::test]
async fn test_stop_on_fail_skips_transitively() {
    let tasks = vec![
        failing("root"),
        sleeper("child", 1).depends_on("root"),
        sleeper("grandchild", 1).depends_on("child"),
        sleeper("other", 1),
    ];

    let result = run(tasks, 2, FailurePolicy::StopOnFail).await;

    assert_eq!(result.status_of("child"), Some(TaskStatus::Skipped));
    assert_eq!(result.status_of("grandchild"), Some(TaskStatus::Skipped));
    assert_eq!(result.status_of("other"), Some(TaskStatus::Succeeded));
    assert_eq!(
        result.outcome("grandchild").unwrap().reason,
        Some(ExecutionError::DependencySkipped {
            dependency: "child".to_string()
        })
    );
}

#[tokio::test]
async fn test_continue_on_fail_runs_through_a_surviving_branch() {
    let tasks = diamond(
        sleeper("A", 1),
        failing("B"),
        sleeper("C", 1),
        sleeper("D", 1),
    );

    let result = run(tasks, 4, FailurePolicy::ContinueOnFail).await;

    assert_eq!(result.status_of("B"), Some(TaskStatus::Failed));
    assert_eq!(result.status_of("D"), Some(TaskStatus::Succeeded));
}

#[tokio::test]
async fn test_continue_on_fail_skips_without_a_succeeded_dependency() {
    let tasks = vec![
        failing("a"),
        failing("b"),
        sleeper("both", 1).depends_on("a").depends_on("b"),
        sleeper("after", 1).depends_on("both"),
    ];

    let result = run(tasks, 2, FailurePolicy::ContinueOnFail).await;

    assert_eq!(result.status_of("both"), Some(TaskStatus::Skipped));
    assert_eq!(result.status_of("after"), Some(TaskStatus::Skipped));
}

// ============================================================================
// Ordering and Parallelism
// ============================================================================

#[tokio::test]
async fn test_tasks_start_after_their_dependencies_finish() {
    let tasks = diamond(
        sleeper("A", 20),
        sleeper("B", 30),
        sleeper("C", 10),
        sleeper("D", 5),
    );
    let plan = Scheduler::plan(tasks).unwrap();

    let result = executor(4, FailurePolicy::StopOnFail)
        .run(&plan, CancellationToken::new())
        .await;
    assert!(result.all_succeeded());

    for (task, deps) in [("B", &["A"][..]), ("C", &["A"]), ("D", &["B", "C"])] {
        let started = result.outcome(task).unwrap().started.unwrap();
        for dep in deps {
            let finished = result.outcome(dep).unwrap().finished.unwrap();
            assert!(started >= finished, "{task} started before {dep} finished");
        }
    }

    let ids: Vec<&str> = result.tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, ["A", "B", "C", "D"]);
}

#[tokio::test]
async fn test_independent_tasks_overlap() {
    let tasks = (0..4).map(|i| sleeper(&format!("t{i}"), 100)).collect();

    let result = run(tasks, 4, FailurePolicy::StopOnFail).await;

    assert!(result.all_succeeded());
    assert!(result.speedup >= 1.0, "speedup was {}", result.speedup);
    assert!(result.wall_clock < result.total_task_time);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_instant_wave_speedup_is_at_least_one() {
    for _ in 0..20 {
        let tasks = (0..4)
            .map(|i| ExecutionTask::function(format!("t{i}"), |_ctx| async { Ok(()) }))
            .collect();

        let result = run(tasks, 4, FailurePolicy::StopOnFail).await;

        assert!(result.all_succeeded());
        assert!(result.speedup >= 1.0, "speedup was {}", result.speedup);
        assert!(result.wall_clock <= result.total_task_time);
    }
}

#[tokio::test]
async fn test_worker_limit_bounds_concurrency() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let tasks = (0..8)
        .map(|i| {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            ExecutionTask::function(format!("t{i}"), move |_ctx| {
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(15)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
        })
        .collect();

    let result = run(tasks, 2, FailurePolicy::StopOnFail).await;

    assert!(result.all_succeeded());
    assert!(peak.load(Ordering::SeqCst) <= 2);
}

// ============================================================================
// Retries and Timeouts
// ============================================================================

#[tokio::test]
async fn test_flaky_task_succeeds_within_retry_budget() {
    let flaky = ExecutionTask::function("flaky", |ctx| async move {
        if ctx.attempt < 3 {
            Err(ActionError::failed(format!("attempt {}", ctx.attempt)))
        } else {
            Ok(())
        }
    })
    .with_retry(RetryPolicy::fixed(3, Duration::from_millis(5)));

    let result = run(vec![flaky], 1, FailurePolicy::StopOnFail).await;

    let outcome = result.outcome("flaky").unwrap();
    assert_eq!(outcome.status, TaskStatus::Succeeded);
    assert_eq!(outcome.attempts, 3);
    assert!(outcome.reason.is_none());
}

#[tokio::test]
async fn test_exhausted_retries_report_the_last_error() {
    let task = failing("always").with_retry(RetryPolicy::exponential(
        3,
        Duration::from_millis(2),
        Duration::from_millis(10),
    ));

    let result = run(vec![task], 1, FailurePolicy::StopOnFail).await;

    let outcome = result.outcome("always").unwrap();
    assert_eq!(outcome.status, TaskStatus::Failed);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(
        outcome.reason,
        Some(ExecutionError::TaskFailed {
            attempts: 3,
            last_error: ActionError::failed("always fails"),
        })
    );
}

#[tokio::test]
async fn test_timeout_fails_the_attempt() {
    let slow = sleeper("slow", 2_000).with_timeout(Duration::from_millis(30));
    let after = sleeper("after", 1).depends_on("slow");

    let result = run(vec![slow, after], 2, FailurePolicy::StopOnFail).await;

    let outcome = result.outcome("slow").unwrap();
    assert_eq!(outcome.status, TaskStatus::Failed);
    assert!(matches!(
        outcome.reason,
        Some(ExecutionError::TaskFailed {
            last_error: ActionError::TimedOut(30),
            ..
        })
    ));
    assert_eq!(result.status_of("after"), Some(TaskStatus::Skipped));
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancel_lets_running_task_finish_and_cancels_the_rest() {
    let tasks = vec![
        sleeper("running", 150),
        sleeper("waiting", 1).depends_on("running"),
        sleeper("later", 1).depends_on("waiting"),
    ];
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(40)).await;
        trigger.cancel();
    });

    let result = executor(2, FailurePolicy::StopOnFail)
        .plan_and_run(tasks, cancel)
        .await
        .unwrap();

    assert_eq!(result.status_of("running"), Some(TaskStatus::Succeeded));
    assert_eq!(result.status_of("waiting"), Some(TaskStatus::Cancelled));
    assert_eq!(result.status_of("later"), Some(TaskStatus::Cancelled));
    assert_eq!(
        result.outcome("later").unwrap().reason,
        Some(ExecutionError::Cancelled)
    );
    assert!(!result.all_succeeded());
}

#[tokio::test]
async fn test_cancelled_before_start_runs_nothing() {
    let counter = Arc::new(AtomicUsize::new(0));
    let tasks = vec![counted("a", &counter), counted("b", &counter).depends_on("a")];
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = executor(2, FailurePolicy::StopOnFail)
        .plan_and_run(tasks, cancel)
        .await
        .unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert_eq!(result.counts().cancelled, 2);
}

#[tokio::test]
async fn test_cancel_interrupts_retry_backoff() {
    let task = failing("retrying").with_retry(RetryPolicy::fixed(5, Duration::from_secs(30)));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(40)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        executor(1, FailurePolicy::StopOnFail).plan_and_run(vec![task], cancel),
    )
    .await
    .expect("cancellation should end the run promptly")
    .unwrap();

    let outcome = result.outcome("retrying").unwrap();
    assert_eq!(outcome.status, TaskStatus::Cancelled);
    assert_eq!(outcome.attempts, 1);
}

// ============================================================================
// Invalid Batches
// ============================================================================

#[tokio::test]
async fn test_cyclic_batch_runs_nothing() {
    let counter = Arc::new(AtomicUsize::new(0));
    let tasks = vec![
        counted("A", &counter).depends_on("C"),
        counted("B", &counter).depends_on("A"),
        counted("C", &counter).depends_on("B"),
    ];

    let err = executor(4, FailurePolicy::StopOnFail)
        .plan_and_run(tasks, CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        ValidationError::CycleDetected(cycle) => assert_eq!(cycle.members(), ["A", "B", "C"]),
        other => panic!("expected a cycle, got {other}"),
    }
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_batch_succeeds_trivially() {
    let result = run(Vec::new(), 4, FailurePolicy::StopOnFail).await;
    assert!(result.tasks.is_empty());
    assert!(result.all_succeeded());
    assert!((result.speedup - 1.0).abs() < f64::EPSILON);
}
