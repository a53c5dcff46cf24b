//! The scheduling decision loop.
//!
//! Every piece of mutable run state lives in [`Arbiter`] and is touched only
//! from [`Arbiter::run`]. Workers see nothing but [`Dispatch`] values and
//! answer with [`Event`]s.

use super::result::{ExecutionResult, TaskOutcome, covered, speedup};
use super::{Dispatch, Event, ExecutorOptions, FailurePolicy, TaskContext, TaskStatus, worker};
use crate::error::{ActionError, ExecutionError};
use crate::scheduler::ExecutionPlan;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Arbiter-side view of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Pending,
    Ready,
    Running,
    /// Failed with attempts left, waiting for the retry timer
    BackingOff,
    Done(TaskStatus),
}

impl Slot {
    fn status(self) -> TaskStatus {
        match self {
            Self::Pending => TaskStatus::Pending,
            Self::Ready => TaskStatus::Ready,
            Self::Running => TaskStatus::Running,
            Self::BackingOff => TaskStatus::Failed,
            Self::Done(status) => status,
        }
    }
}

pub(super) struct Arbiter<'a> {
    plan: &'a ExecutionPlan,
    options: ExecutorOptions,
    cancel: CancellationToken,
    start: Instant,

    slots: Vec<Slot>,
    attempts: Vec<u32>,
    /// Dependencies that have not reached a terminal state (or, under
    /// stop-on-fail, not succeeded)
    unresolved: Vec<usize>,
    succeeded_deps: Vec<usize>,
    busy: Vec<Duration>,
    started: Vec<Option<Duration>>,
    finished: Vec<Option<Duration>>,
    /// Every attempt as `(start, end)` offsets from `start`
    spans: Vec<(Duration, Duration)>,
    reasons: Vec<Option<ExecutionError>>,

    ready: VecDeque<usize>,
    running: usize,
    backing_off: usize,
    cancelled: bool,
}

impl<'a> Arbiter<'a> {
    pub(super) fn new(
        plan: &'a ExecutionPlan,
        options: ExecutorOptions,
        cancel: CancellationToken,
    ) -> Self {
        let n = plan.len();
        Self {
            plan,
            options,
            cancel,
            start: Instant::now(),
            slots: vec![Slot::Pending; n],
            attempts: vec![0; n],
            unresolved: (0..n).map(|i| plan.dependencies_at(i).len()).collect(),
            succeeded_deps: vec![0; n],
            busy: vec![Duration::ZERO; n],
            started: vec![None; n],
            finished: vec![None; n],
            spans: Vec::new(),
            reasons: vec![None; n],
            ready: VecDeque::new(),
            running: 0,
            backing_off: 0,
            cancelled: false,
        }
    }

    pub(super) async fn run(mut self) -> ExecutionResult {
        let workers = self.options.max_workers.min(self.plan.len()).max(1);
        let (dispatch_tx, dispatch_rx) = mpsc::channel::<Dispatch>(workers);
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();
        let queue = Arc::new(Mutex::new(dispatch_rx));

        let mut pool = JoinSet::new();
        for _ in 0..workers {
            pool.spawn(worker(Arc::clone(&queue), event_tx.clone()));
        }

        info!(
            tasks = self.plan.len(),
            workers,
            policy = %self.options.failure_policy,
            "run started"
        );

        let roots: Vec<usize> = self
            .plan
            .ordered_indices()
            .filter(|&i| self.plan.dependencies_at(i).is_empty())
            .collect();
        for index in roots {
            self.mark_ready(index);
        }

        let cancel = self.cancel.clone();
        loop {
            if !self.cancelled && cancel.is_cancelled() {
                self.cancel_waiting();
            }

            while !self.cancelled && self.running < workers {
                let Some(index) = self.ready.pop_front() else {
                    break;
                };
                let job = self.start_attempt(index);
                if dispatch_tx.send(job).await.is_err() {
                    self.running -= 1;
                    let error = ActionError::failed("worker pool shut down");
                    self.fail(index, error);
                }
            }

            let idle = self.running == 0 && self.backing_off == 0;
            if idle && (self.cancelled || self.ready.is_empty()) {
                break;
            }

            tokio::select! {
                () = cancel.cancelled(), if !self.cancelled => self.cancel_waiting(),
                event = event_rx.recv() => match event {
                    Some(event) => self.on_event(event, &event_tx),
                    None => break,
                },
            }
        }

        drop(dispatch_tx);
        while pool.join_next().await.is_some() {}

        self.into_result()
    }

    fn mark_ready(&mut self, index: usize) {
        self.slots[index] = Slot::Ready;
        self.ready.push_back(index);
    }

    fn start_attempt(&mut self, index: usize) -> Dispatch {
        let plan = self.plan;
        let task = &plan.tasks()[index];
        self.slots[index] = Slot::Running;
        self.attempts[index] += 1;
        self.running += 1;

        let attempt = self.attempts[index];
        debug!(task = %task.id, attempt, action = %task.action.describe(), "dispatching");
        Dispatch {
            index,
            action: Arc::clone(&task.action),
            timeout: task.timeout,
            ctx: TaskContext {
                task_id: task.id.clone(),
                attempt,
                cancel: self.cancel.clone(),
            },
        }
    }

    fn on_event(&mut self, event: Event, events: &mpsc::UnboundedSender<Event>) {
        match event {
            Event::RetryReady { index } => {
                // Cancellation may already have settled the task.
                if self.slots[index] == Slot::BackingOff {
                    self.backing_off -= 1;
                    self.mark_ready(index);
                }
            }
            Event::Finished {
                index,
                started,
                finished,
                result,
            } => {
                self.running -= 1;
                let from = started.saturating_duration_since(self.start);
                let to = finished.saturating_duration_since(self.start);
                self.busy[index] += to.saturating_sub(from);
                self.started[index].get_or_insert(from);
                self.finished[index] = Some(to);
                self.spans.push((from, to));

                match result {
                    Ok(()) => self.settle(index, TaskStatus::Succeeded, None),
                    Err(ActionError::Cancelled) if self.cancel.is_cancelled() => {
                        self.settle(index, TaskStatus::Cancelled, Some(ExecutionError::Cancelled));
                    }
                    Err(error) => self.retry_or_fail(index, error, events),
                }
            }
        }
    }

    fn retry_or_fail(
        &mut self,
        index: usize,
        error: ActionError,
        events: &mpsc::UnboundedSender<Event>,
    ) {
        let plan = self.plan;
        let task = &plan.tasks()[index];
        let attempts = self.attempts[index];
        if self.cancel.is_cancelled() || !task.retry.allows_retry(attempts) {
            self.fail(index, error);
            return;
        }

        let delay = task.retry.delay_after(attempts);
        debug!(
            task = %task.id,
            attempt = attempts,
            delay_ms = super::duration_ms(delay),
            error = %error,
            "attempt failed, retrying"
        );
        self.slots[index] = Slot::BackingOff;
        self.backing_off += 1;

        let events = events.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(delay) => {
                    let _ = events.send(Event::RetryReady { index });
                }
                () = cancel.cancelled() => {}
            }
        });
    }

    fn fail(&mut self, index: usize, error: ActionError) {
        let attempts = self.attempts[index];
        warn!(task = %self.plan.tasks()[index].id, attempts, error = %error, "task failed");
        self.settle(
            index,
            TaskStatus::Failed,
            Some(ExecutionError::TaskFailed {
                attempts,
                last_error: error,
            }),
        );
    }

    /// Record a terminal status and propagate it to dependents.
    fn settle(&mut self, root: usize, status: TaskStatus, reason: Option<ExecutionError>) {
        let plan = self.plan;
        let mut settled = vec![(root, status, reason)];

        while let Some((index, status, reason)) = settled.pop() {
            self.slots[index] = Slot::Done(status);
            self.reasons[index] = reason;
            debug!(task = %plan.tasks()[index].id, %status, "settled");

            for &dependent in plan.dependents_at(index) {
                if self.slots[dependent] != Slot::Pending {
                    continue;
                }
                let skip = match (status, self.options.failure_policy) {
                    // Left pending; the cancellation sweep settles it.
                    (TaskStatus::Cancelled, _) => false,
                    (TaskStatus::Succeeded, _) => {
                        self.unresolved[dependent] -= 1;
                        self.succeeded_deps[dependent] += 1;
                        if self.unresolved[dependent] == 0 {
                            self.mark_ready(dependent);
                        }
                        false
                    }
                    (_, FailurePolicy::StopOnFail) => true,
                    (_, FailurePolicy::ContinueOnFail) => {
                        self.unresolved[dependent] -= 1;
                        if self.unresolved[dependent] > 0 {
                            false
                        } else if self.succeeded_deps[dependent] > 0 {
                            self.mark_ready(dependent);
                            false
                        } else {
                            true
                        }
                    }
                };

                if skip {
                    // Claim the slot now so a second failing dependency
                    // cannot queue it twice.
                    self.slots[dependent] = Slot::Done(TaskStatus::Skipped);
                    settled.push((
                        dependent,
                        TaskStatus::Skipped,
                        Some(ExecutionError::DependencySkipped {
                            dependency: plan.tasks()[index].id.clone(),
                        }),
                    ));
                }
            }
        }
    }

    /// Cancel everything that has not started. Running attempts continue.
    fn cancel_waiting(&mut self) {
        self.cancelled = true;
        self.ready.clear();

        let mut count = 0;
        for index in 0..self.slots.len() {
            match self.slots[index] {
                Slot::Pending | Slot::Ready => {}
                Slot::BackingOff => self.backing_off -= 1,
                Slot::Running | Slot::Done(_) => continue,
            }
            self.slots[index] = Slot::Done(TaskStatus::Cancelled);
            self.reasons[index] = Some(ExecutionError::Cancelled);
            count += 1;
        }
        warn!(cancelled = count, running = self.running, "run cancelled");
    }

    fn into_result(mut self) -> ExecutionResult {
        let elapsed = self.start.elapsed();
        let wall_clock = covered(&mut self.spans);
        let total_task_time: Duration = self.busy.iter().sum();

        let tasks: Vec<TaskOutcome> = self
            .plan
            .ordered_indices()
            .map(|i| TaskOutcome {
                id: self.plan.tasks()[i].id.clone(),
                status: self.slots[i].status(),
                attempts: self.attempts[i],
                duration: self.busy[i],
                started: self.started[i],
                finished: self.finished[i],
                reason: self.reasons[i].clone(),
            })
            .collect();

        let result = ExecutionResult {
            tasks,
            wall_clock,
            total_task_time,
            speedup: speedup(total_task_time, wall_clock),
        };
        let counts = result.counts();
        info!(
            succeeded = counts.succeeded,
            failed = counts.failed,
            skipped = counts.skipped,
            cancelled = counts.cancelled,
            wall_clock_ms = super::duration_ms(wall_clock),
            elapsed_ms = super::duration_ms(elapsed),
            speedup = result.speedup,
            "run finished"
        );
        result
    }
}
