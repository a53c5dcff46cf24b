//! Outcome of a run.

use super::task::{TaskId, TaskStatus};
use crate::error::ExecutionError;
use serde::Serialize;
use std::time::Duration;

/// Durations serialize as fractional milliseconds.
mod millis {
    use serde::Serializer;
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64() * 1000.0)
    }

    pub(super) mod option {
        use serde::Serializer;
        use std::time::Duration;

        #[allow(clippy::ref_option)]
        pub(in super::super) fn serialize<S: Serializer>(
            d: &Option<Duration>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match d {
                Some(d) => s.serialize_some(&(d.as_secs_f64() * 1000.0)),
                None => s.serialize_none(),
            }
        }
    }
}

/// Final state of one task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskOutcome {
    /// Task id
    pub id: TaskId,
    /// Terminal status
    pub status: TaskStatus,
    /// Attempts started (0 when the task never ran)
    pub attempts: u32,
    /// Sum of the durations of all attempts
    #[serde(rename = "duration_ms", with = "millis")]
    pub duration: Duration,
    /// Offset from the start of the run to the first attempt
    #[serde(rename = "started_ms", with = "millis::option")]
    pub started: Option<Duration>,
    /// Offset from the start of the run to the end of the last attempt
    #[serde(rename = "finished_ms", with = "millis::option")]
    pub finished: Option<Duration>,
    /// Why the task did not succeed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ExecutionError>,
}

/// Per-status counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    /// Succeeded tasks
    pub succeeded: usize,
    /// Terminally failed tasks
    pub failed: usize,
    /// Skipped tasks
    pub skipped: usize,
    /// Cancelled tasks
    pub cancelled: usize,
}

/// Everything the executor reports about a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    /// One outcome per task, in plan order
    pub tasks: Vec<TaskOutcome>,
    /// Time during which at least one attempt was running
    #[serde(rename = "wall_clock_ms", with = "millis")]
    pub wall_clock: Duration,
    /// Sum of every attempt's duration
    #[serde(rename = "total_task_time_ms", with = "millis")]
    pub total_task_time: Duration,
    /// `total_task_time / wall_clock`, or 1.0 for an instantaneous run
    pub speedup: f64,
}

impl ExecutionResult {
    /// Outcome of one task.
    #[must_use]
    pub fn outcome(&self, id: &str) -> Option<&TaskOutcome> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Status of one task.
    #[must_use]
    pub fn status_of(&self, id: &str) -> Option<TaskStatus> {
        self.outcome(id).map(|t| t.status)
    }

    /// Whether every task succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.tasks.iter().all(|t| t.status == TaskStatus::Succeeded)
    }

    /// Whether any task terminally failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.tasks.iter().any(|t| t.status == TaskStatus::Failed)
    }

    /// Counts per terminal status.
    #[must_use]
    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for task in &self.tasks {
            match task.status {
                TaskStatus::Succeeded => counts.succeeded += 1,
                TaskStatus::Failed => counts.failed += 1,
                TaskStatus::Skipped => counts.skipped += 1,
                TaskStatus::Cancelled => counts.cancelled += 1,
                TaskStatus::Pending | TaskStatus::Ready | TaskStatus::Running => {}
            }
        }
        counts
    }
}

/// Length of the union of `(start, end)` spans. Sorts `spans` in place.
pub(crate) fn covered(spans: &mut [(Duration, Duration)]) -> Duration {
    spans.sort_unstable();
    let mut total = Duration::ZERO;
    let mut current: Option<(Duration, Duration)> = None;
    for &(start, end) in spans.iter() {
        match current {
            Some((from, to)) if start <= to => current = Some((from, to.max(end))),
            Some((from, to)) => {
                total += to.saturating_sub(from);
                current = Some((start, end));
            }
            None => current = Some((start, end)),
        }
    }
    if let Some((from, to)) = current {
        total += to.saturating_sub(from);
    }
    total
}

/// `total / wall`, defined as 1.0 when no task time was spent or no time
/// elapsed.
pub(crate) fn speedup(total: Duration, wall: Duration) -> f64 {
    if total.is_zero() || wall.is_zero() {
        return 1.0;
    }
    total.as_secs_f64() / wall.as_secs_f64()
}
