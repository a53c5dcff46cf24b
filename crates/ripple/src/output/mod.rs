//! Output formatting for CLI commands.
//!
//! Every command prints either human-readable text or, with `--json`, the
//! serialized document. Text renderers take a `Write` so they can be tested
//! against a buffer.

pub mod color;

use crate::domain::{Cycle, NodeId};
use crate::executor::{ExecutionResult, TaskStatus};
use crate::history::History;
use crate::impact::ImpactReport;
use crate::scheduler::PlanSummary;
use serde::Serialize;
use std::collections::BTreeSet;
use std::env;
use std::io::{self, Write};

pub use color::{error, info, success, warning};

use color::{bold, colorize_severity, colorize_status, dimmed};

// ============================================================================
// Output Configuration
// ============================================================================

/// Configuration for output formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    /// Whether to use colors in output.
    pub use_colors: bool,
}

impl OutputConfig {
    /// Read color settings from the environment.
    ///
    /// Colors are disabled when `NO_COLOR` is set or `RIPPLE_COLOR` is `0`
    /// or `false`.
    #[must_use]
    pub fn from_env() -> Self {
        // Respect NO_COLOR standard (https://no-color.org/)
        let use_colors = env::var("NO_COLOR").is_err()
            && env::var("RIPPLE_COLOR")
                .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true);
        Self { use_colors }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { use_colors: true }
    }
}

/// Output format mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text format
    Text,
    /// JSON format for programmatic use
    Json,
}

/// Pretty-print any serializable document followed by a newline.
///
/// # Errors
///
/// Fails if serialization or the write fails.
pub fn write_json<W: Write, T: Serialize + ?Sized>(w: &mut W, value: &T) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *w, value)?;
    writeln!(w)
}

// ============================================================================
// Text Renderers
// ============================================================================

/// Cycle list.
///
/// # Errors
///
/// Fails if the write fails.
pub fn write_cycles<W: Write>(w: &mut W, cycles: &[Cycle], config: &OutputConfig) -> io::Result<()> {
    if cycles.is_empty() {
        return writeln!(w, "{}", success("No cycles found", config));
    }
    writeln!(
        w,
        "{}",
        error(&format!("Found {} cycle(s):", cycles.len()), config)
    )?;
    for cycle in cycles {
        writeln!(w, "  {cycle}")?;
    }
    Ok(())
}

/// A titled set of node ids.
///
/// # Errors
///
/// Fails if the write fails.
pub fn write_node_set<W: Write>(
    w: &mut W,
    title: &str,
    nodes: &BTreeSet<NodeId>,
    config: &OutputConfig,
) -> io::Result<()> {
    writeln!(w, "{} ({})", bold(title, config), nodes.len())?;
    for node in nodes {
        writeln!(w, "  {}", info(node.as_str(), config))?;
    }
    Ok(())
}

/// Impact report table.
///
/// # Errors
///
/// Fails if the write fails.
pub fn write_impact<W: Write>(
    w: &mut W,
    report: &ImpactReport,
    config: &OutputConfig,
) -> io::Result<()> {
    let changed: Vec<&str> = report.changed.iter().map(NodeId::as_str).collect();
    writeln!(
        w,
        "{} {}{}",
        bold("Impact of", config),
        changed.join(", "),
        if report.breaking {
            warning(" (breaking)", config)
        } else {
            String::new()
        }
    )?;

    if report.entries.is_empty() && report.cyclic_impact.is_empty() {
        return writeln!(w, "  {}", dimmed("no dependents affected", config));
    }

    for entry in &report.entries {
        writeln!(
            w,
            "  {} {:>5.2}  {}  {}",
            colorize_severity(entry.severity, config),
            entry.score,
            dimmed(&format!("d={} via {}", entry.distance, entry.via), config),
            info(entry.node.as_str(), config),
        )?;
    }

    if !report.cyclic_impact.is_empty() {
        writeln!(w)?;
        writeln!(w, "{}", error("Cyclic impact (not scored):", config))?;
        for cycle in &report.cycles {
            writeln!(w, "  {cycle}")?;
        }
    }

    let summary = report.summary();
    writeln!(w)?;
    writeln!(
        w,
        "{} critical {}, high {}, medium {}, low {}, cyclic {}",
        dimmed("Summary:", config),
        summary.critical,
        summary.high,
        summary.medium,
        summary.low,
        summary.cyclic
    )
}

/// Waves of an execution plan.
///
/// # Errors
///
/// Fails if the write fails.
pub fn write_plan<W: Write>(w: &mut W, plan: &PlanSummary, config: &OutputConfig) -> io::Result<()> {
    writeln!(
        w,
        "{} {} task(s) in {} wave(s), up to {} in parallel",
        bold("Plan:", config),
        plan.tasks,
        plan.waves.len(),
        plan.max_parallelism
    )?;
    for (number, wave) in plan.waves.iter().enumerate() {
        let ids: Vec<String> = wave.iter().map(|id| info(id, config)).collect();
        writeln!(
            w,
            "  {} {}",
            dimmed(&format!("wave {}:", number + 1), config),
            ids.join(", ")
        )?;
    }
    Ok(())
}

/// Per-task outcomes and run metrics.
///
/// # Errors
///
/// Fails if the write fails.
pub fn write_result<W: Write>(
    w: &mut W,
    result: &ExecutionResult,
    config: &OutputConfig,
) -> io::Result<()> {
    for task in &result.tasks {
        write!(
            w,
            "  {} {}  {}",
            colorize_status(task.status, config),
            info(&task.id, config),
            dimmed(
                &format!(
                    "{} attempt(s), {:.1} ms",
                    task.attempts,
                    task.duration.as_secs_f64() * 1000.0
                ),
                config
            ),
        )?;
        if let Some(reason) = &task.reason {
            write!(w, "  {}", dimmed(&reason.to_string(), config))?;
        }
        writeln!(w)?;
    }

    let counts = result.counts();
    let headline = format!(
        "{} succeeded, {} failed, {} skipped, {} cancelled",
        counts.succeeded, counts.failed, counts.skipped, counts.cancelled
    );
    writeln!(w)?;
    if result.has_failures() {
        writeln!(w, "{}", error(&headline, config))?;
    } else if result.all_succeeded() {
        writeln!(w, "{}", success(&headline, config))?;
    } else {
        writeln!(w, "{}", warning(&headline, config))?;
    }
    writeln!(
        w,
        "{} wall clock {:.1} ms, task time {:.1} ms, speedup {:.2}x",
        dimmed("Metrics:", config),
        result.wall_clock.as_secs_f64() * 1000.0,
        result.total_task_time.as_secs_f64() * 1000.0,
        result.speedup
    )
}

/// Recorded snapshot list.
///
/// # Errors
///
/// Fails if the write fails.
pub fn write_history<W: Write>(w: &mut W, history: &History, config: &OutputConfig) -> io::Result<()> {
    if history.records.is_empty() {
        writeln!(w, "{}", dimmed("No records", config))?;
    }
    for record in &history.records {
        let fingerprint = record
            .fingerprint
            .as_deref()
            .map(|f| format!("  graph {}", f.chars().take(12).collect::<String>()))
            .unwrap_or_default();
        writeln!(
            w,
            "  {}  {:<9}{}",
            dimmed(&record.recorded_at.to_rfc3339(), config),
            record.kind.to_string(),
            fingerprint
        )?;
    }
    for skipped in &history.warnings {
        writeln!(w, "  {}", warning(&skipped.to_string(), config))?;
    }
    Ok(())
}

/// Whether a status should make the process exit non-zero.
#[must_use]
pub fn is_unsuccessful(status: TaskStatus) -> bool {
    matches!(status, TaskStatus::Failed | TaskStatus::Cancelled)
}
