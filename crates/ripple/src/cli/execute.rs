//! Command execution logic.
//!
//! This module contains the implementation of all CLI commands.

use anyhow::Result;
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::Cli;
use super::args::{DepsArgs, GraphArgs, HistoryArgs, ImpactArgs, InitArgs, PlanArgs, RunArgs};
use super::input::load_graph;
use super::tasks::TaskBatchFile;
use crate::config::{self, RippleConfig, default_config_path};
use crate::cycles::find_cycles;
use crate::domain::NodeId;
use crate::executor::{ExecutionTask, Executor};
use crate::history::{self, SnapshotKind, SnapshotRecord};
use crate::impact::ImpactAnalyzer;
use crate::output::{self, OutputConfig, OutputMode};
use crate::scheduler::Scheduler;

/// Settings shared by every command except `init`.
#[derive(Debug)]
pub struct Context {
    output_mode: OutputMode,
    output: OutputConfig,
    config: RippleConfig,
    record: Option<PathBuf>,
}

impl Context {
    /// Resolve output settings and load the configuration.
    ///
    /// An explicit `--config` file must exist; otherwise the nearest
    /// `.ripple/config.yaml` is used when present.
    pub async fn load(cli: &Cli) -> Result<Self> {
        let config = match &cli.config {
            Some(path) => RippleConfig::load(path).await?,
            None => {
                let current_dir = std::env::current_dir()?;
                RippleConfig::load_or_default(&default_config_path(&current_dir)).await?
            }
        };

        Ok(Self {
            output_mode: if cli.json {
                OutputMode::Json
            } else {
                OutputMode::Text
            },
            output: OutputConfig::from_env(),
            config,
            record: cli.record.clone(),
        })
    }

    /// Append a snapshot when `--record` was given.
    async fn record<T: Serialize>(
        &self,
        kind: SnapshotKind,
        payload: &T,
        fingerprint: Option<String>,
    ) -> Result<()> {
        let Some(path) = &self.record else {
            return Ok(());
        };
        let mut record = SnapshotRecord::new(kind, payload)?;
        if let Some(fingerprint) = fingerprint {
            record = record.with_fingerprint(fingerprint);
        }
        history::record(path, &record).await?;
        Ok(())
    }
}

/// Directory that relative paths inside a batch file are resolved against.
fn batch_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new(""))
}

async fn load_tasks(context: &Context, path: &Path) -> Result<Vec<ExecutionTask>> {
    let batch = TaskBatchFile::load(path).await?;
    Ok(batch.into_tasks(batch_dir(path), context.config.executor.retry))
}

/// Execute the init command
pub async fn execute_init(args: &InitArgs, json: bool) -> Result<()> {
    let current_dir = std::env::current_dir()?;

    if !args.quiet && !json {
        println!("Initializing ripple in {}...", current_dir.display());
    }

    let result = config::init(&current_dir).await?;

    if json {
        output::write_json(
            &mut io::stdout().lock(),
            &serde_json::json!({
                "ripple_dir": result.ripple_dir,
                "config_file": result.config_file,
            }),
        )?;
    } else if !args.quiet {
        println!("Initialized ripple in {}", result.ripple_dir.display());
        println!("  Config: {}", result.config_file.display());
    }

    Ok(())
}

/// Execute the cycles command. Exits with failure when a cycle exists.
pub async fn execute_cycles(context: &Context, args: &GraphArgs) -> Result<ExitCode> {
    let graph = load_graph(&args.graph).await?;
    let cycles = find_cycles(&graph);
    let snapshot = graph.snapshot();

    context
        .record(
            SnapshotKind::Graph,
            &serde_json::json!({
                "nodes": snapshot.nodes.len(),
                "edges": snapshot.edges.len(),
                "cycles": &cycles,
            }),
            Some(snapshot.fingerprint()),
        )
        .await?;

    let mut stdout = io::stdout().lock();
    match context.output_mode {
        OutputMode::Json => {
            output::write_json(&mut stdout, &serde_json::json!({ "cycles": &cycles }))?;
        }
        OutputMode::Text => output::write_cycles(&mut stdout, &cycles, &context.output)?,
    }
    stdout.flush()?;

    Ok(if cycles.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Execute the deps command
pub async fn execute_deps(context: &Context, args: &DepsArgs) -> Result<ExitCode> {
    let graph = load_graph(&args.graph).await?;
    let node = NodeId::new(args.node.as_str());
    let (direction, nodes) = if args.reverse {
        ("dependents", graph.dependents(&node, args.transitive)?)
    } else {
        ("dependencies", graph.dependencies(&node, args.transitive)?)
    };

    let mut stdout = io::stdout().lock();
    match context.output_mode {
        OutputMode::Json => output::write_json(
            &mut stdout,
            &serde_json::json!({
                "node": node,
                "direction": direction,
                "transitive": args.transitive,
                "nodes": nodes,
            }),
        )?,
        OutputMode::Text => {
            let title = format!(
                "{}{} of {node}",
                if args.transitive { "Transitive " } else { "" },
                direction
            );
            output::write_node_set(&mut stdout, &title, &nodes, &context.output)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Execute the impact command
pub async fn execute_impact(context: &Context, args: &ImpactArgs) -> Result<ExitCode> {
    let graph = load_graph(&args.graph).await?;
    let changed: Vec<NodeId> = args.changed.iter().map(NodeId::new).collect();

    let analyzer = ImpactAnalyzer::new(context.config.impact);
    let report = analyzer.analyze(&graph, &changed, args.breaking)?;

    context
        .record(
            SnapshotKind::Impact,
            &report,
            Some(graph.snapshot().fingerprint()),
        )
        .await?;

    let mut stdout = io::stdout().lock();
    match context.output_mode {
        OutputMode::Json => output::write_json(&mut stdout, &report)?,
        OutputMode::Text => output::write_impact(&mut stdout, &report, &context.output)?,
    }

    Ok(ExitCode::SUCCESS)
}

/// Execute the plan command
pub async fn execute_plan(context: &Context, args: &PlanArgs) -> Result<ExitCode> {
    let tasks = load_tasks(context, &args.tasks).await?;
    let plan = Scheduler::plan(tasks)?;
    let summary = plan.summary();

    context.record(SnapshotKind::Plan, &summary, None).await?;

    let mut stdout = io::stdout().lock();
    match context.output_mode {
        OutputMode::Json => output::write_json(&mut stdout, &summary)?,
        OutputMode::Text => output::write_plan(&mut stdout, &summary, &context.output)?,
    }

    Ok(ExitCode::SUCCESS)
}

/// Execute the run command. Exits with failure when any task failed or was
/// cancelled.
pub async fn execute_run(
    context: &Context,
    args: &RunArgs,
    cancel: CancellationToken,
) -> Result<ExitCode> {
    let tasks = load_tasks(context, &args.tasks).await?;

    let mut options = context.config.executor.options();
    if let Some(workers) = args.workers {
        options.max_workers = usize::from(workers);
    }
    if let Some(policy) = args.policy {
        options.failure_policy = policy.into();
    }

    info!(
        tasks = tasks.len(),
        workers = options.max_workers,
        policy = %options.failure_policy,
        "starting run"
    );
    let result = Executor::new(options).plan_and_run(tasks, cancel).await?;

    context.record(SnapshotKind::Execution, &result, None).await?;

    let mut stdout = io::stdout().lock();
    match context.output_mode {
        OutputMode::Json => output::write_json(&mut stdout, &result)?,
        OutputMode::Text => output::write_result(&mut stdout, &result, &context.output)?,
    }

    let unsuccessful = result
        .tasks
        .iter()
        .any(|task| output::is_unsuccessful(task.status));
    Ok(if unsuccessful {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Execute the history command
pub async fn execute_history(context: &Context, args: &HistoryArgs) -> Result<ExitCode> {
    if let Some(keep) = args.prune {
        let removed = history::prune(&args.file, keep).await?;
        if context.output_mode == OutputMode::Text {
            println!(
                "{}",
                output::info(&format!("Pruned {removed} record(s)"), &context.output)
            );
        }
    }

    let history = history::load(&args.file).await?;

    let mut stdout = io::stdout().lock();
    match context.output_mode {
        OutputMode::Json => {
            let warnings: Vec<String> = history.warnings.iter().map(ToString::to_string).collect();
            output::write_json(
                &mut stdout,
                &serde_json::json!({
                    "records": history.records,
                    "warnings": warnings,
                }),
            )?;
        }
        OutputMode::Text => output::write_history(&mut stdout, &history, &context.output)?,
    }

    Ok(ExitCode::SUCCESS)
}
