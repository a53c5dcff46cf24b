//! CLI argument parsing and command dispatch.
//!
//! The CLI is a thin collaborator around the library: it reads graph and
//! task batch files, calls into the engine and prints the result.
//!
//! # Commands
//!
//! - `init`: Write a default `.ripple/config.yaml`
//! - `cycles`: Report dependency cycles in a graph file
//! - `deps`: Show dependencies or dependents of a node
//! - `impact`: Rank the dependents of changed nodes by severity
//! - `plan`: Validate a task batch and print its waves
//! - `run`: Execute a task batch
//! - `history`: List (or prune) recorded snapshots
//!
//! # Global Flags
//!
//! - `--json`: Output in JSON format (applies to all commands)
//! - `-v`: Increase log verbosity (repeatable); logs go to stderr
//! - `--config <file>`: Use a specific configuration file
//! - `--record <file>`: Append a snapshot of the command's result to a JSONL file
//!
//! # Example
//!
//! ```bash
//! ripple impact graph.json --changed src/auth.rs --breaking
//! ripple plan tasks.yaml
//! ripple run tasks.yaml --workers 8 --policy continue-on-fail
//! ```

mod args;
mod execute;
mod input;
mod tasks;
mod types;
mod validators;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

pub use args::{DepsArgs, GraphArgs, HistoryArgs, ImpactArgs, InitArgs, PlanArgs, RunArgs};
pub use tasks::{TaskBatchFile, TaskDefaults, TaskSpec};
pub use types::PolicyArg;

/// Ripple - dependency graphs, change impact and parallel task execution
///
/// Reads graph batches (`{"nodes": [...], "edges": [...]}`) and task batch
/// files produced by external tooling.
#[derive(Parser, Debug)]
#[command(name = "ripple")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format for programmatic use
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (default: nearest .ripple/config.yaml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Append a snapshot of the result to this JSONL file
    #[arg(long, global = true, value_name = "FILE")]
    pub record: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Write a default configuration file
    ///
    /// Creates `.ripple/config.yaml` in the current directory.
    Init(InitArgs),

    /// Report dependency cycles in a graph
    Cycles(GraphArgs),

    /// Show what a node depends on, or what depends on it
    Deps(DepsArgs),

    /// Rank the dependents of changed nodes by impact severity
    Impact(ImpactArgs),

    /// Validate a task batch and print its execution waves
    Plan(PlanArgs),

    /// Execute a task batch with bounded parallelism
    ///
    /// Ctrl-C cancels the run: nothing new starts and running commands are
    /// stopped. Exits non-zero if any task failed or was cancelled.
    Run(RunArgs),

    /// List snapshots recorded with --record
    History(HistoryArgs),
}

impl Cli {
    /// Parse CLI arguments from command line
    #[must_use]
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse CLI arguments from an iterator (for testing)
    ///
    /// # Errors
    ///
    /// Returns the clap error for invalid arguments.
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Default log filter for the `-v` count.
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Execute the CLI command
    ///
    /// # Errors
    ///
    /// Returns any error from loading inputs, the engine or writing output.
    pub async fn execute(&self, cancel: CancellationToken) -> Result<ExitCode> {
        if let Commands::Init(args) = &self.command {
            execute::execute_init(args, self.json).await?;
            return Ok(ExitCode::SUCCESS);
        }

        let context = execute::Context::load(self).await?;
        match &self.command {
            Commands::Init(_) => Ok(ExitCode::SUCCESS),
            Commands::Cycles(args) => execute::execute_cycles(&context, args).await,
            Commands::Deps(args) => execute::execute_deps(&context, args).await,
            Commands::Impact(args) => execute::execute_impact(&context, args).await,
            Commands::Plan(args) => execute::execute_plan(&context, args).await,
            Commands::Run(args) => execute::execute_run(&context, args, cancel).await,
            Commands::History(args) => execute::execute_history(&context, args).await,
        }
    }
}
