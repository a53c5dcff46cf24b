//! CLI argument structs for all commands.
//!
//! Each command has its own argument struct with clap derive attributes
//! for parsing and validation.

use clap::Parser;
use std::path::PathBuf;

use super::types::PolicyArg;
use super::validators::validate_node_id;

/// Arguments for the `init` command
#[derive(Parser, Debug, Clone)]
pub struct InitArgs {
    /// Suppress output messages
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for commands that only read a graph file
#[derive(Parser, Debug, Clone)]
pub struct GraphArgs {
    /// Graph batch file (JSON, or YAML with a .yaml/.yml extension)
    pub graph: PathBuf,
}

/// Arguments for the `deps` command
#[derive(Parser, Debug, Clone)]
pub struct DepsArgs {
    /// Graph batch file
    pub graph: PathBuf,

    /// Node to inspect
    #[arg(value_parser = validate_node_id)]
    pub node: String,

    /// Show the nodes that depend on NODE instead of its dependencies
    #[arg(short, long)]
    pub reverse: bool,

    /// Follow edges transitively
    #[arg(short, long)]
    pub transitive: bool,
}

/// Arguments for the `impact` command
#[derive(Parser, Debug, Clone)]
pub struct ImpactArgs {
    /// Graph batch file
    pub graph: PathBuf,

    /// Changed node (repeatable, or comma-separated)
    #[arg(short, long, required = true, value_delimiter = ',', value_parser = validate_node_id)]
    pub changed: Vec<String>,

    /// Treat the change as breaking (adds the breaking bonus to every score)
    #[arg(short, long)]
    pub breaking: bool,
}

/// Arguments for the `plan` command
#[derive(Parser, Debug, Clone)]
pub struct PlanArgs {
    /// Task batch file (YAML or JSON)
    pub tasks: PathBuf,
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Task batch file (YAML or JSON)
    pub tasks: PathBuf,

    /// Worker pool size (overrides the configuration)
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: Option<u16>,

    /// Failure policy (overrides the configuration)
    #[arg(short, long, value_enum)]
    pub policy: Option<PolicyArg>,
}

/// Arguments for the `history` command
#[derive(Parser, Debug, Clone)]
pub struct HistoryArgs {
    /// History file written with --record
    pub file: PathBuf,

    /// Keep only the newest N records
    #[arg(long, value_name = "N")]
    pub prune: Option<usize>,
}
