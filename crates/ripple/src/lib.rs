//! Ripple - dependency graphs, change impact and parallel task execution.
//!
//! The library is organised leaf-first:
//!
//! - [`graph::GraphStore`] owns the node/edge graph fed by external scanners
//! - [`cycles`] finds strongly connected components that form cycles
//! - [`impact::ImpactAnalyzer`] ranks the dependents of a change by severity
//! - [`scheduler::Scheduler`] validates a task batch and layers it into waves
//! - [`executor::Executor`] runs the waves on a bounded worker pool
//!
//! Nothing here is global: callers own a `GraphStore` and pass it by
//! reference to the analysis functions.
//!
//! ```
//! use ripple::domain::{Edge, EdgeKind, Node, NodeKind};
//! use ripple::graph::GraphStore;
//! use ripple::impact::{ImpactAnalyzer, Severity};
//!
//! let graph = GraphStore::new();
//! for id in ["x", "y"] {
//!     graph.add_node(Node::new(id, NodeKind::File));
//! }
//! graph.add_edge(Edge::new("y", "x", EdgeKind::Imports))?;
//!
//! let report = ImpactAnalyzer::default().analyze(&graph, &["x".into()], true)?;
//! assert_eq!(report.entries[0].severity, Severity::Critical);
//! # Ok::<(), ripple::error::Error>(())
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod cycles;
pub mod domain;
pub mod error;
pub mod executor;
pub mod graph;
pub mod history;
pub mod impact;
pub mod scheduler;

// CLI layer used by the binary
pub mod cli;
pub mod output;
