//! Domain types shared by the graph, impact and execution layers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unique identifier for a graph node (a file, task or component).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create a new node ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string representation
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// What kind of artifact a node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A source or configuration file
    File,
    /// A build or pipeline task
    Task,
    /// A larger unit such as a crate, package or service
    Component,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Task => write!(f, "task"),
            Self::Component => write!(f, "component"),
        }
    }
}

/// An artifact observed by a source scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier
    pub id: NodeId,

    /// Artifact kind
    pub kind: NodeKind,

    /// Version or content fingerprint reported by the scanner
    #[serde(default)]
    pub version: String,

    /// Free-form attributes (owner, language, path, ...)
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Node {
    /// Create a node with an empty version and no metadata.
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            version: String::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Set the version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Add a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// How one artifact depends on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeKind {
    /// Source-level import / use
    Imports,
    /// Function or method call
    Calls,
    /// Reference from configuration
    ConfigRef,
}

impl EdgeKind {
    /// All edge kinds, strongest first.
    pub const ALL: [EdgeKind; 3] = [EdgeKind::Imports, EdgeKind::Calls, EdgeKind::ConfigRef];
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Imports => write!(f, "imports"),
            Self::Calls => write!(f, "calls"),
            Self::ConfigRef => write!(f, "config-ref"),
        }
    }
}

fn default_edge_weight() -> f64 {
    1.0
}

/// Directed dependency: `from` depends on `to`.
///
/// Edges are identified by `(from, to, kind)`; the weight is an annotation
/// supplied by the scanner and does not take part in identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// The dependent artifact
    pub from: NodeId,

    /// The artifact depended upon
    pub to: NodeId,

    /// Relationship kind
    pub kind: EdgeKind,

    /// Scanner-provided strength of the relationship
    #[serde(default = "default_edge_weight")]
    pub weight: f64,
}

impl Edge {
    /// Create an edge with weight 1.0.
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>, kind: EdgeKind) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            kind,
            weight: default_edge_weight(),
        }
    }

    /// Set the weight.
    #[must_use]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.from, self.kind, self.to)
    }
}

/// A batch of observations from an external scanner.
///
/// This is the JSON shape accepted by `ripple impact`, `ripple cycles` and
/// [`GraphStore::apply_batch`](crate::graph::GraphStore::apply_batch).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphBatch {
    /// Nodes to upsert
    #[serde(default)]
    pub nodes: Vec<Node>,

    /// Edges to add after the nodes
    #[serde(default)]
    pub edges: Vec<Edge>,
}

/// A cycle: the members of one strongly connected component, sorted by id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cycle(pub Vec<String>);

impl Cycle {
    /// Member ids.
    #[must_use]
    pub fn members(&self) -> &[String] {
        &self.0
    }

    /// Whether `id` is part of the cycle.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|m| m == id)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for cycles produced by the detector.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" -> "))?;
        if let Some(first) = self.0.first() {
            write!(f, " -> {first}")?;
        }
        Ok(())
    }
}
