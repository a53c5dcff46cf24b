//! Change impact analysis.
//!
//! Given a set of changed nodes, [`ImpactAnalyzer::analyze`] walks the
//! reverse adjacency (who depends on what changed) breadth-first and scores
//! every reached node:
//!
//! ```text
//! score = weight(kind of the edge that reached it) * decay^distance
//!       + (breaking ? breaking_bonus : 0)
//! ```
//!
//! Scores map to a [`Severity`] through fixed thresholds. When a node can be
//! reached several ways (different paths, or several changed nodes) the
//! highest score wins; scores are never averaged.
//!
//! Distance is not well defined inside a cycle, so members of a cycle that
//! contains a changed node are listed in [`ImpactReport::cyclic_impact`]
//! instead of being scored.

use crate::cycles::strongly_connected_cycles;
use crate::domain::{Cycle, EdgeKind, NodeId};
use crate::error::GraphError;
use crate::graph::{GraphInner, GraphStore};
use petgraph::Direction;
use petgraph::stable_graph::NodeIndex;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use tracing::{debug, info};

/// Discretized impact ranking, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Score below the medium threshold
    Low,
    /// Score at or above the medium threshold
    Medium,
    /// Score at or above the high threshold
    High,
    /// Score at or above the critical threshold
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Base weight of each edge kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EdgeWeights {
    /// Weight of [`EdgeKind::Imports`]
    pub imports: f64,
    /// Weight of [`EdgeKind::Calls`]
    pub calls: f64,
    /// Weight of [`EdgeKind::ConfigRef`]
    pub config_ref: f64,
}

impl EdgeWeights {
    /// Weight for an edge kind.
    #[must_use]
    pub fn weight(&self, kind: EdgeKind) -> f64 {
        match kind {
            EdgeKind::Imports => self.imports,
            EdgeKind::Calls => self.calls,
            EdgeKind::ConfigRef => self.config_ref,
        }
    }
}

impl Default for EdgeWeights {
    fn default() -> Self {
        Self {
            imports: 1.0,
            calls: 0.7,
            config_ref: 0.4,
        }
    }
}

/// Lower bounds of each severity band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityThresholds {
    /// Scores at or above this are critical
    pub critical: f64,
    /// Scores at or above this are high
    pub high: f64,
    /// Scores at or above this are medium
    pub medium: f64,
}

impl SeverityThresholds {
    /// Map a score to its severity band.
    #[must_use]
    pub fn classify(&self, score: f64) -> Severity {
        if score >= self.critical {
            Severity::Critical
        } else if score >= self.high {
            Severity::High
        } else if score >= self.medium {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            critical: 0.8,
            high: 0.6,
            medium: 0.3,
        }
    }
}

/// Scoring parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ImpactConfig {
    /// Per-hop discount, strictly between 0 and 1
    pub decay: f64,
    /// Added to every score when the change is breaking
    pub breaking_bonus: f64,
    /// Base weight per edge kind
    pub weights: EdgeWeights,
    /// Severity bands
    pub thresholds: SeverityThresholds,
}

impl Default for ImpactConfig {
    fn default() -> Self {
        Self {
            decay: 0.6,
            breaking_bonus: 0.3,
            weights: EdgeWeights::default(),
            thresholds: SeverityThresholds::default(),
        }
    }
}

impl ImpactConfig {
    /// Check that the parameters make sense.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid parameter.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.decay > 0.0 && self.decay < 1.0) {
            return Err(format!("decay must be in (0, 1), got {}", self.decay));
        }
        if self.breaking_bonus < 0.0 {
            return Err(format!(
                "breaking-bonus must not be negative, got {}",
                self.breaking_bonus
            ));
        }
        for kind in EdgeKind::ALL {
            let weight = self.weights.weight(kind);
            if weight.is_nan() || weight < 0.0 {
                return Err(format!("weight for {kind} must not be negative, got {weight}"));
            }
        }
        let t = self.thresholds;
        if !(t.critical >= t.high && t.high >= t.medium) {
            return Err(format!(
                "thresholds must satisfy critical >= high >= medium, got {} / {} / {}",
                t.critical, t.high, t.medium
            ));
        }
        Ok(())
    }

    /// Score of a node reached over `kind` at `distance` hops.
    #[must_use]
    pub fn score(&self, kind: EdgeKind, distance: u32, breaking: bool) -> f64 {
        let hops = i32::try_from(distance).unwrap_or(i32::MAX);
        let bonus = if breaking { self.breaking_bonus } else { 0.0 };
        self.weights.weight(kind) * self.decay.powi(hops) + bonus
    }
}

/// One scored dependent of a change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactEntry {
    /// The affected node
    pub node: NodeId,
    /// Shortest hop count from the changed node that produced the score
    pub distance: u32,
    /// Severity band of `score`
    pub severity: Severity,
    /// Continuous impact score
    pub score: f64,
    /// Kind of the edge through which the node was reached
    pub via: EdgeKind,
}

/// Number of entries per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImpactSummary {
    /// Critical entries
    pub critical: usize,
    /// High entries
    pub high: usize,
    /// Medium entries
    pub medium: usize,
    /// Low entries
    pub low: usize,
    /// Nodes flagged as cyclic impact
    pub cyclic: usize,
}

/// Result of an impact query. Never persisted by the library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    /// The changed nodes, as given
    pub changed: Vec<NodeId>,
    /// Whether the change was marked breaking
    pub breaking: bool,
    /// Scored dependents, highest score first
    pub entries: Vec<ImpactEntry>,
    /// Cycles that contain at least one changed node
    pub cycles: Vec<Cycle>,
    /// Other members of those cycles, flagged instead of scored
    pub cyclic_impact: Vec<NodeId>,
}

impl ImpactReport {
    /// Entry for a node, if it was scored.
    #[must_use]
    pub fn entry(&self, node: &NodeId) -> Option<&ImpactEntry> {
        self.entries.iter().find(|e| &e.node == node)
    }

    /// Entries of one severity.
    pub fn entries_with(&self, severity: Severity) -> impl Iterator<Item = &ImpactEntry> {
        self.entries.iter().filter(move |e| e.severity == severity)
    }

    /// Counts per severity.
    #[must_use]
    pub fn summary(&self) -> ImpactSummary {
        let mut summary = ImpactSummary {
            cyclic: self.cyclic_impact.len(),
            ..ImpactSummary::default()
        };
        for entry in &self.entries {
            match entry.severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
            }
        }
        summary
    }
}

/// How a node was first reached from one changed node.
#[derive(Debug, Clone, Copy)]
struct Hop {
    distance: u32,
    kind: EdgeKind,
}

/// Scores dependents of changed nodes.
#[derive(Debug, Clone, Default)]
pub struct ImpactAnalyzer {
    config: ImpactConfig,
}

impl ImpactAnalyzer {
    /// Create an analyzer with the given scoring parameters.
    #[must_use]
    pub fn new(config: ImpactConfig) -> Self {
        Self { config }
    }

    /// The scoring parameters in use.
    #[must_use]
    pub fn config(&self) -> &ImpactConfig {
        &self.config
    }

    /// Analyze the impact of changing `changed`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NodeNotFound`] if any changed node is missing;
    /// nothing is computed in that case.
    pub fn analyze(
        &self,
        graph: &GraphStore,
        changed: &[NodeId],
        breaking: bool,
    ) -> Result<ImpactReport, GraphError> {
        let inner = graph.read();
        let starts = changed
            .iter()
            .map(|id| inner.index_of(id))
            .collect::<Result<Vec<_>, _>>()?;
        let changed_set: HashSet<NodeIndex> = starts.iter().copied().collect();

        let cycles: Vec<Cycle> =
            strongly_connected_cycles(&inner.graph, |ix| inner.graph[ix].id.to_string())
                .into_iter()
                .filter(|cycle| changed.iter().any(|id| cycle.contains(id.as_str())))
                .collect();
        let cyclic: BTreeSet<NodeId> = cycles
            .iter()
            .flat_map(|cycle| cycle.members().iter().map(|m| NodeId::new(m.as_str())))
            .filter(|id| !changed.contains(id))
            .collect();

        let mut best: HashMap<NodeIndex, ImpactEntry> = HashMap::new();
        for &start in &starts {
            for (index, hop) in self.first_hops(&inner, start) {
                if changed_set.contains(&index) {
                    continue;
                }
                let node = &inner.graph[index].id;
                if cyclic.contains(node) {
                    continue;
                }

                let score = self.config.score(hop.kind, hop.distance, breaking);
                let candidate = ImpactEntry {
                    node: node.clone(),
                    distance: hop.distance,
                    severity: self.config.thresholds.classify(score),
                    score,
                    via: hop.kind,
                };
                match best.entry(index) {
                    Entry::Occupied(mut slot) => {
                        if outranks(&candidate, slot.get()) {
                            slot.insert(candidate);
                        }
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(candidate);
                    }
                }
            }
        }

        let mut entries: Vec<ImpactEntry> = best.into_values().collect();
        entries.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.distance.cmp(&b.distance))
                .then_with(|| a.node.cmp(&b.node))
        });

        let report = ImpactReport {
            changed: changed.to_vec(),
            breaking,
            entries,
            cycles,
            cyclic_impact: cyclic.into_iter().collect(),
        };
        let summary = report.summary();
        info!(
            changed = changed.len(),
            critical = summary.critical,
            high = summary.high,
            medium = summary.medium,
            low = summary.low,
            cyclic = summary.cyclic,
            "impact analysis complete"
        );
        Ok(report)
    }

    /// BFS over dependents of `start`, recording each node's shortest
    /// distance and the heaviest edge kind that reaches it at that distance.
    fn first_hops(&self, inner: &GraphInner, start: NodeIndex) -> HashMap<NodeIndex, Hop> {
        let weights = &self.config.weights;
        let mut hops: HashMap<NodeIndex, Hop> = HashMap::new();
        let mut frontier = vec![start];
        let mut distance = 0;

        while !frontier.is_empty() {
            distance += 1;
            let mut next = Vec::new();
            for &node in &frontier {
                for edge in inner.graph.edges_directed(node, Direction::Incoming) {
                    let dependent = edge.source();
                    if dependent == start {
                        continue;
                    }
                    let kind = edge.weight().kind;
                    match hops.get_mut(&dependent) {
                        None => {
                            hops.insert(dependent, Hop { distance, kind });
                            next.push(dependent);
                        }
                        Some(hop)
                            if hop.distance == distance
                                && weights.weight(kind) > weights.weight(hop.kind) =>
                        {
                            hop.kind = kind;
                        }
                        Some(_) => {}
                    }
                }
            }
            frontier = next;
        }

        debug!(
            start = %inner.graph[start].id,
            reached = hops.len(),
            max_distance = distance.saturating_sub(1),
            "dependents traversed"
        );
        hops
    }
}

/// Worst case wins: higher score, then shorter distance.
fn outranks(candidate: &ImpactEntry, current: &ImpactEntry) -> bool {
    match candidate.score.total_cmp(&current.score) {
        Ordering::Greater => true,
        Ordering::Equal => candidate.distance < current.distance,
        Ordering::Less => false,
    }
}
