//! Task batch validation and wave layering.
//!
//! [`Scheduler::plan`] turns a batch of [`ExecutionTask`]s into an
//! [`ExecutionPlan`]: a sequence of waves, each a set of tasks with no
//! dependency among them. Planning is all-or-nothing. A batch with a cycle,
//! a duplicate id or a dangling dependency produces a [`ValidationError`]
//! and no plan, so the executor never sees a partial batch.

use crate::cycles::strongly_connected_cycles;
use crate::error::ValidationError;
use crate::executor::{ExecutionTask, TaskId};
use petgraph::graph::DiGraph;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info};

/// Validated, layered task batch.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    tasks: Vec<ExecutionTask>,
    index: HashMap<TaskId, usize>,
    /// `dependencies[i]` are the tasks `i` waits for
    dependencies: Vec<Vec<usize>>,
    /// `dependents[i]` are the tasks waiting for `i`
    dependents: Vec<Vec<usize>>,
    waves: Vec<Vec<usize>>,
}

/// Serializable view of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    /// Number of tasks
    pub tasks: usize,
    /// Task ids per wave
    pub waves: Vec<Vec<TaskId>>,
    /// Size of the widest wave
    pub max_parallelism: usize,
}

impl ExecutionPlan {
    /// Task ids grouped by wave. Ids within a wave are sorted for display;
    /// the executor may run them in any order.
    #[must_use]
    pub fn waves(&self) -> Vec<Vec<&str>> {
        self.waves
            .iter()
            .map(|wave| wave.iter().map(|&i| self.tasks[i].id.as_str()).collect())
            .collect()
    }

    /// Number of tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the plan has no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Look up a task by id.
    #[must_use]
    pub fn task(&self, id: &str) -> Option<&ExecutionTask> {
        self.index.get(id).map(|&i| &self.tasks[i])
    }

    /// Ids of the tasks that directly depend on `id`.
    #[must_use]
    pub fn dependents_of(&self, id: &str) -> Vec<&str> {
        self.index
            .get(id)
            .map(|&i| {
                self.dependents[i]
                    .iter()
                    .map(|&d| self.tasks[d].id.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Serializable summary.
    #[must_use]
    pub fn summary(&self) -> PlanSummary {
        let waves: Vec<Vec<TaskId>> = self
            .waves()
            .into_iter()
            .map(|wave| wave.into_iter().map(str::to_string).collect())
            .collect();
        PlanSummary {
            tasks: self.tasks.len(),
            max_parallelism: waves.iter().map(Vec::len).max().unwrap_or(0),
            waves,
        }
    }

    pub(crate) fn tasks(&self) -> &[ExecutionTask] {
        &self.tasks
    }

    pub(crate) fn dependencies_at(&self, index: usize) -> &[usize] {
        &self.dependencies[index]
    }

    pub(crate) fn dependents_at(&self, index: usize) -> &[usize] {
        &self.dependents[index]
    }

    /// Task indices in plan order: wave by wave.
    pub(crate) fn ordered_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.waves.iter().flatten().copied()
    }
}

/// Builds execution plans.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scheduler;

impl Scheduler {
    /// Validate a batch and layer it into waves.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::DuplicateTask`] if two tasks share an id
    /// - [`ValidationError::UnknownDependency`] if a dependency is not in the batch
    /// - [`ValidationError::CycleDetected`] if the dependencies form a cycle
    pub fn plan(tasks: Vec<ExecutionTask>) -> Result<ExecutionPlan, ValidationError> {
        let mut index = HashMap::with_capacity(tasks.len());
        for (i, task) in tasks.iter().enumerate() {
            if index.insert(task.id.clone(), i).is_some() {
                return Err(ValidationError::DuplicateTask(task.id.clone()));
            }
        }

        let mut dependencies = vec![Vec::new(); tasks.len()];
        let mut dependents = vec![Vec::new(); tasks.len()];
        for (i, task) in tasks.iter().enumerate() {
            for dependency in &task.dependencies {
                let Some(&d) = index.get(dependency) else {
                    return Err(ValidationError::UnknownDependency {
                        task: task.id.clone(),
                        dependency: dependency.clone(),
                    });
                };
                dependencies[i].push(d);
                dependents[d].push(i);
            }
        }

        // Edges run dependency -> dependent, the direction work flows.
        let mut graph = DiGraph::<usize, ()>::with_capacity(tasks.len(), tasks.len());
        let nodes: Vec<_> = (0..tasks.len()).map(|i| graph.add_node(i)).collect();
        for (i, deps) in dependencies.iter().enumerate() {
            for &d in deps {
                graph.add_edge(nodes[d], nodes[i], ());
            }
        }
        let cycles = strongly_connected_cycles(&graph, |ix| tasks[graph[ix]].id.clone());
        if let Some(cycle) = cycles.into_iter().next() {
            debug!(cycle = %cycle, "task batch rejected");
            return Err(ValidationError::CycleDetected(cycle));
        }

        let waves = kahn_waves(&tasks, &dependencies, &dependents);
        info!(tasks = tasks.len(), waves = waves.len(), "execution plan built");

        Ok(ExecutionPlan {
            tasks,
            index,
            dependencies,
            dependents,
            waves,
        })
    }
}

/// Kahn's algorithm, extracting every zero in-degree task at once.
fn kahn_waves(
    tasks: &[ExecutionTask],
    dependencies: &[Vec<usize>],
    dependents: &[Vec<usize>],
) -> Vec<Vec<usize>> {
    let mut in_degree: Vec<usize> = dependencies.iter().map(Vec::len).collect();
    let mut current: Vec<usize> = (0..tasks.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut waves = Vec::new();

    while !current.is_empty() {
        current.sort_by(|&a, &b| tasks[a].id.cmp(&tasks[b].id));
        let mut next = Vec::new();
        for &task in &current {
            for &dependent in &dependents[task] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    next.push(dependent);
                }
            }
        }
        waves.push(current);
        current = next;
    }

    waves
}
