//! Task dependency graph built on `petgraph`.
//!
//! Validates workflow structure, measures its shape for adaptive mode
//! selection, and derives static execution waves.

use std::collections::{BTreeSet, HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::{Direction, algo};
use serde::{Deserialize, Serialize};
use skillflow_core::WorkflowMode;

use super::{DependencyEdge, SkillTask};
use crate::{CoordinationError, Result};

/// Chains at least this long run as a pipeline.
const PIPELINE_CHAIN_LENGTH: usize = 5;
/// Roots with at least this many direct dependents run in parallel.
const PARALLEL_FAN_OUT: usize = 3;

/// Structural measurements used to pick a scheduling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphShape {
    /// Tasks on the longest dependency chain starting at a root
    pub longest_chain: usize,
    /// Largest number of direct dependents of any root
    pub max_root_fan_out: usize,
}

impl GraphShape {
    /// Scheduling mode suggested by this shape.
    pub fn mode(self) -> WorkflowMode {
        if self.longest_chain >= PIPELINE_CHAIN_LENGTH {
            WorkflowMode::Pipeline
        } else if self.max_root_fan_out >= PARALLEL_FAN_OUT {
            WorkflowMode::Parallel
        } else {
            WorkflowMode::Sequential
        }
    }
}

/// Immutable task dependency graph; edges point from a dependency to its dependent
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Builds and validates a graph over `task_ids` in declaration order.
    ///
    /// # Errors
    /// Returns `EmptyWorkflow` for no tasks, `DuplicateTask` for a repeated id,
    /// `UnknownDependency` when an edge names a task outside `task_ids`, and
    /// `CyclicDependency` when the edges form a cycle.
    pub fn from_edges<S: AsRef<str>>(task_ids: &[S], edges: &[DependencyEdge]) -> Result<Self> {
        if task_ids.is_empty() {
            return Err(CoordinationError::EmptyWorkflow);
        }

        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();
        for task_id in task_ids {
            let task_id = task_id.as_ref();
            if nodes.contains_key(task_id) {
                return Err(CoordinationError::DuplicateTask(task_id.to_owned()));
            }
            let node = graph.add_node(task_id.to_owned());
            nodes.insert(task_id.to_owned(), node);
        }

        for edge in edges {
            let unknown = |missing: &str| CoordinationError::UnknownDependency {
                task: edge.task.clone(),
                dependency: missing.to_owned(),
            };
            let Some(&dependent) = nodes.get(&edge.task) else {
                return Err(unknown(&edge.task));
            };
            let Some(&dependency) = nodes.get(&edge.depends_on) else {
                return Err(unknown(&edge.depends_on));
            };
            graph.update_edge(dependency, dependent, ());
        }

        let built = Self { graph, nodes };
        built.topological_order()?;
        Ok(built)
    }

    /// Builds a graph from tasks that were already validated.
    ///
    /// Dependencies naming tasks outside the slice are ignored.
    #[must_use]
    pub fn from_tasks(tasks: &[SkillTask]) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();

        for task in tasks {
            let node = graph.add_node(task.task_id().to_owned());
            nodes.insert(task.task_id().to_owned(), node);
        }

        for task in tasks {
            let dependent = nodes[task.task_id()];
            for dependency in task.dependencies() {
                if let Some(&source) = nodes.get(dependency) {
                    graph.update_edge(source, dependent, ());
                }
            }
        }

        Self { graph, nodes }
    }

    /// Task ids in a dependency-respecting order.
    ///
    /// # Errors
    /// Returns `CyclicDependency` naming a task on the cycle.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        algo::toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|node| self.graph[node].clone()).collect())
            .map_err(|cycle| CoordinationError::CyclicDependency {
                task: self.graph[cycle.node_id()].clone(),
            })
    }

    /// Number of tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Task ids in declaration order.
    #[must_use]
    pub fn task_ids(&self) -> Vec<&str> {
        self.graph.node_weights().map(String::as_str).collect()
    }

    /// Direct dependencies of a task, in declaration order.
    #[must_use]
    pub fn dependencies_of(&self, task_id: &str) -> Vec<&str> {
        self.neighbors(task_id, Direction::Incoming)
    }

    /// Direct dependents of a task, in declaration order.
    #[must_use]
    pub fn dependents_of(&self, task_id: &str) -> Vec<&str> {
        self.neighbors(task_id, Direction::Outgoing)
    }

    /// Tasks without dependencies, in declaration order.
    #[must_use]
    pub fn roots(&self) -> Vec<&str> {
        self.graph
            .node_indices()
            .filter(|&node| {
                self.graph
                    .neighbors_directed(node, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|node| self.graph[node].as_str())
            .collect()
    }

    /// Longest chain and widest root fan-out.
    #[must_use]
    pub fn shape(&self) -> GraphShape {
        let max_root_fan_out = self
            .graph
            .node_indices()
            .filter(|&node| {
                self.graph
                    .neighbors_directed(node, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|node| {
                self.graph
                    .neighbors_directed(node, Direction::Outgoing)
                    .count()
            })
            .max()
            .unwrap_or(0);

        GraphShape {
            longest_chain: self.longest_chain(),
            max_root_fan_out,
        }
    }

    /// Scheduling mode for Adaptive workflows.
    ///
    /// Chains of five or more tasks become Pipeline, roots with three or more
    /// direct dependents become Parallel, everything else runs Sequential.
    #[must_use]
    pub fn classify(&self) -> WorkflowMode {
        self.shape().mode()
    }

    /// Static wave plan assuming every task succeeds.
    ///
    /// Each wave holds the tasks whose dependencies all sit in earlier waves,
    /// in declaration order. A cyclic remainder is dropped.
    #[must_use]
    pub fn plan_waves(&self) -> Vec<Vec<String>> {
        let mut placed = HashSet::new();
        let mut waves = Vec::new();

        while placed.len() < self.graph.node_count() {
            let wave: Vec<NodeIndex> = self
                .graph
                .node_indices()
                .filter(|node| !placed.contains(node))
                .filter(|&node| {
                    self.graph
                        .neighbors_directed(node, Direction::Incoming)
                        .all(|dependency| placed.contains(&dependency))
                })
                .collect();

            if wave.is_empty() {
                break;
            }
            placed.extend(wave.iter().copied());
            waves.push(wave.into_iter().map(|node| self.graph[node].clone()).collect());
        }

        waves
    }

    /// Number of tasks on the longest chain, counted in tasks.
    fn longest_chain(&self) -> usize {
        let Ok(order) = algo::toposort(&self.graph, None) else {
            return 0;
        };

        let mut depth = HashMap::with_capacity(order.len());
        for node in order {
            let deepest_dependency = self
                .graph
                .neighbors_directed(node, Direction::Incoming)
                .filter_map(|dependency| depth.get(&dependency).copied())
                .max()
                .unwrap_or(0);
            depth.insert(node, deepest_dependency + 1);
        }
        depth.into_values().max().unwrap_or(0)
    }

    fn neighbors(&self, task_id: &str, direction: Direction) -> Vec<&str> {
        let Some(&node) = self.nodes.get(task_id) else {
            return Vec::new();
        };
        let adjacent: BTreeSet<NodeIndex> =
            self.graph.neighbors_directed(node, direction).collect();
        adjacent
            .into_iter()
            .map(|neighbor| self.graph[neighbor].as_str())
            .collect()
    }
}
