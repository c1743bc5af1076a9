//! Workflow definition files and the static plan derived from them

use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use skillflow_coordination::{DependencyEdge, DependencyGraph, GraphShape};
use skillflow_core::{Parameters, SkillRequest, WorkflowMode};

/// Workflow definition as written in TOML
#[derive(Debug, Deserialize)]
pub struct WorkflowFile {
    pub name: String,
    #[serde(default)]
    pub mode: Option<WorkflowMode>,
    #[serde(default)]
    pub tasks: Vec<TaskEntry>,
}

/// One `[[tasks]]` entry
#[derive(Debug, Deserialize)]
pub struct TaskEntry {
    pub id: String,
    pub skill: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub parameters: Parameters,
}

/// Static execution plan for a workflow file
#[derive(Debug, Serialize)]
pub struct PlanReport {
    pub name: String,
    pub task_count: usize,
    pub declared_mode: WorkflowMode,
    pub effective_mode: WorkflowMode,
    pub shape: GraphShape,
    pub waves: Vec<Vec<String>>,
}

impl WorkflowFile {
    /// Read and parse a workflow file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid TOML
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse workflow file {}", path.display()))
    }

    /// Skill requests for every task, in declaration order
    ///
    /// # Errors
    /// Returns an error if a task names an empty skill
    pub fn requests(&self) -> Result<Vec<SkillRequest>> {
        self.tasks
            .iter()
            .map(|task| {
                SkillRequest::new(task.skill.as_str())
                    .map(|request| {
                        request
                            .with_task_id(task.id.as_str())
                            .with_parameters(task.parameters.clone())
                    })
                    .with_context(|| format!("Invalid task '{}'", task.id))
            })
            .collect()
    }

    /// Dependency edges declared by the tasks
    pub fn edges(&self) -> Vec<DependencyEdge> {
        self.tasks
            .iter()
            .flat_map(|task| {
                task.depends_on
                    .iter()
                    .map(|dependency| DependencyEdge::new(task.id.as_str(), dependency.as_str()))
            })
            .collect()
    }

    /// Validate the workflow and derive its plan, using `default_mode`
    /// when the file does not declare one
    ///
    /// # Errors
    /// Returns an error for empty skill names, duplicate task ids, unknown
    /// dependencies, or dependency cycles
    pub fn plan(&self, default_mode: WorkflowMode) -> Result<PlanReport> {
        self.requests()?;
        let task_ids: Vec<&str> = self.tasks.iter().map(|task| task.id.as_str()).collect();
        let graph = DependencyGraph::from_edges(&task_ids, &self.edges())
            .with_context(|| format!("Workflow '{}' is invalid", self.name))?;

        let declared_mode = self.mode.unwrap_or(default_mode);
        let effective_mode = match declared_mode {
            WorkflowMode::Adaptive => graph.classify(),
            explicit => explicit,
        };
        tracing::debug!(
            "Planned workflow '{}': {declared_mode} runs as {effective_mode}",
            self.name
        );

        Ok(PlanReport {
            name: self.name.clone(),
            task_count: graph.task_count(),
            declared_mode,
            effective_mode,
            shape: graph.shape(),
            waves: graph.plan_waves(),
        })
    }
}
