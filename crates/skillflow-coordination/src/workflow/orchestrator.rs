//! Builds workflows and runs them under one of the scheduling modes.

use core::result::Result as CoreResult;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use skillflow_core::{
    Error as CoreError, ExecutionConfig, Parameters, SkillInvoker, SkillRequest, WorkflowMode,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::graph::DependencyGraph;
use super::{
    DependencyEdge, PIPELINE_DATA_KEY, SkillTask, TaskStatus, WORKFLOW_CONTEXT_KEY, Workflow,
    WorkflowStatus,
};
use crate::{CoordinationError, Result};

/// Outcome of one invocation: the skill's value or a failure detail.
type TaskRun = CoreResult<Value, String>;

/// Builds workflows from skill requests and runs them under a scheduling mode
#[derive(Clone)]
pub struct WorkflowOrchestrator {
    invoker: Arc<dyn SkillInvoker>,
    max_workers: usize,
    task_timeout: Duration,
}

impl WorkflowOrchestrator {
    /// Creates an orchestrator with default execution settings.
    pub fn new(invoker: Arc<dyn SkillInvoker>) -> Self {
        let defaults = ExecutionConfig::default();
        Self {
            invoker,
            max_workers: defaults.max_workers,
            task_timeout: defaults.task_timeout(),
        }
    }

    /// Creates an orchestrator from execution settings.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinationError::Configuration`] when the worker pool is
    /// empty or the task timeout is zero.
    pub fn from_config(invoker: Arc<dyn SkillInvoker>, config: &ExecutionConfig) -> Result<Self> {
        config.validate().map_err(|err| match err {
            CoreError::Config(message) => CoordinationError::Configuration(message),
            other => CoordinationError::Core(other),
        })?;
        Ok(Self {
            invoker,
            max_workers: config.max_workers,
            task_timeout: config.task_timeout(),
        })
    }

    /// Bounds how many tasks of one wave run at once.
    #[must_use]
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Sets the per-task timeout.
    #[must_use]
    pub fn with_task_timeout(mut self, task_timeout: Duration) -> Self {
        self.task_timeout = task_timeout;
        self
    }

    /// Worker pool size.
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Per-task timeout.
    pub fn task_timeout(&self) -> Duration {
        self.task_timeout
    }

    /// Builds a validated workflow.
    ///
    /// Each request becomes one task; its id is the request's task id or a
    /// fresh UUID. Edges are given between task ids.
    ///
    /// # Errors
    /// Returns a structural error for an empty request list, a duplicate task
    /// id, an edge naming an unknown task, or a dependency cycle, and
    /// `UnknownSkill` when the invoker cannot resolve a requested skill.
    pub fn build_workflow<T: Into<String>>(
        &self,
        name: T,
        requests: Vec<SkillRequest>,
        edges: &[DependencyEdge],
        mode: WorkflowMode,
    ) -> Result<Workflow> {
        let task_ids: Vec<String> = requests
            .iter()
            .map(|request| {
                request
                    .task_id()
                    .map_or_else(|| Uuid::new_v4().to_string(), str::to_owned)
            })
            .collect();

        DependencyGraph::from_edges(&task_ids, edges)?;

        if let Some(missing) = requests
            .iter()
            .find(|request| !self.invoker.is_available(request.skill_name()))
        {
            return Err(CoordinationError::UnknownSkill(
                missing.skill_name().to_owned(),
            ));
        }

        let mut dependencies: HashMap<&str, BTreeSet<String>> = HashMap::new();
        for edge in edges {
            dependencies
                .entry(edge.task.as_str())
                .or_default()
                .insert(edge.depends_on.clone());
        }

        let tasks = task_ids
            .iter()
            .zip(requests)
            .map(|(task_id, request)| {
                let task_dependencies = dependencies.remove(task_id.as_str()).unwrap_or_default();
                SkillTask::new(task_id.clone(), request, task_dependencies)
            })
            .collect();

        let workflow = Workflow::new(name.into(), tasks, mode);
        debug!(
            "Built workflow '{}' ({}) with {} tasks in {} mode",
            workflow.name(),
            workflow.workflow_id(),
            workflow.tasks().len(),
            mode
        );
        Ok(workflow)
    }

    /// Attaches a shared context to a workflow.
    pub fn with_context(workflow: Workflow, context: Parameters) -> Workflow {
        workflow.with_context(context)
    }

    /// Concrete mode an Adaptive workflow would run under.
    pub fn classify(&self, workflow: &Workflow) -> WorkflowMode {
        DependencyGraph::from_tasks(workflow.tasks()).classify()
    }

    /// Runs a pending workflow to completion.
    ///
    /// Task failures are recorded on the tasks; the returned map holds the
    /// results of completed tasks keyed by task id.
    ///
    /// # Errors
    /// Returns `AlreadyExecuted` if the workflow has run before, and
    /// `Internal` if a task panics.
    pub async fn execute(&self, workflow: &mut Workflow) -> Result<BTreeMap<String, Value>> {
        if workflow.status() != WorkflowStatus::Pending {
            return Err(CoordinationError::AlreadyExecuted(
                workflow.workflow_id().to_owned(),
            ));
        }
        workflow.set_status(WorkflowStatus::Running);

        let mode = match workflow.mode() {
            WorkflowMode::Adaptive => {
                let chosen = self.classify(workflow);
                info!(
                    "Adaptive workflow '{}' classified as {chosen}",
                    workflow.name()
                );
                chosen
            }
            explicit => explicit,
        };

        let status = match mode {
            WorkflowMode::Parallel => self.run_parallel(workflow).await?,
            WorkflowMode::Pipeline => self.run_ordered(workflow, true).await,
            WorkflowMode::Sequential | WorkflowMode::Adaptive => {
                self.run_ordered(workflow, false).await
            }
        };

        workflow.set_status(status);
        let summary = workflow.summary();
        info!(
            "Workflow '{}' finished as {:?}: {} completed, {} failed, {} skipped",
            summary.name,
            summary.status,
            summary.completed_tasks,
            summary.failed_tasks,
            summary.skipped_tasks
        );
        Ok(workflow.results().clone())
    }

    /// Declaration order, fail-fast. Pipeline mode forwards prior results.
    async fn run_ordered(&self, workflow: &mut Workflow, pipeline: bool) -> WorkflowStatus {
        let task_count = workflow.tasks().len();

        for index in 0..task_count {
            if workflow.is_cancelled() {
                info!("Workflow '{}' cancelled", workflow.name());
                skip_from(workflow, index);
                return WorkflowStatus::Cancelled;
            }

            let task = &workflow.tasks()[index];
            if !workflow.dependencies_completed(task) {
                debug!(
                    "Skipping task '{}': dependencies not completed",
                    task.task_id()
                );
                workflow.tasks_mut()[index].mark_skipped();
                continue;
            }

            let skill_name = task.skill_name().to_owned();
            let mut parameters = task_parameters(workflow, task);
            if pipeline {
                let prior: Parameters = workflow
                    .results()
                    .iter()
                    .map(|(task_id, result)| (task_id.clone(), result.clone()))
                    .collect();
                parameters.insert(PIPELINE_DATA_KEY.to_owned(), Value::Object(prior));
            }

            workflow.tasks_mut()[index].mark_running();
            let run = invoke_with_timeout(
                self.invoker.as_ref(),
                &skill_name,
                parameters,
                self.task_timeout,
            )
            .await
            .map_err(|err| err.to_string());

            if !record_run(workflow, index, run) {
                skip_from(workflow, index + 1);
                return WorkflowStatus::Failed;
            }
        }

        WorkflowStatus::Completed
    }

    /// Dependency waves on a bounded worker pool.
    async fn run_parallel(&self, workflow: &mut Workflow) -> Result<WorkflowStatus> {
        let order = DependencyGraph::from_tasks(workflow.tasks()).topological_order()?;
        let positions: HashMap<String, usize> = workflow
            .tasks()
            .iter()
            .enumerate()
            .map(|(index, task)| (task.task_id().to_owned(), index))
            .collect();
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut wave_number = 0usize;

        loop {
            if workflow.is_cancelled() {
                info!("Workflow '{}' cancelled", workflow.name());
                skip_pending(workflow);
                return Ok(WorkflowStatus::Cancelled);
            }

            skip_unreachable(workflow, &order, &positions);

            let mut ready: Vec<usize> = workflow
                .tasks()
                .iter()
                .enumerate()
                .filter(|(_, task)| {
                    task.status() == TaskStatus::Pending && workflow.dependencies_completed(task)
                })
                .map(|(index, _)| index)
                .collect();

            if ready.is_empty() {
                match stalled_task(workflow) {
                    Some(index) => {
                        warn!(
                            "No task ready in workflow '{}'; forcing '{}'",
                            workflow.name(),
                            workflow.tasks()[index].task_id()
                        );
                        ready.push(index);
                    }
                    None => break,
                }
            }

            wave_number += 1;
            info!(
                "Workflow '{}' wave {wave_number}: {} task(s)",
                workflow.name(),
                ready.len()
            );
            self.run_wave(workflow, &ready, &semaphore).await?;
        }

        let any_failed = workflow
            .tasks()
            .iter()
            .any(|task| task.status() == TaskStatus::Failed);
        Ok(if any_failed {
            WorkflowStatus::PartiallyCompleted
        } else {
            WorkflowStatus::Completed
        })
    }

    async fn run_wave(
        &self,
        workflow: &mut Workflow,
        wave: &[usize],
        semaphore: &Arc<Semaphore>,
    ) -> Result<()> {
        let mut join_set = JoinSet::new();
        let mut spawned = HashMap::new();

        for &index in wave {
            let task = &workflow.tasks()[index];
            let skill_name = task.skill_name().to_owned();
            let parameters = task_parameters(workflow, task);
            workflow.tasks_mut()[index].mark_running();

            let invoker = Arc::clone(&self.invoker);
            let task_timeout = self.task_timeout;
            let permit = Arc::clone(semaphore)
                .acquire_owned()
                .await
                .map_err(|err| CoordinationError::Internal(err.to_string()))?;

            let handle = join_set.spawn(async move {
                let run = invoke_with_timeout(
                    invoker.as_ref(),
                    &skill_name,
                    parameters,
                    task_timeout,
                )
                .await
                .map_err(|err| err.to_string());
                drop(permit);
                (index, run)
            });
            spawned.insert(handle.id(), index);
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, run)) => {
                    record_run(workflow, index, run);
                }
                Err(err) => {
                    join_set.abort_all();
                    let detail = if err.is_panic() {
                        format!("task panicked: {err}")
                    } else {
                        err.to_string()
                    };
                    if let Some(&index) = spawned.get(&err.id()) {
                        workflow.tasks_mut()[index].mark_failed(detail.clone());
                    }
                    abandon_wave(workflow, wave);
                    skip_pending(workflow);
                    workflow.set_status(WorkflowStatus::Failed);
                    return Err(CoordinationError::Internal(detail));
                }
            }
        }
        Ok(())
    }
}

/// Request parameters plus the shared workflow context, when present.
fn task_parameters(workflow: &Workflow, task: &SkillTask) -> Parameters {
    let mut parameters = task.request().parameters().clone();
    if !workflow.context().is_empty() {
        parameters.insert(
            WORKFLOW_CONTEXT_KEY.to_owned(),
            Value::Object(workflow.context().clone()),
        );
    }
    parameters
}

/// Invokes one skill, giving up with [`CoordinationError::Timeout`] once
/// `task_timeout` elapses.
pub(crate) async fn invoke_with_timeout(
    invoker: &dyn SkillInvoker,
    skill_name: &str,
    parameters: Parameters,
    task_timeout: Duration,
) -> Result<Value> {
    debug!("Invoking skill '{skill_name}'");
    timeout(task_timeout, invoker.invoke(skill_name, parameters))
        .await
        .map_err(|_elapsed| CoordinationError::Timeout(task_timeout))?
        .map_err(CoordinationError::from)
}

/// Applies a run to the task at `index`; returns whether it completed.
fn record_run(workflow: &mut Workflow, index: usize, run: TaskRun) -> bool {
    let task_id = workflow.tasks()[index].task_id().to_owned();
    match run {
        Ok(value) => {
            workflow.record_result(&task_id, value.clone());
            workflow.tasks_mut()[index].mark_completed(value);
            true
        }
        Err(detail) => {
            warn!("Task '{task_id}' failed: {detail}");
            workflow.tasks_mut()[index].mark_failed(detail);
            false
        }
    }
}

/// Fails every wave member still running once the wave is aborted.
fn abandon_wave(workflow: &mut Workflow, wave: &[usize]) {
    for &index in wave {
        let task = &mut workflow.tasks_mut()[index];
        if task.status() == TaskStatus::Running {
            warn!("Task '{}' aborted after sibling panic", task.task_id());
            task.mark_failed("aborted after sibling panic".to_owned());
        }
    }
}

fn skip_from(workflow: &mut Workflow, start: usize) {
    for task in workflow.tasks_mut().iter_mut().skip(start) {
        if !task.status().is_terminal() {
            task.mark_skipped();
        }
    }
}

fn skip_pending(workflow: &mut Workflow) {
    skip_from(workflow, 0);
}

/// Skips pending tasks that depend on a failed or skipped task.
///
/// Walking in topological order propagates skips transitively in one pass.
fn skip_unreachable(workflow: &mut Workflow, order: &[String], positions: &HashMap<String, usize>) {
    for task_id in order {
        let Some(&index) = positions.get(task_id) else {
            continue;
        };
        let task = &workflow.tasks()[index];
        if task.status() != TaskStatus::Pending {
            continue;
        }
        let blocked = task.dependencies().iter().any(|dependency| {
            positions
                .get(dependency)
                .map(|&position| workflow.tasks()[position].status())
                .is_some_and(|status| matches!(status, TaskStatus::Failed | TaskStatus::Skipped))
        });
        if blocked {
            debug!("Skipping task '{task_id}': a dependency did not complete");
            workflow.tasks_mut()[index].mark_skipped();
        }
    }
}

/// Pending task with the fewest outstanding dependencies, if any remain.
fn stalled_task(workflow: &Workflow) -> Option<usize> {
    workflow
        .tasks()
        .iter()
        .enumerate()
        .filter(|(_, task)| task.status() == TaskStatus::Pending)
        .min_by_key(|(_, task)| {
            task.dependencies()
                .iter()
                .filter(|dependency| !workflow.results().contains_key(*dependency))
                .count()
        })
        .map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use skillflow_core::SkillRegistry;

    fn registry() -> Arc<SkillRegistry> {
        Arc::new(
            SkillRegistry::new()
                .with_fn("echo", |params: Parameters| async move {
                    Ok(Value::Object(params))
                })
                .with_fn("fail", |_params: Parameters| async move {
                    Err(CoreError::invocation("fail", "deliberate failure"))
                }),
        )
    }

    fn request(skill: &str, task_id: &str) -> SkillRequest {
        match SkillRequest::new(skill) {
            Ok(request) => request.with_task_id(task_id),
            Err(err) => panic!("invalid request: {err}"),
        }
    }

    #[test]
    fn test_build_rejects_unknown_skill() {
        let orchestrator = WorkflowOrchestrator::new(registry());
        let result = orchestrator.build_workflow(
            "unknown",
            vec![request("echo", "a"), request("ghost", "b")],
            &[],
            WorkflowMode::Sequential,
        );
        assert!(matches!(result, Err(CoordinationError::UnknownSkill(name)) if name == "ghost"));
    }

    #[test]
    fn test_build_generates_task_ids() -> Result<()> {
        let orchestrator = WorkflowOrchestrator::new(registry());
        let requests = vec![
            SkillRequest::new("echo")?,
            SkillRequest::new("echo")?,
        ];
        let workflow =
            orchestrator.build_workflow("ids", requests, &[], WorkflowMode::Sequential)?;
        let first = workflow.tasks()[0].task_id();
        let second = workflow.tasks()[1].task_id();
        assert_ne!(first, second);
        assert_eq!(workflow.status(), WorkflowStatus::Pending);
        Ok(())
    }

    #[tokio::test]
    async fn test_sequential_halts_on_failure() -> Result<()> {
        let orchestrator = WorkflowOrchestrator::new(registry());
        let mut workflow = orchestrator.build_workflow(
            "halt",
            vec![request("echo", "a"), request("fail", "b"), request("echo", "c")],
            &[],
            WorkflowMode::Sequential,
        )?;

        let results = orchestrator.execute(&mut workflow).await?;

        assert_eq!(workflow.status(), WorkflowStatus::Failed);
        assert!(results.contains_key("a"));
        assert!(!results.contains_key("c"));
        assert_eq!(workflow.task("b").map(SkillTask::status), Some(TaskStatus::Failed));
        assert_eq!(workflow.task("c").map(SkillTask::status), Some(TaskStatus::Skipped));
        let detail = workflow.task("b").and_then(SkillTask::failure_detail);
        assert!(detail.is_some_and(|text| text.contains("deliberate failure")));
        Ok(())
    }

    #[tokio::test]
    async fn test_workflow_context_injected() -> Result<()> {
        let orchestrator = WorkflowOrchestrator::new(registry());
        let mut context = Parameters::new();
        context.insert("project".to_owned(), json!("skillflow"));
        let workflow = orchestrator.build_workflow(
            "context",
            vec![request("echo", "a")],
            &[],
            WorkflowMode::Sequential,
        )?;
        let mut workflow = WorkflowOrchestrator::with_context(workflow, context);

        let results = orchestrator.execute(&mut workflow).await?;
        assert_eq!(
            results["a"][WORKFLOW_CONTEXT_KEY],
            json!({ "project": "skillflow" })
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_second_execution_rejected() -> Result<()> {
        let orchestrator = WorkflowOrchestrator::new(registry());
        let mut workflow = orchestrator.build_workflow(
            "once",
            vec![request("echo", "a")],
            &[],
            WorkflowMode::Parallel,
        )?;
        orchestrator.execute(&mut workflow).await?;

        let second = orchestrator.execute(&mut workflow).await;
        assert!(matches!(second, Err(CoordinationError::AlreadyExecuted(_))));
        Ok(())
    }

    #[test]
    fn test_stalled_task_prefers_fewest_outstanding() -> Result<()> {
        let orchestrator = WorkflowOrchestrator::new(registry());
        let workflow = orchestrator.build_workflow(
            "stall",
            vec![request("echo", "a"), request("echo", "b"), request("echo", "c")],
            &[
                DependencyEdge::new("b", "a"),
                DependencyEdge::new("c", "a"),
                DependencyEdge::new("c", "b"),
            ],
            WorkflowMode::Parallel,
        )?;
        assert_eq!(stalled_task(&workflow), Some(0));
        Ok(())
    }
}
