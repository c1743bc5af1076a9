//! Workflow model, dependency graph analysis, and the orchestrator that runs it.

/// Dependency graph validation and shape analysis.
pub mod graph;
/// Scheduling and execution of workflows.
pub mod orchestrator;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skillflow_core::{Parameters, SkillRequest, WorkflowMode};
use uuid::Uuid;

pub use graph::{DependencyGraph, GraphShape};
pub use orchestrator::WorkflowOrchestrator;

/// Reserved parameter key carrying prior pipeline results.
pub const PIPELINE_DATA_KEY: &str = "pipelineData";
/// Reserved parameter key carrying the shared workflow context.
pub const WORKFLOW_CONTEXT_KEY: &str = "workflowContext";

/// Lifecycle of a single task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started yet
    Pending,
    /// Invocation in flight
    Running,
    /// Finished with a result
    Completed,
    /// Finished with an error
    Failed,
    /// Never started
    Skipped,
}

impl TaskStatus {
    /// Whether the task can no longer change.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

/// Aggregate status of a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Built, not executed
    Pending,
    /// Execution in progress
    Running,
    /// Every task completed or was skipped without any failure
    Completed,
    /// A task failed under a fail-fast mode
    Failed,
    /// Parallel execution finished with failed tasks
    PartiallyCompleted,
    /// Cancelled by the caller between waves
    Cancelled,
}

/// `task` may not start until `depends_on` has completed
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// Dependent task id
    pub task: String,
    /// Task id that must complete first
    pub depends_on: String,
}

impl DependencyEdge {
    /// Creates an edge saying `task` depends on `depends_on`.
    pub fn new<T: Into<String>, D: Into<String>>(task: T, depends_on: D) -> Self {
        Self {
            task: task.into(),
            depends_on: depends_on.into(),
        }
    }
}

/// Scheduling unit wrapping one skill request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillTask {
    task_id: String,
    request: SkillRequest,
    dependencies: BTreeSet<String>,
    status: TaskStatus,
    result: Option<Value>,
    failure_detail: Option<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl SkillTask {
    pub(crate) fn new(
        task_id: String,
        request: SkillRequest,
        dependencies: BTreeSet<String>,
    ) -> Self {
        Self {
            task_id,
            request,
            dependencies,
            status: TaskStatus::Pending,
            result: None,
            failure_detail: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Unique id within the workflow.
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Wrapped request.
    pub fn request(&self) -> &SkillRequest {
        &self.request
    }

    /// Skill name of the wrapped request.
    pub fn skill_name(&self) -> &str {
        self.request.skill_name()
    }

    /// Ids of tasks that must complete first.
    pub fn dependencies(&self) -> &BTreeSet<String> {
        &self.dependencies
    }

    /// Current status.
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Result, present only when completed.
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Failure detail, present only when failed.
    pub fn failure_detail(&self) -> Option<&str> {
        self.failure_detail.as_deref()
    }

    /// When the invocation started.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// When the task reached a terminal state.
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub(crate) fn mark_running(&mut self) {
        self.status = TaskStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub(crate) fn mark_completed(&mut self, result: Value) {
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.finished_at = Some(Utc::now());
    }

    pub(crate) fn mark_failed(&mut self, detail: String) {
        self.status = TaskStatus::Failed;
        self.failure_detail = Some(detail);
        self.finished_at = Some(Utc::now());
    }

    pub(crate) fn mark_skipped(&mut self) {
        self.status = TaskStatus::Skipped;
        self.finished_at = Some(Utc::now());
    }
}

/// Aggregate root for one orchestration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    workflow_id: String,
    name: String,
    tasks: Vec<SkillTask>,
    mode: WorkflowMode,
    context: Parameters,
    status: WorkflowStatus,
    results: BTreeMap<String, Value>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    cancellation: CancellationHandle,
}

impl Workflow {
    pub(crate) fn new(name: String, tasks: Vec<SkillTask>, mode: WorkflowMode) -> Self {
        Self {
            workflow_id: Uuid::new_v4().to_string(),
            name,
            tasks,
            mode,
            context: Parameters::new(),
            status: WorkflowStatus::Pending,
            results: BTreeMap::new(),
            created_at: Utc::now(),
            completed_at: None,
            cancellation: CancellationHandle::new(),
        }
    }

    /// Attaches a read-only context visible to every task.
    #[must_use]
    pub fn with_context(mut self, context: Parameters) -> Self {
        self.context = context;
        self
    }

    /// Workflow id.
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tasks in declaration order.
    pub fn tasks(&self) -> &[SkillTask] {
        &self.tasks
    }

    /// Handle that cancels this workflow between waves.
    ///
    /// Each workflow gets its own flag, so cancelling one run never affects
    /// another workflow built by the same orchestrator.
    pub fn cancellation_handle(&self) -> CancellationHandle {
        self.cancellation.clone()
    }

    /// Whether cancellation was requested for this workflow.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Looks up a task by id.
    pub fn task(&self, task_id: &str) -> Option<&SkillTask> {
        self.tasks.iter().find(|task| task.task_id == task_id)
    }

    /// Requested scheduling mode.
    pub fn mode(&self) -> WorkflowMode {
        self.mode
    }

    /// Shared context.
    pub fn context(&self) -> &Parameters {
        &self.context
    }

    /// Aggregate status.
    pub fn status(&self) -> WorkflowStatus {
        self.status
    }

    /// Results of completed tasks, keyed by task id.
    pub fn results(&self) -> &BTreeMap<String, Value> {
        &self.results
    }

    /// Creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time the run finished.
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Counts and timestamps for reporting.
    pub fn summary(&self) -> WorkflowSummary {
        let count = |status: TaskStatus| {
            self.tasks
                .iter()
                .filter(|task| task.status == status)
                .count()
        };
        WorkflowSummary {
            workflow_id: self.workflow_id.clone(),
            name: self.name.clone(),
            mode: self.mode,
            status: self.status,
            task_count: self.tasks.len(),
            completed_tasks: count(TaskStatus::Completed),
            failed_tasks: count(TaskStatus::Failed),
            skipped_tasks: count(TaskStatus::Skipped),
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }

    pub(crate) fn tasks_mut(&mut self) -> &mut [SkillTask] {
        &mut self.tasks
    }

    pub(crate) fn set_status(&mut self, status: WorkflowStatus) {
        self.status = status;
        if !matches!(status, WorkflowStatus::Pending | WorkflowStatus::Running) {
            self.completed_at = Some(Utc::now());
        }
    }

    pub(crate) fn record_result(&mut self, task_id: &str, result: Value) {
        self.results.insert(task_id.to_owned(), result);
    }

    pub(crate) fn dependencies_completed(&self, task: &SkillTask) -> bool {
        task.dependencies
            .iter()
            .all(|dependency| self.results.contains_key(dependency))
    }
}

/// Reporting view of a workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    /// Workflow id
    pub workflow_id: String,
    /// Workflow name
    pub name: String,
    /// Requested mode
    pub mode: WorkflowMode,
    /// Aggregate status
    pub status: WorkflowStatus,
    /// Total tasks
    pub task_count: usize,
    /// Completed tasks
    pub completed_tasks: usize,
    /// Failed tasks
    pub failed_tasks: usize,
    /// Skipped tasks
    pub skipped_tasks: usize,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Finish time
    pub completed_at: Option<DateTime<Utc>>,
}

/// Cooperative cancellation flag checked between waves
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancellationHandle {
    /// Creates a handle that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; in-flight tasks still finish.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
