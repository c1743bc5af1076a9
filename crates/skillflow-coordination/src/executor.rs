//! Single entry point that picks between coordinated, independent, and degraded execution.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skillflow_core::{
    ExecutionConfig, FileProbe, Parameters, SkillInvoker, SkillRequest, SkillflowConfig,
    WorkflowMode,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::degrader::{DegradationOutcome, ERROR_CONTEXT_KEY, FailureMode, GracefulDegrader};
use crate::detector::{CapabilityDetector, CapabilitySignals, CapabilityStatus};
use crate::error::{CoordinationError, ErrorCategory, Result};
use crate::outcome::{SkillExecution, SkillOutcome};
use crate::stats::ExecutorStats;
use crate::workflow::orchestrator::invoke_with_timeout;
use crate::workflow::{
    DependencyEdge, TaskStatus, Workflow, WorkflowOrchestrator, WorkflowStatus, WorkflowSummary,
};

/// Path a call took through the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Ran as an orchestrated workflow
    Coordinated,
    /// Each request invoked directly
    Independent,
    /// Handed to the degrader after coordination failed
    Degraded,
}

impl Display for ExecutionMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let label = match self {
            Self::Coordinated => "coordinated",
            Self::Independent => "independent",
            Self::Degraded => "degraded",
        };
        f.write_str(label)
    }
}

/// Bookkeeping for one executor call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Unique id of this call
    pub execution_id: String,
    /// Path the call took
    pub mode: ExecutionMode,
    /// Capability level seen at dispatch
    pub capability_status: CapabilityStatus,
    /// Confidence score seen at dispatch
    pub confidence_score: f64,
    /// Number of requests in the call
    pub request_count: usize,
    /// Workflow that ran, when the call was coordinated
    pub workflow_id: Option<String>,
    /// Why coordination was abandoned, when it was
    pub degradation_reason: Option<String>,
    /// Dispatch time
    pub started_at: DateTime<Utc>,
    /// Completion time
    pub finished_at: Option<DateTime<Utc>>,
}

/// Error that stopped a call before any skill ran
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionError {
    /// Error category
    pub category: ErrorCategory,
    /// Error message
    pub message: String,
}

/// Everything a caller learns from one executor call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Whether the call achieved its goal
    pub success: bool,
    /// Bookkeeping for the call
    pub context: ExecutionContext,
    /// One entry per request, in request order
    pub outcomes: Vec<SkillExecution>,
    /// Degradation details, when the call was degraded
    pub degradation: Option<DegradationOutcome>,
    /// Workflow report, when the call was coordinated
    pub workflow: Option<WorkflowSummary>,
    /// Error that prevented dispatch
    pub error: Option<ExecutionError>,
}

/// Routes skill requests to the orchestrator, direct invocation, or the degrader
pub struct UnifiedExecutor {
    invoker: Arc<dyn SkillInvoker>,
    detector: CapabilityDetector,
    orchestrator: WorkflowOrchestrator,
    degrader: GracefulDegrader,
    workflow_mode: WorkflowMode,
    stats: Mutex<ExecutorStats>,
}

impl UnifiedExecutor {
    /// Creates an executor with default settings.
    pub fn new(invoker: Arc<dyn SkillInvoker>, probe: Arc<dyn FileProbe>) -> Self {
        Self {
            detector: CapabilityDetector::new(probe),
            orchestrator: WorkflowOrchestrator::new(Arc::clone(&invoker)),
            degrader: GracefulDegrader::new(Arc::clone(&invoker)),
            workflow_mode: ExecutionConfig::default().default_mode,
            invoker,
            stats: Mutex::new(ExecutorStats::default()),
        }
    }

    /// Creates an executor from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinationError::Configuration`] when the execution
    /// settings cannot run any task.
    pub fn from_config(
        invoker: Arc<dyn SkillInvoker>,
        probe: Arc<dyn FileProbe>,
        config: &SkillflowConfig,
    ) -> Result<Self> {
        Ok(Self {
            detector: CapabilityDetector::new(probe),
            orchestrator: WorkflowOrchestrator::from_config(
                Arc::clone(&invoker),
                &config.execution,
            )?,
            degrader: GracefulDegrader::from_config(Arc::clone(&invoker), &config.degradation),
            workflow_mode: config.execution.default_mode,
            invoker,
            stats: Mutex::new(ExecutorStats::default()),
        })
    }

    /// Replaces the orchestrator used for coordinated calls.
    #[must_use]
    pub fn with_orchestrator(mut self, orchestrator: WorkflowOrchestrator) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    /// Replaces the degrader used after coordination fails.
    #[must_use]
    pub fn with_degrader(mut self, degrader: GracefulDegrader) -> Self {
        self.degrader = degrader;
        self
    }

    /// Scheduling mode for coordinated batches.
    #[must_use]
    pub fn with_workflow_mode(mut self, mode: WorkflowMode) -> Self {
        self.workflow_mode = mode;
        self
    }

    /// Orchestrator used for coordinated calls.
    pub fn orchestrator(&self) -> &WorkflowOrchestrator {
        &self.orchestrator
    }

    /// Detector consulted on every call.
    pub fn detector(&self) -> &CapabilityDetector {
        &self.detector
    }

    /// Path a batch would take right now.
    pub fn select_mode(&self, requests: &[SkillRequest]) -> ExecutionMode {
        select_mode(&self.detector.detect(), requests)
    }

    /// Runs one request.
    pub async fn execute_skill(&self, request: SkillRequest) -> ExecutionResult {
        self.execute_batch(vec![request]).await
    }

    /// Runs a batch of requests; coordinated batches use the configured mode.
    pub async fn execute_batch(&self, requests: Vec<SkillRequest>) -> ExecutionResult {
        let signals = self.detector.detect();
        let mode = select_mode(&signals, &requests);
        let name = format!("batch of {}", requests.len());
        self.dispatch(name, requests, Vec::new(), self.workflow_mode, signals, mode)
            .await
    }

    /// Runs requests with explicit dependencies between their task ids.
    ///
    /// The workflow is coordinated whenever the project scores above the
    /// coordination threshold; otherwise each request runs independently in
    /// the order given.
    pub async fn execute_workflow<T: Into<String>>(
        &self,
        name: T,
        requests: Vec<SkillRequest>,
        edges: &[DependencyEdge],
        mode: WorkflowMode,
    ) -> ExecutionResult {
        let signals = self.detector.detect();
        let execution_mode = if signals.should_coordinate() {
            ExecutionMode::Coordinated
        } else {
            ExecutionMode::Independent
        };
        self.dispatch(
            name.into(),
            requests,
            edges.to_vec(),
            mode,
            signals,
            execution_mode,
        )
        .await
    }

    /// Snapshot of the dispatch counters.
    pub async fn stats(&self) -> ExecutorStats {
        *self.stats.lock().await
    }

    /// Zeroes every counter.
    pub async fn reset_stats(&self) {
        *self.stats.lock().await = ExecutorStats::default();
        info!("Executor statistics reset");
    }

    async fn dispatch(
        &self,
        name: String,
        requests: Vec<SkillRequest>,
        edges: Vec<DependencyEdge>,
        workflow_mode: WorkflowMode,
        signals: CapabilitySignals,
        mode: ExecutionMode,
    ) -> ExecutionResult {
        let mut context = ExecutionContext {
            execution_id: Uuid::new_v4().to_string(),
            mode,
            capability_status: signals.status(),
            confidence_score: signals.confidence_score(),
            request_count: requests.len(),
            workflow_id: None,
            degradation_reason: None,
            started_at: Utc::now(),
            finished_at: None,
        };

        if requests.is_empty() {
            warn!("Rejected an empty batch");
            context.finished_at = Some(Utc::now());
            let error = CoordinationError::EmptyWorkflow;
            return ExecutionResult {
                success: false,
                context,
                outcomes: Vec::new(),
                degradation: None,
                workflow: None,
                error: Some(ExecutionError {
                    category: error.category(),
                    message: error.to_string(),
                }),
            };
        }

        self.stats.lock().await.total_requests += 1;
        info!(
            "Executing {} request(s) {mode} (capability {}, score {:.2})",
            requests.len(),
            context.capability_status,
            context.confidence_score
        );

        let mut result = match mode {
            ExecutionMode::Coordinated => {
                self.run_coordinated(context, name, requests, edges, workflow_mode)
                    .await
            }
            ExecutionMode::Independent | ExecutionMode::Degraded => {
                self.run_independent(context, &requests).await
            }
        };
        result.context.finished_at = Some(Utc::now());
        result
    }

    async fn run_coordinated(
        &self,
        mut context: ExecutionContext,
        name: String,
        requests: Vec<SkillRequest>,
        edges: Vec<DependencyEdge>,
        workflow_mode: WorkflowMode,
    ) -> ExecutionResult {
        let orchestrator = self.orchestrator.clone();
        let submitted = requests.clone();
        let handle = tokio::spawn(async move {
            let mut workflow = orchestrator.build_workflow(name, submitted, &edges, workflow_mode)?;
            orchestrator.execute(&mut workflow).await?;
            Ok::<Workflow, CoordinationError>(workflow)
        });

        let joined = match handle.await {
            Ok(outcome) => outcome,
            Err(err) => Err(CoordinationError::Internal(format!(
                "coordinated run aborted: {err}"
            ))),
        };

        match joined {
            Ok(workflow) => {
                self.stats.lock().await.coordinated_count += 1;
                let summary = workflow.summary();
                context.workflow_id = Some(summary.workflow_id.clone());
                debug!(
                    "Coordinated workflow {} finished as {:?}",
                    summary.workflow_id, summary.status
                );
                ExecutionResult {
                    success: workflow.status() == WorkflowStatus::Completed,
                    context,
                    outcomes: workflow_outcomes(&workflow),
                    degradation: None,
                    workflow: Some(summary),
                    error: None,
                }
            }
            Err(err) => {
                warn!("Coordination failed, degrading: {err}");
                {
                    let mut stats = self.stats.lock().await;
                    stats.coordination_failure_count += 1;
                    stats.degraded_count += 1;
                }
                context.mode = ExecutionMode::Degraded;
                context.degradation_reason = Some(err.to_string());

                let mut degradation_context = Parameters::new();
                degradation_context.insert(
                    ERROR_CONTEXT_KEY.to_owned(),
                    Value::String(err.to_string()),
                );
                degradation_context.insert(
                    "category".to_owned(),
                    Value::String(err.category().to_string()),
                );
                let degradation = self
                    .degrader
                    .degrade(FailureMode::from_error(&err), &requests, &degradation_context)
                    .await;

                ExecutionResult {
                    success: degradation.succeeded,
                    context,
                    outcomes: degradation.results.clone(),
                    degradation: Some(degradation),
                    workflow: None,
                    error: None,
                }
            }
        }
    }

    async fn run_independent(
        &self,
        context: ExecutionContext,
        requests: &[SkillRequest],
    ) -> ExecutionResult {
        self.stats.lock().await.independent_count += 1;

        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            let outcome = match invoke_with_timeout(
                self.invoker.as_ref(),
                request.skill_name(),
                request.parameters().clone(),
                self.orchestrator.task_timeout(),
            )
            .await
            {
                Ok(value) => SkillOutcome::success(value),
                Err(err) => {
                    warn!("Skill '{}' failed: {err}", request.skill_name());
                    SkillOutcome::from_error(&err)
                }
            };
            outcomes.push(SkillExecution::new(
                request.skill_name(),
                request.task_id().map(str::to_owned),
                outcome,
            ));
        }

        ExecutionResult {
            success: outcomes.iter().all(|execution| execution.outcome.is_success()),
            context,
            outcomes,
            degradation: None,
            workflow: None,
            error: None,
        }
    }
}

/// Coordinate when the project scores above the threshold and the call is
/// a real workflow: several requests, or one flagged as a workflow step.
fn select_mode(signals: &CapabilitySignals, requests: &[SkillRequest]) -> ExecutionMode {
    let workflow_shaped =
        requests.len() > 1 || requests.iter().any(SkillRequest::has_workflow_hint);
    if signals.should_coordinate() && workflow_shaped {
        ExecutionMode::Coordinated
    } else {
        ExecutionMode::Independent
    }
}

fn workflow_outcomes(workflow: &Workflow) -> Vec<SkillExecution> {
    let halted = matches!(
        workflow.status(),
        WorkflowStatus::Failed | WorkflowStatus::Cancelled
    );
    workflow
        .tasks()
        .iter()
        .map(|task| {
            let outcome = match task.status() {
                TaskStatus::Completed => {
                    SkillOutcome::success(task.result().cloned().unwrap_or_default())
                }
                TaskStatus::Failed => {
                    let message = task.failure_detail().unwrap_or_default().to_owned();
                    let category = if message.starts_with("timed out after") {
                        ErrorCategory::Timeout
                    } else {
                        ErrorCategory::Task
                    };
                    SkillOutcome::Error { category, message }
                }
                TaskStatus::Skipped if halted => SkillOutcome::Skipped {
                    reason: "workflow halted before this task".to_owned(),
                },
                TaskStatus::Skipped => SkillOutcome::Skipped {
                    reason: "a dependency did not complete".to_owned(),
                },
                TaskStatus::Pending | TaskStatus::Running => SkillOutcome::Skipped {
                    reason: "task never finished".to_owned(),
                },
            };
            SkillExecution::new(task.skill_name(), Some(task.task_id().to_owned()), outcome)
        })
        .collect()
}
