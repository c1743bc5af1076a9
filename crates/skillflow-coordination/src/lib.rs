//! Skill coordination: capability detection, workflow orchestration,
//! graceful degradation, and the unified executor that ties them together.
//!
//! A caller hands requests to [`UnifiedExecutor`], which asks the
//! [`CapabilityDetector`] whether the project is set up for coordination,
//! runs the batch through the [`WorkflowOrchestrator`] when it is, invokes
//! each skill directly when it is not, and falls back to the
//! [`GracefulDegrader`] when orchestration itself fails.

/// Environment capability detection.
pub mod detector;
/// Fallback strategies for failed coordination.
pub mod degrader;
/// Error types and categories.
pub mod error;
/// Entry point choosing the execution path.
pub mod executor;
/// Per-skill result envelopes.
pub mod outcome;
/// Dispatch counters.
pub mod stats;
/// Workflow model, dependency graph, and orchestrator.
pub mod workflow;

pub use degrader::{
    AUXILIARY_CONTEXT_KEY, DEGRADATION_CONTEXT_KEY, DegradationOutcome, ERROR_CONTEXT_KEY,
    FailureMode, GracefulDegrader, Impact,
};
pub use detector::{
    COORDINATION_THRESHOLD, CapabilityDetector, CapabilitySignals, CapabilityStatus,
    CapabilitySummary,
};
pub use error::{CoordinationError, ErrorCategory, Result};
pub use executor::{
    ExecutionContext, ExecutionError, ExecutionMode, ExecutionResult, UnifiedExecutor,
};
pub use outcome::{SkillExecution, SkillOutcome};
pub use stats::ExecutorStats;
pub use workflow::{
    CancellationHandle, DependencyEdge, DependencyGraph, GraphShape, PIPELINE_DATA_KEY,
    SkillTask, TaskStatus, WORKFLOW_CONTEXT_KEY, Workflow, WorkflowOrchestrator, WorkflowStatus,
    WorkflowSummary,
};
