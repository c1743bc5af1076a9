use core::result::Result as CoreResult;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use skillflow_core::Error as CoreError;
use thiserror::Error;

/// Result type for coordination operations.
pub type Result<T> = CoreResult<T, CoordinationError>;

/// Coarse category attached to every error reported to a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed workflow: cycles, unknown references, duplicates
    Structural,
    /// A skill ran and failed
    Task,
    /// A skill did not finish in time
    Timeout,
    /// A skill could not be resolved
    Unavailable,
    /// Settings are invalid or missing
    Configuration,
    /// Unexpected failure inside the scheduler itself
    Orchestration,
}

impl Display for ErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let label = match self {
            Self::Structural => "structural",
            Self::Task => "task",
            Self::Timeout => "timeout",
            Self::Unavailable => "unavailable",
            Self::Configuration => "configuration",
            Self::Orchestration => "orchestration",
        };
        f.write_str(label)
    }
}

/// Errors raised while building or running workflows.
#[derive(Debug, Error)]
pub enum CoordinationError {
    /// Dependency edges form a cycle through the named task.
    #[error("Cyclic dependency detected in workflow involving task '{task}'")]
    CyclicDependency {
        /// A task that participates in the cycle
        task: String,
    },

    /// An edge references a task that is not part of the workflow.
    #[error("Task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency {
        /// The dependent task
        task: String,
        /// The missing dependency
        dependency: String,
    },

    /// The invoker cannot resolve a requested skill.
    #[error("Unknown skill: {0}")]
    UnknownSkill(String),

    /// Two requests share the same task id.
    #[error("Duplicate task id: {0}")]
    DuplicateTask(String),

    /// A workflow needs at least one request.
    #[error("Workflow has no tasks")]
    EmptyWorkflow,

    /// A workflow can only run once.
    #[error("Workflow {0} has already been executed")]
    AlreadyExecuted(String),

    /// An operation exceeded its time budget.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Settings prevent the scheduler from running.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unexpected failure inside the scheduler, including panics in tasks.
    #[error("Internal orchestration failure: {0}")]
    Internal(String),

    /// Error bubbled up from the core crate.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl CoordinationError {
    /// Category used for degradation decisions and user-facing tagging.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::CyclicDependency { .. }
            | Self::UnknownDependency { .. }
            | Self::DuplicateTask(_)
            | Self::EmptyWorkflow
            | Self::AlreadyExecuted(_) => ErrorCategory::Structural,
            Self::UnknownSkill(_) => ErrorCategory::Unavailable,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Internal(_) => ErrorCategory::Orchestration,
            Self::Core(core) => core_category(core),
        }
    }

    /// Whether this error indicates a programming error in workflow construction.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        self.category() == ErrorCategory::Structural
    }
}

/// Maps a core error onto a category.
pub fn core_category(error: &CoreError) -> ErrorCategory {
    if error.is_unavailable() {
        ErrorCategory::Unavailable
    } else if error.is_configuration() {
        ErrorCategory::Configuration
    } else if matches!(error, CoreError::InvalidRequest(_)) {
        ErrorCategory::Structural
    } else {
        ErrorCategory::Task
    }
}
