use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{CoordinationError, ErrorCategory, core_category};
use skillflow_core::Error as CoreError;

/// Per-skill result envelope shared by every execution path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkillOutcome {
    /// The skill ran and produced a value
    Success {
        /// Value returned by the skill
        value: Value,
    },
    /// A clearly labeled substitute for a skill that could not run
    Mock {
        /// Substitute payload, always carrying `"mock": true`
        value: Value,
    },
    /// The skill failed or could not be scheduled
    Error {
        /// Error category
        category: ErrorCategory,
        /// Error message, verbatim
        message: String,
    },
    /// The skill was never started
    Skipped {
        /// Why it did not run
        reason: String,
    },
}

impl SkillOutcome {
    /// Wraps a real skill result.
    pub fn success(value: Value) -> Self {
        Self::Success { value }
    }

    /// Labeled substitute for a skill that is not available.
    pub fn mock(skill_name: &str) -> Self {
        let message =
            format!("Skill '{skill_name}' is currently unavailable; returning a mock result");
        Self::Mock {
            value: json!({
                "skill_name": skill_name,
                "status": "mock_result",
                "message": message,
                "timestamp": Utc::now().to_rfc3339(),
                "mock": true,
            }),
        }
    }

    /// Error outcome from a core error.
    pub fn from_core_error(error: &CoreError) -> Self {
        Self::Error {
            category: core_category(error),
            message: error.to_string(),
        }
    }

    /// Error outcome from a coordination error.
    pub fn from_error(error: &CoordinationError) -> Self {
        Self::Error {
            category: error.category(),
            message: error.to_string(),
        }
    }

    /// Whether the skill really ran and succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Whether this is a labeled substitute.
    pub fn is_mock(&self) -> bool {
        matches!(self, Self::Mock { .. })
    }

    /// Whether the skill failed.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Payload of a success or mock outcome.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Success { value } | Self::Mock { value } => Some(value),
            Self::Error { .. } | Self::Skipped { .. } => None,
        }
    }
}

/// Outcome of one requested skill, tagged with the request it answers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillExecution {
    /// Requested skill
    pub skill_name: String,
    /// Task id, when the request ran as part of a workflow or carried one
    pub task_id: Option<String>,
    /// What happened
    pub outcome: SkillOutcome,
}

impl SkillExecution {
    /// Pairs an outcome with the skill and task it belongs to.
    pub fn new<T: Into<String>>(
        skill_name: T,
        task_id: Option<String>,
        outcome: SkillOutcome,
    ) -> Self {
        Self {
            skill_name: skill_name.into(),
            task_id,
            outcome,
        }
    }
}
