use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Parameter mapping handed to a skill.
pub type Parameters = Map<String, Value>;

/// Auxiliary-context flag marking a request as one step of a larger workflow.
pub const WORKFLOW_CONTEXT_HINT: &str = "workflow_context";

/// Immutable request to run one skill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillRequest {
    skill_name: String,
    parameters: Parameters,
    auxiliary_context: Option<Parameters>,
    task_id: Option<String>,
}

impl SkillRequest {
    /// Creates a request for the named skill with no parameters.
    ///
    /// # Errors
    /// Returns an error if the skill name is empty or only whitespace.
    pub fn new<T: Into<String>>(skill_name: T) -> Result<Self> {
        let skill_name = skill_name.into();
        if skill_name.trim().is_empty() {
            return Err(Error::InvalidRequest(
                "skill name must not be empty".to_owned(),
            ));
        }

        Ok(Self {
            skill_name,
            parameters: Parameters::new(),
            auxiliary_context: None,
            task_id: None,
        })
    }

    /// Replaces the parameters.
    #[must_use]
    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Adds one parameter.
    #[must_use]
    pub fn with_parameter<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Attaches caller-supplied hints.
    #[must_use]
    pub fn with_auxiliary_context(mut self, context: Parameters) -> Self {
        self.auxiliary_context = Some(context);
        self
    }

    /// Marks this request as part of a multi-step workflow.
    #[must_use]
    pub fn in_workflow(mut self) -> Self {
        self.auxiliary_context
            .get_or_insert_with(Parameters::new)
            .insert(WORKFLOW_CONTEXT_HINT.to_owned(), Value::Bool(true));
        self
    }

    /// Fixes the task id this request takes when placed in a workflow.
    #[must_use]
    pub fn with_task_id<T: Into<String>>(mut self, task_id: T) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// Skill name.
    pub fn skill_name(&self) -> &str {
        &self.skill_name
    }

    /// Skill parameters.
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Caller hints, if any.
    pub fn auxiliary_context(&self) -> Option<&Parameters> {
        self.auxiliary_context.as_ref()
    }

    /// Requested task id, if any.
    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    /// Whether the caller flagged this request as part of a workflow.
    pub fn has_workflow_hint(&self) -> bool {
        self.auxiliary_context
            .as_ref()
            .and_then(|context| context.get(WORKFLOW_CONTEXT_HINT))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Scheduling mode for a workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowMode {
    /// Declaration order, fail-fast
    Sequential,
    /// Dependency waves on a bounded worker pool
    Parallel,
    /// Declaration order with forward data flow, fail-fast
    Pipeline,
    /// Picks one of the above from the graph shape
    #[default]
    Adaptive,
}

impl Display for WorkflowMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let label = match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::Pipeline => "pipeline",
            Self::Adaptive => "adaptive",
        };
        f.write_str(label)
    }
}

impl FromStr for WorkflowMode {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "parallel" => Ok(Self::Parallel),
            "pipeline" => Ok(Self::Pipeline),
            "adaptive" => Ok(Self::Adaptive),
            other => Err(Error::Config(format!("unknown workflow mode: {other}"))),
        }
    }
}
