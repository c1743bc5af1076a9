//! Fallback strategies used when coordinated execution is unavailable or fails.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use skillflow_core::{DegradationConfig, Parameters, SkillInvoker, SkillRequest};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::detector::{CapabilitySignals, CapabilityStatus};
use crate::error::{CoordinationError, ErrorCategory};
use crate::outcome::{SkillExecution, SkillOutcome};

/// Reserved parameter key carrying a request's auxiliary context.
pub const AUXILIARY_CONTEXT_KEY: &str = "auxiliaryContext";
/// Reserved parameter key carrying the context handed to a degrade call.
pub const DEGRADATION_CONTEXT_KEY: &str = "degradationContext";
/// Context key holding the text of the error that triggered degradation.
pub const ERROR_CONTEXT_KEY: &str = "error";

/// Why coordinated execution could not be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// The project has no coordination setup at all
    ConstitutionMissing,
    /// One or more requested skills cannot be resolved
    SkillUnavailable,
    /// The system ran out of time or capacity
    ResourceExhausted,
    /// Settings are invalid
    ConfigurationError,
    /// Anything else
    GeneralFailure,
}

impl FailureMode {
    /// Maps an error onto the fallback that suits it.
    pub fn from_error(error: &CoordinationError) -> Self {
        match error.category() {
            ErrorCategory::Unavailable => Self::SkillUnavailable,
            ErrorCategory::Timeout => Self::ResourceExhausted,
            ErrorCategory::Configuration => Self::ConfigurationError,
            ErrorCategory::Structural | ErrorCategory::Task | ErrorCategory::Orchestration => {
                Self::GeneralFailure
            }
        }
    }

    /// Tag naming the strategy applied for this mode.
    pub fn strategy(self) -> &'static str {
        match self {
            Self::ConstitutionMissing => "constitution_missing_fallback",
            Self::SkillUnavailable => "skill_unavailable_fallback",
            Self::ResourceExhausted => "resource_limited_sequential",
            Self::ConfigurationError => "configuration_error_fallback",
            Self::GeneralFailure => "general_fallback",
        }
    }

    fn recommendations(self) -> Vec<String> {
        let advice: &[&str] = match self {
            Self::ConstitutionMissing => &[
                "Create PROJECT_CONSTITUTION.md to enable full coordination",
                "Add a .skillflow directory to enable caching and validation",
                "Configure a skill mapping to enable smart workflows",
            ],
            Self::SkillUnavailable => &[
                "Check skill dependencies and configuration",
                "Register the missing skills with the skill registry",
                "Verify the skill mapping configuration",
            ],
            Self::ResourceExhausted => &[
                "Increase available system resources",
                "Reduce the cost of individual skills",
                "Raise the task timeout or lower max_workers",
            ],
            Self::ConfigurationError => &[
                "Check the configuration file format",
                "Verify the skill mapping configuration",
                "Reload the configuration after fixing it",
            ],
            Self::GeneralFailure => &[
                "Check the coordination logs for the original error",
                "Retry the request once the cause is resolved",
            ],
        };
        advice.iter().map(|line| (*line).to_owned()).collect()
    }
}

impl Display for FailureMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let label = match self {
            Self::ConstitutionMissing => "constitution missing",
            Self::SkillUnavailable => "skill unavailable",
            Self::ResourceExhausted => "resource exhausted",
            Self::ConfigurationError => "configuration error",
            Self::GeneralFailure => "general failure",
        };
        f.write_str(label)
    }
}

/// Expected cost of running degraded
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    /// Little difference from coordinated execution
    Low,
    /// Noticeably reduced functionality
    Medium,
    /// Severely reduced functionality or throughput
    High,
}

/// Result of one degradation attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradationOutcome {
    /// Mode that was handled
    pub failure_mode: FailureMode,
    /// Strategy tag
    pub strategy: String,
    /// At least one skill produced a real result
    pub succeeded: bool,
    /// Expected cost of the fallback
    pub impact: Impact,
    /// One entry per request, in request order
    pub results: Vec<SkillExecution>,
    /// Skills that ran outside coordination or did not really run
    pub degraded_skills: Vec<String>,
    /// Suggested remediations
    pub recommendations: Vec<String>,
    /// Text of the triggering error, when the caller supplied one
    pub original_error: Option<String>,
}

/// How much a request's parameters are enriched before invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Enrichment {
    /// Raw request parameters only
    Minimal,
    /// Auxiliary context, no degradation context
    Isolated,
    /// Auxiliary context and degradation context
    Full,
}

/// Runs skills outside coordination when the preferred path fails
#[derive(Clone)]
pub struct GracefulDegrader {
    invoker: Arc<dyn SkillInvoker>,
    resource_delay: Duration,
}

impl GracefulDegrader {
    /// Creates a degrader with the default inter-task delay.
    pub fn new(invoker: Arc<dyn SkillInvoker>) -> Self {
        Self::from_config(invoker, &DegradationConfig::default())
    }

    /// Creates a degrader from degradation settings.
    pub fn from_config(invoker: Arc<dyn SkillInvoker>, config: &DegradationConfig) -> Self {
        Self {
            invoker,
            resource_delay: config.resource_delay(),
        }
    }

    /// Overrides the delay between skills under resource exhaustion.
    #[must_use]
    pub fn with_resource_delay(mut self, resource_delay: Duration) -> Self {
        self.resource_delay = resource_delay;
        self
    }

    /// Decides whether a call needs degrading before or after it runs.
    ///
    /// An error takes precedence, then an unconfigured project, then any
    /// requested skill the invoker cannot resolve.
    pub fn detect_degradation_need(
        &self,
        error: Option<&CoordinationError>,
        signals: &CapabilitySignals,
        requests: &[SkillRequest],
    ) -> Option<FailureMode> {
        if let Some(error) = error {
            return Some(FailureMode::from_error(error));
        }
        if signals.status() == CapabilityStatus::NotConfigured {
            return Some(FailureMode::ConstitutionMissing);
        }
        requests
            .iter()
            .any(|request| !self.invoker.is_available(request.skill_name()))
            .then_some(FailureMode::SkillUnavailable)
    }

    /// Runs every request under the fallback for `failure_mode`.
    ///
    /// Never fails: per-skill problems are captured in the outcome.
    pub async fn degrade(
        &self,
        failure_mode: FailureMode,
        requests: &[SkillRequest],
        context: &Parameters,
    ) -> DegradationOutcome {
        info!(
            "Degrading {} request(s) for {failure_mode} using {}",
            requests.len(),
            failure_mode.strategy()
        );

        let enrichment = match failure_mode {
            FailureMode::ConfigurationError => Enrichment::Minimal,
            FailureMode::ConstitutionMissing => Enrichment::Isolated,
            FailureMode::SkillUnavailable
            | FailureMode::ResourceExhausted
            | FailureMode::GeneralFailure => Enrichment::Full,
        };

        let mut results = Vec::with_capacity(requests.len());
        for (index, request) in requests.iter().enumerate() {
            if failure_mode == FailureMode::ResourceExhausted && index > 0 {
                sleep(self.resource_delay).await;
            }
            let parameters = enrich(request, enrichment, context);
            let outcome = self.invoke_or_mock(request.skill_name(), parameters).await;
            results.push(SkillExecution::new(
                request.skill_name(),
                request.task_id().map(str::to_owned),
                outcome,
            ));
        }

        let succeeded = results.iter().any(|execution| execution.outcome.is_success());
        let degraded_skills = results
            .iter()
            .filter(|execution| {
                failure_mode != FailureMode::SkillUnavailable || !execution.outcome.is_success()
            })
            .map(|execution| execution.skill_name.clone())
            .collect();
        let impact = match failure_mode {
            FailureMode::SkillUnavailable if succeeded => Impact::Low,
            FailureMode::ConstitutionMissing | FailureMode::ConfigurationError => Impact::Medium,
            FailureMode::SkillUnavailable
            | FailureMode::ResourceExhausted
            | FailureMode::GeneralFailure => Impact::High,
        };

        if !succeeded {
            warn!("Degradation for {failure_mode} produced no real results");
        }

        DegradationOutcome {
            failure_mode,
            strategy: failure_mode.strategy().to_owned(),
            succeeded,
            impact,
            results,
            degraded_skills,
            recommendations: failure_mode.recommendations(),
            original_error: context
                .get(ERROR_CONTEXT_KEY)
                .and_then(Value::as_str)
                .map(str::to_owned),
        }
    }

    /// Labeled mock when the skill cannot be resolved, otherwise a real invocation.
    async fn invoke_or_mock(&self, skill_name: &str, parameters: Parameters) -> SkillOutcome {
        if !self.invoker.is_available(skill_name) {
            debug!("Skill '{skill_name}' unavailable; substituting a mock");
            return SkillOutcome::mock(skill_name);
        }
        match self.invoker.invoke(skill_name, parameters).await {
            Ok(value) => SkillOutcome::success(value),
            Err(err) => {
                warn!("Degraded invocation of '{skill_name}' failed: {err}");
                SkillOutcome::from_core_error(&err)
            }
        }
    }
}

fn enrich(request: &SkillRequest, enrichment: Enrichment, context: &Parameters) -> Parameters {
    let mut parameters = request.parameters().clone();
    if enrichment == Enrichment::Minimal {
        return parameters;
    }
    if let Some(auxiliary) = request.auxiliary_context() {
        parameters.insert(
            AUXILIARY_CONTEXT_KEY.to_owned(),
            Value::Object(auxiliary.clone()),
        );
    }
    if enrichment == Enrichment::Full && !context.is_empty() {
        parameters.insert(
            DEGRADATION_CONTEXT_KEY.to_owned(),
            Value::Object(context.clone()),
        );
    }
    parameters
}
