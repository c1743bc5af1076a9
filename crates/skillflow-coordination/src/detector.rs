//! Capability detection: decides whether coordinated execution is worthwhile.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use skillflow_core::FileProbe;

/// Confidence above which coordinated execution is recommended.
pub const COORDINATION_THRESHOLD: f64 = 0.30;

const MANIFEST_WEIGHT: f64 = 0.30;
const COORDINATION_DIR_WEIGHT: f64 = 0.20;
const SKILL_MAPPING_WEIGHT: f64 = 0.25;
const CACHE_WEIGHT: f64 = 0.15;
const HOOKS_WEIGHT: f64 = 0.10;

const MANIFEST_PATHS: &[&str] = &[
    "PROJECT_CONSTITUTION.md",
    "project_constitution.md",
    "PROJECT_SPEC.json",
    "project_spec.json",
];
const COORDINATION_DIR_PATHS: &[&str] = &[".skillflow"];
const SKILL_MAPPING_PATHS: &[&str] = &[
    ".skillflow/skills_mapping.json",
    "skills_mapping.json",
    ".skillflow/coordination_config.json",
    "coordination_config.json",
];
const CACHE_PATHS: &[&str] = &[".skillflow/cache", ".skillflow/staging", ".skillflow/meta"];
const HOOK_PATHS: &[&str] = &[".skillflow/hooks", ".git/hooks/skillflow-pre-commit"];

const CONFIG_FILES: &[&str] = &[
    "PROJECT_CONSTITUTION.md",
    "PROJECT_SPEC.json",
    ".skillflow/skills_mapping.json",
    ".skillflow/coordination_config.json",
    ".skillflow/cache_config.json",
    ".skillflow/hooks.json",
];

const ALL_FEATURES: &[&str] = &[
    "project_manifest",
    "coordination_directory",
    "skill_mapping",
    "unified_execution",
    "skill_coordination",
    "cache_management",
    "file_validation",
    "staging_workflow",
    "hook_registration",
    "automated_validation",
    "commit_enforcement",
];

/// Coarse configuration level of a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityStatus {
    /// No signal present
    NotConfigured,
    /// One signal present
    Minimal,
    /// Two or three signals present
    Partial,
    /// Four or more signals present
    Full,
}

impl Display for CapabilityStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let label = match self {
            Self::NotConfigured => "not configured",
            Self::Minimal => "minimal",
            Self::Partial => "partial",
            Self::Full => "full",
        };
        f.write_str(label)
    }
}

/// Environment signals observed by one detection pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(
    clippy::struct_excessive_bools,
    reason = "Each flag is an independent environment signal"
)]
pub struct CapabilitySignals {
    /// A project manifest exists
    pub manifest: bool,
    /// The coordination directory exists
    pub coordination_dir: bool,
    /// A skill-mapping registry exists
    pub skill_mapping: bool,
    /// A cache subsystem is set up
    pub cache: bool,
    /// Hooks are registered
    pub hooks: bool,
}

impl CapabilitySignals {
    /// Weighted sum of the present signals, rounded to two decimals.
    pub fn confidence_score(&self) -> f64 {
        let weighted = [
            (self.manifest, MANIFEST_WEIGHT),
            (self.coordination_dir, COORDINATION_DIR_WEIGHT),
            (self.skill_mapping, SKILL_MAPPING_WEIGHT),
            (self.cache, CACHE_WEIGHT),
            (self.hooks, HOOKS_WEIGHT),
        ];
        let score: f64 = weighted
            .iter()
            .filter(|(present, _)| *present)
            .map(|(_, weight)| weight)
            .sum();
        (score * 100.0).round() / 100.0
    }

    /// Number of signals present.
    pub fn present_count(&self) -> usize {
        [
            self.manifest,
            self.coordination_dir,
            self.skill_mapping,
            self.cache,
            self.hooks,
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }

    /// Coarse status derived from how many signals are present.
    pub fn status(&self) -> CapabilityStatus {
        match self.present_count() {
            0 => CapabilityStatus::NotConfigured,
            1 => CapabilityStatus::Minimal,
            2 | 3 => CapabilityStatus::Partial,
            _ => CapabilityStatus::Full,
        }
    }

    /// Whether coordinated execution is recommended.
    pub fn should_coordinate(&self) -> bool {
        self.confidence_score() > COORDINATION_THRESHOLD
    }

    /// Coordination features enabled by the present signals.
    pub fn features(&self) -> Vec<&'static str> {
        let mut features = Vec::new();
        if self.manifest {
            features.push("project_manifest");
        }
        if self.coordination_dir {
            features.push("coordination_directory");
        }
        if self.skill_mapping {
            features.extend(["skill_mapping", "unified_execution", "skill_coordination"]);
        }
        if self.cache {
            features.extend(["cache_management", "file_validation", "staging_workflow"]);
        }
        if self.hooks {
            features.extend([
                "hook_registration",
                "automated_validation",
                "commit_enforcement",
            ]);
        }
        features
    }

    /// Coordination features that are still missing.
    pub fn missing_features(&self) -> Vec<&'static str> {
        let present = self.features();
        ALL_FEATURES
            .iter()
            .copied()
            .filter(|feature| !present.contains(feature))
            .collect()
    }

    /// Ordered next steps for the current status.
    pub fn recommendations(&self) -> Vec<String> {
        let steps: &[&str] = match self.status() {
            CapabilityStatus::NotConfigured => &[
                "Create a project manifest (PROJECT_CONSTITUTION.md) defining collaboration rules",
                "Initialise the .skillflow coordination directory",
                "Configure the skill mapping registry to enable unified execution",
            ],
            CapabilityStatus::Minimal => &[
                "Complete the project manifest",
                "Enable the cache subsystem and file validation",
                "Register hooks for automated validation",
            ],
            CapabilityStatus::Partial => &[
                "Fill in the missing coordination features",
                "Refine the skill mapping configuration",
                "Complete the cache and validation workflow",
            ],
            CapabilityStatus::Full => &[],
        };
        steps.iter().map(|step| (*step).to_owned()).collect()
    }
}

/// Serializable report of one detection pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySummary {
    /// Coarse status
    pub status: CapabilityStatus,
    /// Weighted confidence
    pub confidence_score: f64,
    /// Whether coordination is recommended
    pub coordination_recommended: bool,
    /// Raw signals
    pub signals: CapabilitySignals,
    /// Enabled features
    pub available_features: Vec<String>,
    /// Missing features
    pub missing_features: Vec<String>,
    /// Known configuration files that exist
    pub config_files: Vec<String>,
    /// Next steps
    pub recommendations: Vec<String>,
}

/// Inspects the project environment through a [`FileProbe`]
#[derive(Clone)]
pub struct CapabilityDetector {
    probe: Arc<dyn FileProbe>,
}

impl CapabilityDetector {
    /// Creates a detector over the given probe.
    pub fn new(probe: Arc<dyn FileProbe>) -> Self {
        Self { probe }
    }

    /// Probes every signal. Never cached: the environment may change between calls.
    pub fn detect(&self) -> CapabilitySignals {
        let signals = CapabilitySignals {
            manifest: self.any_exists(MANIFEST_PATHS),
            coordination_dir: self.any_exists(COORDINATION_DIR_PATHS),
            skill_mapping: self.any_exists(SKILL_MAPPING_PATHS),
            cache: self.any_exists(CACHE_PATHS),
            hooks: self.any_exists(HOOK_PATHS),
        };

        tracing::debug!(
            "Capability detection: status={} score={:.2}",
            signals.status(),
            signals.confidence_score()
        );
        signals
    }

    /// Detects and applies the coordination threshold.
    pub fn should_coordinate(&self) -> bool {
        self.detect().should_coordinate()
    }

    /// Next steps for the current environment.
    pub fn recommendations(&self) -> Vec<String> {
        self.detect().recommendations()
    }

    /// Known configuration files present in the project.
    pub fn config_files(&self) -> Vec<String> {
        CONFIG_FILES
            .iter()
            .filter(|path| self.probe.exists(Path::new(path)))
            .map(|path| (*path).to_owned())
            .collect()
    }

    /// Full report for display or logging.
    pub fn summary(&self) -> CapabilitySummary {
        let signals = self.detect();
        CapabilitySummary {
            status: signals.status(),
            confidence_score: signals.confidence_score(),
            coordination_recommended: signals.should_coordinate(),
            signals,
            available_features: signals.features().into_iter().map(str::to_owned).collect(),
            missing_features: signals
                .missing_features()
                .into_iter()
                .map(str::to_owned)
                .collect(),
            config_files: self.config_files(),
            recommendations: signals.recommendations(),
        }
    }

    fn any_exists(&self, candidates: &[&str]) -> bool {
        candidates
            .iter()
            .any(|candidate| self.probe.exists(Path::new(candidate)))
    }
}
