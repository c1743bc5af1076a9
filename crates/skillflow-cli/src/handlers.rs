//! Command handlers for CLI operations

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use skillflow_coordination::{CapabilityDetector, CapabilitySummary};
use skillflow_core::{FsProbe, SkillflowConfig, WorkflowMode};

use crate::plan::{PlanReport, WorkflowFile};

/// Load configuration from an explicit path, or from `~/.skillflow/config.toml`
///
/// An explicit path must parse. The default location falls back to built-in
/// defaults when it cannot be read or created.
///
/// # Errors
/// Returns an error if an explicitly given config file is missing or invalid
pub fn load_config(path: Option<&Path>) -> Result<SkillflowConfig> {
    if let Some(path) = path {
        return SkillflowConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()));
    }

    Ok(SkillflowConfig::load_or_create().unwrap_or_else(|error| {
        tracing::warn!("Failed to load config from ~/.skillflow/config.toml: {error}");
        tracing::warn!("Using default configuration");
        SkillflowConfig::default()
    }))
}

/// Report the coordination capabilities of a project directory
///
/// # Errors
/// Returns an error if the directory does not exist or JSON encoding fails
#[allow(clippy::print_stdout, reason = "JSON report output")]
pub fn handle_status(project: PathBuf, json: bool) -> Result<()> {
    if !project.is_dir() {
        anyhow::bail!("Project directory not found: {}", project.display());
    }

    tracing::debug!("Detecting capabilities in {}", project.display());
    let detector = CapabilityDetector::new(Arc::new(FsProbe::new(project)));
    let summary = detector.summary();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

/// Validate a workflow file and print its execution plan
///
/// # Errors
/// Returns an error if the file cannot be loaded or the workflow is invalid
#[allow(clippy::print_stdout, reason = "JSON plan output")]
pub fn handle_plan(file: &Path, default_mode: WorkflowMode, json: bool) -> Result<()> {
    let workflow = WorkflowFile::load(file)?;
    let report = workflow.plan(default_mode)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_plan(&report);
    }
    Ok(())
}

#[allow(clippy::print_stdout, reason = "Capability report output")]
fn print_summary(summary: &CapabilitySummary) {
    println!("Status: {}", summary.status);
    println!("Confidence: {:.2}", summary.confidence_score);
    println!(
        "Coordination: {}",
        if summary.coordination_recommended {
            "recommended"
        } else {
            "not recommended"
        }
    );

    if !summary.config_files.is_empty() {
        println!("\nConfiguration files:");
        for file in &summary.config_files {
            println!("  {file}");
        }
    }

    println!("\nAvailable features:");
    if summary.available_features.is_empty() {
        println!("  (none)");
    }
    for feature in &summary.available_features {
        println!("  + {feature}");
    }

    if !summary.missing_features.is_empty() {
        println!("\nMissing features:");
        for feature in &summary.missing_features {
            println!("  - {feature}");
        }
    }

    if !summary.recommendations.is_empty() {
        println!("\nRecommendations:");
        for (index, step) in summary.recommendations.iter().enumerate() {
            println!("  {}. {step}", index + 1);
        }
    }
}

#[allow(clippy::print_stdout, reason = "Plan output")]
fn print_plan(report: &PlanReport) {
    println!("Workflow: {}", report.name);
    println!("Tasks: {}", report.task_count);
    if report.declared_mode == report.effective_mode {
        println!("Mode: {}", report.effective_mode);
    } else {
        println!(
            "Mode: {} (resolved to {})",
            report.declared_mode, report.effective_mode
        );
    }
    println!(
        "Longest chain: {}, root fan-out: {}",
        report.shape.longest_chain, report.shape.max_root_fan_out
    );

    println!("\nWaves:");
    for (index, wave) in report.waves.iter().enumerate() {
        println!("  {}: {}", index + 1, wave.join(", "));
    }
}
