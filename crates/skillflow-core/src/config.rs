//! Configuration types for execution, degradation, and capability detection.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, WorkflowMode};

/// Complete skillflow configuration.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillflowConfig {
    /// Workflow execution settings
    pub execution: ExecutionConfig,
    /// Fallback behaviour settings
    pub degradation: DegradationConfig,
    /// Capability detection settings
    pub detection: DetectionConfig,
}

/// Workflow execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Size of the worker pool used by parallel waves
    pub max_workers: usize,
    /// Per-task timeout in seconds
    pub task_timeout_seconds: u64,
    /// Mode used when the executor coordinates a batch
    pub default_mode: WorkflowMode,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            task_timeout_seconds: 300,
            default_mode: WorkflowMode::Adaptive,
        }
    }
}

impl ExecutionConfig {
    /// Per-task timeout as a duration.
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_seconds)
    }

    /// Check that the worker pool and timeout can actually run tasks
    ///
    /// # Errors
    /// Returns [`Error::Config`] for an empty worker pool or a zero timeout
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(Error::Config(
                "execution.max_workers must be at least 1".to_owned(),
            ));
        }
        if self.task_timeout_seconds == 0 {
            return Err(Error::Config(
                "execution.task_timeout_seconds must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Fallback behaviour settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DegradationConfig {
    /// Pause between skills when resources are exhausted, in milliseconds
    pub resource_delay_ms: u64,
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            resource_delay_ms: 500,
        }
    }
}

impl DegradationConfig {
    /// Inter-task delay as a duration.
    pub fn resource_delay(&self) -> Duration {
        Duration::from_millis(self.resource_delay_ms)
    }
}

/// Capability detection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Project root the filesystem probe resolves against
    pub project_root: PathBuf,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
        }
    }
}

impl SkillflowConfig {
    /// Get the default config directory path (`~/.skillflow`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_dir() -> Result<PathBuf> {
        use dirs::home_dir;
        let home = home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_owned()))?;
        Ok(home.join(".skillflow"))
    }

    /// Get the default config file path (`~/.skillflow/config.toml`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from the default location, creating it with defaults if missing
    ///
    /// # Errors
    /// Returns an error if the config cannot be read or created
    pub fn load_or_create() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            let config = Self::default();
            config.save_to_file(&config_path)?;
            Ok(config)
        }
    }

    /// Load config from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or fails validation
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        let header = "# Skillflow Configuration File\n\
                      # This file is automatically generated on first run\n\
                      # Edit this file to customize your settings\n\n";

        fs::write(path, format!("{header}{contents}"))?;
        tracing::debug!("Wrote configuration to {}", path.display());
        Ok(())
    }

    /// Reject settings the scheduler cannot run with
    ///
    /// # Errors
    /// Returns an error if the worker pool is empty or the task timeout is zero
    pub fn validate(&self) -> Result<()> {
        self.execution.validate()
    }
}
