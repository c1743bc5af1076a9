//! Core types and traits for skill coordination.
//!
//! This crate provides the vocabulary shared by every layer of the system:
//! skill requests, the skill-invocation seam, the filesystem probe used for
//! capability detection, configuration, and error handling.

/// Configuration loading and defaults.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// Filesystem existence probes.
pub mod probe;
/// Explicit skill registry.
pub mod registry;
/// Trait definitions for skills and skill invocation.
pub mod traits;
/// Skill request and parameter types.
pub mod types;

pub use config::{DegradationConfig, DetectionConfig, ExecutionConfig, SkillflowConfig};
pub use error::{Error, Result};
pub use probe::{FileProbe, FsProbe, MemoryProbe};
pub use registry::{FnSkill, SkillRegistry};
pub use traits::{Skill, SkillInvoker};
pub use types::{Parameters, SkillRequest, WORKFLOW_CONTEXT_HINT, WorkflowMode};
