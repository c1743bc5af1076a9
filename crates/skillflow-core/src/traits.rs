use async_trait::async_trait;
use serde_json::Value;

use crate::{Parameters, Result};

/// A named, parameterized operation that can be coordinated.
#[async_trait]
pub trait Skill: Send + Sync {
    /// Returns the name this skill is registered under.
    fn name(&self) -> &str;

    /// Runs the skill with the given parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the skill rejects its input or fails while running.
    async fn invoke(&self, parameters: Parameters) -> Result<Value>;
}

/// Resolves skills by name and invokes them.
///
/// Implementations must be safe to call concurrently, since parallel
/// workflows invoke several skills at once.
#[async_trait]
pub trait SkillInvoker: Send + Sync {
    /// Invokes the named skill.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownSkill`] if the name cannot be resolved,
    /// or whatever error the skill itself reports.
    async fn invoke(&self, skill_name: &str, parameters: Parameters) -> Result<Value>;

    /// Checks whether the named skill can be resolved.
    fn is_available(&self, skill_name: &str) -> bool;
}
