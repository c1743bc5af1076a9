//! Skill registry for resolving skills by name.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::{Error, Parameters, Result, Skill, SkillInvoker};

/// Adapts an async closure into a [`Skill`].
pub struct FnSkill<F> {
    name: String,
    func: F,
}

impl<F> FnSkill<F> {
    /// Wraps `func` under the given skill name.
    pub fn new<T: Into<String>>(name: T, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl<F, Fut> Skill for FnSkill<F>
where
    F: Fn(Parameters) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, parameters: Parameters) -> Result<Value> {
        (self.func)(parameters).await
    }
}

/// Explicit name-to-skill mapping, populated at startup by the host
#[derive(Clone, Default)]
pub struct SkillRegistry {
    skills: HashMap<String, Arc<dyn Skill>>,
}

impl SkillRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a skill under its own name, replacing any previous entry
    #[must_use]
    pub fn with_skill(mut self, skill: Arc<dyn Skill>) -> Self {
        self.register(skill);
        self
    }

    /// Register an async closure as a skill
    #[must_use]
    pub fn with_fn<T, F, Fut>(self, name: T, func: F) -> Self
    where
        T: Into<String>,
        F: Fn(Parameters) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.with_skill(Arc::new(FnSkill::new(name, func)))
    }

    /// Register a skill in place
    pub fn register(&mut self, skill: Arc<dyn Skill>) {
        let name = skill.name().to_owned();
        if self.skills.insert(name.clone(), skill).is_some() {
            tracing::debug!("Replaced skill registration for '{name}'");
        }
    }

    /// Get a skill by name, if it exists
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Skill>> {
        self.skills.get(name).cloned()
    }

    /// Registered skill names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.skills.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Get number of registered skills
    #[must_use]
    pub fn len(&self) -> usize {
        self.skills.len()
    }

    /// Check if registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

impl Debug for SkillRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("SkillRegistry")
            .field("skills", &self.names())
            .finish()
    }
}

#[async_trait]
impl SkillInvoker for SkillRegistry {
    async fn invoke(&self, skill_name: &str, parameters: Parameters) -> Result<Value> {
        let skill = self
            .get(skill_name)
            .ok_or_else(|| Error::UnknownSkill(skill_name.to_owned()))?;
        skill.invoke(parameters).await
    }

    fn is_available(&self, skill_name: &str) -> bool {
        self.skills.contains_key(skill_name)
    }
}
