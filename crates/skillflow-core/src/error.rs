use core::result::Result as CoreResult;
use std::io::Error as IoError;

use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use toml::de::Error as TomlError;
use toml::ser::Error as TomlSerializeError;

/// Result type for core operations.
pub type Result<T> = CoreResult<T, Error>;

/// Errors that can occur in the core library.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] SerdeJsonError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),

    /// TOML serialization failed.
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] TomlSerializeError),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A skill request was malformed.
    #[error("Invalid skill request: {0}")]
    InvalidRequest(String),

    /// No skill is registered under the given name.
    #[error("Unknown skill: {0}")]
    UnknownSkill(String),

    /// A skill ran and reported a failure.
    #[error("Skill '{skill}' failed: {message}")]
    Invocation {
        /// Name of the failing skill
        skill: String,
        /// Failure message reported by the skill
        message: String,
    },

    /// A general error not covered by other variants.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Builds an invocation failure for the named skill.
    pub fn invocation<S: Into<String>, M: Into<String>>(skill: S, message: M) -> Self {
        Self::Invocation {
            skill: skill.into(),
            message: message.into(),
        }
    }

    /// Whether this error means the skill could not be resolved at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::UnknownSkill(_))
    }

    /// Whether this error originates from configuration loading or validation.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Toml(_) | Self::TomlSerialize(_))
    }
}
