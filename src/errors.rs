// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Cycle detected in aliases: {0}")]
    AliasCycle(String),

    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Task \"{task}\" failed: {reason}")]
    ToolFailed { task: String, reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BuildError {
    pub fn config(msg: impl Into<String>) -> Self {
        BuildError::ConfigError(msg.into())
    }

    pub fn tool_failed(task: impl Into<String>, reason: impl Into<String>) -> Self {
        BuildError::ToolFailed {
            task: task.into(),
            reason: reason.into(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildError>;
