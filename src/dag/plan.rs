// src/dag/plan.rs

//! Resolved, ready-to-run steps.

use toml::{Table, Value};

use crate::config::FileGroup;

/// A fully resolved call of one tool for one target.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskInvocation {
    /// Tool identifier (the `[task.<tool>]` key).
    pub task: String,
    pub target: String,
    /// Task-level options deep-merged with target options.
    pub options: Table,
    pub files: Vec<FileGroup>,
    /// Tool-specific extra keys of the target.
    pub data: Table,
}

impl TaskInvocation {
    /// `<task>:<target>`, the name users address it by.
    pub fn label(&self) -> String {
        format!("{}:{}", self.task, self.target)
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.option(key).and_then(Value::as_str)
    }

    pub fn option_bool(&self, key: &str) -> bool {
        self.option(key).and_then(Value::as_bool).unwrap_or(false)
    }
}

/// Watch loop requested by a plan, optionally limited to one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchStep {
    pub rule: Option<String>,
}

/// Ordered invocations for the names requested on the command line, plus an
/// optional trailing watch loop.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionPlan {
    pub requested: Vec<String>,
    pub invocations: Vec<TaskInvocation>,
    pub watch: Option<WatchStep>,
}

impl ExecutionPlan {
    pub fn labels(&self) -> Vec<String> {
        self.invocations.iter().map(TaskInvocation::label).collect()
    }
}
