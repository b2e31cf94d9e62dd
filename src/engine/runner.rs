// src/engine/runner.rs

//! Sequential dispatcher: run invocations one at a time, in order, and stop
//! at the first failure.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::dag::TaskInvocation;
use crate::errors::{BuildError, Result};
use crate::exec::{ToolContext, ToolRegistry};

use super::RunState;

/// One executed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub label: String,
    pub duration: Duration,
    pub success: bool,
}

/// Outcome of a composite run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub state: RunState,
    /// Steps that were started, in order. Steps after a failure are absent.
    pub steps: Vec<StepReport>,
    pub error: Option<BuildError>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.state == RunState::Succeeded
    }

    pub fn labels(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.label.as_str()).collect()
    }

    pub fn total_duration(&self) -> Duration {
        self.steps.iter().map(|s| s.duration).sum()
    }

    pub fn into_result(self) -> Result<()> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Runner {
    registry: Arc<ToolRegistry>,
    ctx: ToolContext,
}

impl Runner {
    pub fn new(registry: Arc<ToolRegistry>, ctx: ToolContext) -> Self {
        Self { registry, ctx }
    }

    pub async fn run(&self, invocations: &[TaskInvocation]) -> RunReport {
        let mut report = RunReport {
            state: RunState::Running,
            ..RunReport::default()
        };

        for inv in invocations {
            let label = inv.label();
            println!("\nRunning \"{label}\" ({}) task", inv.task);
            info!(task = %inv.task, target = %inv.target, "running");

            let started = Instant::now();
            let result = match self.registry.get(&inv.task) {
                Some(tool) => tool.run(&self.ctx, inv).await,
                None => Err(BuildError::TaskNotFound(inv.task.clone())),
            };
            let duration = started.elapsed();

            report.steps.push(StepReport {
                label: label.clone(),
                duration,
                success: result.is_ok(),
            });

            if let Err(err) = result {
                error!(task = %label, error = %err, "task failed; aborting");
                report.state = RunState::Failed;
                report.error = Some(err);
                return report;
            }
        }

        report.state = RunState::Succeeded;
        info!(
            steps = report.steps.len(),
            elapsed_ms = report.total_duration().as_millis() as u64,
            "run finished"
        );
        report
    }
}
