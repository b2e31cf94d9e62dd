use std::sync::{Arc, Mutex};
use std::time::Duration;

use buildwatch::dag::TaskInvocation;
use buildwatch::errors::BuildError;
use buildwatch::exec::{Tool, ToolContext, ToolFuture};

/// Shared, ordered log of invocation labels.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// A fake tool that records each invocation label and succeeds.
#[derive(Debug, Clone)]
pub struct RecordingTool {
    log: CallLog,
    delay: Option<Duration>,
}

impl RecordingTool {
    pub fn new(log: CallLog) -> Self {
        Self { log, delay: None }
    }

    /// Sleep before returning, to keep a run "in flight".
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl Tool for RecordingTool {
    fn run<'a>(&'a self, _ctx: &'a ToolContext, inv: &'a TaskInvocation) -> ToolFuture<'a> {
        Box::pin(async move {
            self.log.lock().unwrap().push(inv.label());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(())
        })
    }
}

/// A fake tool that records each invocation label and fails.
#[derive(Debug, Clone)]
pub struct FailingTool {
    log: CallLog,
}

impl FailingTool {
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }
}

impl Tool for FailingTool {
    fn run<'a>(&'a self, _ctx: &'a ToolContext, inv: &'a TaskInvocation) -> ToolFuture<'a> {
        Box::pin(async move {
            self.log.lock().unwrap().push(inv.label());
            Err(BuildError::tool_failed(inv.label(), "simulated failure"))
        })
    }
}
