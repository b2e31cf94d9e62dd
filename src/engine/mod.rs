// src/engine/mod.rs

//! Orchestration engine for buildwatch.
//!
//! This module ties together:
//! - the sequential [`runner`] that executes a list of invocations and stops
//!   at the first failure
//! - the trigger queue (what happens when changes arrive while a run is
//!   active)
//! - the watch-mode event loop that reacts to:
//!   - file changes matched to watch rules
//!   - run completion
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

pub mod batch;
pub mod core;
pub mod event_handlers;
pub mod queue;
pub mod runner;
pub mod runtime;

pub use self::core::{CoreRuntime, RuleTable};
pub use batch::TriggerBatch;
pub use event_handlers::{CoreCommand, CoreStep};
pub use queue::TriggerQueue;
pub use runner::{RunReport, Runner, StepReport};
pub use runtime::{BatchDispatcher, ReloadSender, Runtime, RunnerDispatcher};
pub use crate::types::TriggerWhileRunningBehaviour;

/// Watch rule name as declared under `[watch.<rule>]`.
pub type RuleName = String;

/// Lifecycle of one composite run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// Events flowing into the runtime from the watcher, dispatcher and signals.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    /// Watched files changed; each entry names a matched rule and its paths.
    FilesChanged(TriggerBatch),
    /// The dispatched run finished.
    RunCompleted { success: bool },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}
