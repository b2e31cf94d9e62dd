// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tracing::{debug, info, warn};

use super::batch::TriggerBatch;
use super::core::RuleTable;
use super::queue::TriggerQueue;
use super::RunState;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreCommand {
    /// Run the tasks of these rules.
    StartRun(TriggerBatch),
    /// Tell LiveReload clients that these paths changed.
    Reload(Vec<String>),
    /// Request that the process exits.
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    pub(crate) fn continue_with(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }
}

/// Handle changed files.
///
/// - Rules without tasks reload right away.
/// - If a run is active, rules with tasks go to the queue.
/// - Otherwise a new run starts with the next queued run (if any) plus this
///   batch.
pub fn handle_files_changed(
    state: &mut RunState,
    current: &mut Option<TriggerBatch>,
    queue: &mut TriggerQueue,
    rules: &RuleTable,
    batch: TriggerBatch,
) -> CoreStep {
    let mut commands = Vec::new();
    let (runnable, reload_only) = batch.partition(|rule| rules.is_runnable(rule));

    let reload = reload_only.paths_where(|rule| rules.reloads(rule));
    if !reload.is_empty() {
        commands.push(CoreCommand::Reload(reload));
    }

    if runnable.is_empty() {
        return CoreStep::continue_with(commands);
    }

    if *state == RunState::Running {
        info!(rules = ?runnable.rules(), "run in progress; queueing trigger");
        queue.record(runnable);
        return CoreStep::continue_with(commands);
    }

    let mut next = queue.pop_next();
    next.merge(runnable);
    commands.push(start_run(state, current, next));
    CoreStep::continue_with(commands)
}

/// Handle the end of the active run.
///
/// A failed run is reported and watching continues; reloads are only sent
/// after a successful one.
pub fn handle_run_completed(
    state: &mut RunState,
    current: &mut Option<TriggerBatch>,
    queue: &mut TriggerQueue,
    rules: &RuleTable,
    success: bool,
) -> CoreStep {
    let mut commands = Vec::new();

    if *state != RunState::Running {
        warn!("run completion received without an active run; ignoring");
        return CoreStep::continue_with(commands);
    }

    let finished = current.take().unwrap_or_default();
    if success {
        *state = RunState::Succeeded;
        let reload = finished.paths_where(|rule| rules.reloads(rule));
        if !reload.is_empty() {
            commands.push(CoreCommand::Reload(reload));
        }
    } else {
        *state = RunState::Failed;
        warn!(rules = ?finished.rules(), "run failed; still watching");
    }

    let next = queue.pop_next();
    if !next.is_empty() {
        commands.push(start_run(state, current, next));
    }

    CoreStep::continue_with(commands)
}

fn start_run(
    state: &mut RunState,
    current: &mut Option<TriggerBatch>,
    batch: TriggerBatch,
) -> CoreCommand {
    debug!(rules = ?batch.rules(), "starting run");
    *state = RunState::Running;
    *current = Some(batch.clone());
    CoreCommand::StartRun(batch)
}
