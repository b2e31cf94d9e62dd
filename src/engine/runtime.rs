// src/engine/runtime.rs

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info};

use crate::dag::TaskGraph;
use crate::errors::Result;

use super::batch::TriggerBatch;
use super::core::CoreRuntime;
use super::runner::Runner;
use super::{CoreCommand, RuntimeEvent};

/// Channel the LiveReload server subscribes to; each message is a list of
/// changed root-relative paths.
pub type ReloadSender = broadcast::Sender<Vec<String>>;

/// Starts runs for trigger batches.
///
/// Implementations must eventually send exactly one
/// [`RuntimeEvent::RunCompleted`] per dispatched batch.
pub trait BatchDispatcher: Send {
    fn dispatch(
        &mut self,
        batch: TriggerBatch,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production dispatcher: resolves the batch's rules to invocations and runs
/// them on a spawned Tokio task with the sequential [`Runner`].
#[derive(Debug, Clone)]
pub struct RunnerDispatcher {
    graph: Arc<TaskGraph>,
    runner: Runner,
    events: mpsc::Sender<RuntimeEvent>,
}

impl RunnerDispatcher {
    pub fn new(graph: Arc<TaskGraph>, runner: Runner, events: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            graph,
            runner,
            events,
        }
    }
}

impl BatchDispatcher for RunnerDispatcher {
    fn dispatch(
        &mut self,
        batch: TriggerBatch,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let graph = Arc::clone(&self.graph);
        let runner = self.runner.clone();
        let events = self.events.clone();

        Box::pin(async move {
            for entry in batch.entries() {
                for path in entry.paths.iter() {
                    println!(">> File \"{path}\" changed.");
                }
            }

            let invocations = match graph.batch_invocations(&batch.rules()) {
                Ok(invocations) => invocations,
                Err(err) => {
                    error!(error = %err, "cannot resolve triggered rules");
                    events
                        .send(RuntimeEvent::RunCompleted { success: false })
                        .await
                        .map_err(anyhow::Error::from)?;
                    return Ok(());
                }
            };

            tokio::spawn(async move {
                let report = runner.run(&invocations).await;
                if let Some(err) = &report.error {
                    eprintln!("Warning: {err}");
                }
                if events
                    .send(RuntimeEvent::RunCompleted {
                        success: report.succeeded(),
                    })
                    .await
                    .is_err()
                {
                    debug!("runtime gone before run completion was delivered");
                }
            });
            Ok(())
        })
    }
}

/// Drives the core in response to `RuntimeEvent`s and executes the commands
/// it returns.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// runtime semantics.
pub struct Runtime<D: BatchDispatcher> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    dispatcher: D,
    reload: Option<ReloadSender>,
}

impl<D: BatchDispatcher> fmt::Debug for Runtime<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("livereload", &self.reload.is_some())
            .finish_non_exhaustive()
    }
}

impl<D: BatchDispatcher> Runtime<D> {
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        dispatcher: D,
        reload: Option<ReloadSender>,
    ) -> Self {
        Self {
            core,
            event_rx,
            dispatcher,
            reload,
        }
    }

    /// Main event loop. Returns when shutdown is requested or every event
    /// sender is gone.
    pub async fn run(mut self) -> Result<()> {
        info!("buildwatch runtime started");

        while let Some(event) = self.event_rx.recv().await {
            debug!(?event, "runtime received event");

            let step = self.core.step(event);
            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                return Ok(());
            }
        }

        info!("runtime event channel closed; exiting");
        Ok(())
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::StartRun(batch) => {
                debug!(rules = ?batch.rules(), "dispatching run");
                self.dispatcher.dispatch(batch).await?;
            }
            CoreCommand::Reload(paths) => match &self.reload {
                Some(tx) => {
                    info!(?paths, "live reload");
                    // No subscribers is fine: nobody has a page open.
                    let _ = tx.send(paths);
                }
                None => debug!(?paths, "reload requested but livereload is off"),
            },
            CoreCommand::RequestExit => {
                info!("core issued RequestExit command");
            }
        }
        Ok(())
    }
}
