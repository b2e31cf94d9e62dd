use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use buildwatch::engine::{BatchDispatcher, RuntimeEvent, TriggerBatch};
use buildwatch::errors::Result;
use tokio::sync::mpsc;

/// A fake dispatcher that:
/// - records which batches were dispatched
/// - immediately reports `RunCompleted` with the configured outcome.
pub struct FakeDispatcher {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    dispatched: Arc<Mutex<Vec<TriggerBatch>>>,
    success: bool,
}

impl FakeDispatcher {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        dispatched: Arc<Mutex<Vec<TriggerBatch>>>,
    ) -> Self {
        Self {
            runtime_tx,
            dispatched,
            success: true,
        }
    }

    /// Report every run as failed.
    pub fn failing(mut self) -> Self {
        self.success = false;
        self
    }
}

impl BatchDispatcher for FakeDispatcher {
    fn dispatch(
        &mut self,
        batch: TriggerBatch,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let dispatched = Arc::clone(&self.dispatched);
        let success = self.success;

        Box::pin(async move {
            dispatched.lock().unwrap().push(batch);
            tx.send(RuntimeEvent::RunCompleted { success })
                .await
                .map_err(anyhow::Error::from)?;
            Ok(())
        })
    }
}
