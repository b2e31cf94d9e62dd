// src/watch/watcher.rs

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;
use crate::watch::event_handler::EventProcessor;

/// Handle for the filesystem watcher.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive for
/// as long as needed. Dropping this handle will stop file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch the processor's root recursively and send
/// `RuntimeEvent::FilesChanged` for every event that matches a rule.
pub fn spawn_watcher(
    processor: EventProcessor,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle> {
    let root: PathBuf = processor.root().to_path_buf();

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    eprintln!("buildwatch: failed to forward notify event: {err}");
                }
            }
            Err(err) => {
                eprintln!("buildwatch: file watch error: {err}");
            }
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;
    info!("file watcher started on {:?}", root);

    let processor = Arc::new(Mutex::new(processor));
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if matches!(event.kind, EventKind::Access(_)) {
                continue;
            }
            debug!(?event, "received notify event");

            // Hashing reads files; keep it off the async workers.
            let processor = Arc::clone(&processor);
            let batch = tokio::task::spawn_blocking(move || match processor.lock() {
                Ok(mut p) => Some(p.process(&event.paths)),
                Err(_) => None,
            })
            .await;

            let batch = match batch {
                Ok(Some(batch)) => batch,
                Ok(None) => {
                    warn!("event processor mutex poisoned; stopping watcher loop");
                    return;
                }
                Err(err) => {
                    warn!(error = %err, "event processing task failed");
                    continue;
                }
            };
            if batch.is_empty() {
                continue;
            }

            if runtime_tx.send(RuntimeEvent::FilesChanged(batch)).await.is_err() {
                // Runtime is gone; nothing left to notify.
                break;
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}
