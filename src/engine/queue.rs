// src/engine/queue.rs

use std::collections::VecDeque;

use tracing::{debug, warn};

use super::batch::TriggerBatch;
use crate::types::TriggerWhileRunningBehaviour;

/// Queue of triggers that arrive while a run is already executing.
///
/// Each queued [`TriggerBatch`] becomes one future run. `queue_length`
/// (max_runs) caps how many future runs are pending; once the cap is
/// reached, later triggers are merged into the last pending run, so no
/// change is ever lost.
#[derive(Debug)]
pub struct TriggerQueue {
    behaviour: TriggerWhileRunningBehaviour,
    max_runs: usize,
    runs: VecDeque<TriggerBatch>,
}

impl TriggerQueue {
    /// `max_runs` is clamped to at least 1.
    pub fn new(behaviour: TriggerWhileRunningBehaviour, max_runs: usize) -> Self {
        Self {
            behaviour,
            max_runs: max_runs.max(1),
            runs: VecDeque::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Record a batch that arrived while a run is in progress.
    ///
    /// - `Queue`: append as a new pending run; at `max_runs`, merge into the
    ///   last pending run instead.
    /// - `Cancel`: forget everything pending and keep only this batch.
    pub fn record(&mut self, batch: TriggerBatch) {
        if batch.is_empty() {
            return;
        }

        match self.behaviour {
            TriggerWhileRunningBehaviour::Queue => {
                if self.runs.len() < self.max_runs {
                    debug!(
                        rules = ?batch.rules(),
                        pending = self.runs.len() + 1,
                        "queued trigger as a new run"
                    );
                    self.runs.push_back(batch);
                } else if let Some(last) = self.runs.back_mut() {
                    debug!(
                        rules = ?batch.rules(),
                        max_runs = self.max_runs,
                        "queue_length reached; merged trigger into last queued run"
                    );
                    last.merge(batch);
                }
            }
            TriggerWhileRunningBehaviour::Cancel => {
                if !self.runs.is_empty() {
                    warn!(dropped = self.runs.len(), "cancel mode; discarding queued triggers");
                }
                self.runs.clear();
                self.runs.push_back(batch);
            }
        }
    }

    /// Take the next pending run, or an empty batch when nothing is queued.
    pub fn pop_next(&mut self) -> TriggerBatch {
        let next = self.runs.pop_front().unwrap_or_default();
        if !next.is_empty() {
            debug!(rules = ?next.rules(), remaining = self.runs.len(), "dequeued next run");
        }
        next
    }
}
