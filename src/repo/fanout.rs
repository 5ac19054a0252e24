//! Background fan-out queue
//!
//! Fire-and-forget propagation of writes to secondary layers goes through an
//! explicit bounded queue drained by one dedicated worker task, instead of
//! detached unawaited calls. Failures stay swallowed (secondaries are
//! best-effort) but every one of them is logged where metrics hooks can see
//! it.

use crate::layer::WeeklyDataLayer;
use crate::model::{SaveEntryInput, WeekId, WeeklyEntry};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Jobs queued for propagation to secondary layers
#[derive(Debug, Clone)]
pub(crate) enum FanoutJob {
    /// Carries the record as resolved by the primary, so secondaries land on
    /// the same values no matter what their own copy looked like
    Save(WeeklyEntry),
    Delete(WeekId),
}

const QUEUE_CAPACITY: usize = 256;

pub(crate) struct FanoutWorker {
    tx: mpsc::Sender<FanoutJob>,
    handle: JoinHandle<()>,
}

impl FanoutWorker {
    /// Spawn the worker over the write-capable secondaries
    pub(crate) fn spawn(secondaries: Vec<Arc<dyn WeeklyDataLayer>>) -> Self {
        let (tx, mut rx) = mpsc::channel(QUEUE_CAPACITY);
        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                apply(&secondaries, job).await;
            }
            debug!("fan-out queue closed, worker exiting");
        });
        Self { tx, handle }
    }

    /// Non-blocking enqueue; a saturated queue drops the job with a warning
    /// rather than stalling the caller
    pub(crate) fn enqueue(&self, job: FanoutJob) {
        if let Err(err) = self.tx.try_send(job) {
            warn!(error = %err, "fan-out queue rejected job");
        }
    }

    /// Close the queue and wait for queued jobs to drain
    pub(crate) async fn shutdown(self) {
        drop(self.tx);
        if let Err(err) = self.handle.await {
            warn!(error = %err, "fan-out worker did not shut down cleanly");
        }
    }
}

async fn apply(secondaries: &[Arc<dyn WeeklyDataLayer>], job: FanoutJob) {
    for layer in secondaries {
        let name = layer.descriptor().name.as_str();
        let result = match &job {
            FanoutJob::Save(entry) => layer
                .save(SaveEntryInput::from(entry.clone()))
                .await
                .map(|_| ()),
            FanoutJob::Delete(id) => layer.delete(*id).await,
        };
        if let Err(err) = result {
            warn!(layer = name, error = %err, "background fan-out failed");
        }
    }
}
