//! Sync coordination contract
//!
//! The repository consumes a coordinator that reconciles diverging layer
//! copies; the engine itself lives outside this crate. The contract carries
//! enough context on conflict (both versions plus their modification
//! timestamps) for a resolver to apply the configured strategy.

use crate::error::WeeklogResult;
use crate::model::{WeekId, WeeklyEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;

/// Strategy a coordinator must honor when two copies of a key diverge
///
/// Declared-but-unimplemented policy surface: the repository threads it
/// through configuration and never arbitrates conflicts itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictResolution {
    LocalWins,
    RemoteWins,
    #[default]
    LastWriteWins,
    Manual,
}

/// Both sides of a diverged key
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConflict {
    pub local: WeeklyEntry,
    pub remote: WeeklyEntry,
    pub local_modified: DateTime<Utc>,
    pub remote_modified: DateTime<Utc>,
}

/// Outcome of syncing one key
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SyncOutcome {
    Synced,
    Skipped,
    Conflict(SyncConflict),
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub week_id: WeekId,
    pub outcome: SyncOutcome,
}

/// Coordinator's current view of one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
    InSync,
    Pending,
    Conflicted,
    Unknown,
}

/// Events a coordinator publishes while working
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SyncEvent {
    Started {
        timestamp: DateTime<Utc>,
    },
    ItemSynced {
        week_id: WeekId,
        timestamp: DateTime<Utc>,
    },
    ConflictDetected {
        week_id: WeekId,
        timestamp: DateTime<Utc>,
    },
    Failed {
        week_id: Option<WeekId>,
        error: String,
        timestamp: DateTime<Utc>,
    },
    Stopped {
        timestamp: DateTime<Utc>,
    },
}

/// Reconciles layer copies of weekly entries
///
/// Consumed by the repository: read paths fire non-blocking sync hints at it,
/// and callers may drive full or ranged passes directly. Implementations run
/// outside this crate.
#[async_trait]
pub trait SyncCoordinator: Send + Sync {
    /// Reconcile a single key across layers
    async fn sync_item(&self, id: WeekId) -> WeeklogResult<SyncReport>;

    /// Reconcile every key in an inclusive range
    async fn sync_range(&self, start: WeekId, end: WeekId) -> WeeklogResult<Vec<SyncReport>>;

    /// Reconcile everything
    async fn sync_all(&self) -> WeeklogResult<Vec<SyncReport>>;

    /// Begin periodic background reconciliation
    async fn start_background_sync(&self, interval: Duration) -> WeeklogResult<()>;

    async fn stop_background_sync(&self);

    async fn sync_status(&self, id: WeekId) -> WeeklogResult<SyncStatus>;

    /// Subscribe to sync events; dropping the receiver unsubscribes
    fn subscribe(&self) -> broadcast::Receiver<SyncEvent>;
}
