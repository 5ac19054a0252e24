//! Orchestrating Repository
//!
//! Composes one primary layer and zero-or-more secondary layers into a single
//! read/write contract, with configurable failure fallback and write fan-out.
//!
//! # Data flow
//!
//! ```text
//! caller ──▶ LayeredRepository ──▶ primary layer (always first)
//!                 │                    │ on write success
//!                 │                    ▼
//!                 │              fan-out to secondaries
//!                 │              (awaited or queued, per config)
//!                 │ on primary read failure + fallback_on_error
//!                 ▼
//!           secondaries in priority order, best-effort
//!           re-seed of the primary on a fallback hit
//! ```

pub mod builder;
pub(crate) mod fanout;

pub use builder::RepositoryBuilder;

use crate::error::WeeklogResult;
use crate::layer::WeeklyDataLayer;
use crate::model::{SaveEntryInput, WeekId, WeeklyEntry};
use crate::sync::{ConflictResolution, SyncCoordinator};
use fanout::{FanoutJob, FanoutWorker};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Declarative repository configuration
///
/// `sync_writes_immediately` is the central latency/consistency tradeoff:
/// immediate mode holds `save` open until every secondary settles, background
/// mode returns as soon as the primary commits and lets secondaries lag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryConfig {
    /// Strategy handed to the sync coordinator; never applied by the
    /// repository itself
    pub conflict_resolution: ConflictResolution,
    pub sync_writes_immediately: bool,
    pub fallback_on_error: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            conflict_resolution: ConflictResolution::default(),
            sync_writes_immediately: false,
            fallback_on_error: true,
        }
    }
}

/// Single repository contract over a stack of storage layers
pub struct LayeredRepository {
    primary: Arc<dyn WeeklyDataLayer>,
    /// Sorted descending by priority at build time
    secondaries: Vec<Arc<dyn WeeklyDataLayer>>,
    sync: Option<Arc<dyn SyncCoordinator>>,
    config: RepositoryConfig,
    fanout: FanoutWorker,
}

impl std::fmt::Debug for LayeredRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayeredRepository")
            .field("primary", &self.primary.descriptor().name)
            .field("secondaries", &self.secondaries.len())
            .field("has_sync", &self.sync.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl LayeredRepository {
    pub(crate) fn new(
        primary: Arc<dyn WeeklyDataLayer>,
        secondaries: Vec<Arc<dyn WeeklyDataLayer>>,
        sync: Option<Arc<dyn SyncCoordinator>>,
        config: RepositoryConfig,
    ) -> Self {
        let writable: Vec<_> = secondaries
            .iter()
            .filter(|layer| layer.descriptor().can_write)
            .cloned()
            .collect();
        Self {
            primary,
            secondaries,
            sync,
            config,
            fanout: FanoutWorker::spawn(writable),
        }
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Strategy the configured sync coordinator is expected to honor
    pub fn conflict_resolution(&self) -> ConflictResolution {
        self.config.conflict_resolution
    }

    /// Create-or-update; the primary's resolved record is the return value
    /// regardless of what secondary layers later do with the fan-out.
    pub async fn save(&self, input: SaveEntryInput) -> WeeklogResult<WeeklyEntry> {
        let resolved = self.primary.save(input).await?;
        self.fan_out_save(&resolved).await;
        Ok(resolved)
    }

    /// Point lookup, primary first, falling back per configuration
    pub async fn get(&self, id: WeekId) -> WeeklogResult<Option<WeeklyEntry>> {
        match self.primary.get(id).await {
            Ok(found) => {
                self.hint_sync_item(id);
                Ok(found)
            }
            Err(err) if self.config.fallback_on_error => {
                self.log_primary_failure("get", &err);
                for layer in self.readable_secondaries().await {
                    match layer.get(id).await {
                        Ok(Some(entry)) => {
                            self.repair_primary(&entry).await;
                            return Ok(Some(entry));
                        }
                        Ok(None) => {}
                        Err(err) => self.log_fallback_failure(layer.as_ref(), &err),
                    }
                }
                // Fallback exhausted: absent, not a synthesized failure.
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Inclusive range query; fallback returns the first non-empty secondary
    /// result
    pub async fn get_range(
        &self,
        start: WeekId,
        end: WeekId,
    ) -> WeeklogResult<Vec<WeeklyEntry>> {
        match self.primary.get_range(start, end).await {
            Ok(entries) => {
                self.hint_sync_range(start, end);
                Ok(entries)
            }
            Err(err) if self.config.fallback_on_error => {
                self.log_primary_failure("get_range", &err);
                for layer in self.readable_secondaries().await {
                    match layer.get_range(start, end).await {
                        Ok(entries) if !entries.is_empty() => return Ok(entries),
                        Ok(_) => {}
                        Err(err) => self.log_fallback_failure(layer.as_ref(), &err),
                    }
                }
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    pub async fn get_by_year(&self, year: i32) -> WeeklogResult<Vec<WeeklyEntry>> {
        match self.primary.get_by_year(year).await {
            Ok(entries) => {
                self.hint_sync_range(WeekId::first_of_year(year), WeekId::last_of_year(year));
                Ok(entries)
            }
            Err(err) if self.config.fallback_on_error => {
                self.log_primary_failure("get_by_year", &err);
                for layer in self.readable_secondaries().await {
                    match layer.get_by_year(year).await {
                        Ok(entries) if !entries.is_empty() => return Ok(entries),
                        Ok(_) => {}
                        Err(err) => self.log_fallback_failure(layer.as_ref(), &err),
                    }
                }
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    /// Existence index for sparse-calendar views
    pub async fn weeks_with_data(&self, year: i32) -> WeeklogResult<BTreeSet<u8>> {
        match self.primary.weeks_with_data(year).await {
            Ok(weeks) => {
                self.hint_sync_range(WeekId::first_of_year(year), WeekId::last_of_year(year));
                Ok(weeks)
            }
            Err(err) if self.config.fallback_on_error => {
                self.log_primary_failure("weeks_with_data", &err);
                for layer in self.readable_secondaries().await {
                    match layer.weeks_with_data(year).await {
                        Ok(weeks) if !weeks.is_empty() => return Ok(weeks),
                        Ok(_) => {}
                        Err(err) => self.log_fallback_failure(layer.as_ref(), &err),
                    }
                }
                Ok(BTreeSet::new())
            }
            Err(err) => Err(err),
        }
    }

    /// Idempotent delete, fanned out under the same policy as writes
    pub async fn delete(&self, id: WeekId) -> WeeklogResult<()> {
        self.primary.delete(id).await?;
        self.fan_out_delete(id).await;
        Ok(())
    }

    /// Close the fan-out queue and wait for queued background writes to drain
    pub async fn shutdown(self) {
        self.fanout.shutdown().await;
    }

    // ------------------------------------------------------------------
    // Write fan-out
    // ------------------------------------------------------------------

    async fn fan_out_save(&self, resolved: &WeeklyEntry) {
        if self.config.sync_writes_immediately {
            // All-settled: one secondary's failure neither blocks nor fails
            // the others, and never the caller.
            let saves = self.writable_secondaries().map(|layer| {
                let input = SaveEntryInput::from(resolved.clone());
                async move {
                    (
                        layer.descriptor().name.clone(),
                        layer.save(input).await.map(|_| ()),
                    )
                }
            });
            for (name, result) in join_all(saves).await {
                if let Err(err) = result {
                    warn!(layer = %name, error = %err, "secondary save failed");
                }
            }
        } else {
            self.fanout.enqueue(FanoutJob::Save(resolved.clone()));
        }
    }

    async fn fan_out_delete(&self, id: WeekId) {
        if self.config.sync_writes_immediately {
            let deletes = self.writable_secondaries().map(|layer| async move {
                (layer.descriptor().name.clone(), layer.delete(id).await)
            });
            for (name, result) in join_all(deletes).await {
                if let Err(err) = result {
                    warn!(layer = %name, error = %err, "secondary delete failed");
                }
            }
        } else {
            self.fanout.enqueue(FanoutJob::Delete(id));
        }
    }

    // ------------------------------------------------------------------
    // Fallback plumbing
    // ------------------------------------------------------------------

    /// Read-capable secondaries that currently probe available, in the
    /// priority order fixed at build time
    async fn readable_secondaries(&self) -> Vec<&Arc<dyn WeeklyDataLayer>> {
        let mut layers = Vec::new();
        for layer in &self.secondaries {
            if layer.descriptor().can_read && layer.is_available().await {
                layers.push(layer);
            }
        }
        layers
    }

    fn writable_secondaries(&self) -> impl Iterator<Item = &Arc<dyn WeeklyDataLayer>> {
        self.secondaries
            .iter()
            .filter(|layer| layer.descriptor().can_write)
    }

    /// Best-effort re-seed of the primary after a fallback hit
    async fn repair_primary(&self, entry: &WeeklyEntry) {
        match self.primary.save(SaveEntryInput::from(entry.clone())).await {
            Ok(_) => debug!(week = %entry.week_id, "re-seeded primary from fallback read"),
            Err(err) => warn!(error = %err, "primary re-seed failed"),
        }
    }

    fn log_primary_failure(&self, operation: &str, err: &crate::error::WeeklogError) {
        warn!(
            layer = %self.primary.descriptor().name,
            operation,
            error = %err,
            "primary read failed, trying fallback layers"
        );
    }

    fn log_fallback_failure(&self, layer: &dyn WeeklyDataLayer, err: &crate::error::WeeklogError) {
        warn!(layer = %layer.descriptor().name, error = %err, "fallback read failed");
    }

    // ------------------------------------------------------------------
    // Background sync hints
    // ------------------------------------------------------------------

    /// Non-blocking: reads are never slowed or failed by sync
    fn hint_sync_item(&self, id: WeekId) {
        if let Some(sync) = &self.sync {
            let sync = Arc::clone(sync);
            tokio::spawn(async move {
                if let Err(err) = sync.sync_item(id).await {
                    debug!(week = %id, error = %err, "background item sync failed");
                }
            });
        }
    }

    fn hint_sync_range(&self, start: WeekId, end: WeekId) {
        if let Some(sync) = &self.sync {
            let sync = Arc::clone(sync);
            tokio::spawn(async move {
                if let Err(err) = sync.sync_range(start, end).await {
                    debug!(%start, %end, error = %err, "background range sync failed");
                }
            });
        }
    }
}
