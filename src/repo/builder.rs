//! Composition root for the layered repository
//!
//! Construct the configured repository once at application start and pass it
//! by reference to consumers; there is deliberately no ambient global
//! instance to reach for.

use super::{LayeredRepository, RepositoryConfig};
use crate::error::{WeeklogError, WeeklogResult};
use crate::layer::{MemoryGrantStore, SqliteLayer, WeeklyDataLayer, YearFileLayer};
use crate::sync::SyncCoordinator;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Builds a `LayeredRepository` from a declarative configuration
pub struct RepositoryBuilder {
    primary: Arc<dyn WeeklyDataLayer>,
    secondaries: Vec<Arc<dyn WeeklyDataLayer>>,
    sync: Option<Arc<dyn SyncCoordinator>>,
    config: RepositoryConfig,
}

impl RepositoryBuilder {
    pub fn new(primary: Arc<dyn WeeklyDataLayer>) -> Self {
        Self {
            primary,
            secondaries: Vec::new(),
            sync: None,
            config: RepositoryConfig::default(),
        }
    }

    /// Add a secondary layer; ordering between secondaries is decided by
    /// their priorities at build time, not by insertion order
    pub fn secondary(mut self, layer: Arc<dyn WeeklyDataLayer>) -> Self {
        self.secondaries.push(layer);
        self
    }

    pub fn sync_coordinator(mut self, coordinator: Arc<dyn SyncCoordinator>) -> Self {
        self.sync = Some(coordinator);
        self
    }

    pub fn config(mut self, config: RepositoryConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the topology and build
    ///
    /// Must be called within a Tokio runtime (the background fan-out worker
    /// is spawned here).
    pub fn build(mut self) -> WeeklogResult<LayeredRepository> {
        if !self.primary.descriptor().can_write {
            return Err(WeeklogError::BuilderError(format!(
                "primary layer '{}' must be write-capable",
                self.primary.descriptor().name
            )));
        }

        let mut names = BTreeSet::new();
        names.insert(self.primary.descriptor().name.clone());
        for layer in &self.secondaries {
            if !names.insert(layer.descriptor().name.clone()) {
                return Err(WeeklogError::BuilderError(format!(
                    "duplicate layer name '{}'",
                    layer.descriptor().name
                )));
            }
        }

        // Fallback iterates this order; fix it once here.
        self.secondaries
            .sort_by_key(|layer| std::cmp::Reverse(layer.descriptor().priority));

        Ok(LayeredRepository::new(
            self.primary,
            self.secondaries,
            self.sync,
            self.config,
        ))
    }
}

/// The documented default stack: embedded-store primary plus year-file
/// backup in `backup_dir`, with a process-lifetime grant
pub fn default_stack(
    db_path: impl Into<PathBuf>,
    backup_dir: impl Into<PathBuf>,
) -> WeeklogResult<LayeredRepository> {
    let primary = Arc::new(SqliteLayer::open(db_path));
    let grant_store = Arc::new(MemoryGrantStore::granted(backup_dir));
    let secondary = Arc::new(YearFileLayer::new(grant_store));
    RepositoryBuilder::new(primary)
        .secondary(secondary)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{LayerDescriptor, MemoryLayer};
    use crate::model::{SaveEntryInput, WeekId};

    #[tokio::test]
    async fn test_read_only_primary_is_rejected() {
        let primary = Arc::new(MemoryLayer::with_descriptor(
            LayerDescriptor::new("primary", 100).read_only(),
        ));
        let err = RepositoryBuilder::new(primary).build().unwrap_err();
        assert!(matches!(err, WeeklogError::BuilderError(_)));
    }

    #[tokio::test]
    async fn test_duplicate_layer_names_are_rejected() {
        let primary = Arc::new(MemoryLayer::new("store"));
        let twin = Arc::new(MemoryLayer::new("store"));
        let err = RepositoryBuilder::new(primary)
            .secondary(twin)
            .build()
            .unwrap_err();
        assert!(matches!(err, WeeklogError::BuilderError(_)));
    }

    #[tokio::test]
    async fn test_fallback_respects_priority_not_insertion_order() {
        let primary = Arc::new(MemoryLayer::with_descriptor(
            LayerDescriptor::new("primary", 100).write_only(),
        ));
        let low = Arc::new(MemoryLayer::with_descriptor(LayerDescriptor::new("low", 10)));
        let high = Arc::new(MemoryLayer::with_descriptor(LayerDescriptor::new(
            "high", 90,
        )));

        let id = WeekId::new(2024, 5).unwrap();
        low.save(SaveEntryInput::new(id).achievements("low")).await.unwrap();
        high.save(SaveEntryInput::new(id).achievements("high")).await.unwrap();

        // Inserted low-priority first; the higher-priority copy must win.
        let repo = RepositoryBuilder::new(primary)
            .secondary(low)
            .secondary(high)
            .build()
            .unwrap();

        let entry = repo.get(id).await.unwrap().unwrap();
        assert_eq!(entry.achievements, "high");
    }

    #[tokio::test]
    async fn test_default_stack_round_trips() {
        let dir = tempfile::TempDir::new().unwrap();
        let repo = default_stack(
            dir.path().join("entries.db"),
            dir.path().to_path_buf(),
        )
        .unwrap();

        let id = WeekId::new(2024, 33).unwrap();
        repo.save(SaveEntryInput::new(id).achievements("stacked"))
            .await
            .unwrap();
        let entry = repo.get(id).await.unwrap().unwrap();
        assert_eq!(entry.achievements, "stacked");
    }
}
