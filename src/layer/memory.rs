//! In-memory storage layer
//!
//! Reference implementation of the layer contract over a plain ordered map.
//! Used by tests as a scriptable backend; also usable as a throwaway cache
//! layer in embedding contexts that do not need persistence.

use super::{LayerDescriptor, WeeklyDataLayer};
use crate::error::{WeeklogError, WeeklogResult};
use crate::model::{SaveEntryInput, WeekId, WeeklyEntry};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Default priority; below SqliteLayer, above YearFileLayer.
const DEFAULT_PRIORITY: i32 = 75;

pub struct MemoryLayer {
    descriptor: LayerDescriptor,
    entries: RwLock<BTreeMap<WeekId, WeeklyEntry>>,
}

impl MemoryLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_descriptor(LayerDescriptor::new(name, DEFAULT_PRIORITY))
    }

    /// Full control over routing metadata, for composing test topologies
    pub fn with_descriptor(descriptor: LayerDescriptor) -> Self {
        Self {
            descriptor,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Unlike the persistent backends this layer honors its capability flags,
    /// so a read-only or write-only topology can be scripted in tests.
    fn check_readable(&self) -> WeeklogResult<()> {
        if !self.descriptor.can_read {
            return Err(WeeklogError::LayerNotReadable(self.descriptor.name.clone()));
        }
        Ok(())
    }

    fn check_writable(&self) -> WeeklogResult<()> {
        if !self.descriptor.can_write {
            return Err(WeeklogError::LayerNotWritable(self.descriptor.name.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl WeeklyDataLayer for MemoryLayer {
    fn descriptor(&self) -> &LayerDescriptor {
        &self.descriptor
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn save(&self, input: SaveEntryInput) -> WeeklogResult<WeeklyEntry> {
        self.check_writable()?;
        input.week_id.validate()?;
        let mut entries = self.entries.write().await;
        let resolved = input.merge_into(entries.get(&input.week_id));
        entries.insert(input.week_id, resolved.clone());
        Ok(resolved)
    }

    async fn get(&self, id: WeekId) -> WeeklogResult<Option<WeeklyEntry>> {
        self.check_readable()?;
        id.validate()?;
        Ok(self.entries.read().await.get(&id).cloned())
    }

    async fn get_range(&self, start: WeekId, end: WeekId) -> WeeklogResult<Vec<WeeklyEntry>> {
        self.check_readable()?;
        start.validate()?;
        end.validate()?;
        // BTreeMap::range panics on an inverted range; the contract wants empty
        if end < start {
            return Ok(Vec::new());
        }
        Ok(self
            .entries
            .read()
            .await
            .range(start..=end)
            .map(|(_, entry)| entry.clone())
            .collect())
    }

    async fn delete(&self, id: WeekId) -> WeeklogResult<()> {
        self.check_writable()?;
        id.validate()?;
        self.entries.write().await.remove(&id);
        Ok(())
    }

    async fn reset(&self) {
        // No backing medium to re-acquire; nothing to do.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StatusIcon;

    fn id(year: i32, week: u8) -> WeekId {
        WeekId::new(year, week).unwrap()
    }

    #[tokio::test]
    async fn test_save_then_get_round_trip() {
        let layer = MemoryLayer::new("mem");
        let saved = layer
            .save(SaveEntryInput::new(id(2024, 15)).status_icon(StatusIcon::Good))
            .await
            .unwrap();
        assert_eq!(layer.get(id(2024, 15)).await.unwrap(), Some(saved));
    }

    #[tokio::test]
    async fn test_inverted_range_is_empty() {
        let layer = MemoryLayer::new("mem");
        layer.save(SaveEntryInput::new(id(2024, 7))).await.unwrap();
        let range = layer.get_range(id(2024, 10), id(2024, 5)).await.unwrap();
        assert!(range.is_empty());
    }

    #[tokio::test]
    async fn test_range_spans_year_boundary_in_order() {
        let layer = MemoryLayer::new("mem");
        layer.save(SaveEntryInput::new(id(2024, 1))).await.unwrap();
        layer.save(SaveEntryInput::new(id(2023, 52))).await.unwrap();
        let range = layer
            .get_range(id(2023, 52), id(2024, 1))
            .await
            .unwrap();
        let keys: Vec<WeekId> = range.iter().map(|e| e.week_id).collect();
        assert_eq!(keys, vec![id(2023, 52), id(2024, 1)]);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let layer = MemoryLayer::new("mem");
        layer.save(SaveEntryInput::new(id(2024, 3))).await.unwrap();
        layer.delete(id(2024, 3)).await.unwrap();
        layer.delete(id(2024, 3)).await.unwrap();
        assert_eq!(layer.get(id(2024, 3)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_weeks_with_data_default_method() {
        let layer = MemoryLayer::new("mem");
        layer.save(SaveEntryInput::new(id(2024, 3))).await.unwrap();
        layer.save(SaveEntryInput::new(id(2024, 40))).await.unwrap();
        layer.save(SaveEntryInput::new(id(2025, 1))).await.unwrap();
        let weeks = layer.weeks_with_data(2024).await.unwrap();
        assert_eq!(weeks.into_iter().collect::<Vec<_>>(), vec![3, 40]);
    }
}
