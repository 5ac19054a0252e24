//! Per-year document-file secondary layer
//!
//! One JSON document per year, named `weeklog-<year>.json`, in a directory
//! reached through a revocable grant. Writes are read-modify-write over the
//! whole year document and replace the file atomically (write temp, then
//! rename) so a crash mid-write cannot corrupt the last known-good file.
//!
//! Range and year queries enumerate the directory and read one file per year
//! touched, so callers should scope ranges narrowly.

use super::grant::{DirectoryGrantStore, GrantState};
use super::{LayerDescriptor, WeeklyDataLayer};
use crate::error::{WeeklogError, WeeklogResult};
use crate::model::{SaveEntryInput, WeekId, WeeklyEntry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;

/// Priority of the year-file backend; below the embedded store.
pub const YEAR_FILE_PRIORITY: i32 = 50;

const FILE_PREFIX: &str = "weeklog-";
const FILE_SUFFIX: &str = ".json";

/// Serialized payload of one year file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct YearDocument {
    year: i32,
    weeks: BTreeMap<u8, WeeklyEntry>,
}

impl YearDocument {
    fn new(year: i32) -> Self {
        Self {
            year,
            weeks: BTreeMap::new(),
        }
    }
}

fn file_name(year: i32) -> String {
    format!("{FILE_PREFIX}{year:04}{FILE_SUFFIX}")
}

fn parse_year(name: &str) -> Option<i32> {
    let digits = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
    if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

pub struct YearFileLayer {
    descriptor: LayerDescriptor,
    grant_store: Arc<dyn DirectoryGrantStore>,
    // Resolved directory handle; None until the grant has been acquired
    dir: Mutex<Option<PathBuf>>,
}

impl YearFileLayer {
    pub fn new(grant_store: Arc<dyn DirectoryGrantStore>) -> Self {
        Self {
            descriptor: LayerDescriptor::new("year-files", YEAR_FILE_PRIORITY),
            grant_store,
            dir: Mutex::new(None),
        }
    }

    /// Lazy, memoized acquisition of the granted directory
    ///
    /// Concurrent first calls serialize on the lock and share one
    /// acquisition. `reset` drops the handle; the next operation lands here
    /// again and re-verifies the stored grant.
    async fn directory(&self) -> WeeklogResult<PathBuf> {
        let mut dir = self.dir.lock().await;
        if let Some(path) = dir.as_ref() {
            return Ok(path.clone());
        }
        let grant = self
            .grant_store
            .load()
            .await?
            .ok_or(WeeklogError::GrantMissing)?;
        match grant.verify().await {
            GrantState::Granted => {
                let path = grant.path().to_path_buf();
                *dir = Some(path.clone());
                Ok(path)
            }
            _ => Err(WeeklogError::GrantDenied(
                grant.path().display().to_string(),
            )),
        }
    }

    async fn read_year(&self, dir: &Path, year: i32) -> WeeklogResult<Option<YearDocument>> {
        let path = dir.join(file_name(year));
        match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|err| {
                    WeeklogError::CorruptRecord(format!("{}: {err}", path.display()))
                }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Atomic replacement: serialize to a temp file, then rename over the
    /// target, so readers never observe a partially written document.
    async fn write_year(&self, dir: &Path, doc: &YearDocument) -> WeeklogResult<()> {
        let path = dir.join(file_name(doc.year));
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(doc)?;
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Years present in the directory, ascending, clamped to [min, max]
    async fn years_in_dir(&self, dir: &Path, min: i32, max: i32) -> WeeklogResult<Vec<i32>> {
        let mut years = BTreeSet::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(year) = entry.file_name().to_str().and_then(parse_year) {
                if (min..=max).contains(&year) {
                    years.insert(year);
                }
            }
        }
        Ok(years.into_iter().collect())
    }
}

#[async_trait]
impl WeeklyDataLayer for YearFileLayer {
    fn descriptor(&self) -> &LayerDescriptor {
        &self.descriptor
    }

    /// Probes the grant itself, not the memoized handle: a directory revoked
    /// after initialization makes the layer unavailable again.
    async fn is_available(&self) -> bool {
        match self.grant_store.load().await {
            Ok(Some(grant)) => grant.verify().await == GrantState::Granted,
            _ => false,
        }
    }

    async fn save(&self, input: SaveEntryInput) -> WeeklogResult<WeeklyEntry> {
        input.week_id.validate()?;
        let dir = self.directory().await?;
        let year = input.week_id.year;

        let mut doc = self
            .read_year(&dir, year)
            .await?
            .unwrap_or_else(|| YearDocument::new(year));
        let resolved = input.merge_into(doc.weeks.get(&input.week_id.week));
        doc.weeks.insert(input.week_id.week, resolved.clone());
        self.write_year(&dir, &doc).await?;
        Ok(resolved)
    }

    async fn get(&self, id: WeekId) -> WeeklogResult<Option<WeeklyEntry>> {
        id.validate()?;
        let dir = self.directory().await?;
        Ok(self
            .read_year(&dir, id.year)
            .await?
            .and_then(|doc| doc.weeks.get(&id.week).cloned()))
    }

    async fn get_range(&self, start: WeekId, end: WeekId) -> WeeklogResult<Vec<WeeklyEntry>> {
        start.validate()?;
        end.validate()?;
        if end < start {
            return Ok(Vec::new());
        }
        let dir = self.directory().await?;

        let mut entries = Vec::new();
        for year in self.years_in_dir(&dir, start.year, end.year).await? {
            let Some(doc) = self.read_year(&dir, year).await? else {
                continue;
            };
            // BTreeMap iteration is week-ascending; years arrive ascending,
            // so the aggregate stays ordered by (year, week).
            for (week, entry) in doc.weeks {
                let key = WeekId { year, week };
                if key >= start && key <= end {
                    entries.push(entry);
                }
            }
        }
        Ok(entries)
    }

    async fn get_by_year(&self, year: i32) -> WeeklogResult<Vec<WeeklyEntry>> {
        let dir = self.directory().await?;
        Ok(self
            .read_year(&dir, year)
            .await?
            .map(|doc| doc.weeks.into_values().collect())
            .unwrap_or_default())
    }

    async fn weeks_with_data(&self, year: i32) -> WeeklogResult<BTreeSet<u8>> {
        let dir = self.directory().await?;
        Ok(self
            .read_year(&dir, year)
            .await?
            .map(|doc| doc.weeks.into_keys().collect())
            .unwrap_or_default())
    }

    async fn delete(&self, id: WeekId) -> WeeklogResult<()> {
        id.validate()?;
        let dir = self.directory().await?;

        let Some(mut doc) = self.read_year(&dir, id.year).await? else {
            // No file for that year; nothing to delete.
            return Ok(());
        };
        doc.weeks.remove(&id.week);

        if doc.weeks.is_empty() {
            // Delete the file rather than leaving an empty shell.
            let path = dir.join(file_name(id.year));
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        } else {
            self.write_year(&dir, &doc).await?;
        }
        Ok(())
    }

    async fn reset(&self) {
        *self.dir.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::grant::{DirectoryGrant, MemoryGrantStore};
    use crate::model::StatusIcon;
    use tempfile::TempDir;

    fn id(year: i32, week: u8) -> WeekId {
        WeekId::new(year, week).unwrap()
    }

    fn layer_in(dir: &TempDir) -> (YearFileLayer, Arc<MemoryGrantStore>) {
        let store = Arc::new(MemoryGrantStore::granted(dir.path()));
        (YearFileLayer::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_save_creates_year_file() {
        let dir = TempDir::new().unwrap();
        let (layer, _) = layer_in(&dir);
        layer
            .save(SaveEntryInput::new(id(2024, 15)).status_icon(StatusIcon::Good))
            .await
            .unwrap();
        assert!(dir.path().join("weeklog-2024.json").exists());
    }

    #[tokio::test]
    async fn test_missing_year_file_reads_as_no_data() {
        let dir = TempDir::new().unwrap();
        let (layer, _) = layer_in(&dir);
        assert_eq!(layer.get(id(2031, 4)).await.unwrap(), None);
        assert!(layer.get_by_year(2031).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deleting_only_week_removes_the_file() {
        let dir = TempDir::new().unwrap();
        let (layer, _) = layer_in(&dir);
        layer.save(SaveEntryInput::new(id(2024, 10))).await.unwrap();
        layer.delete(id(2024, 10)).await.unwrap();
        assert!(!dir.path().join("weeklog-2024.json").exists());
        // And again: deleting with no file present is a no-op.
        layer.delete(id(2024, 10)).await.unwrap();
    }

    #[tokio::test]
    async fn test_deleting_one_of_several_weeks_preserves_rest() {
        let dir = TempDir::new().unwrap();
        let (layer, _) = layer_in(&dir);
        layer
            .save(SaveEntryInput::new(id(2024, 10)).achievements("ten"))
            .await
            .unwrap();
        layer
            .save(SaveEntryInput::new(id(2024, 20)).achievements("twenty"))
            .await
            .unwrap();

        layer.delete(id(2024, 10)).await.unwrap();

        assert!(dir.path().join("weeklog-2024.json").exists());
        assert_eq!(layer.get(id(2024, 10)).await.unwrap(), None);
        let kept = layer.get(id(2024, 20)).await.unwrap().unwrap();
        assert_eq!(kept.achievements, "twenty");
    }

    #[tokio::test]
    async fn test_save_merges_against_own_copy() {
        let dir = TempDir::new().unwrap();
        let (layer, _) = layer_in(&dir);
        layer
            .save(
                SaveEntryInput::new(id(2024, 15))
                    .status_icon(StatusIcon::Good)
                    .achievements("A"),
            )
            .await
            .unwrap();
        let updated = layer
            .save(SaveEntryInput::new(id(2024, 15)).challenges("C"))
            .await
            .unwrap();
        assert_eq!(updated.status_icon, StatusIcon::Good);
        assert_eq!(updated.achievements, "A");
        assert_eq!(updated.challenges, "C");
    }

    #[tokio::test]
    async fn test_range_aggregates_across_year_files() {
        let dir = TempDir::new().unwrap();
        let (layer, _) = layer_in(&dir);
        for key in [id(2023, 52), id(2024, 1), id(2024, 30), id(2025, 2)] {
            layer.save(SaveEntryInput::new(key)).await.unwrap();
        }
        let range = layer.get_range(id(2023, 52), id(2024, 30)).await.unwrap();
        let keys: Vec<WeekId> = range.iter().map(|e| e.week_id).collect();
        assert_eq!(keys, vec![id(2023, 52), id(2024, 1), id(2024, 30)]);
    }

    #[tokio::test]
    async fn test_corrupt_year_file_is_a_hard_error() {
        let dir = TempDir::new().unwrap();
        let (layer, _) = layer_in(&dir);
        std::fs::write(dir.path().join("weeklog-2024.json"), b"{not json").unwrap();
        let err = layer.get(id(2024, 1)).await.unwrap_err();
        assert!(matches!(err, WeeklogError::CorruptRecord(_)));
    }

    #[tokio::test]
    async fn test_unrelated_files_are_ignored_by_range_scan() {
        let dir = TempDir::new().unwrap();
        let (layer, _) = layer_in(&dir);
        std::fs::write(dir.path().join("notes.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("weeklog-abcd.json"), b"{}").unwrap();
        layer.save(SaveEntryInput::new(id(2024, 5))).await.unwrap();
        let range = layer.get_range(id(2024, 1), id(2024, 53)).await.unwrap();
        assert_eq!(range.len(), 1);
    }

    #[tokio::test]
    async fn test_revoking_grant_flips_availability() {
        let dir = TempDir::new().unwrap();
        let (layer, store) = layer_in(&dir);
        assert!(layer.is_available().await);

        store.clear().await.unwrap();
        assert!(!layer.is_available().await);
    }

    #[tokio::test]
    async fn test_reset_reacquires_grant() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryGrantStore::new());
        let layer = YearFileLayer::new(store.clone());

        // No grant stored yet: operations fail with a capability error.
        assert!(matches!(
            layer.get(id(2024, 1)).await.unwrap_err(),
            WeeklogError::GrantMissing
        ));

        store
            .save(&DirectoryGrant::new(dir.path()))
            .await
            .unwrap();
        layer.reset().await;
        assert_eq!(layer.get(id(2024, 1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_no_temp_file_left_behind() {
        let dir = TempDir::new().unwrap();
        let (layer, _) = layer_in(&dir);
        layer.save(SaveEntryInput::new(id(2024, 8))).await.unwrap();
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
