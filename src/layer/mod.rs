//! Storage Layer Abstraction
//!
//! A layer is one storage backend implementing the minimal operation set for
//! weekly entries, independent of its physical medium. The orchestrating
//! repository composes layers; each layer only answers for itself.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          WeeklyDataLayer trait          │
//! │   (capability-described backend API)    │
//! └──────────────┬──────────────────────────┘
//!                │
//!        ┌───────┴────────┬─────────────────┐
//!        │                │                 │
//! ┌──────▼──────┐  ┌─────▼───────┐  ┌──────▼────────┐
//! │ SqliteLayer │  │YearFileLayer│  │ MemoryLayer   │
//! │             │  │             │  │               │
//! │- embedded   │  │- 1 file/year│  │- BTreeMap     │
//! │- primary    │  │- fallback   │  │- tests/ref    │
//! └─────────────┘  └─────────────┘  └───────────────┘
//! ```

pub mod grant;
pub mod memory;
pub mod sqlite;
pub mod yearfile;

use crate::error::WeeklogResult;
use crate::model::{SaveEntryInput, WeekId, WeeklyEntry};
use async_trait::async_trait;
use std::collections::BTreeSet;

// Re-export main types
pub use grant::{DirectoryGrant, DirectoryGrantStore, GrantState, MemoryGrantStore};
pub use memory::MemoryLayer;
pub use sqlite::SqliteLayer;
pub use yearfile::YearFileLayer;

/// Static metadata describing a storage layer
///
/// Immutable for the lifetime of a layer instance; the repository routes
/// reads and writes based on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerDescriptor {
    /// Unique layer name
    pub name: String,
    /// Higher priority = preferred (the primary carries the highest)
    pub priority: i32,
    pub can_read: bool,
    pub can_write: bool,
}

impl LayerDescriptor {
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            priority,
            can_read: true,
            can_write: true,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.can_write = false;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.can_read = false;
        self
    }
}

/// Contract every storage backend must satisfy
///
/// All operations are asynchronous and may fail with a backend-specific
/// error. The contract makes no failure recoverable on its own; recovery
/// (fallback, fan-out, sync) is the orchestrating repository's job.
///
/// Lifecycle: layers initialize lazily on first use, memoized so concurrent
/// callers share one initialization, and stay ready until `reset` drops them
/// back to uninitialized.
#[async_trait]
pub trait WeeklyDataLayer: Send + Sync {
    /// Static routing metadata
    fn descriptor(&self) -> &LayerDescriptor;

    /// Runtime availability probe
    ///
    /// Must reflect the current state of the backing medium (e.g. a granted
    /// directory that has since been revoked probes false), not just that the
    /// backend type is supported.
    async fn is_available(&self) -> bool;

    /// Create-or-update with per-layer merge semantics
    ///
    /// Unset input fields are resolved against this layer's own current copy
    /// of the record (or defaults on create). Returns the fully resolved
    /// record, never a partial.
    async fn save(&self, input: SaveEntryInput) -> WeeklogResult<WeeklyEntry>;

    /// Point lookup; absent is not an error
    async fn get(&self, id: WeekId) -> WeeklogResult<Option<WeeklyEntry>>;

    /// Inclusive range query, ascending by (year, week)
    ///
    /// An end key before the start key yields an empty sequence, not an error.
    async fn get_range(&self, start: WeekId, end: WeekId) -> WeeklogResult<Vec<WeeklyEntry>>;

    /// All entries of one ISO year, ascending by week
    async fn get_by_year(&self, year: i32) -> WeeklogResult<Vec<WeeklyEntry>> {
        self.get_range(WeekId::first_of_year(year), WeekId::last_of_year(year))
            .await
    }

    /// Existence index: week numbers with data, without loading payloads
    async fn weeks_with_data(&self, year: i32) -> WeeklogResult<BTreeSet<u8>> {
        Ok(self
            .get_by_year(year)
            .await?
            .into_iter()
            .map(|entry| entry.week_id.week)
            .collect())
    }

    /// Idempotent delete; removing an absent key is a no-op
    async fn delete(&self, id: WeekId) -> WeeklogResult<()>;

    /// Drop runtime state back to uninitialized
    ///
    /// The next operation re-initializes (e.g. re-acquires a directory grant).
    async fn reset(&self);
}
