//! weeklog: layered storage for weekly journal entries
//!
//! Persists small structured records keyed by ISO (year, week) across
//! multiple heterogeneous storage backends behind a single read/write
//! contract. Reads prefer the primary layer and can fall back to secondaries
//! when it fails; writes land on the primary and fan out to secondaries
//! either synchronously or through a background queue.
//!
//! ```no_run
//! use weeklog::{default_stack, SaveEntryInput, StatusIcon, WeekId};
//!
//! # async fn demo() -> weeklog::WeeklogResult<()> {
//! let repo = default_stack("weeklog.db", "backups")?;
//! let id = WeekId::new(2024, 15)?;
//! repo.save(SaveEntryInput::new(id).status_icon(StatusIcon::Good)).await?;
//! let entry = repo.get(id).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod layer;
pub mod model;
pub mod repo;
pub mod sync;

pub use error::{WeeklogError, WeeklogResult};
pub use layer::{
    DirectoryGrant, DirectoryGrantStore, GrantState, LayerDescriptor, MemoryGrantStore,
    MemoryLayer, SqliteLayer, WeeklyDataLayer, YearFileLayer,
};
pub use model::{
    iso_weeks_in_year, SaveEntryInput, StatusIcon, WeekId, WeeklyEntry, MAX_WEEK, MIN_WEEK,
};
pub use repo::builder::default_stack;
pub use repo::{LayeredRepository, RepositoryBuilder, RepositoryConfig};
pub use sync::{
    ConflictResolution, SyncConflict, SyncCoordinator, SyncEvent, SyncOutcome, SyncReport,
    SyncStatus,
};
