//! Directory capability model
//!
//! The year-file layer reaches its directory through a revocable grant: an
//! opaque capability handle owned by the settings layer and lent to storage.
//! Grants are persisted across sessions by a `DirectoryGrantStore` and must be
//! re-verified before trust; a stored grant says nothing about whether the
//! user has since revoked access.

use crate::error::WeeklogResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Current permission state of a grant
///
/// `Unchecked` is the state of a freshly loaded grant before verification;
/// callers must not treat it as granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantState {
    Granted,
    Denied,
    Unchecked,
}

/// A user-granted, revocable handle to a directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryGrant {
    path: PathBuf,
}

impl DirectoryGrant {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Probe the grant's current validity
    ///
    /// The directory must exist and be writable right now; a grant that was
    /// valid last session can come back `Denied`.
    pub async fn verify(&self) -> GrantState {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) if meta.is_dir() && !meta.permissions().readonly() => GrantState::Granted,
            Ok(_) => GrantState::Denied,
            Err(_) => GrantState::Denied,
        }
    }
}

/// Persists the directory grant across sessions
///
/// Consumed collaborator: the year-file layer loads the grant from here on
/// initialization instead of re-prompting every session.
#[async_trait]
pub trait DirectoryGrantStore: Send + Sync {
    async fn save(&self, grant: &DirectoryGrant) -> WeeklogResult<()>;

    async fn load(&self) -> WeeklogResult<Option<DirectoryGrant>>;

    async fn clear(&self) -> WeeklogResult<()>;
}

/// Process-lifetime grant store
///
/// Default store for embedding contexts without their own settings
/// persistence, and the scriptable store used by tests.
#[derive(Default)]
pub struct MemoryGrantStore {
    grant: Mutex<Option<DirectoryGrant>>,
}

impl MemoryGrantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with a grant for `path`
    pub fn granted(path: impl Into<PathBuf>) -> Self {
        Self {
            grant: Mutex::new(Some(DirectoryGrant::new(path))),
        }
    }
}

#[async_trait]
impl DirectoryGrantStore for MemoryGrantStore {
    async fn save(&self, grant: &DirectoryGrant) -> WeeklogResult<()> {
        *self.grant.lock()? = Some(grant.clone());
        Ok(())
    }

    async fn load(&self) -> WeeklogResult<Option<DirectoryGrant>> {
        Ok(self.grant.lock()?.clone())
    }

    async fn clear(&self) -> WeeklogResult<()> {
        *self.grant.lock()? = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_verify_granted_directory() {
        let dir = TempDir::new().unwrap();
        let grant = DirectoryGrant::new(dir.path());
        assert_eq!(grant.verify().await, GrantState::Granted);
    }

    #[tokio::test]
    async fn test_verify_missing_directory_is_denied() {
        let dir = TempDir::new().unwrap();
        let gone = dir.path().join("does-not-exist");
        let grant = DirectoryGrant::new(&gone);
        assert_eq!(grant.verify().await, GrantState::Denied);
    }

    #[tokio::test]
    async fn test_verify_file_is_denied() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain-file");
        std::fs::write(&file, b"x").unwrap();
        let grant = DirectoryGrant::new(&file);
        assert_eq!(grant.verify().await, GrantState::Denied);
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryGrantStore::new();
        assert!(store.load().await.unwrap().is_none());

        let grant = DirectoryGrant::new("/tmp/weeklog");
        store.save(&grant).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(grant));

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }
}
