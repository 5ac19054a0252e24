use thiserror::Error;

/// Central error type for the weeklog storage subsystem
#[derive(Error, Debug)]
pub enum WeeklogError {
    // ============================================================================
    // Key / Record Errors
    // ============================================================================
    #[error("Invalid ISO week {week} for year {year}")]
    InvalidWeek { year: i32, week: u8 },

    #[error("Corrupt persisted record: {0}")]
    CorruptRecord(String),

    // ============================================================================
    // Layer Errors
    // ============================================================================
    #[error("Storage layer '{0}' is not initialized")]
    LayerNotInitialized(String),

    #[error("Storage layer '{0}' is unavailable")]
    LayerUnavailable(String),

    #[error("Storage layer '{0}' is not readable")]
    LayerNotReadable(String),

    #[error("Storage layer '{0}' is not writable")]
    LayerNotWritable(String),

    #[error("Failed to save to storage: {0}")]
    StorageSaveFailed(String),

    #[error("Failed to load from storage: {0}")]
    StorageLoadFailed(String),

    // ============================================================================
    // Capability Errors
    // ============================================================================
    #[error("Directory access denied: {0}")]
    GrantDenied(String),

    #[error("No directory grant has been stored")]
    GrantMissing,

    // ============================================================================
    // Sync Errors
    // ============================================================================
    #[error("Sync failed: {0}")]
    SyncFailed(String),

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Builder error: {0}")]
    BuilderError(String),

    // ============================================================================
    // Generic/System Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Mutex lock error")]
    LockError,
}

// Implement conversion from PoisonError for Mutex locks
impl<T> From<std::sync::PoisonError<T>> for WeeklogError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        WeeklogError::LockError
    }
}

// Helper type alias for Results
pub type WeeklogResult<T> = Result<T, WeeklogError>;
