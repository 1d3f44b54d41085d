// Storage error types

use thiserror::Error;

/// Errors reported by a `MessageStore`
#[derive(Debug, Error)]
pub enum StorageError {
    /// Open/read/write/sync failure on the backing file
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A writer panicked while holding the store lock
    #[error("Storage lock poisoned: {0}")]
    LockPoisoned(String),

    /// The task running the storage operation did not complete
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

pub type StorageResult<T> = Result<T, StorageError>;
