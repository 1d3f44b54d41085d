//! Message storage module
//!
//! Owns message persistence and the username validation rule. The
//! `MessageStore` trait is the seam the handlers depend on; backends:
//! - `MemoryStore` - in-process vector, for tests and throwaway boards
//! - `FileStore` - append-only JSON Lines log on disk

mod error;
mod file;
mod memory;
mod message;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use message::Message;

use chrono::{DateTime, FixedOffset};
use std::sync::Arc;

use crate::config::{StorageBackend, StorageConfig};

/// Characters that may never appear in a username besides control characters.
const DISALLOWED_USERNAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Durable, append-only message log plus username verification.
///
/// Implementations guard appends and reads with a single lock so readers
/// never see a half-written message.
pub trait MessageStore: Send + Sync {
    /// Append a message. `verified` is computed from `author` at this moment.
    fn save_message(
        &self,
        author: &str,
        content: &str,
        timestamp: DateTime<FixedOffset>,
    ) -> StorageResult<Message>;

    /// All messages in insertion order. Empty when nothing has been posted.
    fn get_messages(&self) -> StorageResult<Vec<Message>>;

    /// Pure format check, independent of whether the user has ever posted.
    fn verify_username(&self, username: &str) -> bool {
        is_valid_username(username)
    }
}

/// Shared handle used by the handlers
pub type SharedStore = Arc<dyn MessageStore>;

/// A username is valid when it is non-empty and free of path separators,
/// filename-reserved characters and control characters.
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && !username
            .chars()
            .any(|c| c.is_control() || DISALLOWED_USERNAME_CHARS.contains(&c))
}

/// Build the configured storage backend
pub fn open(config: &StorageConfig) -> StorageResult<SharedStore> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::File => {
            let store = FileStore::open(&config.path)?;
            crate::logger::log_info(&format!(
                "Message log opened at {}",
                store.path().display()
            ));
            Ok(Arc::new(store))
        }
    }
}
