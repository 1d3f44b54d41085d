// In-memory message store

use chrono::{DateTime, FixedOffset};
use std::sync::{Mutex, MutexGuard};

use super::error::{StorageError, StorageResult};
use super::message::Message;
use super::MessageStore;

/// Message store kept entirely in process memory.
///
/// Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    messages: Mutex<Vec<Message>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Vec<Message>>> {
        self.messages
            .lock()
            .map_err(|_| StorageError::LockPoisoned("message list".to_string()))
    }
}

impl MessageStore for MemoryStore {
    fn save_message(
        &self,
        author: &str,
        content: &str,
        timestamp: DateTime<FixedOffset>,
    ) -> StorageResult<Message> {
        let message = Message::new(author, content, timestamp, self.verify_username(author));
        self.lock()?.push(message.clone());
        Ok(message)
    }

    fn get_messages(&self) -> StorageResult<Vec<Message>> {
        Ok(self.lock()?.clone())
    }
}
