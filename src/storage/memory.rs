//! In-Memory Event Storage

use std::sync::Mutex;

use super::{newest_first, StorageBackend};
use crate::error::StorageError;
use crate::trace::Event;

/// Keeps events in process memory.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    events: Mutex<Vec<Event>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored events.
    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageBackend for InMemoryStorage {
    fn save(&self, event: &Event) -> Result<(), StorageError> {
        let mut events = self.events.lock().map_err(|_| StorageError::Poisoned)?;
        events.push(event.clone());
        Ok(())
    }

    fn load(&self) -> Result<Vec<Event>, StorageError> {
        let events = self.events.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(newest_first(events.clone()))
    }
}
