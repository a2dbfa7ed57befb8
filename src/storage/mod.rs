//! Event Storage
//!
//! The tracer hands every [`Event`] to a [`StorageBackend`]. Backends only
//! append; nothing in the engine rewrites a stored event.
//!
//! - [`memory`]: Process-local backend, handy for tests and short runs
//! - [`json`]: Backend persisting to a JSON array on disk

pub mod json;
pub mod memory;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::trace::Event;

pub use json::JsonFileStorage;
pub use memory::InMemoryStorage;

/// Outcome filter for [`EventFilter`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Success,
    Failure,
}

/// Criteria for [`StorageBackend::query`]. Unset fields match everything.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    #[serde(default)]
    pub tool_name: Option<String>,

    #[serde(default)]
    pub status: Option<EventStatus>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tool(mut self, name: impl Into<String>) -> Self {
        self.tool_name = Some(name.into());
        self
    }

    pub fn status(mut self, status: EventStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns true if the event satisfies every set criterion.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ref name) = self.tool_name {
            if &event.tool_name != name {
                return false;
            }
        }

        match self.status {
            Some(EventStatus::Success) => event.is_success(),
            Some(EventStatus::Failure) => !event.is_success(),
            None => true,
        }
    }
}

/// Durable sink for execution events.
pub trait StorageBackend: Send + Sync {
    /// Appends an event.
    fn save(&self, event: &Event) -> Result<(), StorageError>;

    /// Returns all events, most recent first.
    fn load(&self) -> Result<Vec<Event>, StorageError>;

    /// Returns the events matching `filter`, most recent first.
    fn query(&self, filter: &EventFilter) -> Result<Vec<Event>, StorageError> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|event| filter.matches(event))
            .collect())
    }
}

/// Orders events most recent first. Ties keep the latest insertion first.
pub(crate) fn newest_first(mut events: Vec<Event>) -> Vec<Event> {
    events.reverse();
    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    events
}
