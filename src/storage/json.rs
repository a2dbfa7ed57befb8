//! JSON File Event Storage
//!
//! Events are kept as a pretty-printed JSON array, in insertion order.
//! Each save rewrites the whole file, so this backend suits audit trails of
//! modest size. The new array is written to a sibling temporary file and
//! renamed over the trace, so a failed write never truncates earlier events.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, info};

use super::{newest_first, StorageBackend};
use crate::error::StorageError;
use crate::trace::Event;

/// Persists events to a JSON file.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStorage {
    /// Creates a backend writing to `path`. The file is created on the
    /// first save; parent directories must exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        info!("Event trace file: {}", path.display());
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file the next array is staged in before the rename.
    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("trace"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Replaces the trace file with `events` in one rename.
    fn write_all(&self, events: &[Event]) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(events)?;
        let staging = self.staging_path();

        let written = File::create(&staging).and_then(|mut file| {
            file.write_all(json.as_bytes())?;
            file.sync_all()
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&staging);
            return Err(e.into());
        }

        fs::rename(&staging, &self.path)?;
        Ok(())
    }

    /// Reads the stored events in insertion order.
    fn read_all(&self) -> Result<Vec<Event>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_str(&content)?)
    }
}

impl StorageBackend for JsonFileStorage {
    fn save(&self, event: &Event) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;

        let mut events = self.read_all()?;
        events.push(event.clone());

        self.write_all(&events)?;

        debug!(
            "Saved event for '{}' to {} ({} total)",
            event.tool_name,
            self.path.display(),
            events.len()
        );
        Ok(())
    }

    fn load(&self) -> Result<Vec<Event>, StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(newest_first(self.read_all()?))
    }
}
