//! Engine Configuration
//!
//! Settings shared by the CLI and embedding applications, optionally loaded
//! from a YAML file. Every field has a default, so a partial file is fine.
//!
//! ```yaml
//! retry_backoff_ms: 250
//! max_steps: 15
//! max_parallel: 4
//! trace_file: runs/trace.json
//! auto_approve: false
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{HelmError, Result};

/// Default file events are written to.
pub const DEFAULT_TRACE_FILE: &str = "agenthelm_trace.json";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HelmConfig {
    /// Pause between tool retry attempts
    pub retry_backoff_ms: u64,
    /// Decision budget for sequential agents, applied by `ReactExecutor::with_config`
    pub max_steps: usize,
    /// Concurrent steps per round; unbounded when unset
    pub max_parallel: Option<usize>,
    /// JSON event log
    pub trace_file: PathBuf,
    /// Approve every guarded tool call without asking
    pub auto_approve: bool,
}

impl Default for HelmConfig {
    fn default() -> Self {
        Self {
            retry_backoff_ms: 1000,
            max_steps: 10,
            max_parallel: None,
            trace_file: PathBuf::from(DEFAULT_TRACE_FILE),
            auto_approve: false,
        }
    }
}

impl HelmConfig {
    /// Loads settings from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            HelmError::Config(format!("Failed to read config '{}': {}", path.display(), e))
        })?;

        let config = Self::from_yaml(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parses settings from YAML text. Empty text yields the defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| HelmError::Config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(HelmError::Config("max_steps must be at least 1".to_string()));
        }
        if self.max_parallel == Some(0) {
            return Err(HelmError::Config("max_parallel must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}
