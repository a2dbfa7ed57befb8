//! Execution Events
//!
//! An [`Event`] is the immutable audit record of one tool invocation. The
//! tracer writes exactly one per call, after any retries have played out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tool::Arguments;

/// Audit record of a single tool invocation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Event {
    /// When the invocation started (UTC)
    pub timestamp: DateTime<Utc>,

    /// Name of the invoked tool
    pub tool_name: String,

    /// Arguments bound to parameter names
    pub inputs: Arguments,

    /// `{"result": value}` on success, empty on failure
    pub outputs: Arguments,

    /// Wall time across all attempts, in seconds
    pub execution_time: f64,

    /// Final error text, `None` on success
    pub error_state: Option<String>,

    /// Reasoning the decision maker gave for this call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_reasoning_trace: Option<String>,

    /// Decision maker's confidence in this call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
}

impl Event {
    /// Returns true if the invocation ended without error.
    pub fn is_success(&self) -> bool {
        self.error_state.is_none()
    }

    /// Returns the recorded result value, if any.
    pub fn result(&self) -> Option<&Value> {
        self.outputs.get("result")
    }
}
