//! Error Types
//!
//! Every failure the engine can report is a variant of [`HelmError`].
//! Tool callables themselves fail with plain strings; the tracer turns
//! those into [`HelmError::ToolExecution`] once the retry budget is spent.

use thiserror::Error;

use crate::plan::StepStatus;

/// Error text recorded on an event when the approval gate refuses a call.
pub const APPROVAL_DENIED: &str = "approval denied";

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage lock poisoned")]
    Poisoned,
}

/// Errors raised by the execution engine.
#[derive(Debug, Error)]
pub enum HelmError {
    #[error("tool '{0}' is not registered")]
    ToolNotFound(String),

    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("invalid contract for tool '{tool}': {reason}")]
    InvalidContract { tool: String, reason: String },

    #[error("invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("approval denied for tool '{0}'")]
    ApprovalDenied(String),

    #[error("tool '{tool}' failed after {attempts} attempt(s): {message}")]
    ToolExecution {
        tool: String,
        attempts: u32,
        message: String,
    },

    #[error("invalid transition for step '{step}': {from} -> {to}")]
    InvalidTransition {
        step: String,
        from: StepStatus,
        to: StepStatus,
    },

    #[error("unknown step '{0}'")]
    UnknownStep(String),

    #[error("plan validation failed: {0}")]
    PlanValidation(String),

    #[error("plan deadlocked: no runnable steps among {0:?}")]
    Deadlock(Vec<String>),

    #[error("agent not found: {0}")]
    AgentNotFound(String),

    #[error("agent '{0}' is already registered")]
    DuplicateAgent(String),

    #[error("invalid decision: {0}")]
    InvalidDecision(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, HelmError>;
