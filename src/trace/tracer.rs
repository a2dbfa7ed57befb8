//! Execution Tracer
//!
//! Wraps a single tool invocation with the policy its contract asks for:
//!
//! 1. Bind arguments to the contract's parameter names
//! 2. Ask the approval gate, if the contract requires it
//! 3. Attempt the call up to `retries + 1` times, sleeping a fixed
//!    backoff between attempts
//! 4. Persist exactly one [`Event`] describing the final outcome
//!
//! Failures come back as values in [`TracedCall::outcome`]; the caller
//! decides what a failed call means for the workflow.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use log::{debug, error, info, warn};
use serde_json::Value;

use super::approval::{ApprovalGate, DenyAll};
use super::event::Event;
use crate::error::{HelmError, APPROVAL_DENIED};
use crate::storage::StorageBackend;
use crate::tool::{Arguments, ToolRegistry};

/// Default pause between retry attempts.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// A request to invoke one tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub tool_name: String,
    pub positional: Vec<Value>,
    pub arguments: Arguments,
}

impl ToolCall {
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            positional: Vec::new(),
            arguments: Arguments::new(),
        }
    }

    /// Appends a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Sets a keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    /// Replaces all keyword arguments.
    pub fn with_arguments(mut self, arguments: Arguments) -> Self {
        self.arguments = arguments;
        self
    }
}

/// Reasoning metadata copied into the persisted event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceMetadata {
    pub reasoning: Option<String>,
    pub confidence: Option<f64>,
}

/// Result of one traced invocation.
#[derive(Debug)]
pub struct TracedCall {
    /// The event handed to storage
    pub event: Event,
    /// The tool output, or why there is none
    pub outcome: Result<Value, HelmError>,
}

impl TracedCall {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Executes tool calls under their contracts and records every outcome.
pub struct ExecutionTracer {
    registry: Arc<ToolRegistry>,
    storage: Arc<dyn StorageBackend>,
    approval: Arc<dyn ApprovalGate>,
    retry_backoff: Duration,
}

impl ExecutionTracer {
    /// Creates a tracer that denies all approval requests and waits
    /// [`DEFAULT_RETRY_BACKOFF`] between attempts.
    pub fn new(registry: Arc<ToolRegistry>, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            registry,
            storage,
            approval: Arc::new(DenyAll),
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Sets the approval gate.
    pub fn with_approval_gate(mut self, gate: Arc<dyn ApprovalGate>) -> Self {
        self.approval = gate;
        self
    }

    /// Sets the pause between retry attempts.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    /// Executes a call with keyword arguments only.
    pub fn execute(&self, tool_name: &str, arguments: &Arguments) -> Result<Value, HelmError> {
        let call = ToolCall::new(tool_name).with_arguments(arguments.clone());
        self.trace(&call, &TraceMetadata::default()).outcome
    }

    /// Executes a call and returns both the persisted event and the outcome.
    ///
    /// An unknown tool fails with [`HelmError::ToolNotFound`] and produces
    /// a failure event; so does an argument binding error.
    pub fn trace(&self, call: &ToolCall, metadata: &TraceMetadata) -> TracedCall {
        let timestamp = Utc::now();
        let started = Instant::now();
        let name = call.tool_name.as_str();

        let tool = match self.registry.lookup(name) {
            Ok(tool) => tool,
            Err(e) => {
                warn!("Call to unregistered tool '{}'", name);
                return self.finish(timestamp, started, name, call.arguments.clone(), metadata, Err(e));
            }
        };
        let contract = tool.contract();

        let inputs = match contract.bind(&call.positional, &call.arguments) {
            Ok(bound) => bound,
            Err(reason) => {
                warn!("Rejected arguments for '{}': {}", name, reason);
                let err = HelmError::InvalidArguments {
                    tool: name.to_string(),
                    reason,
                };
                return self.finish(timestamp, started, name, call.arguments.clone(), metadata, Err(err));
            }
        };

        if contract.requires_approval {
            info!("Requesting approval for '{}'", name);
            if !self.approval.request_approval(name, &inputs) {
                warn!("Approval denied for '{}'", name);
                let err = HelmError::ApprovalDenied(name.to_string());
                return self.finish(timestamp, started, name, inputs, metadata, Err(err));
            }
        }

        let max_attempts = contract.max_attempts();
        let mut last_error = None;
        let mut output = None;

        for attempt in 1..=max_attempts {
            debug!("Invoking '{}' (attempt {}/{})", name, attempt, max_attempts);

            match tool.call(&inputs) {
                Ok(value) => {
                    last_error = None;
                    output = Some(value);
                    break;
                }
                Err(message) => {
                    warn!(
                        "Tool '{}' failed on attempt {}/{}: {}",
                        name, attempt, max_attempts, message
                    );
                    last_error = Some(message);

                    if attempt < max_attempts && !self.retry_backoff.is_zero() {
                        thread::sleep(self.retry_backoff);
                    }
                }
            }
        }

        let outcome = match (output, last_error) {
            (Some(value), _) => Ok(value),
            (None, message) => Err(HelmError::ToolExecution {
                tool: name.to_string(),
                attempts: max_attempts,
                message: message.unwrap_or_default(),
            }),
        };

        self.finish(timestamp, started, name, inputs, metadata, outcome)
    }

    /// Builds the event for an outcome, persists it, and packages both.
    fn finish(
        &self,
        timestamp: chrono::DateTime<Utc>,
        started: Instant,
        tool_name: &str,
        inputs: Arguments,
        metadata: &TraceMetadata,
        outcome: Result<Value, HelmError>,
    ) -> TracedCall {
        let mut outputs = Arguments::new();
        let error_state = match &outcome {
            Ok(value) => {
                outputs.insert("result".to_string(), value.clone());
                None
            }
            Err(HelmError::ApprovalDenied(_)) => Some(APPROVAL_DENIED.to_string()),
            Err(HelmError::ToolExecution { message, .. }) => Some(message.clone()),
            Err(other) => Some(other.to_string()),
        };

        let event = Event {
            timestamp,
            tool_name: tool_name.to_string(),
            inputs,
            outputs,
            execution_time: started.elapsed().as_secs_f64(),
            error_state,
            llm_reasoning_trace: metadata.reasoning.clone(),
            confidence_score: metadata.confidence,
        };

        let outcome = match self.storage.save(&event) {
            Ok(()) => outcome,
            Err(e) => {
                error!("Failed to persist event for '{}': {}", tool_name, e);
                Err(HelmError::Storage(e))
            }
        };

        match &outcome {
            Ok(_) => info!(
                "Tool '{}' succeeded in {:.3}s",
                tool_name, event.execution_time
            ),
            Err(e) => info!("Tool '{}' failed: {}", tool_name, e),
        }

        TracedCall { event, outcome }
    }
}
