//! Agent Module
//!
//! The agent capability the orchestrator dispatches plan steps to, plus the
//! built-in sequential (ReAct) agent.
//!
//! # Structure
//!
//! - [`registry`]: Named agent lookup
//! - [`llm`]: Decision collaborator interface and response parsing
//! - [`react`]: Single-agent tool loop with rollback on failure

pub mod llm;
pub mod react;
pub mod registry;

use serde::{Deserialize, Serialize};

use crate::trace::Event;

pub use llm::{Decision, LlmClient, FINISH_TOOL};
pub use react::{ReactExecutor, ReactOutcome, ReactRun};
pub use registry::AgentRegistry;

/// Anything that can carry out a task described in text.
///
/// `run` reports failure through [`AgentResult::success`] rather than by
/// panicking; the orchestrator still contains panics as step failures.
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn run(&self, task: &str) -> AgentResult;
}

/// Token and cost accounting reported by an agent.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
}

impl TokenUsage {
    /// Adds another usage record into this one.
    pub fn merge(&mut self, other: &TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.cost += other.cost;
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Outcome of an agent run or of a whole plan execution.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct AgentResult {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Every tool event produced, in execution order
    #[serde(default)]
    pub events: Vec<Event>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

impl AgentResult {
    pub fn succeeded(answer: impl Into<String>) -> Self {
        Self {
            success: true,
            answer: Some(answer.into()),
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_events(mut self, events: Vec<Event>) -> Self {
        self.events = events;
        self
    }

    pub fn with_token_usage(mut self, usage: TokenUsage) -> Self {
        self.token_usage = Some(usage);
        self
    }

    /// Appends an event.
    pub fn add_event(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Adds usage, starting the tally if none was recorded yet.
    pub fn add_token_usage(&mut self, usage: &TokenUsage) {
        self.token_usage.get_or_insert_with(TokenUsage::default).merge(usage);
    }

    /// Sum of the recorded tool execution times, in seconds.
    pub fn total_execution_time(&self) -> f64 {
        self.events.iter().map(|e| e.execution_time).sum()
    }
}
