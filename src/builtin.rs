//! Built-in Tools and Agents
//!
//! A minimal `echo` tool and an agent that runs it, used by the CLI to
//! exercise a plan end to end without a language model.

use std::sync::Arc;

use serde_json::Value;

use crate::agent::{Agent, AgentResult};
use crate::error::Result;
use crate::tool::{ToolContract, ToolRegistry};
use crate::trace::{ExecutionTracer, ToolCall, TraceMetadata};

/// Name of the built-in echo tool.
pub const ECHO_TOOL: &str = "echo";

/// Registers the built-in tools.
pub fn register_builtin_tools(registry: &mut ToolRegistry) -> Result<()> {
    registry.register_fn(
        ECHO_TOOL,
        ToolContract::new()
            .with_input("message", "str")
            .with_output("result", "str"),
        |args| match args.get("message") {
            Some(Value::String(s)) => Ok(Value::String(s.clone())),
            Some(other) => Ok(Value::String(other.to_string())),
            None => Err("missing message".to_string()),
        },
    )
}

/// Agent that answers every task by echoing it through the tracer.
pub struct EchoAgent {
    name: String,
    tracer: Arc<ExecutionTracer>,
}

impl EchoAgent {
    /// The tracer's registry must contain the `echo` tool.
    pub fn new(name: impl Into<String>, tracer: Arc<ExecutionTracer>) -> Self {
        Self {
            name: name.into(),
            tracer,
        }
    }
}

impl Agent for EchoAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, task: &str) -> AgentResult {
        let call = ToolCall::new(ECHO_TOOL).kwarg("message", task);
        let metadata = TraceMetadata {
            reasoning: Some(format!("{} echoes its task", self.name)),
            confidence: Some(1.0),
        };
        let traced = self.tracer.trace(&call, &metadata);

        let result = match traced.outcome {
            Ok(Value::String(answer)) => AgentResult::succeeded(answer),
            Ok(other) => AgentResult::succeeded(other.to_string()),
            Err(e) => AgentResult::failed(e.to_string()),
        };
        result.with_events(vec![traced.event])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryStorage, StorageBackend};
    use serde_json::json;
    use std::time::Duration;

    fn echo_tracer() -> (Arc<ExecutionTracer>, Arc<InMemoryStorage>) {
        let mut registry = ToolRegistry::new();
        register_builtin_tools(&mut registry).unwrap();
        let storage = Arc::new(InMemoryStorage::new());
        let tracer = ExecutionTracer::new(Arc::new(registry), storage.clone())
            .with_retry_backoff(Duration::ZERO);
        (Arc::new(tracer), storage)
    }

    #[test]
    fn test_register_builtin_tools_once() {
        let mut registry = ToolRegistry::new();
        register_builtin_tools(&mut registry).unwrap();
        assert!(registry.contains(ECHO_TOOL));
        assert!(register_builtin_tools(&mut registry).is_err());
    }

    #[test]
    fn test_echo_tool_renders_non_strings() {
        let (tracer, _) = echo_tracer();
        let mut args = crate::tool::Arguments::new();
        args.insert("message".to_string(), json!(42));
        assert_eq!(tracer.execute(ECHO_TOOL, &args).unwrap(), json!("42"));
    }

    #[test]
    fn test_echo_agent_answers_with_task() {
        let (tracer, storage) = echo_tracer();
        let agent = EchoAgent::new("echo", tracer);

        let result = agent.run("Summarize (args: n=3)");

        assert!(result.success);
        assert_eq!(result.answer.as_deref(), Some("Summarize (args: n=3)"));
        assert_eq!(result.events.len(), 1);
        assert_eq!(result.events[0].confidence_score, Some(1.0));

        let stored = storage.load().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].inputs.get("message"), Some(&json!("Summarize (args: n=3)")));
    }

    #[test]
    fn test_echo_agent_without_tool_fails() {
        let storage = Arc::new(InMemoryStorage::new());
        let tracer = Arc::new(ExecutionTracer::new(Arc::new(ToolRegistry::new()), storage));
        let result = EchoAgent::new("echo", tracer).run("hello");

        assert!(!result.success);
        assert!(result.error.unwrap().contains("not registered"));
        assert_eq!(result.events.len(), 1);
    }
}
