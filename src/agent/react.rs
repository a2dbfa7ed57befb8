//! Sequential Agent
//!
//! A single-agent reason/act loop: ask the decision collaborator for the
//! next tool call, run it through the tracer, feed the observation back, and
//! repeat until the model calls `finish` or the step budget runs out.
//!
//! Any failure along the way rolls back everything the run completed so far
//! through the [`CompensationEngine`].

use std::sync::Arc;

use log::{info, warn};

use super::llm::{build_user_prompt, Decision, LlmClient, SYSTEM_PROMPT};
use super::{Agent, AgentResult};
use crate::config::HelmConfig;
use crate::error::{HelmError, Result};
use crate::execution::compensation::{CompensationEngine, CompensationReport, CompletedAction};
use crate::trace::{Event, ExecutionTracer, ToolCall, TraceMetadata};

/// Default number of decisions a run may take.
pub const DEFAULT_MAX_STEPS: usize = 10;

/// How a sequential run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ReactOutcome {
    /// The model called `finish`
    Finished { answer: String },
    /// The step budget ran out first; nothing was rolled back
    Incomplete { steps: usize },
    /// A step failed and completed actions were compensated
    RolledBack {
        error: String,
        report: CompensationReport,
    },
}

/// Result of [`ReactExecutor::run_task`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReactRun {
    pub outcome: ReactOutcome,
    /// Tool and compensation events, in execution order
    pub events: Vec<Event>,
    /// One line per executed tool call
    pub history: Vec<String>,
}

impl ReactRun {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ReactOutcome::Finished { .. })
    }
}

impl From<ReactRun> for AgentResult {
    fn from(run: ReactRun) -> Self {
        let result = match run.outcome {
            ReactOutcome::Finished { answer } => AgentResult::succeeded(answer),
            ReactOutcome::Incomplete { steps } => AgentResult::failed(format!(
                "incomplete: no answer after {} step(s)",
                steps
            )),
            ReactOutcome::RolledBack { error, report } => {
                AgentResult::failed(format!("{} (rolled back: {})", error, report))
            }
        };
        result.with_events(run.events)
    }
}

/// Drives one agent through a task with a fixed set of tools.
pub struct ReactExecutor {
    name: String,
    tracer: Arc<ExecutionTracer>,
    client: Arc<dyn LlmClient>,
    tools: Vec<String>,
    compensation: CompensationEngine,
    max_steps: usize,
}

impl ReactExecutor {
    /// Creates an executor allowed to call `tools`.
    ///
    /// Every tool must already be registered with the tracer's registry.
    pub fn new(
        name: impl Into<String>,
        tracer: Arc<ExecutionTracer>,
        client: Arc<dyn LlmClient>,
        tools: Vec<String>,
    ) -> Result<Self> {
        for tool in &tools {
            if !tracer.registry().contains(tool) {
                return Err(HelmError::ToolNotFound(tool.clone()));
            }
        }

        Ok(Self {
            name: name.into(),
            compensation: CompensationEngine::new(tracer.clone()),
            tracer,
            client,
            tools,
            max_steps: DEFAULT_MAX_STEPS,
        })
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Applies the step budget from a loaded [`HelmConfig`].
    pub fn with_config(self, config: &HelmConfig) -> Self {
        self.with_max_steps(config.max_steps)
    }

    pub fn tools(&self) -> &[String] {
        &self.tools
    }

    /// Runs the loop for one task.
    pub fn run_task(&self, task: &str) -> ReactRun {
        info!("Agent '{}' running task: {}", self.name, task);

        let tools_text = self.tracer.registry().describe(&self.tools);
        let mut history: Vec<String> = Vec::new();
        let mut events: Vec<Event> = Vec::new();
        let mut completed: Vec<CompletedAction> = Vec::new();

        for step in 1..=self.max_steps {
            let decision = match self.decide(&tools_text, task, &history) {
                Ok(decision) => decision,
                Err(e) => return self.roll_back(e, &completed, events, history),
            };

            if decision.is_finish() {
                return match decision.answer() {
                    Ok(answer) => {
                        info!("Agent '{}' finished after {} step(s)", self.name, step - 1);
                        ReactRun {
                            outcome: ReactOutcome::Finished { answer },
                            events,
                            history,
                        }
                    }
                    Err(e) => self.roll_back(e, &completed, events, history),
                };
            }

            if !self.tools.contains(&decision.tool_name) {
                let err = HelmError::ToolNotFound(decision.tool_name.clone());
                return self.roll_back(err, &completed, events, history);
            }

            let call = ToolCall::new(decision.tool_name.as_str()).with_arguments(decision.arguments);
            let metadata = TraceMetadata {
                reasoning: decision.thought,
                confidence: decision.confidence,
            };
            let traced = self.tracer.trace(&call, &metadata);

            // A storage failure still leaves a side effect behind.
            if traced.event.is_success() {
                completed.push(CompletedAction::from(&traced.event));
            }
            let inputs = serde_json::to_string(&traced.event.inputs).unwrap_or_default();
            events.push(traced.event);

            match traced.outcome {
                Ok(value) => {
                    history.push(format!("{}. {}({}) -> {}", step, call.tool_name, inputs, value));
                }
                Err(e) => {
                    history.push(format!("{}. {}({}) -> error: {}", step, call.tool_name, inputs, e));
                    return self.roll_back(e, &completed, events, history);
                }
            }
        }

        warn!(
            "Agent '{}' reached max steps ({}) without finishing",
            self.name, self.max_steps
        );
        ReactRun {
            outcome: ReactOutcome::Incomplete {
                steps: self.max_steps,
            },
            events,
            history,
        }
    }

    fn decide(&self, tools_text: &str, task: &str, history: &[String]) -> Result<Decision> {
        let prompt = build_user_prompt(tools_text, task, history);
        let response = self
            .client
            .predict(SYSTEM_PROMPT, &prompt)
            .map_err(|e| HelmError::InvalidDecision(format!("model call failed: {}", e)))?;
        Decision::parse(&response)
    }

    fn roll_back(
        &self,
        error: HelmError,
        completed: &[CompletedAction],
        mut events: Vec<Event>,
        history: Vec<String>,
    ) -> ReactRun {
        warn!("Agent '{}' failed: {}", self.name, error);
        let report = self.compensation.compensate(completed);
        events.extend(report.events.iter().cloned());

        ReactRun {
            outcome: ReactOutcome::RolledBack {
                error: error.to_string(),
                report,
            },
            events,
            history,
        }
    }
}

impl Agent for ReactExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, task: &str) -> AgentResult {
        self.run_task(task).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::compensation::CompensationStatus;
    use crate::storage::{InMemoryStorage, StorageBackend};
    use crate::tool::{Arguments, ToolContract, ToolRegistry};
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays canned responses, one per turn.
    struct ScriptedClient {
        replies: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    impl LlmClient for ScriptedClient {
        fn predict(&self, _system: &str, user: &str) -> std::result::Result<String, String> {
            self.prompts.lock().unwrap().push(user.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| "script exhausted".to_string())
        }
    }

    struct Fixture {
        tracer: Arc<ExecutionTracer>,
        storage: Arc<InMemoryStorage>,
        undo_calls: Arc<Mutex<Vec<Arguments>>>,
        add_calls: Arc<AtomicUsize>,
    }

    fn fixture() -> Fixture {
        let undo_calls: Arc<Mutex<Vec<Arguments>>> = Arc::default();
        let add_calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();

        let adds = add_calls.clone();
        registry
            .register_fn(
                "add",
                ToolContract::new().with_input("a", "int").with_input("b", "int"),
                move |args| {
                    adds.fetch_add(1, Ordering::SeqCst);
                    let a = args.get("a").and_then(Value::as_i64).unwrap_or(0);
                    let b = args.get("b").and_then(Value::as_i64).unwrap_or(0);
                    Ok(json!(a + b))
                },
            )
            .unwrap();
        registry
            .register_fn(
                "create",
                ToolContract::new()
                    .with_input("name", "str")
                    .with_compensating_tool("undo"),
                |args| Ok(json!(format!("created {}", args["name"]))),
            )
            .unwrap();
        let undos = undo_calls.clone();
        registry
            .register_fn("undo", ToolContract::new().with_input("name", "str"), move |args| {
                undos.lock().unwrap().push(args.clone());
                Ok(Value::Null)
            })
            .unwrap();
        registry
            .register_fn("failing_step", ToolContract::new(), |_| Err("it broke".to_string()))
            .unwrap();

        let storage = Arc::new(InMemoryStorage::new());
        let tracer = Arc::new(
            ExecutionTracer::new(Arc::new(registry), storage.clone()).with_retry_backoff(Duration::ZERO),
        );

        Fixture {
            tracer,
            storage,
            undo_calls,
            add_calls,
        }
    }

    fn tools(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_unknown_tool_rejected_at_construction() {
        let fx = fixture();
        let result = ReactExecutor::new("calc", fx.tracer, ScriptedClient::new(&[]), tools(&["nope"]));
        assert!(matches!(result, Err(HelmError::ToolNotFound(name)) if name == "nope"));
    }

    #[test]
    fn test_tool_then_finish() {
        let fx = fixture();
        let client = ScriptedClient::new(&[
            r#"{"thought": "add them", "confidence": 0.8, "tool_name": "add", "arguments": {"a": 2, "b": 3}}"#,
            r#"Done! {"tool_name": "finish", "arguments": {"answer": "5"}}"#,
        ]);
        let agent = ReactExecutor::new("calc", fx.tracer, client.clone(), tools(&["add"])).unwrap();

        let run = agent.run_task("add 2 and 3");

        assert_eq!(run.outcome, ReactOutcome::Finished { answer: "5".to_string() });
        assert_eq!(run.events.len(), 1);
        assert_eq!(run.events[0].result(), Some(&json!(5)));
        assert_eq!(run.events[0].llm_reasoning_trace.as_deref(), Some("add them"));
        assert_eq!(run.events[0].confidence_score, Some(0.8));
        assert_eq!(run.history.len(), 1);
        assert!(run.history[0].ends_with("-> 5"));

        let prompts = client.prompts.lock().unwrap();
        assert!(prompts[0].contains("Tool Name: add"));
        assert!(prompts[1].contains("Previous steps"));
        assert_eq!(fx.storage.len(), 1);
    }

    #[test]
    fn test_failure_rolls_back_completed_actions() {
        let fx = fixture();
        let client = ScriptedClient::new(&[
            r#"{"tool_name": "create", "arguments": {"name": "report.txt"}}"#,
            r#"{"tool_name": "failing_step", "arguments": {}}"#,
        ]);
        let agent = ReactExecutor::new(
            "files",
            fx.tracer,
            client,
            tools(&["create", "failing_step"]),
        )
        .unwrap();

        let run = agent.run_task("create then fail");

        let undo_calls = fx.undo_calls.lock().unwrap();
        assert_eq!(undo_calls.len(), 1);
        assert_eq!(undo_calls[0].get("name"), Some(&json!("report.txt")));

        match &run.outcome {
            ReactOutcome::RolledBack { error, report } => {
                assert!(error.contains("it broke"));
                assert_eq!(report.compensated(), 1);
                assert_eq!(
                    report.entries[0].status,
                    CompensationStatus::Compensated {
                        compensator: "undo".to_string()
                    }
                );
            }
            other => panic!("Expected rollback, got {:?}", other),
        }

        let names: Vec<&str> = run.events.iter().map(|e| e.tool_name.as_str()).collect();
        assert_eq!(names, vec!["create", "failing_step", "undo"]);
        assert!(!run.is_success());

        let result: AgentResult = run.into();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("rolled back"));
    }

    #[test]
    fn test_tool_outside_local_set_rolls_back() {
        let fx = fixture();
        let client = ScriptedClient::new(&[
            r#"{"tool_name": "create", "arguments": {"name": "a"}}"#,
            r#"{"tool_name": "add", "arguments": {"a": 1, "b": 1}}"#,
        ]);
        let agent = ReactExecutor::new("files", fx.tracer, client, tools(&["create"])).unwrap();

        let run = agent.run_task("task");

        match &run.outcome {
            ReactOutcome::RolledBack { error, .. } => assert!(error.contains("'add' is not registered")),
            other => panic!("Expected rollback, got {:?}", other),
        }
        assert_eq!(fx.add_calls.load(Ordering::SeqCst), 0);
        assert_eq!(fx.undo_calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unparsable_decision_rolls_back() {
        let fx = fixture();
        let client = ScriptedClient::new(&["I am not sure what to do"]);
        let agent = ReactExecutor::new("calc", fx.tracer, client, tools(&["add"])).unwrap();

        let run = agent.run_task("task");
        match &run.outcome {
            ReactOutcome::RolledBack { error, report } => {
                assert!(error.contains("invalid decision"));
                assert!(report.entries.is_empty());
            }
            other => panic!("Expected rollback, got {:?}", other),
        }
        assert!(run.events.is_empty());
    }

    #[test]
    fn test_max_steps_is_incomplete_without_compensation() {
        let fx = fixture();
        let client = ScriptedClient::new(&[
            r#"{"tool_name": "create", "arguments": {"name": "a"}}"#,
            r#"{"tool_name": "create", "arguments": {"name": "b"}}"#,
            r#"{"tool_name": "create", "arguments": {"name": "c"}}"#,
        ]);
        let agent = ReactExecutor::new("files", fx.tracer, client, tools(&["create"]))
            .unwrap()
            .with_max_steps(2);

        let run = agent.run_task("keep creating");

        assert_eq!(run.outcome, ReactOutcome::Incomplete { steps: 2 });
        assert_eq!(run.events.len(), 2);
        assert!(fx.undo_calls.lock().unwrap().is_empty());

        let result = AgentResult::from(run);
        assert!(!result.success);
        assert!(result.error.unwrap().contains("incomplete"));
    }

    #[test]
    fn test_config_sets_step_budget() {
        let fx = fixture();
        let client = ScriptedClient::new(&[
            r#"{"tool_name": "create", "arguments": {"name": "a"}}"#,
            r#"{"tool_name": "create", "arguments": {"name": "b"}}"#,
        ]);
        let config = HelmConfig::from_yaml("max_steps: 1\n").unwrap();
        let agent = ReactExecutor::new("files", fx.tracer, client, tools(&["create"]))
            .unwrap()
            .with_config(&config);

        let run = agent.run_task("keep creating");
        assert_eq!(run.outcome, ReactOutcome::Incomplete { steps: 1 });
        assert_eq!(run.events.len(), 1);
    }

    #[test]
    fn test_agent_trait_reports_answer() {
        let fx = fixture();
        let client = ScriptedClient::new(&[r#"{"tool_name": "finish", "arguments": {"answer": "nothing to do"}}"#]);
        let agent = ReactExecutor::new("idle", fx.tracer, client, Vec::new()).unwrap();

        assert_eq!(Agent::name(&agent), "idle");
        let result = agent.run("anything");
        assert!(result.success);
        assert_eq!(result.answer.as_deref(), Some("nothing to do"));
        assert!(result.events.is_empty());
        assert!(fx.storage.load().unwrap().is_empty());
    }
}
