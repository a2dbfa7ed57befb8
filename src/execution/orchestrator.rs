//! Plan Orchestrator
//!
//! Runs an approved plan to completion by dispatching ready steps to agents.
//!
//! Each scheduling round takes every ready step, runs them on their own
//! threads (up to `max_parallel` at a time) and waits for all of them to
//! report back over a channel before the next round is computed. A step
//! failure never stops its siblings; steps depending on it are left pending
//! and reported as blocked.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::thread;

use log::{debug, error, info, warn};
use serde_json::Value;

use super::compensation::{CompensationEngine, CompletedAction};
use crate::agent::{Agent, AgentRegistry, AgentResult, TokenUsage};
use crate::error::{HelmError, Result};
use crate::monitoring::{EventType, ExecutionTimeline};
use crate::plan::{Plan, PlanGraph, PlanStep};
use crate::trace::Event;

/// Message sent back from a step thread.
struct StepReport {
    /// Dispatch position within the round
    position: usize,
    step_id: String,
    outcome: thread::Result<AgentResult>,
}

/// Accumulated output of a run.
#[derive(Default)]
struct RunState {
    events: Vec<Event>,
    token_usage: Option<TokenUsage>,
    /// Completed step ids in the order they finished
    completion_order: Vec<String>,
    step_events: HashMap<String, Vec<Event>>,
}

/// Executes plans by routing steps to registered agents.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use agenthelm::agent::AgentRegistry;
/// use agenthelm::execution::Orchestrator;
/// use agenthelm::plan::load_plan;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut registry = AgentRegistry::new();
///     // registry.register(Arc::new(my_agent))?;
///     let orchestrator = Orchestrator::new(registry).with_max_parallel(4);
///
///     let mut plan = load_plan("plan.yaml")?;
///     plan.approve();
///     let result = orchestrator.execute(&mut plan)?;
///     println!("success: {}", result.success);
///     Ok(())
/// }
/// ```
pub struct Orchestrator {
    agents: AgentRegistry,
    default_agent: Option<Arc<dyn Agent>>,
    max_parallel: Option<usize>,
    compensation: Option<CompensationEngine>,
}

impl Orchestrator {
    pub fn new(agents: AgentRegistry) -> Self {
        Self {
            agents,
            default_agent: None,
            max_parallel: None,
            compensation: None,
        }
    }

    /// Sets the agent for steps without an `agent_name`.
    pub fn with_default_agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.default_agent = Some(agent);
        self
    }

    /// Caps how many steps of a round run at once. Zero is treated as one.
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = Some(max_parallel.max(1));
        self
    }

    /// Compensates completed steps, newest first, when a run fails.
    pub fn with_compensation(mut self, engine: CompensationEngine) -> Self {
        self.compensation = Some(engine);
        self
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    /// Executes `plan`, updating its step statuses, outputs and errors in
    /// place.
    ///
    /// Fails with [`HelmError::PlanValidation`] for an unapproved or
    /// malformed plan (nothing runs) and with [`HelmError::Deadlock`] when
    /// pending steps wait on each other. Step failures are reported in the
    /// returned [`AgentResult`].
    pub fn execute(&self, plan: &mut Plan) -> Result<AgentResult> {
        self.execute_with_timeline(plan).map(|(result, _)| result)
    }

    /// Like [`execute`](Self::execute), also returning per-step timing.
    pub fn execute_with_timeline(&self, plan: &mut Plan) -> Result<(AgentResult, ExecutionTimeline)> {
        if !plan.approved {
            return Err(HelmError::PlanValidation(
                "Plan must be approved before execution".to_string(),
            ));
        }

        let mut graph = PlanGraph::new(plan.clone())?;
        let mut timeline = ExecutionTimeline::new();
        let mut state = RunState::default();
        let mut round = 0;

        info!("Executing plan '{}' ({} steps)", plan.goal, plan.steps.len());

        let outcome = loop {
            let ready = graph.get_ready_steps();

            if ready.is_empty() {
                if graph.is_complete() {
                    break Ok(());
                }

                let stuck = graph.stuck_steps();
                if !stuck.is_empty() {
                    error!("Plan deadlocked: no runnable steps among {:?}", stuck);
                    break Err(HelmError::Deadlock(stuck));
                }

                warn!("Remaining steps blocked by failures: {:?}", graph.blocked_steps());
                break Ok(());
            }

            round += 1;
            info!("Round {}: {} ready step(s)", round, ready.len());

            if let Err(e) = self.run_round(&mut graph, ready, round, &mut timeline, &mut state) {
                break Err(e);
            }

            let (done, total) = graph.progress();
            debug!("Progress: {}/{} steps finished", done, total);
        };

        let result = match outcome {
            Ok(()) => Ok(self.finish(&graph, state)),
            Err(e) => Err(e),
        };

        *plan = graph.into_plan();
        result.map(|result| (result, timeline))
    }

    /// Dispatches one round of ready steps and waits for all of them.
    fn run_round(
        &self,
        graph: &mut PlanGraph,
        ready: Vec<PlanStep>,
        round: usize,
        timeline: &mut ExecutionTimeline,
        state: &mut RunState,
    ) -> Result<()> {
        let limit = self.max_parallel.unwrap_or(ready.len()).max(1);
        let (tx, rx) = channel::<StepReport>();
        let mut pending = ready.into_iter().enumerate();
        let mut running_count = 0;
        let mut finished: Vec<(usize, String, Vec<Event>)> = Vec::new();

        loop {
            while running_count < limit {
                let Some((position, step)) = pending.next() else {
                    break;
                };

                graph.mark_running(&step.id)?;
                timeline.add_event(step.id.as_str(), round, EventType::Started);

                let agent = match self.resolve_agent(&step) {
                    Ok(agent) => agent,
                    Err(e) => {
                        warn!("Step '{}' failed: {}", step.id, e);
                        graph.mark_failed(&step.id, e.to_string())?;
                        timeline.add_event(step.id.as_str(), round, EventType::Failed);
                        continue;
                    }
                };

                let task = step.task_description();
                let step_id = step.id.clone();
                let tx = tx.clone();

                info!("Starting step '{}' on agent '{}'", step.id, agent.name());
                thread::spawn(move || {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| agent.run(&task)));
                    let _ = tx.send(StepReport {
                        position,
                        step_id,
                        outcome,
                    });
                });
                running_count += 1;
            }

            if running_count == 0 {
                break;
            }

            let Ok(report) = rx.recv() else {
                break;
            };
            running_count -= 1;

            let events = self.apply_report(graph, &report.step_id, report.outcome, round, timeline, state)?;
            finished.push((report.position, report.step_id, events));
        }

        finished.sort_by_key(|(position, _, _)| *position);
        for (_, step_id, events) in finished {
            state.events.extend(events.iter().cloned());
            state.step_events.insert(step_id, events);
        }

        Ok(())
    }

    /// Records a step's outcome and returns its events.
    fn apply_report(
        &self,
        graph: &mut PlanGraph,
        step_id: &str,
        outcome: thread::Result<AgentResult>,
        round: usize,
        timeline: &mut ExecutionTimeline,
        state: &mut RunState,
    ) -> Result<Vec<Event>> {
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => {
                let message = format!("agent panicked: {}", panic_message(payload.as_ref()));
                error!("Step '{}' failed: {}", step_id, message);
                graph.mark_failed(step_id, message)?;
                timeline.add_event(step_id, round, EventType::Failed);
                return Ok(Vec::new());
            }
        };

        if let Some(usage) = &result.token_usage {
            state
                .token_usage
                .get_or_insert_with(TokenUsage::default)
                .merge(usage);
        }

        if result.success {
            info!("Step '{}' completed", step_id);
            graph.mark_completed(step_id, result.answer.map(Value::String))?;
            timeline.add_event(step_id, round, EventType::Completed);
            state.completion_order.push(step_id.to_string());
        } else {
            let message = result
                .error
                .unwrap_or_else(|| "Agent execution failed".to_string());
            warn!("Step '{}' failed: {}", step_id, message);
            graph.mark_failed(step_id, message)?;
            timeline.add_event(step_id, round, EventType::Failed);
        }

        Ok(result.events)
    }

    fn resolve_agent(&self, step: &PlanStep) -> Result<Arc<dyn Agent>> {
        match &step.agent_name {
            Some(name) => self.agents.get(name),
            None => self.default_agent.clone().ok_or_else(|| {
                HelmError::AgentNotFound(format!(
                    "Step '{}' has no agent_name and no default agent configured",
                    step.id
                ))
            }),
        }
    }

    /// Builds the final result once no more steps can run.
    fn finish(&self, graph: &PlanGraph, state: RunState) -> AgentResult {
        let mut result = AgentResult {
            success: graph.success(),
            answer: None,
            error: None,
            events: state.events,
            token_usage: state.token_usage,
        };

        if result.success {
            info!("Plan completed: {} step(s)", graph.plan().len());
            return result;
        }

        let mut message = format!("Steps failed: {:?}", graph.failed_step_ids());
        let blocked = graph.blocked_steps();
        if !blocked.is_empty() {
            message.push_str(&format!("; blocked: {:?}", blocked));
        }

        if let Some(engine) = &self.compensation {
            let actions: Vec<CompletedAction> = state
                .completion_order
                .iter()
                .filter_map(|id| state.step_events.get(id))
                .flatten()
                .filter(|event| event.is_success())
                .map(CompletedAction::from)
                .collect();

            let report = engine.compensate(&actions);
            result.events.extend(report.events.iter().cloned());
            message.push_str(&format!("; rolled back: {}", report));
        }

        error!("Plan failed: {}", message);
        result.error = Some(message);
        result
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{plan_from_yaml, StepStatus};
    use crate::storage::{InMemoryStorage, StorageBackend};
    use crate::tool::{Arguments, ToolContract, ToolRegistry};
    use crate::trace::{ExecutionTracer, ToolCall, TraceMetadata};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Barrier, Mutex};
    use std::time::Duration;

    /// Agent that answers every task with a canned reply and logs tasks.
    struct RecordingAgent {
        name: String,
        tasks: Mutex<Vec<String>>,
        calls: AtomicUsize,
        fail: bool,
    }

    impl RecordingAgent {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                tasks: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
                fail: false,
            })
        }

        fn failing(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                tasks: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
                fail: true,
            })
        }
    }

    impl Agent for RecordingAgent {
        fn name(&self) -> &str {
            &self.name
        }

        fn run(&self, task: &str) -> AgentResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.tasks.lock().unwrap().push(task.to_string());
            if self.fail {
                AgentResult::failed(format!("{} could not do it", self.name))
            } else {
                AgentResult::succeeded(format!("{}: ok", self.name)).with_token_usage(TokenUsage {
                    input_tokens: 10,
                    output_tokens: 2,
                    cost: 0.5,
                })
            }
        }
    }

    /// Agent that calls one tool through a tracer with the task as input.
    struct ToolAgent {
        name: String,
        tool: String,
        tracer: Arc<ExecutionTracer>,
    }

    impl Agent for ToolAgent {
        fn name(&self) -> &str {
            &self.name
        }

        fn run(&self, task: &str) -> AgentResult {
            let traced = self.tracer.trace(
                &ToolCall::new(self.tool.as_str()).kwarg("task", task),
                &TraceMetadata::default(),
            );
            let result = match &traced.outcome {
                Ok(value) => AgentResult::succeeded(value.to_string()),
                Err(e) => AgentResult::failed(e.to_string()),
            };
            result.with_events(vec![traced.event])
        }
    }

    struct PanickingAgent;

    impl Agent for PanickingAgent {
        fn name(&self) -> &str {
            "panicky"
        }

        fn run(&self, _task: &str) -> AgentResult {
            panic!("agent exploded");
        }
    }

    fn approved(steps: Vec<PlanStep>) -> Plan {
        let mut plan = Plan::from_steps("test goal", steps);
        plan.approve();
        plan
    }

    fn orchestrator_with(agents: Vec<Arc<dyn Agent>>) -> Orchestrator {
        let mut registry = AgentRegistry::new();
        for agent in agents {
            registry.register(agent).unwrap();
        }
        Orchestrator::new(registry)
    }

    /// Registry with a `create` tool compensated by `undo` and a `fail` tool.
    fn tool_setup(undo_calls: Arc<Mutex<Vec<Arguments>>>) -> (Arc<ExecutionTracer>, Arc<InMemoryStorage>) {
        let mut registry = ToolRegistry::new();
        registry
            .register_fn(
                "create",
                ToolContract::new()
                    .with_input("task", "str")
                    .with_compensating_tool("undo"),
                |args| Ok(json!(format!("created for {}", args["task"]))),
            )
            .unwrap();
        registry
            .register_fn("undo", ToolContract::new().with_input("task", "str"), move |args| {
                undo_calls.lock().unwrap().push(args.clone());
                Ok(Value::Null)
            })
            .unwrap();
        registry
            .register_fn("fail", ToolContract::new().with_input("task", "str"), |_| {
                Err("permanent failure".to_string())
            })
            .unwrap();

        let storage = Arc::new(InMemoryStorage::new());
        let tracer = ExecutionTracer::new(Arc::new(registry), storage.clone())
            .with_retry_backoff(Duration::ZERO);
        (Arc::new(tracer), storage)
    }

    fn tool_agent(name: &str, tool: &str, tracer: &Arc<ExecutionTracer>) -> Arc<dyn Agent> {
        Arc::new(ToolAgent {
            name: name.to_string(),
            tool: tool.to_string(),
            tracer: tracer.clone(),
        })
    }

    #[test]
    fn test_unapproved_plan_runs_nothing() {
        let agent = RecordingAgent::new("worker");
        let orchestrator = orchestrator_with(vec![]).with_default_agent(agent.clone());
        let mut plan = Plan::from_steps("goal", vec![PlanStep::new("a", "do a")]);

        let err = orchestrator.execute(&mut plan).unwrap_err();
        assert!(matches!(err, HelmError::PlanValidation(_)));
        assert_eq!(agent.calls.load(Ordering::SeqCst), 0);
        assert_eq!(plan.steps[0].status, StepStatus::Pending);
    }

    #[test]
    fn test_two_cycle_deadlocks() {
        let agent = RecordingAgent::new("worker");
        let orchestrator = orchestrator_with(vec![]).with_default_agent(agent.clone());
        let mut plan = approved(vec![
            PlanStep::new("a", "").depends_on("b"),
            PlanStep::new("b", "").depends_on("a"),
        ]);

        match orchestrator.execute(&mut plan) {
            Err(HelmError::Deadlock(steps)) => assert_eq!(steps, vec!["a", "b"]),
            other => panic!("Expected deadlock, got {:?}", other.map(|r| r.success)),
        }
        assert_eq!(agent.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_plan_with_preset_status_is_rejected() {
        for status in ["running", "completed"] {
            let agent = RecordingAgent::new("worker");
            let orchestrator = orchestrator_with(vec![]).with_default_agent(agent.clone());
            let yaml = format!(
                "goal: preset\nsteps:\n  - id: a\n    status: {}\n  - id: b\n    depends_on: a\n",
                status
            );
            let mut plan = plan_from_yaml(&yaml).unwrap();
            plan.approve();

            assert!(matches!(
                orchestrator.execute(&mut plan),
                Err(HelmError::PlanValidation(msg)) if msg.contains("'a'")
            ));
            assert_eq!(agent.calls.load(Ordering::SeqCst), 0);
        }
    }

    #[test]
    fn test_executed_plan_cannot_run_again() {
        let agent = RecordingAgent::new("worker");
        let orchestrator = orchestrator_with(vec![]).with_default_agent(agent.clone());
        let mut plan = approved(vec![PlanStep::new("a", "do a")]);

        assert!(orchestrator.execute(&mut plan).unwrap().success);
        assert!(matches!(
            orchestrator.execute(&mut plan),
            Err(HelmError::PlanValidation(_))
        ));
        assert_eq!(agent.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dangling_dependency_is_validation_error() {
        let orchestrator = orchestrator_with(vec![]);
        let mut plan = approved(vec![PlanStep::new("a", "").depends_on("ghost")]);
        assert!(matches!(
            orchestrator.execute(&mut plan),
            Err(HelmError::PlanValidation(_))
        ));
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn test_chain_runs_one_step_per_round() {
        let agent = RecordingAgent::new("worker");
        let orchestrator = orchestrator_with(vec![]).with_default_agent(agent.clone());
        let mut plan = approved(vec![
            PlanStep::new("step1", "first"),
            PlanStep::new("step2", "second").depends_on("step1"),
        ]);

        let (result, timeline) = orchestrator.execute_with_timeline(&mut plan).unwrap();

        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(
            timeline.rounds(),
            vec![vec!["step1".to_string()], vec!["step2".to_string()]]
        );
        assert!(plan.success());
        assert_eq!(plan.steps[0].output, Some(json!("worker: ok")));
        assert_eq!(*agent.tasks.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_independent_steps_both_complete_with_events() {
        let (tracer, storage) = tool_setup(Arc::default());
        let orchestrator = orchestrator_with(vec![]).with_default_agent(tool_agent("maker", "create", &tracer));
        let mut plan = approved(vec![PlanStep::new("a", "make a"), PlanStep::new("b", "make b")]);

        let (result, timeline) = orchestrator.execute_with_timeline(&mut plan).unwrap();

        assert!(result.success);
        assert_eq!(result.events.len(), 2);
        assert_eq!(result.events[0].inputs.get("task"), Some(&json!("make a")));
        assert_eq!(result.events[1].inputs.get("task"), Some(&json!("make b")));
        assert_eq!(timeline.rounds().len(), 1);
        assert_eq!(storage.len(), 2);
        assert!(plan.steps.iter().all(|s| s.status == StepStatus::Completed));
    }

    #[test]
    fn test_ready_steps_run_concurrently() {
        struct BarrierAgent(Barrier);

        impl Agent for BarrierAgent {
            fn name(&self) -> &str {
                "barrier"
            }

            fn run(&self, _task: &str) -> AgentResult {
                self.0.wait();
                AgentResult::succeeded("met")
            }
        }

        let orchestrator =
            orchestrator_with(vec![]).with_default_agent(Arc::new(BarrierAgent(Barrier::new(3))));
        let mut plan = approved(vec![
            PlanStep::new("a", ""),
            PlanStep::new("b", ""),
            PlanStep::new("c", ""),
        ]);

        let result = orchestrator.execute(&mut plan).unwrap();
        assert!(result.success);
    }

    #[test]
    fn test_max_parallel_bounds_in_flight_steps() {
        struct Gauge {
            current: AtomicUsize,
            peak: AtomicUsize,
        }

        impl Agent for Gauge {
            fn name(&self) -> &str {
                "gauge"
            }

            fn run(&self, _task: &str) -> AgentResult {
                let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(10));
                self.current.fetch_sub(1, Ordering::SeqCst);
                AgentResult::succeeded("ok")
            }
        }

        let gauge = Arc::new(Gauge {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let orchestrator = orchestrator_with(vec![])
            .with_default_agent(gauge.clone())
            .with_max_parallel(2);
        let mut plan = approved((0..5).map(|i| PlanStep::new(format!("s{}", i), "")).collect());

        let (result, timeline) = orchestrator.execute_with_timeline(&mut plan).unwrap();
        assert!(result.success);
        assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(timeline.rounds().len(), 1);
    }

    #[test]
    fn test_failure_blocks_dependents_without_deadlock() {
        let good = RecordingAgent::new("good");
        let bad = RecordingAgent::failing("bad");
        let orchestrator = orchestrator_with(vec![good.clone(), bad.clone()]);
        let mut plan = approved(vec![
            PlanStep::new("a", "").with_agent("bad"),
            PlanStep::new("b", "").with_agent("good").depends_on("a"),
            PlanStep::new("c", "").with_agent("good"),
        ]);

        let result = orchestrator.execute(&mut plan).unwrap();

        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.contains("Steps failed: [\"a\"]"));
        assert!(error.contains("blocked: [\"b\"]"));
        assert_eq!(plan.get_step("a").unwrap().status, StepStatus::Failed);
        assert_eq!(plan.get_step("a").unwrap().error.as_deref(), Some("bad could not do it"));
        assert_eq!(plan.get_step("b").unwrap().status, StepStatus::Pending);
        assert_eq!(plan.get_step("c").unwrap().status, StepStatus::Completed);
        assert_eq!(good.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_agent_fails_only_that_step() {
        let good = RecordingAgent::new("good");
        let orchestrator = orchestrator_with(vec![good.clone()]);
        let mut plan = approved(vec![
            PlanStep::new("a", "").with_agent("ghost"),
            PlanStep::new("b", "").with_agent("good"),
            PlanStep::new("c", ""),
        ]);

        let result = orchestrator.execute(&mut plan).unwrap();

        assert!(!result.success);
        let a = plan.get_step("a").unwrap();
        assert_eq!(a.status, StepStatus::Failed);
        assert!(a.error.as_deref().unwrap().contains("Agent 'ghost' not found"));
        let c = plan.get_step("c").unwrap();
        assert!(c.error.as_deref().unwrap().contains("no default agent"));
        assert_eq!(plan.get_step("b").unwrap().status, StepStatus::Completed);
    }

    #[test]
    fn test_agent_panic_becomes_step_failure() {
        let good = RecordingAgent::new("good");
        let orchestrator = orchestrator_with(vec![Arc::new(PanickingAgent), good.clone()]);
        let mut plan = approved(vec![
            PlanStep::new("boom", "").with_agent("panicky"),
            PlanStep::new("fine", "").with_agent("good"),
        ]);

        let result = orchestrator.execute(&mut plan).unwrap();

        assert!(!result.success);
        let boom = plan.get_step("boom").unwrap();
        assert_eq!(boom.status, StepStatus::Failed);
        assert!(boom.error.as_deref().unwrap().contains("agent exploded"));
        assert_eq!(plan.get_step("fine").unwrap().status, StepStatus::Completed);
    }

    #[test]
    fn test_task_text_includes_sorted_args() {
        let agent = RecordingAgent::new("writer");
        let orchestrator = orchestrator_with(vec![agent.clone()]);
        let mut plan = approved(vec![PlanStep::new("w", "Write article")
            .with_agent("writer")
            .with_arg("topic", "AI")
            .with_arg("length", 500)]);

        orchestrator.execute(&mut plan).unwrap();
        assert_eq!(
            *agent.tasks.lock().unwrap(),
            vec!["Write article (args: length=500, topic=AI)"]
        );
    }

    #[test]
    fn test_token_usage_is_summed() {
        let agent = RecordingAgent::new("worker");
        let orchestrator = orchestrator_with(vec![]).with_default_agent(agent);
        let mut plan = approved(vec![PlanStep::new("a", ""), PlanStep::new("b", "").depends_on("a")]);

        let result = orchestrator.execute(&mut plan).unwrap();
        let usage = result.token_usage.unwrap();
        assert_eq!(usage.input_tokens, 20);
        assert_eq!(usage.output_tokens, 4);
        assert!((usage.cost - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_no_compensation_by_default() {
        let undo_calls: Arc<Mutex<Vec<Arguments>>> = Arc::default();
        let (tracer, _) = tool_setup(undo_calls.clone());
        let orchestrator = orchestrator_with(vec![
            tool_agent("maker", "create", &tracer),
            tool_agent("breaker", "fail", &tracer),
        ]);
        let mut plan = approved(vec![
            PlanStep::new("make", "make it").with_agent("maker"),
            PlanStep::new("break", "break it").with_agent("breaker").depends_on("make"),
        ]);

        let result = orchestrator.execute(&mut plan).unwrap();
        assert!(!result.success);
        assert!(!result.error.unwrap().contains("rolled back"));
        assert!(undo_calls.lock().unwrap().is_empty());
        assert_eq!(result.events.len(), 2);
    }

    #[test]
    fn test_opt_in_compensation_undoes_completed_steps() {
        let undo_calls: Arc<Mutex<Vec<Arguments>>> = Arc::default();
        let (tracer, storage) = tool_setup(undo_calls.clone());
        let orchestrator = orchestrator_with(vec![
            tool_agent("maker", "create", &tracer),
            tool_agent("breaker", "fail", &tracer),
        ])
        .with_compensation(CompensationEngine::new(tracer.clone()));
        let mut plan = approved(vec![
            PlanStep::new("make", "make it").with_agent("maker"),
            PlanStep::new("break", "break it").with_agent("breaker").depends_on("make"),
        ]);

        let result = orchestrator.execute(&mut plan).unwrap();

        assert!(!result.success);
        assert!(result.error.unwrap().contains("rolled back: compensated 1"));
        let undo_calls = undo_calls.lock().unwrap();
        assert_eq!(undo_calls.len(), 1);
        assert_eq!(undo_calls[0].get("task"), Some(&json!("make it")));

        let names: Vec<&str> = result.events.iter().map(|e| e.tool_name.as_str()).collect();
        assert_eq!(names, vec!["create", "fail", "undo"]);
        assert_eq!(storage.load().unwrap().len(), 3);
    }
}
