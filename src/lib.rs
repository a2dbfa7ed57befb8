//! AgentHelm - Execution and Recovery Engine for Agent Workflows
//!
//! Runs tool-driven workflows with approval gating, bounded retry, an
//! audit event for every tool call, and saga-style rollback when a later
//! step fails.
//!
//! # Architecture
//!
//! - [`tool`]: Tool contracts and the registry
//! - [`trace`]: The execution tracer, approval gates and events
//! - [`storage`]: Event persistence backends
//! - [`plan`]: Plan model, validation, parsing and step scheduling
//! - [`agent`]: The agent capability and the sequential ReAct agent
//! - [`execution`]: The plan orchestrator and compensation engine
//! - [`monitoring`]: Execution timeline
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use agenthelm::builtin::{register_builtin_tools, EchoAgent};
//! use agenthelm::execution::Orchestrator;
//! use agenthelm::agent::AgentRegistry;
//! use agenthelm::storage::JsonFileStorage;
//! use agenthelm::tool::ToolRegistry;
//! use agenthelm::trace::ExecutionTracer;
//! use agenthelm::load_plan;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tools = ToolRegistry::new();
//!     register_builtin_tools(&mut tools)?;
//!
//!     let storage = Arc::new(JsonFileStorage::new("trace.json"));
//!     let tracer = Arc::new(ExecutionTracer::new(Arc::new(tools), storage));
//!
//!     let orchestrator = Orchestrator::new(AgentRegistry::new())
//!         .with_default_agent(Arc::new(EchoAgent::new("echo", tracer)));
//!
//!     let mut plan = load_plan("plan.yaml")?;
//!     plan.approve();
//!     let result = orchestrator.execute(&mut plan)?;
//!     println!("success: {}", result.success);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod builtin;
pub mod config;
pub mod error;
pub mod execution;
pub mod monitoring;
pub mod plan;
pub mod storage;
pub mod tool;
pub mod trace;

// Re-export commonly used types
pub use agent::{Agent, AgentResult, ReactExecutor};
pub use config::HelmConfig;
pub use error::{HelmError, Result};
pub use execution::{CompensationEngine, Orchestrator};
pub use plan::{load_plan, Plan, PlanStep, StepStatus};
pub use tool::{Tool, ToolContract, ToolRegistry};
pub use trace::{Event, ExecutionTracer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "AgentHelm";
