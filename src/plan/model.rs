//! Plan Data Model
//!
//! Core data structures describing a multi-step plan and its steps.
//!
//! # Example YAML Format
//!
//! ```yaml
//! goal: Refund a damaged order
//! reasoning: Look the order up before touching payments
//! approved: true
//! steps:
//!   - id: lookup
//!     description: Fetch the order record
//!     tool_name: get_order
//!     args:
//!       order_id: ORD-1001
//!
//!   - id: refund
//!     description: Issue the refund
//!     tool_name: issue_refund
//!     agent_name: payments
//!     args:
//!       order_id: ORD-1001
//!       amount: 75.5
//!     depends_on: lookup
//! ```

use std::collections::HashSet;
use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tool::Arguments;

/// Lifecycle of a plan step.
///
/// Transitions only move forward: `Pending -> Running -> Completed | Failed`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Waiting for dependencies
    #[default]
    Pending,
    /// Dispatched to an agent
    Running,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
}

impl StepStatus {
    /// Returns true for `Completed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// One unit of work in a plan.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlanStep {
    /// Identifier, unique within the plan
    pub id: String,

    /// What the step should accomplish
    #[serde(default)]
    pub description: String,

    /// Tool the step is expected to use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Agent the step is delegated to (default agent if unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,

    /// Arguments for the step
    #[serde(default, skip_serializing_if = "Arguments::is_empty")]
    pub args: Arguments,

    /// IDs of steps that must complete first
    #[serde(deserialize_with = "single_or_set", default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// Current status
    #[serde(default)]
    pub status: StepStatus,

    /// Result produced by the step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    /// Error text if the step failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Deserializes a single id or a list of ids, dropping repeats.
fn single_or_set<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Value::deserialize(deserializer)?;
    let ids: Vec<String> = match val {
        Value::Null => Vec::new(),
        Value::String(s) if s.trim().is_empty() => Vec::new(),
        Value::String(s) => vec![s],
        Value::Array(arr) => arr
            .into_iter()
            .map(|v| match v {
                Value::String(s) => Ok(s),
                _ => Err(de::Error::custom("Expected step id string in depends_on")),
            })
            .collect::<Result<_, _>>()?,
        _ => return Err(de::Error::custom("Expected step id or list of step ids")),
    };

    let mut seen = HashSet::new();
    Ok(ids.into_iter().filter(|id| seen.insert(id.clone())).collect())
}

impl PlanStep {
    /// Creates a pending step.
    ///
    /// # Example
    ///
    /// ```
    /// use agenthelm::plan::PlanStep;
    ///
    /// let step = PlanStep::new("draft", "Write the first draft")
    ///     .with_tool("write_draft")
    ///     .with_agent("writer")
    ///     .with_arg("topic", "AI agents")
    ///     .depends_on("research");
    /// assert_eq!(step.depends_on, vec!["research"]);
    /// ```
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into().trim().to_string(),
            description: description.into(),
            tool_name: None,
            agent_name: None,
            args: Arguments::new(),
            depends_on: Vec::new(),
            status: StepStatus::Pending,
            output: None,
            error: None,
        }
    }

    /// Sets the tool the step uses.
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool_name = Some(tool.into());
        self
    }

    /// Delegates the step to a named agent.
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent_name = Some(agent.into());
        self
    }

    /// Adds an argument.
    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    /// Adds a dependency on another step. Repeats are ignored.
    pub fn depends_on(mut self, step_id: impl Into<String>) -> Self {
        let step_id = step_id.into();
        if !self.depends_on.contains(&step_id) {
            self.depends_on.push(step_id);
        }
        self
    }

    /// Renders the task text handed to an agent: the description plus the
    /// arguments as `key=value` pairs in key order.
    pub fn task_description(&self) -> String {
        if self.args.is_empty() {
            return self.description.clone();
        }

        let rendered: Vec<String> = self
            .args
            .iter()
            .map(|(key, value)| match value {
                Value::String(s) => format!("{}={}", key, s),
                other => format!("{}={}", key, other),
            })
            .collect();

        format!("{} (args: {})", self.description, rendered.join(", "))
    }
}

/// A goal with an ordered, dependency-annotated set of steps.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Plan {
    /// What the plan achieves
    #[serde(default)]
    pub goal: String,

    /// Why the steps were chosen
    #[serde(default)]
    pub reasoning: String,

    /// Steps in plan order
    #[serde(default)]
    pub steps: Vec<PlanStep>,

    /// Set by an approval gate; execution refuses unapproved plans
    #[serde(default)]
    pub approved: bool,
}

impl Plan {
    /// Creates an empty, unapproved plan.
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            ..Self::default()
        }
    }

    /// Creates a plan from a list of steps.
    pub fn from_steps(goal: impl Into<String>, steps: Vec<PlanStep>) -> Self {
        Self {
            goal: goal.into(),
            steps,
            ..Self::default()
        }
    }

    /// Sets the reasoning text.
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    /// Adds a step to the plan.
    pub fn add_step(&mut self, step: PlanStep) -> Result<(), String> {
        if self.steps.iter().any(|s| s.id == step.id) {
            return Err(format!("Step '{}' already exists", step.id));
        }
        self.steps.push(step);
        Ok(())
    }

    /// Marks the plan approved for execution.
    pub fn approve(&mut self) {
        self.approved = true;
    }

    /// Gets a step by ID.
    pub fn get_step(&self, id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Gets a mutable reference to a step by ID.
    pub fn get_step_mut(&mut self, id: &str) -> Option<&mut PlanStep> {
        self.steps.iter_mut().find(|s| s.id == id)
    }

    /// Returns steps with no dependencies (entry points).
    pub fn root_steps(&self) -> Vec<&PlanStep> {
        self.steps.iter().filter(|s| s.depends_on.is_empty()).collect()
    }

    /// True when every step is completed or failed.
    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|s| s.status.is_terminal())
    }

    /// True when every step completed.
    pub fn success(&self) -> bool {
        self.steps.iter().all(|s| s.status == StepStatus::Completed)
    }

    /// IDs of failed steps, in plan order.
    pub fn failed_steps(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Failed)
            .map(|s| s.id.clone())
            .collect()
    }

    /// Returns the number of steps in the plan.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the plan has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
