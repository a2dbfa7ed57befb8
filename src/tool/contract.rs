//! Tool Contracts
//!
//! A contract is the metadata registered alongside a tool callable. It
//! governs how the tracer invokes the tool: whether a human must approve
//! the call, how many extra attempts a failure earns, and which tool undoes
//! its side effects.
//!
//! # Example
//!
//! ```
//! use agenthelm::tool::ToolContract;
//!
//! let contract = ToolContract::new()
//!     .with_input("order_id", "str")
//!     .with_input("amount", "float")
//!     .with_output("transaction_id", "str")
//!     .with_side_effect("payments.refund")
//!     .with_approval()
//!     .with_retries(2)
//!     .with_compensating_tool("reverse_refund");
//!
//! assert!(contract.requires_approval);
//! assert_eq!(contract.max_attempts(), 3);
//! ```

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named arguments of a tool call. Keys are kept sorted, so any rendering
/// of a mapping is deterministic.
pub type Arguments = serde_json::Map<String, Value>;

/// One declared input parameter.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Parameter name used as the key of bound arguments
    pub name: String,

    /// Free-form type description (e.g. "str", "list[int]")
    #[serde(rename = "type")]
    pub kind: String,

    /// Whether a call must supply this parameter
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// Metadata governing how a tool may be invoked.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ToolContract {
    /// Declared input parameters, in positional order
    #[serde(default)]
    pub inputs: Vec<Parameter>,

    /// Output names mapped to type descriptions
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,

    /// Tags describing what the tool changes in the outside world
    #[serde(default)]
    pub side_effects: Vec<String>,

    /// Whether the approval gate must grant each call
    #[serde(default)]
    pub requires_approval: bool,

    /// Extra attempts allowed after the first failure
    #[serde(default)]
    pub retries: u32,

    /// Tool that undoes this tool's side effects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compensating_tool: Option<String>,

    /// Cost ceiling for a single call
    #[serde(default)]
    pub max_cost: f64,
}

impl ToolContract {
    /// Creates an empty contract: no approval, no retries, no compensator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a required input parameter.
    pub fn with_input(mut self, name: impl Into<String>, kind: impl Into<String>) -> Self {
        self.inputs.push(Parameter {
            name: name.into(),
            kind: kind.into(),
            required: true,
        });
        self
    }

    /// Declares an optional input parameter.
    pub fn with_optional_input(mut self, name: impl Into<String>, kind: impl Into<String>) -> Self {
        self.inputs.push(Parameter {
            name: name.into(),
            kind: kind.into(),
            required: false,
        });
        self
    }

    /// Declares an output.
    pub fn with_output(mut self, name: impl Into<String>, kind: impl Into<String>) -> Self {
        self.outputs.insert(name.into(), kind.into());
        self
    }

    /// Adds a side-effect tag.
    pub fn with_side_effect(mut self, tag: impl Into<String>) -> Self {
        self.side_effects.push(tag.into());
        self
    }

    /// Requires approval before every call.
    pub fn with_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }

    /// Sets the number of extra attempts after a failure.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Names the tool that undoes this one.
    pub fn with_compensating_tool(mut self, tool: impl Into<String>) -> Self {
        self.compensating_tool = Some(tool.into());
        self
    }

    /// Sets the per-call cost ceiling.
    pub fn with_max_cost(mut self, max_cost: f64) -> Self {
        self.max_cost = max_cost;
        self
    }

    /// Total attempts the tracer makes before giving up.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Checks the contract's own invariants.
    pub fn validate(&self) -> Result<(), String> {
        if !self.max_cost.is_finite() || self.max_cost < 0.0 {
            return Err(format!("max_cost must be >= 0, got {}", self.max_cost));
        }

        let mut seen = HashSet::new();
        for param in &self.inputs {
            if param.name.trim().is_empty() {
                return Err("input parameter with empty name".to_string());
            }
            if !seen.insert(param.name.as_str()) {
                return Err(format!("input parameter '{}' declared twice", param.name));
            }
        }

        Ok(())
    }

    /// Binds positional and keyword arguments to declared parameter names.
    ///
    /// Positional values bind in declaration order. When the contract
    /// declares no inputs, keyword arguments pass through unchanged and
    /// positional values are rejected.
    pub fn bind(&self, positional: &[Value], named: &Arguments) -> Result<Arguments, String> {
        if self.inputs.is_empty() {
            if !positional.is_empty() {
                return Err(format!(
                    "{} positional argument(s) given but no inputs are declared",
                    positional.len()
                ));
            }
            return Ok(named.clone());
        }

        if positional.len() > self.inputs.len() {
            return Err(format!(
                "takes {} argument(s) but {} positional were given",
                self.inputs.len(),
                positional.len()
            ));
        }

        let mut bound = Arguments::new();
        for (param, value) in self.inputs.iter().zip(positional) {
            bound.insert(param.name.clone(), value.clone());
        }

        for (name, value) in named {
            if !self.inputs.iter().any(|p| &p.name == name) {
                return Err(format!("unexpected argument '{}'", name));
            }
            if bound.contains_key(name) {
                return Err(format!("multiple values for argument '{}'", name));
            }
            bound.insert(name.clone(), value.clone());
        }

        let missing: Vec<&str> = self
            .inputs
            .iter()
            .filter(|p| p.required && !bound.contains_key(&p.name))
            .map(|p| p.name.as_str())
            .collect();

        if !missing.is_empty() {
            return Err(format!("missing required argument(s): {}", missing.join(", ")));
        }

        Ok(bound)
    }
}
