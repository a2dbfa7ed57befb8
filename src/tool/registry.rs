//! Tool Registry
//!
//! Maps tool names to their callables and contracts. The hosting
//! application builds one registry at startup and then shares it as
//! `Arc<ToolRegistry>`; once shared it can no longer be mutated.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::debug;
use serde_json::Value;

use super::contract::{Arguments, ToolContract};
use crate::error::{HelmError, Result};

/// Signature every tool callable implements.
pub type ToolFn = dyn Fn(&Arguments) -> std::result::Result<Value, String> + Send + Sync;

/// A registered tool: name, callable and contract.
#[derive(Clone)]
pub struct Tool {
    name: String,
    contract: ToolContract,
    func: Arc<ToolFn>,
}

impl Tool {
    /// Creates a tool from a closure.
    ///
    /// ```
    /// use agenthelm::tool::{Tool, ToolContract};
    /// use serde_json::json;
    ///
    /// let tool = Tool::new("add", ToolContract::new().with_input("a", "int"), |args| {
    ///     let a = args.get("a").and_then(|v| v.as_i64()).ok_or("a must be an int")?;
    ///     Ok(json!(a + 1))
    /// });
    /// assert_eq!(tool.name(), "add");
    /// ```
    pub fn new<F>(name: impl Into<String>, contract: ToolContract, func: F) -> Self
    where
        F: Fn(&Arguments) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into().trim().to_string(),
            contract,
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contract(&self) -> &ToolContract {
        &self.contract
    }

    /// Invokes the underlying callable once, with no policy applied.
    pub fn call(&self, args: &Arguments) -> std::result::Result<Value, String> {
        (self.func)(args)
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("contract", &self.contract)
            .finish_non_exhaustive()
    }
}

/// Registry of tools available to the engine.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Tool>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool.
    ///
    /// Names are unique: registering a name twice fails with
    /// [`HelmError::DuplicateTool`] and leaves the first registration intact.
    pub fn register(&mut self, tool: Tool) -> Result<()> {
        if tool.name.is_empty() {
            return Err(HelmError::InvalidContract {
                tool: tool.name,
                reason: "tool name is empty".to_string(),
            });
        }

        if self.tools.contains_key(&tool.name) {
            return Err(HelmError::DuplicateTool(tool.name));
        }

        tool.contract
            .validate()
            .map_err(|reason| HelmError::InvalidContract {
                tool: tool.name.clone(),
                reason,
            })?;

        debug!(
            "Registered tool '{}' (approval: {}, retries: {}, compensator: {:?})",
            tool.name,
            tool.contract.requires_approval,
            tool.contract.retries,
            tool.contract.compensating_tool
        );

        self.tools.insert(tool.name.clone(), tool);
        Ok(())
    }

    /// Registers a closure under a name.
    pub fn register_fn<F>(&mut self, name: &str, contract: ToolContract, func: F) -> Result<()>
    where
        F: Fn(&Arguments) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        self.register(Tool::new(name, contract, func))
    }

    /// Looks up a tool by name.
    pub fn lookup(&self, name: &str) -> Result<&Tool> {
        self.tools
            .get(name)
            .ok_or_else(|| HelmError::ToolNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Returns all registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Renders the named tools' contracts as a prompt-friendly text block.
    ///
    /// Unknown names are skipped.
    pub fn describe(&self, names: &[String]) -> String {
        let mut text = String::new();

        for name in names {
            let Some(tool) = self.tools.get(name) else {
                continue;
            };
            let contract = &tool.contract;

            let inputs: Vec<String> = contract
                .inputs
                .iter()
                .map(|p| {
                    if p.required {
                        format!("{}: {}", p.name, p.kind)
                    } else {
                        format!("{}: {} (optional)", p.name, p.kind)
                    }
                })
                .collect();
            let outputs: Vec<String> = contract
                .outputs
                .iter()
                .map(|(name, kind)| format!("{}: {}", name, kind))
                .collect();

            text.push_str(&format!("Tool Name: {}\n", name));
            text.push_str(&format!("Tool {} Inputs: {{{}}}\n", name, inputs.join(", ")));
            text.push_str(&format!("Tool {} Outputs: {{{}}}\n", name, outputs.join(", ")));
            text.push_str(&format!(
                "Tool {} Side Effects: [{}]\n\n",
                name,
                contract.side_effects.join(", ")
            ));
        }

        text
    }
}
