//! Agent Registry
//!
//! Maps agent names to shared agent instances for the orchestrator.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::info;

use super::Agent;
use crate::error::{HelmError, Result};

/// Named agents available to a plan.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an agent under its own name. Names must be unique.
    pub fn register(&mut self, agent: Arc<dyn Agent>) -> Result<()> {
        let name = agent.name().to_string();
        if self.agents.contains_key(&name) {
            return Err(HelmError::DuplicateAgent(name));
        }
        info!("Registered agent '{}'", name);
        self.agents.insert(name, agent);
        Ok(())
    }

    /// Looks up an agent by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Agent>> {
        self.agents
            .get(name)
            .cloned()
            .ok_or_else(|| HelmError::AgentNotFound(format!("Agent '{}' not found in registry", name)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    /// Registered agent names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.agents.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.list())
            .finish()
    }
}
