//! Step Scheduler
//!
//! Tracks the status of every step over the plan's dependency graph:
//! - Which steps are ready to run
//! - Guarded status transitions
//! - Completion, blocked steps and deadlock detection

use std::collections::{HashMap, HashSet};

use log::debug;
use serde_json::Value;

use super::model::{Plan, PlanStep, StepStatus};
use crate::error::{HelmError, Result};

/// Dependency-aware view of a plan that drives step status.
///
/// The graph owns the plan while it runs; [`PlanGraph::into_plan`] hands it
/// back with every status, output and error filled in.
#[derive(Debug, Clone)]
pub struct PlanGraph {
    /// The plan being scheduled
    plan: Plan,
    /// Step id -> position in `plan.steps`
    index: HashMap<String, usize>,
}

impl PlanGraph {
    /// Builds a scheduler over `plan`.
    ///
    /// Fails with [`HelmError::PlanValidation`] on duplicate step ids, a
    /// step that is not pending, or a dependency naming a step that does not
    /// exist. Cycles are accepted here and surface as a deadlock once nothing
    /// can run.
    pub fn new(plan: Plan) -> Result<Self> {
        let mut index = HashMap::new();
        for (pos, step) in plan.steps.iter().enumerate() {
            if step.status != StepStatus::Pending {
                return Err(HelmError::PlanValidation(format!(
                    "Step '{}' is {}; every step must start pending",
                    step.id, step.status
                )));
            }
            if index.insert(step.id.clone(), pos).is_some() {
                return Err(HelmError::PlanValidation(format!(
                    "Duplicate step ID: '{}'",
                    step.id
                )));
            }
        }

        for step in &plan.steps {
            for dep in &step.depends_on {
                if !index.contains_key(dep) {
                    return Err(HelmError::PlanValidation(format!(
                        "Step '{}' depends on unknown step '{}'",
                        step.id, dep
                    )));
                }
            }
        }

        debug!("Scheduling {} steps for '{}'", plan.steps.len(), plan.goal);
        Ok(Self { plan, index })
    }

    /// Returns pending steps whose dependencies have all completed, in plan
    /// order.
    pub fn get_ready_steps(&self) -> Vec<PlanStep> {
        self.plan
            .steps
            .iter()
            .filter(|step| step.status == StepStatus::Pending)
            .filter(|step| {
                step.depends_on
                    .iter()
                    .all(|dep| self.status(dep) == Some(StepStatus::Completed))
            })
            .cloned()
            .collect()
    }

    /// Moves a step from pending to running.
    pub fn mark_running(&mut self, id: &str) -> Result<()> {
        let step = self.transition(id, StepStatus::Running)?;
        debug!("Step '{}' running", step.id);
        Ok(())
    }

    /// Moves a running step to completed, storing its output.
    pub fn mark_completed(&mut self, id: &str, output: Option<Value>) -> Result<()> {
        let step = self.transition(id, StepStatus::Completed)?;
        step.output = output;
        debug!("Step '{}' completed", step.id);
        Ok(())
    }

    /// Moves a running step to failed, storing the error text.
    pub fn mark_failed(&mut self, id: &str, error: impl Into<String>) -> Result<()> {
        let step = self.transition(id, StepStatus::Failed)?;
        step.error = Some(error.into());
        debug!("Step '{}' failed", step.id);
        Ok(())
    }

    fn transition(&mut self, id: &str, to: StepStatus) -> Result<&mut PlanStep> {
        let pos = *self
            .index
            .get(id)
            .ok_or_else(|| HelmError::UnknownStep(id.to_string()))?;
        let step = &mut self.plan.steps[pos];

        let allowed = matches!(
            (step.status, to),
            (StepStatus::Pending, StepStatus::Running)
                | (StepStatus::Running, StepStatus::Completed)
                | (StepStatus::Running, StepStatus::Failed)
        );
        if !allowed {
            return Err(HelmError::InvalidTransition {
                step: id.to_string(),
                from: step.status,
                to,
            });
        }

        step.status = to;
        Ok(step)
    }

    /// Status of a step, or `None` for an unknown id.
    pub fn status(&self, id: &str) -> Option<StepStatus> {
        self.index.get(id).map(|&pos| self.plan.steps[pos].status)
    }

    /// Returns a step by id.
    pub fn step(&self, id: &str) -> Option<&PlanStep> {
        self.index.get(id).map(|&pos| &self.plan.steps[pos])
    }

    /// True when no step is pending or running.
    pub fn is_complete(&self) -> bool {
        self.plan.is_complete()
    }

    /// True when every step completed.
    pub fn success(&self) -> bool {
        self.plan.success()
    }

    /// Returns true if any step is running.
    pub fn has_running(&self) -> bool {
        self.plan
            .steps
            .iter()
            .any(|s| s.status == StepStatus::Running)
    }

    /// Pending steps that can never run because a dependency failed,
    /// directly or through another blocked step. Plan order.
    pub fn blocked_steps(&self) -> Vec<String> {
        let mut dead: HashSet<&str> = self
            .plan
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Failed)
            .map(|s| s.id.as_str())
            .collect();

        if dead.is_empty() {
            return Vec::new();
        }

        let mut blocked: HashSet<&str> = HashSet::new();
        loop {
            let mut changed = false;
            for step in &self.plan.steps {
                if step.status != StepStatus::Pending || blocked.contains(step.id.as_str()) {
                    continue;
                }
                if step.depends_on.iter().any(|dep| dead.contains(dep.as_str())) {
                    blocked.insert(step.id.as_str());
                    dead.insert(step.id.as_str());
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        self.plan
            .steps
            .iter()
            .filter(|s| blocked.contains(s.id.as_str()))
            .map(|s| s.id.clone())
            .collect()
    }

    /// Pending steps that are neither ready nor blocked by a failure.
    ///
    /// Non-empty only when nothing is running, which means a dependency
    /// cycle keeps them waiting forever.
    pub fn stuck_steps(&self) -> Vec<String> {
        if self.has_running() || !self.get_ready_steps().is_empty() {
            return Vec::new();
        }

        let blocked: HashSet<String> = self.blocked_steps().into_iter().collect();
        self.plan
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Pending && !blocked.contains(&s.id))
            .map(|s| s.id.clone())
            .collect()
    }

    /// True when nothing is ready or running and some pending step is
    /// waiting on a cycle rather than a failure.
    pub fn is_deadlocked(&self) -> bool {
        !self.stuck_steps().is_empty()
    }

    /// Returns the current progress as (finished, total).
    pub fn progress(&self) -> (usize, usize) {
        let finished = self
            .plan
            .steps
            .iter()
            .filter(|s| s.status.is_terminal())
            .count();
        (finished, self.plan.steps.len())
    }

    /// IDs of failed steps, in plan order.
    pub fn failed_step_ids(&self) -> Vec<String> {
        self.plan.failed_steps()
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Consumes the scheduler, returning the plan with its final state.
    pub fn into_plan(self) -> Plan {
        self.plan
    }
}
