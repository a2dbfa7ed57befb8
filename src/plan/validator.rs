//! Plan Validation
//!
//! Structural checks run before a plan is handed to the orchestrator:
//! - Step field validation
//! - Reference integrity checking
//! - Dependency graph validation (no cycles)
//! - Topological ordering and execution waves

use std::collections::{HashMap, HashSet, VecDeque};

use log::{debug, info, warn};

use super::model::{Plan, PlanStep};
use crate::error::{HelmError, Result};

/// Validation error types for user-friendly error messages.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyPlan,
    DuplicateStepId(String),
    EmptyStepId,
    InvalidReference { step: String, reference: String },
    SelfDependency(String),
    CyclicDependency(Vec<String>),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPlan => write!(f, "Plan has no steps"),
            Self::DuplicateStepId(id) => write!(f, "Duplicate step ID: '{}'", id),
            Self::EmptyStepId => write!(f, "Step has empty or whitespace-only ID"),
            Self::InvalidReference { step, reference } => {
                write!(f, "Step '{}' depends on unknown step '{}'", step, reference)
            }
            Self::SelfDependency(step) => write!(f, "Step '{}' depends on itself", step),
            Self::CyclicDependency(steps) => write!(
                f,
                "Plan contains cyclic dependencies between steps: {}",
                steps.join(", ")
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validates a single step's fields.
fn validate_step(step: &PlanStep) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if step.id.trim().is_empty() {
        errors.push(ValidationError::EmptyStepId);
        return errors;
    }

    if step.depends_on.iter().any(|dep| dep == &step.id) {
        errors.push(ValidationError::SelfDependency(step.id.clone()));
    }

    if step.tool_name.is_none() && step.agent_name.is_none() {
        debug!("Step '{}' names no tool or agent; the default agent decides", step.id);
    }

    if step.depends_on.is_empty() {
        debug!("Step '{}' is a root step (no dependencies)", step.id);
    }

    errors
}

/// Validates the whole plan structure.
///
/// Checks, in order:
/// 1. Plan is not empty
/// 2. No duplicate step IDs
/// 3. All steps have valid fields
/// 4. All dependencies point to existing steps
/// 5. No cyclic dependencies
///
/// Step order is left untouched. All problems found are reported together
/// as one [`HelmError::PlanValidation`].
pub fn validate_plan(plan: &Plan) -> Result<()> {
    info!("Validating plan with {} steps", plan.steps.len());

    if plan.steps.is_empty() {
        return Err(HelmError::PlanValidation(ValidationError::EmptyPlan.to_string()));
    }

    let mut seen_ids: HashSet<&str> = HashSet::new();
    for step in &plan.steps {
        if !seen_ids.insert(step.id.as_str()) {
            return Err(HelmError::PlanValidation(
                ValidationError::DuplicateStepId(step.id.clone()).to_string(),
            ));
        }
    }

    let mut all_errors = Vec::new();
    for step in &plan.steps {
        all_errors.extend(validate_step(step));

        for dep in &step.depends_on {
            if !seen_ids.contains(dep.as_str()) {
                all_errors.push(ValidationError::InvalidReference {
                    step: step.id.clone(),
                    reference: dep.clone(),
                });
            }
        }
    }

    if !all_errors.is_empty() {
        let messages: Vec<String> = all_errors.iter().map(|e| e.to_string()).collect();
        return Err(HelmError::PlanValidation(messages.join("\n")));
    }

    let order = topological_order(plan).map_err(|e| HelmError::PlanValidation(e.to_string()))?;
    debug!("Topological order: {:?}", order);

    info!("Plan validated: {} steps", plan.steps.len());
    Ok(())
}

/// Orders step ids so every dependency comes before its dependents, using
/// Kahn's algorithm. Ties keep plan order.
///
/// Unknown dependency ids are ignored here; [`validate_plan`] reports them.
pub fn topological_order(plan: &Plan) -> std::result::Result<Vec<String>, ValidationError> {
    Ok(execution_waves(plan)?.into_iter().flatten().collect())
}

/// Groups steps into the rounds the orchestrator would run them in when
/// every step succeeds. Each wave only depends on earlier waves.
pub fn execution_waves(plan: &Plan) -> std::result::Result<Vec<Vec<String>>, ValidationError> {
    let known: HashSet<&str> = plan.steps.iter().map(|s| s.id.as_str()).collect();

    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
    for step in &plan.steps {
        let deps: Vec<&str> = step
            .depends_on
            .iter()
            .map(String::as_str)
            .filter(|dep| known.contains(dep))
            .collect();
        in_degree.insert(step.id.as_str(), deps.len());
        for dep in deps {
            successors.entry(dep).or_default().push(step.id.as_str());
        }
    }

    let position: HashMap<&str, usize> = plan
        .steps
        .iter()
        .enumerate()
        .map(|(pos, s)| (s.id.as_str(), pos))
        .collect();

    let mut current: VecDeque<&str> = plan
        .steps
        .iter()
        .map(|s| s.id.as_str())
        .filter(|id| in_degree.get(id) == Some(&0))
        .collect();

    let mut waves = Vec::new();
    let mut placed = 0;

    while !current.is_empty() {
        let mut next: Vec<&str> = Vec::new();
        let wave: Vec<String> = current.iter().map(|id| id.to_string()).collect();
        placed += wave.len();

        while let Some(id) = current.pop_front() {
            for succ in successors.get(id).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(succ) {
                    *degree -= 1;
                    if *degree == 0 {
                        next.push(*succ);
                    }
                }
            }
        }

        next.sort_by_key(|id| position.get(id).copied().unwrap_or(usize::MAX));
        waves.push(wave);
        current = next.into_iter().collect();
    }

    if placed != plan.steps.len() {
        let stuck: Vec<String> = plan
            .steps
            .iter()
            .filter(|s| in_degree.get(s.id.as_str()).copied().unwrap_or(0) > 0)
            .map(|s| s.id.clone())
            .collect();
        warn!("Cycle detected between steps: {:?}", stuck);
        return Err(ValidationError::CyclicDependency(stuck));
    }

    Ok(waves)
}

/// Quick validation that returns a list of error messages without failing
/// fast.
pub fn quick_validate(plan: &Plan) -> Vec<String> {
    let mut errors = Vec::new();

    if plan.steps.is_empty() {
        errors.push(ValidationError::EmptyPlan.to_string());
        return errors;
    }

    let step_ids: HashSet<&str> = plan.steps.iter().map(|s| s.id.as_str()).collect();
    if step_ids.len() != plan.steps.len() {
        errors.push("Plan contains duplicate step IDs".to_string());
    }

    for step in &plan.steps {
        errors.extend(validate_step(step).iter().map(|e| e.to_string()));

        for dep in &step.depends_on {
            if !step_ids.contains(dep.as_str()) {
                errors.push(
                    ValidationError::InvalidReference {
                        step: step.id.clone(),
                        reference: dep.clone(),
                    }
                    .to_string(),
                );
            }
        }
    }

    errors
}
