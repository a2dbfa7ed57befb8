//! Plan Parser
//!
//! Loads and saves plan definitions. Files ending in `.json` are read as
//! JSON; everything else is read as YAML. Both formats keep step order and
//! dependency lists exactly as written.

use std::fs;
use std::path::Path;

use log::{debug, info};

use super::model::Plan;
use super::validator::validate_plan;
use crate::error::{HelmError, Result};

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Loads a plan from a YAML or JSON file and validates its structure.
///
/// # Example
///
/// ```rust,no_run
/// use agenthelm::plan::load_plan;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let plan = load_plan("refund_plan.yaml")?;
///     println!("Loaded {} steps", plan.steps.len());
///     Ok(())
/// }
/// ```
pub fn load_plan(path: impl AsRef<Path>) -> Result<Plan> {
    let path = path.as_ref();
    info!("Loading plan from: {}", path.display());

    let content = fs::read_to_string(path).map_err(|e| {
        HelmError::PlanValidation(format!(
            "Failed to read plan file '{}': {}. Check that the file exists and is readable.",
            path.display(),
            e
        ))
    })?;

    debug!("Plan content loaded ({} bytes)", content.len());

    let plan = if is_json(path) {
        plan_from_json(&content)?
    } else {
        plan_from_yaml(&content)?
    };

    info!("Parsed {} steps for goal '{}'", plan.steps.len(), plan.goal);

    validate_plan(&plan)?;
    Ok(plan)
}

/// Parses a plan from YAML text without validating it.
pub fn plan_from_yaml(content: &str) -> Result<Plan> {
    serde_yaml::from_str(content).map_err(|e| {
        HelmError::PlanValidation(format!("Failed to parse plan YAML: {}. Check the file format.", e))
    })
}

/// Parses a plan from JSON text without validating it.
pub fn plan_from_json(content: &str) -> Result<Plan> {
    serde_json::from_str(content).map_err(|e| {
        HelmError::PlanValidation(format!("Failed to parse plan JSON: {}. Check the file format.", e))
    })
}

/// Renders a plan as YAML.
pub fn plan_to_yaml(plan: &Plan) -> Result<String> {
    serde_yaml::to_string(plan)
        .map_err(|e| HelmError::PlanValidation(format!("Failed to serialize plan: {}", e)))
}

/// Renders a plan as pretty-printed JSON.
pub fn plan_to_json(plan: &Plan) -> Result<String> {
    serde_json::to_string_pretty(plan)
        .map_err(|e| HelmError::PlanValidation(format!("Failed to serialize plan: {}", e)))
}

/// Saves a plan, picking the format from the file extension.
pub fn save_plan(plan: &Plan, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let content = if is_json(path) {
        plan_to_json(plan)?
    } else {
        plan_to_yaml(plan)?
    };

    fs::write(path, content).map_err(|e| {
        HelmError::PlanValidation(format!("Failed to write plan to '{}': {}", path.display(), e))
    })?;
    info!("Plan saved to: {}", path.display());
    Ok(())
}
