//! Plan Module
//!
//! Data structures and utilities for defining, validating and scheduling
//! multi-step plans.
//!
//! # Structure
//!
//! - [`model`]: Core data structures (PlanStep, Plan)
//! - [`parser`]: YAML/JSON loading and saving
//! - [`validator`]: Structural checks and execution waves
//! - [`graph`]: Step status tracking and scheduling

pub mod graph;
pub mod model;
pub mod parser;
pub mod validator;

pub use graph::PlanGraph;
pub use model::{Plan, PlanStep, StepStatus};
pub use parser::{load_plan, plan_from_json, plan_from_yaml, plan_to_json, plan_to_yaml, save_plan};
pub use validator::{execution_waves, quick_validate, topological_order, validate_plan, ValidationError};
