//! Plan Execution Module
//!
//! Runs approved plans and recovers from partial failure.
//!
//! # Architecture
//!
//! - [`orchestrator`]: Round-based, multi-threaded plan execution
//! - [`compensation`]: Reverse-order rollback of completed actions

pub mod compensation;
pub mod orchestrator;

pub use compensation::{
    CompensationEngine, CompensationEntry, CompensationReport, CompensationStatus, CompletedAction,
};
pub use orchestrator::Orchestrator;
