//! Compensation Engine
//!
//! Undoes completed actions after a failure by running each action's
//! compensating tool, newest action first. Compensation never raises: every
//! outcome, including failures, lands in the returned report.

use std::fmt;
use std::sync::Arc;

use log::{info, warn};

use crate::tool::Arguments;
use crate::trace::{Event, ExecutionTracer, ToolCall, TraceMetadata};

/// A successful tool invocation that may need undoing.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedAction {
    pub tool_name: String,
    /// Bound arguments of the original call, reused for the compensator
    pub arguments: Arguments,
}

impl CompletedAction {
    pub fn new(tool_name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

impl From<&Event> for CompletedAction {
    fn from(event: &Event) -> Self {
        Self::new(event.tool_name.clone(), event.inputs.clone())
    }
}

/// What happened to one completed action during compensation.
#[derive(Debug, Clone, PartialEq)]
pub enum CompensationStatus {
    /// The compensating tool ran successfully
    Compensated { compensator: String },
    /// The tool declares no compensating tool
    Skipped,
    /// The declared compensating tool is not registered
    Unregistered { compensator: String },
    /// The compensating tool ran and failed
    Failed { compensator: String, error: String },
}

/// Report line for one action.
#[derive(Debug, Clone, PartialEq)]
pub struct CompensationEntry {
    pub tool_name: String,
    pub status: CompensationStatus,
}

/// Everything a compensation walk did, in walk order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompensationReport {
    pub entries: Vec<CompensationEntry>,
    /// Events of the compensating calls
    pub events: Vec<Event>,
}

impl CompensationReport {
    fn count(&self, pred: impl Fn(&CompensationStatus) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.status)).count()
    }

    pub fn compensated(&self) -> usize {
        self.count(|s| matches!(s, CompensationStatus::Compensated { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, CompensationStatus::Failed { .. }))
    }

    /// True when no compensator failed or was missing.
    pub fn is_clean(&self) -> bool {
        self.count(|s| {
            matches!(
                s,
                CompensationStatus::Failed { .. } | CompensationStatus::Unregistered { .. }
            )
        }) == 0
    }
}

impl fmt::Display for CompensationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "compensated {}, skipped {}, unregistered {}, failed {}",
            self.compensated(),
            self.count(|s| matches!(s, CompensationStatus::Skipped)),
            self.count(|s| matches!(s, CompensationStatus::Unregistered { .. })),
            self.failed()
        )
    }
}

/// Runs compensating tools through the tracer.
#[derive(Clone)]
pub struct CompensationEngine {
    tracer: Arc<ExecutionTracer>,
}

impl CompensationEngine {
    pub fn new(tracer: Arc<ExecutionTracer>) -> Self {
        Self { tracer }
    }

    /// Compensates `completed`, given in completion order, starting from
    /// the most recent action.
    pub fn compensate(&self, completed: &[CompletedAction]) -> CompensationReport {
        let mut report = CompensationReport::default();
        if completed.is_empty() {
            return report;
        }

        info!("Compensating {} completed action(s)", completed.len());
        let registry = self.tracer.registry();

        for action in completed.iter().rev() {
            let compensator = registry
                .lookup(&action.tool_name)
                .ok()
                .and_then(|tool| tool.contract().compensating_tool.clone());

            let status = match compensator {
                None => {
                    info!("No compensation for '{}'", action.tool_name);
                    CompensationStatus::Skipped
                }
                Some(compensator) if !registry.contains(&compensator) => {
                    warn!(
                        "Compensating tool '{}' for '{}' is not registered",
                        compensator, action.tool_name
                    );
                    CompensationStatus::Unregistered { compensator }
                }
                Some(compensator) => {
                    info!("Compensating '{}' with '{}'", action.tool_name, compensator);
                    let call = ToolCall::new(compensator.as_str()).with_arguments(action.arguments.clone());
                    let metadata = TraceMetadata {
                        reasoning: Some(format!("Compensating '{}'", action.tool_name)),
                        confidence: None,
                    };
                    let traced = self.tracer.trace(&call, &metadata);
                    report.events.push(traced.event);

                    match traced.outcome {
                        Ok(_) => CompensationStatus::Compensated { compensator },
                        Err(e) => {
                            warn!("Compensation '{}' failed: {}", compensator, e);
                            CompensationStatus::Failed {
                                compensator,
                                error: e.to_string(),
                            }
                        }
                    }
                }
            };

            report.entries.push(CompensationEntry {
                tool_name: action.tool_name.clone(),
                status,
            });
        }

        info!("Compensation finished: {}", report);
        report
    }
}

impl fmt::Debug for CompensationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompensationEngine").finish_non_exhaustive()
    }
}
