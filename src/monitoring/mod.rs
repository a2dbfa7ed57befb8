//! Monitoring Module
//!
//! Per-step timing for plan runs.
//!
//! - [`timeline`]: Step start/finish recording and Gantt charts

pub mod timeline;

pub use timeline::{EventType, ExecutionTimeline, StepSpan, TimelineEvent};
