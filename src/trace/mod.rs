//! Tracing Module
//!
//! Everything needed to run one tool call under its contract and leave an
//! audit record behind.
//!
//! - [`event`]: The immutable [`Event`] record
//! - [`approval`]: Approval gates consulted before guarded calls
//! - [`tracer`]: The [`ExecutionTracer`] itself

pub mod approval;
pub mod event;
pub mod tracer;

pub use approval::{ApprovalGate, AutoApprove, ConsoleApproval, DenyAll};
pub use event::Event;
pub use tracer::{ExecutionTracer, ToolCall, TraceMetadata, TracedCall, DEFAULT_RETRY_BACKOFF};
