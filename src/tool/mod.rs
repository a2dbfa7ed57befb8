//! Tool Module
//!
//! Tools are the side-effecting actions a workflow performs. Each one is
//! registered once, with a [`ToolContract`], in a [`ToolRegistry`].
//!
//! - [`contract`]: Contract metadata and argument binding
//! - [`registry`]: Name to callable mapping

pub mod contract;
pub mod registry;

pub use contract::{Arguments, Parameter, ToolContract};
pub use registry::{Tool, ToolFn, ToolRegistry};
