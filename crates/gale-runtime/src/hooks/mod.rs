//! Runtime glue between the hook dispatcher and the agent loop.

pub mod context;
pub mod tool_wrapper;

pub use context::{ContextTransform, FnTransform};
pub use tool_wrapper::{HookedTool, wrap_tools};
