//! # gale-tools
//!
//! The tool capability consumed by the engine.
//!
//! - [`AgentTool`]: name, description, parameter schema, async `execute`
//! - [`ToolContext`]: cooperative cancellation plus an optional progress sink
//! - [`ToolOutput`]: result text with an error flag
//! - [`ToolSet`]: ordered, cheaply cloneable collection with exact-name lookup
//!
//! Concrete tools (filesystem, shell, web) live outside the engine.

#![deny(unsafe_code)]

pub mod errors;
pub mod set;
pub mod traits;

pub use errors::ToolError;
pub use set::ToolSet;
pub use traits::{AgentTool, ProgressFn, ToolContext, ToolDefinition, ToolOutput};
