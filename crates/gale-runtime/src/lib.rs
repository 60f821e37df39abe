//! # gale-runtime
//!
//! Agent execution loop, tool execution and session orchestration.
//!
//! - **Event channel**: push/pull transport with a one-shot final result
//! - **Tool executor**: sequential, failure-isolated batch execution
//! - **Tool hook wrapper**: gate and post-process every tool call
//! - **Agent loop**: call model → run tools → continue or stop
//! - **Session**: message queue, lifecycle hooks, bounded end-of-run injection

#![deny(unsafe_code)]

pub mod agent;
pub mod channel;
pub mod config;
pub mod errors;
pub mod hooks;
pub mod orchestrator;

pub use agent::agent_loop::{AgentLoop, AgentRun, FollowUpFn, LoopState};
pub use agent::tool_executor::execute_calls;
pub use agent::{AgentChannel, agent_channel};
pub use channel::EventChannel;
pub use config::EngineConfig;
pub use errors::RuntimeError;
pub use hooks::{ContextTransform, FnTransform, HookedTool, wrap_tools};
pub use orchestrator::Session;
