//! # gale-core
//!
//! Foundation types shared by every Gale crate.
//!
//! - **Turns**: role-tagged, append-only units of conversation history
//! - **Content blocks**: text, thought summary, function call, function result
//! - **Usage**: additive token counters
//! - **Events**: the stable semantic event vocabulary surfaced to callers
//! - **Logging**: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod content;
pub mod events;
pub mod logging;
pub mod usage;

pub use content::{ContentBlock, Role, Turn};
pub use events::{AgentEvent, RunOutcome, StopReason};
pub use usage::Usage;
