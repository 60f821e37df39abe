//! # gale-hooks
//!
//! Ordered, typed middleware chains at six fixed extension points.
//!
//! | Point | Policy |
//! |---|---|
//! | `onAgentStart` | merge |
//! | `onInteractionStart` | merge |
//! | `beforeToolExecute` | gate |
//! | `afterToolExecute` | merge |
//! | `onInteractionEnd` | observe |
//! | `onAgentEnd` | collect |
//!
//! ## Execution Model
//!
//! Handlers of one point run strictly in order (priority descending, then
//! registration order). All four policies live in [`HookDispatcher`]:
//! - **Merge**: shallow-merge every returned [`HookOutcome`], later field wins
//! - **Gate**: the first denial short-circuits; no handlers means allow
//! - **Observe**: run everything, discard results
//! - **Collect**: join every non-empty `input` with a blank line
//!
//! ## Errors
//!
//! A failing handler is a caller bug. Its [`HookError`] propagates out of the
//! dispatch call untouched; nothing is swallowed.

#![deny(unsafe_code)]

pub mod dispatcher;
pub mod errors;
pub mod handler;
pub mod registry;
pub mod types;

pub use dispatcher::{GateDecision, HookDispatcher};
pub use errors::HookError;
pub use handler::{FnHandler, HookHandler};
pub use registry::{HookId, HookRegistry};
pub use types::{ContextOverrides, ContextSnapshot, HookEvent, HookOutcome, HookPoint, MergePolicy};
