//! # gale-llm
//!
//! Everything between the agent loop and a concrete model backend.
//!
//! - [`ModelTransport`]: one streaming call in, a stream of [`ProviderEvent`]s out
//! - [`ProviderEvent`]: the provider's low-level protocol (interaction, content
//!   block, delta, error)
//! - [`ModelAdapter`]: translates that protocol into the semantic
//!   [`AgentEvent`](gale_core::AgentEvent) vocabulary while accumulating the
//!   model's content blocks
//! - [`sse`]: shared Server-Sent Events line parser for HTTP transports

#![deny(unsafe_code)]

pub mod adapter;
pub mod events;
pub mod provider;
pub mod sse;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use adapter::{ModelAdapter, ModelResponse};
pub use events::{ContentKind, ProviderDelta, ProviderEvent};
pub use provider::{ModelRequest, ModelTransport, ProviderError, ProviderEventStream, ProviderResult};
