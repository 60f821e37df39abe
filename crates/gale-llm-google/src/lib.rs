//! # gale-llm-google
//!
//! Gemini Interactions API transport.
//!
//! Implements [`ModelTransport`](gale_llm::ModelTransport) against
//! `POST {base}/v1beta/interactions?alt=sse`:
//! - Message converter (content blocks and tool schemas → wire format)
//! - Stream handler (SSE `event_type` payloads → provider events)
//! - Transport (API key auth, HTTP error mapping)
//!
//! Server-side conversation state is carried by the continuation ID
//! (`previous_interaction_id`), so each call sends only the newest input.

#![deny(unsafe_code)]

pub mod message_converter;
pub mod provider;
pub mod stream_handler;
pub mod types;

pub use provider::GeminiTransport;
pub use types::GeminiConfig;
