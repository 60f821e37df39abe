//! Interactions API stream events → provider events.
//!
//! Stateless: each SSE payload maps to at most one [`ProviderEvent`].
//! Accumulation happens downstream in the model adapter.

use gale_llm::{ContentKind, ProviderDelta, ProviderEvent};
use serde_json::Value;
use tracing::{debug, warn};

use crate::types::{WireDelta, WireEvent};

/// Map a wire content type to a block kind.
pub fn content_kind(kind: &str) -> ContentKind {
    match kind {
        "text" => ContentKind::Text,
        "thought" => ContentKind::Thought,
        "function_call" => ContentKind::FunctionCall,
        _ => ContentKind::Unknown,
    }
}

/// Convert one wire event. `None` means "nothing the engine models".
pub fn convert_event(event: WireEvent) -> Option<ProviderEvent> {
    match event {
        WireEvent::InteractionStart { interaction } => Some(ProviderEvent::InteractionStart {
            interaction_id: interaction.and_then(|i| i.id),
        }),
        WireEvent::InteractionComplete { interaction } => {
            let interaction = interaction.unwrap_or_default();
            Some(ProviderEvent::InteractionComplete {
                interaction_id: interaction.id,
                usage: interaction.usage,
            })
        }
        WireEvent::ContentStart { index, content } => Some(ProviderEvent::ContentStart {
            index,
            kind: content.map_or(ContentKind::Unknown, |c| content_kind(&c.kind)),
        }),
        WireEvent::ContentDelta { index, delta } => {
            convert_delta(delta).map(|delta| ProviderEvent::ContentDelta { index, delta })
        }
        WireEvent::ContentStop { index } => Some(ProviderEvent::ContentStop { index }),
        WireEvent::Error { error } => Some(ProviderEvent::Error {
            code: error.code.map(|c| match c {
                Value::String(s) => s,
                other => other.to_string(),
            }),
            message: error.message,
        }),
        WireEvent::Unknown => {
            debug!("ignoring unmodelled stream event");
            None
        }
    }
}

fn convert_delta(delta: WireDelta) -> Option<ProviderDelta> {
    match delta {
        WireDelta::Text { text } => Some(ProviderDelta::Text { text }),
        WireDelta::ThoughtSummary { content, text } => {
            let text = content.map(|c| c.text).or(text).unwrap_or_default();
            Some(ProviderDelta::ThoughtSummary { text })
        }
        WireDelta::ThoughtSignature { signature } => {
            Some(ProviderDelta::ThoughtSignature { signature })
        }
        WireDelta::FunctionCall {
            id,
            name,
            arguments,
        } => Some(ProviderDelta::FunctionCall {
            id,
            name,
            arguments,
        }),
        WireDelta::Unknown => None,
    }
}

/// Parse and convert one SSE `data` payload.
///
/// Unparseable payloads are logged and skipped.
pub fn process_data(data: &str) -> Option<ProviderEvent> {
    match serde_json::from_str::<WireEvent>(data) {
        Ok(event) => convert_event(event),
        Err(e) => {
            let preview: String = data.chars().take(100).collect();
            warn!(error = %e, data_preview = %preview, "Failed to parse Gemini SSE payload");
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
