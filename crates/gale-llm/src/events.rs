//! Provider event protocol.
//!
//! The low-level signals a [`ModelTransport`](crate::ModelTransport) yields.
//! Content arrives as indexed blocks: a block may be opened, receives any
//! number of deltas, and is closed. Only the model adapter consumes these.

use gale_core::Usage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of a streamed content block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Plain text.
    Text,
    /// Reasoning (summary text and an opaque signature).
    Thought,
    /// Tool invocation.
    FunctionCall,
    /// Anything the engine does not model. Dropped from outputs.
    #[serde(other)]
    Unknown,
}

/// Payload of a `content.delta`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderDelta {
    /// Text fragment.
    Text {
        /// Fragment.
        text: String,
    },
    /// Thought summary fragment, raw (may contain markup).
    ThoughtSummary {
        /// Fragment.
        text: String,
    },
    /// Opaque thought signature.
    ThoughtSignature {
        /// Signature.
        signature: String,
    },
    /// Function call piece. Any field may be absent on a given delta.
    FunctionCall {
        /// Call ID.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Tool name.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        /// Either a JSON object (merged key-wise) or a raw JSON text fragment.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arguments: Option<Value>,
    },
}

impl ProviderDelta {
    /// The block kind this delta implies.
    #[must_use]
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Text { .. } => ContentKind::Text,
            Self::ThoughtSummary { .. } | Self::ThoughtSignature { .. } => ContentKind::Thought,
            Self::FunctionCall { .. } => ContentKind::FunctionCall,
        }
    }
}

/// One provider streaming signal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProviderEvent {
    /// Server-side interaction created.
    #[serde(rename = "interaction.start")]
    InteractionStart {
        /// Continuation ID, if assigned.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        interaction_id: Option<String>,
    },
    /// Server-side interaction finished.
    #[serde(rename = "interaction.complete")]
    InteractionComplete {
        /// Continuation ID.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        interaction_id: Option<String>,
        /// Usage of this call.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
    /// A content block opened.
    #[serde(rename = "content.start")]
    ContentStart {
        /// Block index.
        index: u32,
        /// Block kind.
        kind: ContentKind,
    },
    /// A content block received a delta.
    #[serde(rename = "content.delta")]
    ContentDelta {
        /// Block index.
        index: u32,
        /// Delta payload.
        delta: ProviderDelta,
    },
    /// A content block closed.
    #[serde(rename = "content.stop")]
    ContentStop {
        /// Block index.
        index: u32,
    },
    /// The provider reported a failure.
    #[serde(rename = "error")]
    Error {
        /// Provider error code.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        /// Error description.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn delta_wire_shape() {
        let event = ProviderEvent::ContentDelta {
            index: 2,
            delta: ProviderDelta::ThoughtSummary { text: "x".into() },
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "content.delta", "index": 2, "delta": {"type": "thought_summary", "text": "x"}})
        );
    }

    #[test]
    fn unknown_kind_deserializes() {
        let event: ProviderEvent =
            serde_json::from_value(json!({"type": "content.start", "index": 0, "kind": "image"}))
                .unwrap();
        assert_eq!(
            event,
            ProviderEvent::ContentStart {
                index: 0,
                kind: ContentKind::Unknown
            }
        );
    }

    #[test]
    fn delta_kind() {
        assert_eq!(
            ProviderDelta::ThoughtSignature { signature: "s".into() }.kind(),
            ContentKind::Thought
        );
        let call = ProviderDelta::FunctionCall {
            id: None,
            name: Some("read".into()),
            arguments: None,
        };
        assert_eq!(call.kind(), ContentKind::FunctionCall);
    }
}
