//! Gemini Interactions API configuration and wire types.

use gale_core::Usage;
use gale_llm::{ProviderError, ProviderResult};
use gale_settings::GoogleSettings;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// API version path segment.
pub const API_VERSION: &str = "v1beta";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Transport configuration.
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key sent as `x-goog-api-key`.
    pub api_key: String,
    /// Base URL (no trailing slash).
    pub base_url: String,
}

impl GeminiConfig {
    /// Config with the default base URL.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Override the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build from settings, reading the key from the configured env var.
    pub fn from_settings(settings: &GoogleSettings) -> ProviderResult<Self> {
        Self::from_settings_with(settings, |name| std::env::var(name).ok())
    }

    /// Build from settings, reading the key through `lookup`.
    pub fn from_settings_with<F>(settings: &GoogleSettings, lookup: F) -> ProviderResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(&settings.api_key_env)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ProviderError::Auth {
                message: format!("environment variable {} is not set", settings.api_key_env),
            })?;
        Ok(Self::new(api_key).with_base_url(settings.base_url.clone()))
    }

    /// Streaming endpoint URL.
    pub fn interactions_url(&self) -> String {
        format!("{}/{API_VERSION}/interactions?alt=sse", self.base_url)
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"[redacted]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request
// ─────────────────────────────────────────────────────────────────────────────

/// Text part nested in thought summaries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextPart {
    /// Always `"text"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Text.
    pub text: String,
}

/// One input content item.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputContent {
    /// Text.
    Text {
        /// Text.
        text: String,
    },
    /// Replayed reasoning.
    Thought {
        /// Opaque signature.
        #[serde(skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
        /// Summary parts.
        #[serde(skip_serializing_if = "Vec::is_empty")]
        summary: Vec<TextPart>,
    },
    /// Replayed tool call.
    FunctionCall {
        /// Call ID.
        id: String,
        /// Tool name.
        name: String,
        /// Arguments object.
        arguments: Value,
    },
    /// Tool outcome.
    FunctionResult {
        /// Call ID.
        call_id: String,
        /// Tool name.
        name: String,
        /// Result text.
        result: String,
        /// Error flag.
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

/// Function tool declaration.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FunctionTool {
    /// Always `"function"`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Tool name.
    pub name: String,
    /// Description.
    pub description: String,
    /// JSON Schema of the arguments.
    pub parameters: Value,
}

/// Body of `POST /interactions`.
#[derive(Clone, Debug, Serialize)]
pub struct InteractionRequest {
    /// Model ID.
    pub model: String,
    /// Input content.
    pub input: Vec<InputContent>,
    /// Tool declarations.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<FunctionTool>,
    /// System instruction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
    /// Continuation ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_interaction_id: Option<String>,
    /// Always `true`.
    pub stream: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Stream events
// ─────────────────────────────────────────────────────────────────────────────

/// Interaction header carried by `interaction.*` events.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct WireInteraction {
    /// Interaction ID.
    #[serde(default)]
    pub id: Option<String>,
    /// Status string.
    #[serde(default)]
    pub status: Option<String>,
    /// Usage (present on completion).
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// Content header carried by `content.start`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct WireContentHeader {
    /// Content type (`"text"`, `"thought"`, `"function_call"`, ...).
    #[serde(rename = "type")]
    pub kind: String,
}

/// Nested content of a thought summary delta.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct WireSummaryContent {
    /// Summary text.
    #[serde(default)]
    pub text: String,
}

/// Delta payload of `content.delta`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireDelta {
    /// Text fragment.
    Text {
        /// Fragment.
        #[serde(default)]
        text: String,
    },
    /// Thought summary fragment.
    ThoughtSummary {
        /// Nested content.
        #[serde(default)]
        content: Option<WireSummaryContent>,
        /// Flat text (older payload shape).
        #[serde(default)]
        text: Option<String>,
    },
    /// Thought signature.
    ThoughtSignature {
        /// Signature.
        #[serde(default)]
        signature: String,
    },
    /// Function call piece.
    FunctionCall {
        /// Call ID.
        #[serde(default)]
        id: Option<String>,
        /// Tool name.
        #[serde(default)]
        name: Option<String>,
        /// Arguments object or raw JSON text.
        #[serde(default)]
        arguments: Option<Value>,
    },
    /// Anything else.
    #[serde(other)]
    Unknown,
}

/// Error body of an `error` event.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct WireError {
    /// Code (string or number).
    #[serde(default)]
    pub code: Option<Value>,
    /// Description.
    #[serde(default)]
    pub message: String,
}

/// One SSE `data:` payload.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "event_type")]
pub enum WireEvent {
    /// Interaction created.
    #[serde(rename = "interaction.start")]
    InteractionStart {
        /// Interaction header.
        #[serde(default)]
        interaction: Option<WireInteraction>,
    },
    /// Interaction finished.
    #[serde(rename = "interaction.complete")]
    InteractionComplete {
        /// Interaction header.
        #[serde(default)]
        interaction: Option<WireInteraction>,
    },
    /// Content block opened.
    #[serde(rename = "content.start")]
    ContentStart {
        /// Block index.
        index: u32,
        /// Content header.
        #[serde(default)]
        content: Option<WireContentHeader>,
    },
    /// Content block delta.
    #[serde(rename = "content.delta")]
    ContentDelta {
        /// Block index.
        index: u32,
        /// Delta.
        delta: WireDelta,
    },
    /// Content block closed.
    #[serde(rename = "content.stop")]
    ContentStop {
        /// Block index.
        index: u32,
    },
    /// Stream-level error.
    #[serde(rename = "error")]
    Error {
        /// Error body.
        error: WireError,
    },
    /// Status updates and anything newer than this client.
    #[serde(other)]
    Unknown,
}
