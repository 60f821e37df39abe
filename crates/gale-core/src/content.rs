//! Conversation turns and the content blocks they carry.
//!
//! History is an append-only `Vec<Turn>`. A [`Turn`] is never edited after it
//! has been appended; the agent loop only ever pushes new ones.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Role
// ─────────────────────────────────────────────────────────────────────────────

/// Author of a [`Turn`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Caller input, including tool results fed back to the model.
    User,
    /// Model output.
    Model,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Model => write!(f, "model"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Function call / result records
// ─────────────────────────────────────────────────────────────────────────────

/// A model-requested tool invocation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCall {
    /// Call ID, echoed back on the matching [`FunctionResult`].
    pub id: String,
    /// Tool name as requested by the model.
    pub name: String,
    /// Tool arguments (JSON object).
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// The resolved outcome of one [`FunctionCall`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResult {
    /// ID of the call this result answers.
    pub call_id: String,
    /// Tool name of the call.
    pub name: String,
    /// Result text handed back to the model.
    pub result: String,
    /// Whether the call failed (unknown tool, tool error, gate denial).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl FunctionResult {
    /// Build a successful result for `call`.
    #[must_use]
    pub fn ok(call: &FunctionCall, result: impl Into<String>) -> Self {
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            result: result.into(),
            is_error: false,
        }
    }

    /// Build an error-flagged result for `call`.
    #[must_use]
    pub fn error(call: &FunctionCall, message: impl Into<String>) -> Self {
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            result: message.into(),
            is_error: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Content block
// ─────────────────────────────────────────────────────────────────────────────

/// One fragment of a [`Turn`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// Full text of the block.
        text: String,
    },
    /// Cleaned-up reasoning summary.
    ThoughtSummary {
        /// Accumulated summary text.
        summary: String,
        /// Opaque provider signature, replayed on later calls.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    /// Tool invocation requested by the model.
    FunctionCall(FunctionCall),
    /// Tool outcome fed back to the model.
    FunctionResult(FunctionResult),
}

impl ContentBlock {
    /// Create a text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// The text of a text block.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    /// The call record of a function-call block.
    #[must_use]
    pub fn as_function_call(&self) -> Option<&FunctionCall> {
        match self {
            Self::FunctionCall(call) => Some(call),
            _ => None,
        }
    }

    /// The result record of a function-result block.
    #[must_use]
    pub fn as_function_result(&self) -> Option<&FunctionResult> {
        match self {
            Self::FunctionResult(result) => Some(result),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Turn
// ─────────────────────────────────────────────────────────────────────────────

/// One role-tagged message of ordered content blocks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Author.
    pub role: Role,
    /// Ordered content blocks.
    pub content: Vec<ContentBlock>,
}

impl Turn {
    /// A user turn with the given blocks.
    #[must_use]
    pub fn user(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            content,
        }
    }

    /// A user turn holding a single text block.
    #[must_use]
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::user(vec![ContentBlock::text(text)])
    }

    /// A model turn with the given blocks.
    #[must_use]
    pub fn model(content: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Model,
            content,
        }
    }

    /// All function calls in this turn, in order.
    pub fn function_calls(&self) -> impl Iterator<Item = &FunctionCall> {
        self.content.iter().filter_map(ContentBlock::as_function_call)
    }

    /// Whether this turn requests any tool invocation.
    #[must_use]
    pub fn has_function_calls(&self) -> bool {
        self.function_calls().next().is_some()
    }

    /// Concatenated text of all text blocks.
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
