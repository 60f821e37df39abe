//! Semantic event vocabulary.
//!
//! [`AgentEvent`] is the stable wire contract surfaced to callers while a run
//! is in flight. Provider-specific streaming signals never leak past the
//! model adapter; they are translated into these variants first.
//!
//! Every run ends with exactly one [`AgentEvent::AgentEnd`], whose
//! [`RunOutcome`] is also the value the run's result resolves to.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::content::Turn;
use crate::usage::Usage;

// ─────────────────────────────────────────────────────────────────────────────
// Run outcome
// ─────────────────────────────────────────────────────────────────────────────

/// Why a run stopped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model answered without tool calls and no follow-up was queued.
    #[default]
    Completed,
    /// The iteration cap was reached.
    MaxIterations,
    /// Cancellation was observed at an iteration boundary.
    Aborted,
    /// A provider or hook failure ended the run.
    Error,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::MaxIterations => write!(f, "max_iterations"),
            Self::Aborted => write!(f, "aborted"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Final aggregate of one agent run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    /// Full interaction history of the run, seed turn first.
    pub interactions: Vec<Turn>,
    /// Continuation ID after the last model call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_id: Option<String>,
    /// Summed usage of every model call in the run.
    pub usage: Usage,
    /// Number of iterations started.
    pub iterations: u32,
    /// Why the run stopped.
    pub stop_reason: StopReason,
}

impl RunOutcome {
    /// Text of the last model turn, if any.
    #[must_use]
    pub fn final_text(&self) -> Option<String> {
        self.interactions
            .iter()
            .rev()
            .find(|t| t.role == crate::content::Role::Model)
            .map(Turn::text)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AgentEvent
// ─────────────────────────────────────────────────────────────────────────────

/// Events emitted while a run is in flight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AgentEvent {
    /// Run started.
    #[serde(rename = "agent.start")]
    AgentStart,

    /// Run finished. Always the last event of a run.
    #[serde(rename = "agent.end")]
    AgentEnd(RunOutcome),

    /// An iteration is about to call the model.
    #[serde(rename = "interaction.start")]
    InteractionStart {
        /// 1-based iteration number.
        iteration: u32,
    },

    /// An iteration finished.
    #[serde(rename = "interaction.end")]
    InteractionEnd {
        /// 1-based iteration number.
        iteration: u32,
        /// Usage reported by this iteration's model call.
        usage: Usage,
    },

    /// A text block opened.
    #[serde(rename = "text.start")]
    TextStart {
        /// Provider block index.
        index: u32,
    },

    /// Incremental text.
    #[serde(rename = "text.delta")]
    TextDelta {
        /// Provider block index.
        index: u32,
        /// Text fragment.
        delta: String,
    },

    /// A text block closed.
    #[serde(rename = "text.end")]
    TextEnd {
        /// Provider block index.
        index: u32,
        /// Full accumulated text.
        text: String,
    },

    /// Cleaned-up thought summary fragment (never the accumulated summary).
    #[serde(rename = "thought.summary")]
    ThoughtSummary {
        /// Summary fragment.
        delta: String,
    },

    /// A tool call is about to run.
    #[serde(rename = "tool.start")]
    ToolStart {
        /// Call ID.
        #[serde(rename = "callId")]
        call_id: String,
        /// Tool name.
        name: String,
        /// Call arguments.
        arguments: serde_json::Map<String, serde_json::Value>,
    },

    /// Best-effort progress reported by a running tool.
    #[serde(rename = "tool.delta")]
    ToolDelta {
        /// Call ID.
        #[serde(rename = "callId")]
        call_id: String,
        /// Tool name.
        name: String,
        /// Progress payload.
        delta: String,
    },

    /// A tool call finished (successfully or not).
    #[serde(rename = "tool.end")]
    ToolEnd {
        /// Call ID.
        #[serde(rename = "callId")]
        call_id: String,
        /// Tool name.
        name: String,
        /// Result text.
        result: String,
        /// Whether the result is error-flagged.
        #[serde(rename = "isError")]
        is_error: bool,
    },
}

impl AgentEvent {
    /// Wire name of the event (`"text.delta"`, `"agent.end"`, ...).
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::AgentStart => "agent.start",
            Self::AgentEnd(_) => "agent.end",
            Self::InteractionStart { .. } => "interaction.start",
            Self::InteractionEnd { .. } => "interaction.end",
            Self::TextStart { .. } => "text.start",
            Self::TextDelta { .. } => "text.delta",
            Self::TextEnd { .. } => "text.end",
            Self::ThoughtSummary { .. } => "thought.summary",
            Self::ToolStart { .. } => "tool.start",
            Self::ToolDelta { .. } => "tool.delta",
            Self::ToolEnd { .. } => "tool.end",
        }
    }

    /// Whether this is the terminal event of a run.
    #[must_use]
    pub fn is_agent_end(&self) -> bool {
        matches!(self, Self::AgentEnd(_))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
