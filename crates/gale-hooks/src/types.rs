//! Core types for the hook system.
//!
//! Extension points, their merge policies, the per-point payloads handed to
//! handlers, and the partial overrides handlers return.

use std::fmt;

use gale_core::{RunOutcome, Turn, Usage};
use gale_tools::{ToolOutput, ToolSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Points and policies
// ─────────────────────────────────────────────────────────────────────────────

/// How the results of one point's handlers are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergePolicy {
    /// Shallow-merge partial overrides, later field wins.
    Merge,
    /// First denial short-circuits; no handlers means allow.
    Gate,
    /// Run every handler, discard results.
    Observe,
    /// Join every non-empty injected input with a blank line.
    Collect,
}

/// Named extension point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HookPoint {
    /// Before the first run of a session stream.
    OnAgentStart,
    /// Before every model call.
    OnInteractionStart,
    /// Before a tool runs. Gate.
    BeforeToolExecute,
    /// After a tool ran.
    AfterToolExecute,
    /// After every iteration.
    OnInteractionEnd,
    /// After a run finished. May inject new input.
    OnAgentEnd,
}

impl HookPoint {
    /// Merge policy of this point.
    #[must_use]
    pub fn policy(self) -> MergePolicy {
        match self {
            Self::OnAgentStart | Self::OnInteractionStart | Self::AfterToolExecute => {
                MergePolicy::Merge
            }
            Self::BeforeToolExecute => MergePolicy::Gate,
            Self::OnInteractionEnd => MergePolicy::Observe,
            Self::OnAgentEnd => MergePolicy::Collect,
        }
    }

    /// Returns all points.
    #[must_use]
    pub fn all() -> &'static [HookPoint] {
        &[
            Self::OnAgentStart,
            Self::OnInteractionStart,
            Self::BeforeToolExecute,
            Self::AfterToolExecute,
            Self::OnInteractionEnd,
            Self::OnAgentEnd,
        ]
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnAgentStart => write!(f, "onAgentStart"),
            Self::OnInteractionStart => write!(f, "onInteractionStart"),
            Self::BeforeToolExecute => write!(f, "beforeToolExecute"),
            Self::AfterToolExecute => write!(f, "afterToolExecute"),
            Self::OnInteractionEnd => write!(f, "onInteractionEnd"),
            Self::OnAgentEnd => write!(f, "onAgentEnd"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Read-only copy of run context handed to start hooks and context transforms.
#[derive(Debug, Clone, Default)]
pub struct ContextSnapshot {
    /// Iteration about to run (0 before the first run of a stream).
    pub iteration: u32,
    /// Model ID.
    pub model: String,
    /// Interaction history.
    pub interactions: Vec<Turn>,
    /// Continuation ID.
    pub interaction_id: Option<String>,
    /// Active tools.
    pub tools: ToolSet,
    /// System instruction.
    pub system_instruction: Option<String>,
}

/// Context fields a start hook or transform may replace.
#[derive(Debug, Clone, Default)]
pub struct ContextOverrides {
    /// Replacement history.
    pub interactions: Option<Vec<Turn>>,
    /// Replacement tool set.
    pub tools: Option<ToolSet>,
    /// Replacement system instruction.
    pub system_instruction: Option<String>,
}

impl ContextOverrides {
    /// Whether nothing is overridden.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interactions.is_none() && self.tools.is_none() && self.system_instruction.is_none()
    }
}

/// Point-specific payload passed to handlers.
#[derive(Debug, Clone)]
pub enum HookEvent {
    /// `onAgentStart`.
    AgentStart(ContextSnapshot),
    /// `onInteractionStart`.
    InteractionStart(ContextSnapshot),
    /// `beforeToolExecute`.
    BeforeToolExecute {
        /// Call ID.
        call_id: String,
        /// Tool name.
        name: String,
        /// Call arguments.
        arguments: Map<String, Value>,
    },
    /// `afterToolExecute`.
    AfterToolExecute {
        /// Call ID.
        call_id: String,
        /// Tool name.
        name: String,
        /// Arguments the tool actually ran with.
        arguments: Map<String, Value>,
        /// What the tool returned.
        output: ToolOutput,
    },
    /// `onInteractionEnd`.
    InteractionEnd {
        /// 1-based iteration number.
        iteration: u32,
        /// Usage of this iteration.
        usage: Usage,
    },
    /// `onAgentEnd`.
    AgentEnd(RunOutcome),
}

impl HookEvent {
    /// The point this payload belongs to.
    #[must_use]
    pub fn point(&self) -> HookPoint {
        match self {
            Self::AgentStart(_) => HookPoint::OnAgentStart,
            Self::InteractionStart(_) => HookPoint::OnInteractionStart,
            Self::BeforeToolExecute { .. } => HookPoint::BeforeToolExecute,
            Self::AfterToolExecute { .. } => HookPoint::AfterToolExecute,
            Self::InteractionEnd { .. } => HookPoint::OnInteractionEnd,
            Self::AgentEnd(_) => HookPoint::OnAgentEnd,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outcome
// ─────────────────────────────────────────────────────────────────────────────

/// Partial override returned by a handler.
///
/// Every field is optional; `None` means "no opinion". Which fields a point
/// honors depends on the point.
#[derive(Debug, Clone, Default)]
pub struct HookOutcome {
    /// Gate decision (`beforeToolExecute`).
    pub allow: Option<bool>,
    /// Denial reason (`beforeToolExecute`).
    pub reason: Option<String>,
    /// Replacement tool arguments (`beforeToolExecute`).
    pub arguments: Option<Map<String, Value>>,
    /// Replacement tool result (`afterToolExecute`).
    pub result: Option<ToolOutput>,
    /// Replacement history (start points).
    pub interactions: Option<Vec<Turn>>,
    /// Replacement tool set (start points).
    pub tools: Option<ToolSet>,
    /// Replacement system instruction (start points).
    pub system_instruction: Option<String>,
    /// Input to inject as a new user turn (`onAgentEnd`).
    pub input: Option<String>,
}

impl HookOutcome {
    /// Explicit approval.
    #[must_use]
    pub fn allow() -> Self {
        Self {
            allow: Some(true),
            ..Self::default()
        }
    }

    /// Denial with a reason.
    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allow: Some(false),
            reason: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Inject input after the run.
    #[must_use]
    pub fn inject(input: impl Into<String>) -> Self {
        Self {
            input: Some(input.into()),
            ..Self::default()
        }
    }

    /// Replace the tool result.
    #[must_use]
    pub fn replace_result(output: ToolOutput) -> Self {
        Self {
            result: Some(output),
            ..Self::default()
        }
    }

    /// Override tool arguments.
    #[must_use]
    pub fn with_arguments(mut self, arguments: Map<String, Value>) -> Self {
        self.arguments = Some(arguments);
        self
    }

    /// Override the system instruction.
    #[must_use]
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    /// Override the tool set.
    #[must_use]
    pub fn with_tools(mut self, tools: ToolSet) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Override the history.
    #[must_use]
    pub fn with_interactions(mut self, interactions: Vec<Turn>) -> Self {
        self.interactions = Some(interactions);
        self
    }

    /// Shallow merge: every field set on `later` replaces ours.
    pub fn merge(&mut self, later: HookOutcome) {
        let HookOutcome {
            allow,
            reason,
            arguments,
            result,
            interactions,
            tools,
            system_instruction,
            input,
        } = later;
        if allow.is_some() {
            self.allow = allow;
        }
        if reason.is_some() {
            self.reason = reason;
        }
        if arguments.is_some() {
            self.arguments = arguments;
        }
        if result.is_some() {
            self.result = result;
        }
        if interactions.is_some() {
            self.interactions = interactions;
        }
        if tools.is_some() {
            self.tools = tools;
        }
        if system_instruction.is_some() {
            self.system_instruction = system_instruction;
        }
        if input.is_some() {
            self.input = input;
        }
    }

    /// The context-override subset of this outcome.
    #[must_use]
    pub fn into_context_overrides(self) -> ContextOverrides {
        ContextOverrides {
            interactions: self.interactions,
            tools: self.tools,
            system_instruction: self.system_instruction,
        }
    }

    /// Whether no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.allow.is_none()
            && self.reason.is_none()
            && self.arguments.is_none()
            && self.result.is_none()
            && self.input.is_none()
            && self.interactions.is_none()
            && self.tools.is_none()
            && self.system_instruction.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn policies() {
        assert_eq!(HookPoint::BeforeToolExecute.policy(), MergePolicy::Gate);
        assert_eq!(HookPoint::AfterToolExecute.policy(), MergePolicy::Merge);
        assert_eq!(HookPoint::OnAgentStart.policy(), MergePolicy::Merge);
        assert_eq!(HookPoint::OnInteractionStart.policy(), MergePolicy::Merge);
        assert_eq!(HookPoint::OnInteractionEnd.policy(), MergePolicy::Observe);
        assert_eq!(HookPoint::OnAgentEnd.policy(), MergePolicy::Collect);
    }

    #[test]
    fn display_matches_serde() {
        for point in HookPoint::all() {
            let wire = serde_json::to_value(point).unwrap();
            assert_eq!(wire, json!(point.to_string()));
        }
        assert_eq!(HookPoint::all().len(), 6);
    }

    #[test]
    fn event_point() {
        let event = HookEvent::InteractionEnd {
            iteration: 1,
            usage: Usage::default(),
        };
        assert_eq!(event.point(), HookPoint::OnInteractionEnd);
        let event = HookEvent::AgentEnd(RunOutcome::default());
        assert_eq!(event.point(), HookPoint::OnAgentEnd);
    }

    #[test]
    fn merge_later_field_wins() {
        let mut acc = HookOutcome::default().with_system_instruction("first");
        acc.merge(HookOutcome::inject("x"));
        acc.merge(HookOutcome::default().with_system_instruction("second"));
        assert_eq!(acc.system_instruction.as_deref(), Some("second"));
        assert_eq!(acc.input.as_deref(), Some("x"));
    }

    #[test]
    fn merge_none_keeps_existing() {
        let mut acc = HookOutcome::deny("no");
        acc.merge(HookOutcome::default());
        assert_eq!(acc.allow, Some(false));
        assert_eq!(acc.reason.as_deref(), Some("no"));
    }

    #[test]
    fn is_empty() {
        assert!(HookOutcome::default().is_empty());
        assert!(!HookOutcome::allow().is_empty());
        assert!(!HookOutcome::default().with_tools(ToolSet::new()).is_empty());
    }

    #[test]
    fn context_overrides_subset() {
        let overrides = HookOutcome::allow()
            .with_system_instruction("be brief")
            .into_context_overrides();
        assert_eq!(overrides.system_instruction.as_deref(), Some("be brief"));
        assert!(overrides.tools.is_none());
        assert!(!overrides.is_empty());
    }
}
