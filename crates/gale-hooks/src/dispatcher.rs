//! Hook dispatcher.
//!
//! Runs a point's handler chain under that point's [`MergePolicy`]. This is
//! the only place the four policies are implemented; callers use either the
//! generic [`HookDispatcher::dispatch`] or the typed per-point helpers.

use std::future::Future;
use std::sync::Arc;

use gale_core::{RunOutcome, Usage};
use gale_tools::ToolOutput;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::errors::HookError;
use crate::handler::{FnHandler, HookHandler};
use crate::registry::{HookId, HookRegistry};
use crate::types::{ContextOverrides, ContextSnapshot, HookEvent, HookOutcome, HookPoint, MergePolicy};

/// Separator between collected inputs.
const COLLECT_SEPARATOR: &str = "\n\n";

/// Result of the `beforeToolExecute` gate.
#[derive(Debug, Clone, PartialEq)]
pub struct GateDecision {
    /// Whether the tool may run.
    pub allow: bool,
    /// Denial reason, if one was given.
    pub reason: Option<String>,
    /// Replacement arguments, if any handler supplied them.
    pub arguments: Option<Map<String, Value>>,
}

impl GateDecision {
    /// Implicit approval.
    #[must_use]
    pub fn approve() -> Self {
        Self {
            allow: true,
            reason: None,
            arguments: None,
        }
    }
}

/// Shared handle over a [`HookRegistry`].
///
/// Cloning is cheap; clones see the same registrations.
#[derive(Clone, Default)]
pub struct HookDispatcher {
    registry: Arc<RwLock<HookRegistry>>,
}

impl HookDispatcher {
    /// Create a dispatcher with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ── registration ────────────────────────────────────────────────

    /// Register a handler.
    pub fn register(&self, handler: Arc<dyn HookHandler>) -> HookId {
        self.registry.write().register(handler)
    }

    /// Register an async closure at `point`.
    pub fn on<F, Fut>(&self, point: HookPoint, name: impl Into<String>, f: F) -> HookId
    where
        F: Fn(HookEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HookOutcome, HookError>> + Send + 'static,
    {
        self.register(Arc::new(FnHandler::new(point, name, f)))
    }

    /// Register an async closure at `point` with an explicit priority.
    pub fn on_with_priority<F, Fut>(
        &self,
        point: HookPoint,
        name: impl Into<String>,
        priority: i32,
        f: F,
    ) -> HookId
    where
        F: Fn(HookEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HookOutcome, HookError>> + Send + 'static,
    {
        self.register(Arc::new(FnHandler::new(point, name, f).with_priority(priority)))
    }

    /// Remove a registration by ID.
    pub fn off(&self, id: HookId) -> bool {
        self.registry.write().unregister(id)
    }

    /// Remove every registration with the given name.
    pub fn off_named(&self, name: &str) -> bool {
        self.registry.write().unregister_named(name)
    }

    /// Remove the registrations of one point, or all of them.
    pub fn clear(&self, point: Option<HookPoint>) {
        self.registry.write().clear(point);
    }

    /// Whether anything is registered at `point`.
    #[must_use]
    pub fn has(&self, point: HookPoint) -> bool {
        self.registry.read().has(point)
    }

    /// Total number of registrations.
    #[must_use]
    pub fn count(&self) -> usize {
        self.registry.read().count()
    }

    // ── dispatch ────────────────────────────────────────────────────

    /// Run the handlers of `event`'s point under that point's policy.
    ///
    /// Handlers run one at a time, in order. The first handler error is
    /// returned as-is.
    #[instrument(skip_all, fields(point = %event.point()))]
    pub async fn dispatch(&self, event: HookEvent) -> Result<HookOutcome, HookError> {
        let point = event.point();
        // Snapshot the chain so no lock is held across an await.
        let handlers = self.registry.read().get_handlers(point);
        if handlers.is_empty() {
            return Ok(match point.policy() {
                MergePolicy::Gate => HookOutcome::allow(),
                _ => HookOutcome::default(),
            });
        }
        debug!(count = handlers.len(), "dispatching hooks");

        match point.policy() {
            MergePolicy::Merge => {
                let mut acc = HookOutcome::default();
                for handler in &handlers {
                    acc.merge(handler.handle(&event).await?);
                }
                Ok(acc)
            }
            MergePolicy::Gate => {
                let mut acc = HookOutcome::default();
                for handler in &handlers {
                    let out = handler.handle(&event).await?;
                    let denied = out.allow == Some(false);
                    acc.merge(out);
                    if denied {
                        debug!(handler = handler.name(), reason = ?acc.reason, "gate denied");
                        return Ok(acc);
                    }
                }
                acc.allow = Some(true);
                Ok(acc)
            }
            MergePolicy::Observe => {
                for handler in &handlers {
                    let _ = handler.handle(&event).await?;
                }
                Ok(HookOutcome::default())
            }
            MergePolicy::Collect => {
                let mut inputs = Vec::new();
                for handler in &handlers {
                    let out = handler.handle(&event).await?;
                    if let Some(input) = out.input.filter(|s| !s.is_empty()) {
                        inputs.push(input);
                    }
                }
                if inputs.is_empty() {
                    Ok(HookOutcome::default())
                } else {
                    Ok(HookOutcome::inject(inputs.join(COLLECT_SEPARATOR)))
                }
            }
        }
    }

    // ── typed helpers ───────────────────────────────────────────────

    /// `onAgentStart`: context overrides for the coming stream.
    pub async fn on_agent_start(
        &self,
        snapshot: ContextSnapshot,
    ) -> Result<ContextOverrides, HookError> {
        if !self.has(HookPoint::OnAgentStart) {
            return Ok(ContextOverrides::default());
        }
        let out = self.dispatch(HookEvent::AgentStart(snapshot)).await?;
        Ok(out.into_context_overrides())
    }

    /// `onInteractionStart`: context overrides for the coming model call.
    pub async fn on_interaction_start(
        &self,
        snapshot: ContextSnapshot,
    ) -> Result<ContextOverrides, HookError> {
        if !self.has(HookPoint::OnInteractionStart) {
            return Ok(ContextOverrides::default());
        }
        let out = self.dispatch(HookEvent::InteractionStart(snapshot)).await?;
        Ok(out.into_context_overrides())
    }

    /// `beforeToolExecute`: the gate.
    pub async fn before_tool_execute(
        &self,
        call_id: &str,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<GateDecision, HookError> {
        if !self.has(HookPoint::BeforeToolExecute) {
            return Ok(GateDecision::approve());
        }
        let out = self
            .dispatch(HookEvent::BeforeToolExecute {
                call_id: call_id.to_owned(),
                name: name.to_owned(),
                arguments: arguments.clone(),
            })
            .await?;
        Ok(GateDecision {
            allow: out.allow.unwrap_or(true),
            reason: out.reason,
            arguments: out.arguments,
        })
    }

    /// `afterToolExecute`: an optional replacement result.
    pub async fn after_tool_execute(
        &self,
        call_id: &str,
        name: &str,
        arguments: &Map<String, Value>,
        output: &ToolOutput,
    ) -> Result<Option<ToolOutput>, HookError> {
        if !self.has(HookPoint::AfterToolExecute) {
            return Ok(None);
        }
        let out = self
            .dispatch(HookEvent::AfterToolExecute {
                call_id: call_id.to_owned(),
                name: name.to_owned(),
                arguments: arguments.clone(),
                output: output.clone(),
            })
            .await?;
        Ok(out.result)
    }

    /// `onInteractionEnd`: observation only.
    pub async fn on_interaction_end(&self, iteration: u32, usage: Usage) -> Result<(), HookError> {
        if !self.has(HookPoint::OnInteractionEnd) {
            return Ok(());
        }
        let _ = self
            .dispatch(HookEvent::InteractionEnd { iteration, usage })
            .await?;
        Ok(())
    }

    /// `onAgentEnd`: the joined injected input, if any handler supplied one.
    pub async fn on_agent_end(&self, outcome: &RunOutcome) -> Result<Option<String>, HookError> {
        if !self.has(HookPoint::OnAgentEnd) {
            return Ok(None);
        }
        let out = self.dispatch(HookEvent::AgentEnd(outcome.clone())).await?;
        Ok(out.input)
    }
}

impl std::fmt::Debug for HookDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookDispatcher")
            .field("hook_count", &self.count())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use gale_tools::ToolSet;
    use serde_json::json;

    use super::*;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    // ── gate ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn gate_with_no_handlers_allows() {
        let hooks = HookDispatcher::new();
        let decision = hooks
            .before_tool_execute("c1", "read", &Map::new())
            .await
            .unwrap();
        assert_eq!(decision, GateDecision::approve());
    }

    #[tokio::test]
    async fn gate_first_denial_short_circuits() {
        let hooks = HookDispatcher::new();
        let third_calls = counter();
        let _ = hooks.on(HookPoint::BeforeToolExecute, "first", |_| async {
            Ok(HookOutcome::allow())
        });
        let _ = hooks.on(HookPoint::BeforeToolExecute, "second", |_| async {
            Ok(HookOutcome::deny("R"))
        });
        let seen = Arc::clone(&third_calls);
        let _ = hooks.on(HookPoint::BeforeToolExecute, "third", move |_| {
            let seen = Arc::clone(&seen);
            async move {
                let _ = seen.fetch_add(1, Ordering::SeqCst);
                Ok(HookOutcome::allow())
            }
        });

        let decision = hooks
            .before_tool_execute("c1", "bash", &Map::new())
            .await
            .unwrap();
        assert!(!decision.allow);
        assert_eq!(decision.reason.as_deref(), Some("R"));
        assert_eq!(third_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn gate_merges_prior_argument_overrides() {
        let hooks = HookDispatcher::new();
        let _ = hooks.on(HookPoint::BeforeToolExecute, "rewrite", |_| async {
            Ok(HookOutcome::allow().with_arguments(args(json!({"path": "/safe"}))))
        });
        let _ = hooks.on(HookPoint::BeforeToolExecute, "noop", |_| async {
            Ok(HookOutcome::default())
        });

        let decision = hooks
            .before_tool_execute("c1", "read", &args(json!({"path": "/etc"})))
            .await
            .unwrap();
        assert!(decision.allow);
        assert_eq!(decision.arguments, Some(args(json!({"path": "/safe"}))));
    }

    #[tokio::test]
    async fn gate_sees_call_payload() {
        let hooks = HookDispatcher::new();
        let _ = hooks.on(HookPoint::BeforeToolExecute, "only-read", |event| async move {
            match event {
                HookEvent::BeforeToolExecute { name, .. } if name == "read" => {
                    Ok(HookOutcome::allow())
                }
                _ => Ok(HookOutcome::deny("read only")),
            }
        });
        let read = hooks.before_tool_execute("c1", "read", &Map::new()).await.unwrap();
        let bash = hooks.before_tool_execute("c2", "bash", &Map::new()).await.unwrap();
        assert!(read.allow);
        assert!(!bash.allow);
    }

    // ── merge ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn merge_with_no_handlers_is_empty() {
        let hooks = HookDispatcher::new();
        let out = hooks
            .dispatch(HookEvent::InteractionStart(ContextSnapshot::default()))
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn merge_later_field_wins() {
        let hooks = HookDispatcher::new();
        let _ = hooks.on(HookPoint::OnInteractionStart, "a", |_| async {
            Ok(HookOutcome::default()
                .with_system_instruction("a")
                .with_tools(ToolSet::new()))
        });
        let _ = hooks.on(HookPoint::OnInteractionStart, "b", |_| async {
            Ok(HookOutcome::default().with_system_instruction("b"))
        });
        let overrides = hooks
            .on_interaction_start(ContextSnapshot::default())
            .await
            .unwrap();
        assert_eq!(overrides.system_instruction.as_deref(), Some("b"));
        assert!(overrides.tools.is_some());
    }

    #[tokio::test]
    async fn after_tool_execute_replacement() {
        let hooks = HookDispatcher::new();
        let _ = hooks.on(HookPoint::AfterToolExecute, "redact", |event| async move {
            match event {
                HookEvent::AfterToolExecute { output, .. } => Ok(HookOutcome::replace_result(
                    ToolOutput::text(output.result.replace("secret", "***")),
                )),
                _ => Ok(HookOutcome::default()),
            }
        });
        let replaced = hooks
            .after_tool_execute("c1", "read", &Map::new(), &ToolOutput::text("a secret"))
            .await
            .unwrap();
        assert_eq!(replaced, Some(ToolOutput::text("a ***")));
    }

    #[tokio::test]
    async fn priority_controls_order() {
        let hooks = HookDispatcher::new();
        let _ = hooks.on_with_priority(HookPoint::OnAgentStart, "late", 0, |_| async {
            Ok(HookOutcome::default().with_system_instruction("low"))
        });
        let _ = hooks.on_with_priority(HookPoint::OnAgentStart, "early", 10, |_| async {
            Ok(HookOutcome::default().with_system_instruction("high"))
        });
        let overrides = hooks.on_agent_start(ContextSnapshot::default()).await.unwrap();
        // "early" runs first, so "late" wins the merge.
        assert_eq!(overrides.system_instruction.as_deref(), Some("low"));
    }

    // ── observe ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn observe_runs_all_and_discards() {
        let hooks = HookDispatcher::new();
        let calls = counter();
        for name in ["a", "b"] {
            let seen = Arc::clone(&calls);
            let _ = hooks.on(HookPoint::OnInteractionEnd, name, move |_| {
                let seen = Arc::clone(&seen);
                async move {
                    let _ = seen.fetch_add(1, Ordering::SeqCst);
                    Ok(HookOutcome::inject("ignored"))
                }
            });
        }
        let out = hooks
            .dispatch(HookEvent::InteractionEnd {
                iteration: 1,
                usage: Usage::default(),
            })
            .await
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    // ── collect ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn collect_joins_with_blank_line() {
        let hooks = HookDispatcher::new();
        let _ = hooks.on(HookPoint::OnAgentEnd, "a", |_| async { Ok(HookOutcome::inject("a")) });
        let _ = hooks.on(HookPoint::OnAgentEnd, "skip", |_| async {
            Ok(HookOutcome::inject(""))
        });
        let _ = hooks.on(HookPoint::OnAgentEnd, "none", |_| async { Ok(HookOutcome::default()) });
        let _ = hooks.on(HookPoint::OnAgentEnd, "b", |_| async { Ok(HookOutcome::inject("b")) });

        let input = hooks.on_agent_end(&RunOutcome::default()).await.unwrap();
        assert_eq!(input.as_deref(), Some("a\n\nb"));
    }

    #[tokio::test]
    async fn collect_without_input_is_empty() {
        let hooks = HookDispatcher::new();
        let _ = hooks.on(HookPoint::OnAgentEnd, "none", |_| async { Ok(HookOutcome::default()) });
        let out = hooks
            .dispatch(HookEvent::AgentEnd(RunOutcome::default()))
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    // ── errors ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn handler_error_propagates_and_stops_chain() {
        let hooks = HookDispatcher::new();
        let after = counter();
        let _ = hooks.on(HookPoint::OnInteractionEnd, "boom", |_| async {
            Err(HookError::handler("boom", "exploded"))
        });
        let seen = Arc::clone(&after);
        let _ = hooks.on(HookPoint::OnInteractionEnd, "after", move |_| {
            let seen = Arc::clone(&seen);
            async move {
                let _ = seen.fetch_add(1, Ordering::SeqCst);
                Ok(HookOutcome::default())
            }
        });

        let err = hooks.on_interaction_end(1, Usage::default()).await.unwrap_err();
        assert_matches!(err, HookError::HandlerError { ref name, .. } if name == "boom");
        assert_eq!(after.load(Ordering::SeqCst), 0);
    }

    // ── registration ────────────────────────────────────────────────

    #[tokio::test]
    async fn off_and_clear() {
        let hooks = HookDispatcher::new();
        let id = hooks.on(HookPoint::OnAgentEnd, "a", |_| async { Ok(HookOutcome::inject("a")) });
        let _ = hooks.on(HookPoint::OnAgentStart, "b", |_| async { Ok(HookOutcome::default()) });
        assert!(hooks.has(HookPoint::OnAgentEnd));
        assert_eq!(hooks.count(), 2);

        assert!(hooks.off(id));
        assert!(!hooks.has(HookPoint::OnAgentEnd));
        assert_eq!(hooks.on_agent_end(&RunOutcome::default()).await.unwrap(), None);

        assert!(hooks.off_named("b"));
        let _ = hooks.on(HookPoint::OnAgentStart, "c", |_| async { Ok(HookOutcome::default()) });
        hooks.clear(None);
        assert_eq!(hooks.count(), 0);
    }

    #[test]
    fn clones_share_registrations() {
        let hooks = HookDispatcher::new();
        let other = hooks.clone();
        let _ = other.on(HookPoint::OnAgentEnd, "a", |_| async { Ok(HookOutcome::default()) });
        assert!(hooks.has(HookPoint::OnAgentEnd));
        assert!(format!("{hooks:?}").contains("hook_count: 1"));
    }
}
