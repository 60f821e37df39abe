//! Session: the conversational handle around repeated agent runs.
//!
//! `send` queues user turns. `stream` drains the queue through agent runs,
//! forwarding every event, and lets `onAgentEnd` handlers inject further
//! input. Runs per `stream` call are capped by `max_injection_loops`; input
//! injected by the last allowed run stays queued for the next call.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_stream::try_stream;
use futures::Stream;
use gale_core::{AgentEvent, ContentBlock, RunOutcome, StopReason, Turn, Usage};
use gale_hooks::{ContextOverrides, ContextSnapshot, HookDispatcher};
use gale_llm::ModelAdapter;
use gale_tools::ToolSet;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::agent::agent_loop::{AgentLoop, FollowUpFn, LoopState};
use crate::config::EngineConfig;
use crate::errors::RuntimeError;
use crate::hooks::wrap_tools;

/// Resets the streaming flag on drop, including when the stream is dropped early.
struct StreamGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> StreamGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for StreamGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct SessionState {
    history: Vec<Turn>,
    usage: Usage,
    interaction_id: Option<String>,
    tools: ToolSet,
    system_instruction: Option<String>,
    started: bool,
}

/// Conversational handle over one model adapter.
pub struct Session {
    agent: AgentLoop,
    hooks: HookDispatcher,
    state: Mutex<SessionState>,
    queue: Arc<Mutex<VecDeque<Turn>>>,
    cancel: Mutex<CancellationToken>,
    streaming: AtomicBool,
}

impl Session {
    /// Session over `adapter`. Hooks registered on [`hooks`](Self::hooks)
    /// apply to every run.
    pub fn new(adapter: ModelAdapter, config: EngineConfig) -> Self {
        let hooks = HookDispatcher::new();
        let agent = AgentLoop::new(adapter, config).with_transform(Arc::new(hooks.clone()));
        Self {
            agent,
            hooks,
            state: Mutex::new(SessionState::default()),
            queue: Arc::new(Mutex::new(VecDeque::new())),
            cancel: Mutex::new(CancellationToken::new()),
            streaming: AtomicBool::new(false),
        }
    }

    /// Set the tool set.
    #[must_use]
    pub fn with_tools(self, tools: ToolSet) -> Self {
        self.set_tools(&tools);
        self
    }

    /// Set the system instruction.
    #[must_use]
    pub fn with_system_instruction(self, instruction: impl Into<String>) -> Self {
        self.state.lock().system_instruction = Some(instruction.into());
        self
    }

    /// Replace the tool set. Takes effect on the next run.
    pub fn set_tools(&self, tools: &ToolSet) {
        self.state.lock().tools = wrap_tools(tools, &self.hooks);
    }

    /// The session's hook dispatcher.
    pub fn hooks(&self) -> &HookDispatcher {
        &self.hooks
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        self.agent.config()
    }

    // ── input ───────────────────────────────────────────────────────

    /// Queue a user turn. Does not start anything.
    pub fn send(&self, content: Vec<ContentBlock>) {
        self.queue.lock().push_back(Turn::user(content));
    }

    /// Queue a plain-text user turn.
    pub fn send_text(&self, text: impl Into<String>) {
        self.send(vec![ContentBlock::text(text)]);
    }

    /// Cancel the in-flight run, if any, and drop every queued turn.
    pub fn abort(&self) {
        self.cancel.lock().cancel();
        let dropped = {
            let mut queue = self.queue.lock();
            let n = queue.len();
            queue.clear();
            n
        };
        info!(dropped, "session aborted");
    }

    // ── streaming ───────────────────────────────────────────────────

    /// Process queued input, yielding every event of every run.
    ///
    /// A second concurrent call yields [`RuntimeError::SessionBusy`].
    pub fn stream(&self) -> impl Stream<Item = Result<AgentEvent, RuntimeError>> + Send + '_ {
        try_stream! {
            let _guard = StreamGuard::acquire(&self.streaming).ok_or(RuntimeError::SessionBusy)?;
            let cancel = self.reset_cancel();

            if self.mark_started() {
                let overrides = self.hooks.on_agent_start(self.snapshot()).await?;
                self.apply_overrides(overrides);
            }

            let max_injections = self.config().max_injection_loops;
            let mut injections = 0u32;
            while injections < max_injections {
                let Some(seed) = self.queue.lock().pop_front() else {
                    break;
                };
                // Dropping `run` on an early return stops it.
                let run = self.agent.spawn(self.loop_state(seed), self.follow_up(), cancel.child_token());

                while let Some(event) = run.next_event().await {
                    if let AgentEvent::InteractionEnd { iteration, usage } = &event {
                        self.hooks.on_interaction_end(*iteration, *usage).await?;
                    }
                    yield event;
                }

                let reported = run.result().await;
                let joined = run.join().await;
                if let Some(outcome) = reported.filter(|o| !o.interactions.is_empty()) {
                    self.record(&outcome);
                }
                let outcome = joined?;
                if outcome.stop_reason == StopReason::Aborted {
                    break;
                }

                match self.hooks.on_agent_end(&outcome).await? {
                    Some(input) if !input.trim().is_empty() => {
                        self.queue.lock().push_back(Turn::user_text(input));
                        injections += 1;
                        debug!(injections, "agent end hook injected input");
                    }
                    _ => break,
                }
            }
            if injections >= max_injections {
                info!(max_injections, queued = self.queued(), "injection cap reached");
            }
        }
    }

    // ── accessors ───────────────────────────────────────────────────

    /// Every turn of every completed run.
    pub fn history(&self) -> Vec<Turn> {
        self.state.lock().history.clone()
    }

    /// Usage summed across runs.
    pub fn usage(&self) -> Usage {
        self.state.lock().usage
    }

    /// Continuation ID after the latest run.
    pub fn interaction_id(&self) -> Option<String> {
        self.state.lock().interaction_id.clone()
    }

    /// Turns waiting to be processed.
    pub fn queued(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether a `stream()` is active.
    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }

    /// Active tool set (already hooked).
    pub fn tools(&self) -> ToolSet {
        self.state.lock().tools.clone()
    }

    /// Active system instruction.
    pub fn system_instruction(&self) -> Option<String> {
        self.state.lock().system_instruction.clone()
    }

    // ── internals ───────────────────────────────────────────────────

    fn reset_cancel(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();
        token
    }

    /// True exactly once per session.
    fn mark_started(&self) -> bool {
        let mut state = self.state.lock();
        !std::mem::replace(&mut state.started, true)
    }

    fn snapshot(&self) -> ContextSnapshot {
        let state = self.state.lock();
        ContextSnapshot {
            iteration: 0,
            model: self.config().model.clone(),
            interactions: state.history.clone(),
            interaction_id: state.interaction_id.clone(),
            tools: state.tools.clone(),
            system_instruction: state.system_instruction.clone(),
        }
    }

    fn apply_overrides(&self, overrides: ContextOverrides) {
        let mut state = self.state.lock();
        if let Some(interactions) = overrides.interactions {
            state.history = interactions;
        }
        if let Some(tools) = overrides.tools {
            state.tools = wrap_tools(&tools, &self.hooks);
        }
        if let Some(instruction) = overrides.system_instruction {
            state.system_instruction = Some(instruction);
        }
    }

    fn loop_state(&self, seed: Turn) -> LoopState {
        let state = self.state.lock();
        let mut interactions = state.history.clone();
        interactions.push(seed);
        LoopState {
            interactions,
            interaction_id: state.interaction_id.clone(),
            usage: Usage::default(),
            tools: state.tools.clone(),
            system_instruction: state.system_instruction.clone(),
            iteration: 0,
        }
    }

    fn follow_up(&self) -> FollowUpFn {
        let queue = Arc::clone(&self.queue);
        Box::new(move || queue.lock().drain(..).collect())
    }

    fn record(&self, outcome: &RunOutcome) {
        let mut state = self.state.lock();
        state.history.clone_from(&outcome.interactions);
        state.usage += outcome.usage;
        if outcome.interaction_id.is_some() {
            state.interaction_id.clone_from(&outcome.interaction_id);
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("agent", &self.agent)
            .field("queued", &self.queued())
            .field("streaming", &self.is_streaming())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::time::Duration;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use futures::StreamExt;
    use gale_hooks::{HookError, HookOutcome, HookPoint};
    use gale_llm::testing::{ScriptedTransport, tokens};
    use gale_tools::{AgentTool, ToolContext, ToolError, ToolOutput};
    use serde_json::{Map, Value, json};

    use super::*;

    fn session(transport: &Arc<ScriptedTransport>) -> Session {
        Session::new(ModelAdapter::new(transport.clone()), EngineConfig::default())
    }

    async fn collect(session: &Session) -> Vec<Result<AgentEvent, RuntimeError>> {
        session.stream().collect().await
    }

    #[tokio::test]
    async fn send_then_stream_runs_once() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_text("hello back", tokens(6));
        let session = session(&transport);
        session.send_text("hello");
        assert_eq!(session.queued(), 1);

        let events: Vec<_> = collect(&session).await.into_iter().map(Result::unwrap).collect();
        assert_eq!(events.first().map(AgentEvent::event_type), Some("agent.start"));
        assert!(events.last().is_some_and(AgentEvent::is_agent_end));
        assert_eq!(session.queued(), 0);
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.usage().total_tokens, 6);
        assert!(!session.is_streaming());
    }

    #[tokio::test]
    async fn history_and_usage_accumulate_across_streams() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_text("one", tokens(10));
        transport.push_text("two", tokens(15));
        let session = session(&transport);

        session.send_text("first");
        let _ = collect(&session).await;
        session.send_text("second");
        let _ = collect(&session).await;

        assert_eq!(session.history().len(), 4);
        assert_eq!(session.usage().total_tokens, 25);
        // Each call sends only the new turn.
        let second = &transport.requests()[1];
        assert_eq!(second.input.len(), 1);
        assert_eq!(second.input[0].as_text(), Some("second"));
    }

    #[tokio::test]
    async fn agent_start_hook_runs_once() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_text("a", tokens(1));
        transport.push_text("b", tokens(1));
        let session = session(&transport);
        let count = Arc::new(Mutex::new(0));
        let counter = count.clone();
        let _ = session.hooks().on(HookPoint::OnAgentStart, "count", move |_| {
            *counter.lock() += 1;
            async { Ok(HookOutcome::default().with_system_instruction("be brief")) }
        });

        session.send_text("x");
        let _ = collect(&session).await;
        session.send_text("y");
        let _ = collect(&session).await;

        assert_eq!(*count.lock(), 1);
        assert_eq!(session.system_instruction().as_deref(), Some("be brief"));
        assert_eq!(transport.requests()[1].system_instruction.as_deref(), Some("be brief"));
    }

    #[tokio::test]
    async fn agent_end_injection_is_bounded() {
        let transport = Arc::new(ScriptedTransport::new());
        for _ in 0..3 {
            transport.push_text("again?", tokens(1));
        }
        let session = Session::new(
            ModelAdapter::new(transport.clone()),
            EngineConfig::default().with_max_injection_loops(2),
        );
        let _ = session.hooks().on(HookPoint::OnAgentEnd, "nag", |_| async {
            Ok(HookOutcome::inject("keep going"))
        });

        session.send_text("start");
        let events = collect(&session).await;
        let ends = events
            .iter()
            .filter(|e| matches!(e, Ok(AgentEvent::AgentEnd(_))))
            .count();
        assert_eq!(ends, 2);
        assert_eq!(transport.call_count(), 2);
        assert_eq!(transport.requests()[1].input[0].as_text(), Some("keep going"));
        // The last injection waits for the next stream.
        assert_eq!(session.queued(), 1);

        let _ = collect(&session).await;
        assert_eq!(transport.call_count(), 3);
        assert_eq!(transport.requests()[2].input[0].as_text(), Some("keep going"));
    }

    #[tokio::test]
    async fn zero_injection_cap_runs_nothing() {
        let transport = Arc::new(ScriptedTransport::new());
        let session = Session::new(
            ModelAdapter::new(transport.clone()),
            EngineConfig::default().with_max_injection_loops(0),
        );
        session.send_text("start");
        assert!(collect(&session).await.is_empty());
        assert_eq!(transport.call_count(), 0);
        assert_eq!(session.queued(), 1);
    }

    // ── run lifecycle ──

    #[derive(Default)]
    struct Slow {
        finished: AtomicUsize,
    }

    #[async_trait]
    impl AgentTool for Slow {
        fn name(&self) -> &str {
            "slow"
        }
        fn description(&self) -> &str {
            "Takes a while"
        }
        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(
            &self,
            _call_id: &str,
            _arguments: Map<String, Value>,
            _ctx: &ToolContext,
        ) -> Result<ToolOutput, ToolError> {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let _ = self.finished.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(ToolOutput::text("done"))
        }
    }

    fn slow_session(transport: &Arc<ScriptedTransport>) -> (Session, Arc<Slow>) {
        transport.push_calls(&[("c1", "slow", json!({}))], tokens(1));
        transport.push_calls(&[("c2", "slow", json!({}))], tokens(1));
        transport.push_text("finished", tokens(1));
        let slow = Arc::new(Slow::default());
        let session = session(transport).with_tools(ToolSet::new().with(slow.clone()));
        (session, slow)
    }

    #[tokio::test]
    async fn hook_error_stops_the_run() {
        let transport = Arc::new(ScriptedTransport::new());
        let (session, slow) = slow_session(&transport);
        let _ = session.hooks().on(HookPoint::OnInteractionEnd, "broken-meter", |_| async {
            Err(HookError::handler("broken-meter", "store unavailable"))
        });

        session.send_text("go");
        let events = collect(&session).await;
        assert_matches!(events.last(), Some(Err(RuntimeError::Hook(_))));

        let calls = transport.call_count();
        let finished = slow.finished.load(AtomicOrdering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.call_count(), calls);
        assert_eq!(slow.finished.load(AtomicOrdering::SeqCst), finished);
        assert!(transport.remaining() >= 1);
    }

    #[tokio::test]
    async fn dropped_stream_stops_the_run() {
        let transport = Arc::new(ScriptedTransport::new());
        let (session, slow) = slow_session(&transport);
        session.send_text("go");

        let mut stream = Box::pin(session.stream());
        assert_matches!(stream.next().await, Some(Ok(AgentEvent::AgentStart)));
        drop(stream);
        assert!(!session.is_streaming());

        let calls = transport.call_count();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.call_count(), calls);
        assert_eq!(slow.finished.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn abort_stops_an_in_flight_run() {
        let transport = Arc::new(ScriptedTransport::new());
        let (session, slow) = slow_session(&transport);
        session.send_text("go");

        let mut stream = Box::pin(session.stream());
        assert_matches!(stream.next().await, Some(Ok(AgentEvent::AgentStart)));
        session.abort();
        let mut last = None;
        while let Some(item) = stream.next().await {
            last = Some(item);
        }
        drop(stream);

        assert_matches!(
            last,
            Some(Ok(AgentEvent::AgentEnd(RunOutcome { stop_reason: StopReason::Aborted, .. })))
        );
        assert_eq!(transport.call_count(), 1);
        assert_eq!(slow.finished.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn interaction_end_observers_fire() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_text("ok", tokens(3));
        let session = session(&transport);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _ = session.hooks().on(HookPoint::OnInteractionEnd, "meter", move |event| {
            let sink = sink.clone();
            async move {
                if let gale_hooks::HookEvent::InteractionEnd { iteration, usage } = event {
                    sink.lock().push((iteration, usage.total_tokens));
                }
                Ok(HookOutcome::default())
            }
        });

        session.send_text("go");
        let _ = collect(&session).await;
        assert_eq!(*seen.lock(), vec![(1, 3)]);
    }

    #[tokio::test]
    async fn hook_error_ends_the_stream_with_err() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_text("ok", tokens(1));
        let session = session(&transport);
        let _ = session.hooks().on(HookPoint::OnAgentEnd, "broken", |_| async {
            Err(HookError::handler("broken", "bad state"))
        });

        session.send_text("go");
        let events = collect(&session).await;
        assert_matches!(events.last(), Some(Err(RuntimeError::Hook(_))));
        assert!(!session.is_streaming());
    }

    #[tokio::test]
    async fn concurrent_stream_is_rejected() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_text("ok", tokens(1));
        let session = session(&transport);
        session.send_text("go");

        let mut first = Box::pin(session.stream());
        let _ = first.next().await;
        assert!(session.is_streaming());

        let second: Vec<_> = session.stream().collect().await;
        assert_eq!(second.len(), 1);
        assert_matches!(second[0], Err(RuntimeError::SessionBusy));

        while first.next().await.is_some() {}
        drop(first);
        assert!(!session.is_streaming());
    }

    #[tokio::test]
    async fn abort_clears_queue() {
        let transport = Arc::new(ScriptedTransport::new());
        let session = session(&transport);
        session.send_text("a");
        session.send_text("b");
        session.abort();
        assert_eq!(session.queued(), 0);
        assert!(collect(&session).await.is_empty());
        assert_eq!(transport.call_count(), 0);
    }

    #[test]
    fn tools_are_hooked_on_set() {
        let transport = Arc::new(ScriptedTransport::new());
        let session = session(&transport).with_tools(ToolSet::new());
        assert!(session.tools().all_hooked());
    }
}
