//! The agent loop: call model → run tools → decide continue/stop.
//!
//! One run owns a [`LoopState`] exclusively. Each iteration:
//! 1. stops early if cancellation was requested
//! 2. takes the newest user input as model input
//! 3. applies context-transform overrides (every iteration)
//! 4. calls the model, merges usage, appends the model turn
//! 5. runs any function calls and appends their results, or
//! 6. appends follow-up turns if the provider has any, or
//! 7. stops
//!
//! Whatever happens, the run ends with `agent.end` followed by the channel
//! result, both carrying the same [`RunOutcome`].

use std::sync::Arc;

use gale_core::{AgentEvent, ContentBlock, Role, RunOutcome, StopReason, Turn, Usage};
use gale_hooks::{ContextOverrides, ContextSnapshot};
use gale_llm::{ModelAdapter, ModelRequest, ProviderError};
use gale_tools::ToolSet;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::agent::tool_executor::execute_calls;
use crate::agent::{AgentChannel, agent_channel};
use crate::config::EngineConfig;
use crate::errors::RuntimeError;
use crate::hooks::ContextTransform;

/// Supplies queued user turns once the model has nothing left to call.
pub type FollowUpFn = Box<dyn FnMut() -> Vec<Turn> + Send>;

// ─────────────────────────────────────────────────────────────────────────────
// Loop state
// ─────────────────────────────────────────────────────────────────────────────

/// Mutable state of one in-flight run.
#[derive(Clone, Debug, Default)]
pub struct LoopState {
    /// Interaction history, seed turn last.
    pub interactions: Vec<Turn>,
    /// Continuation ID for the next model call.
    pub interaction_id: Option<String>,
    /// Usage summed over this run's model calls.
    pub usage: Usage,
    /// Active tools.
    pub tools: ToolSet,
    /// System instruction.
    pub system_instruction: Option<String>,
    /// Iterations started so far.
    pub iteration: u32,
}

impl LoopState {
    /// State seeded with a single user turn.
    pub fn new(seed: Turn) -> Self {
        Self {
            interactions: vec![seed],
            ..Self::default()
        }
    }

    /// Replace the tool set.
    #[must_use]
    pub fn with_tools(mut self, tools: ToolSet) -> Self {
        self.tools = tools;
        self
    }

    /// Replace the system instruction.
    #[must_use]
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    /// Carry a continuation ID from an earlier run.
    #[must_use]
    pub fn with_interaction_id(mut self, interaction_id: Option<String>) -> Self {
        self.interaction_id = interaction_id;
        self
    }

    /// Content of the trailing user turns, oldest first.
    ///
    /// Usually this is the single newest turn. Several user turns in a row
    /// (queued follow-ups) are all sent, since the provider has seen none of
    /// them.
    pub fn latest_input(&self) -> Vec<ContentBlock> {
        let trailing = self
            .interactions
            .iter()
            .rev()
            .take_while(|t| t.role == Role::User)
            .count();
        if trailing == 0 {
            return self
                .interactions
                .last()
                .map(|t| t.content.clone())
                .unwrap_or_default();
        }
        self.interactions[self.interactions.len() - trailing..]
            .iter()
            .flat_map(|t| t.content.iter().cloned())
            .collect()
    }

    /// Read-only copy for transforms and hooks.
    pub fn snapshot(&self, model: &str) -> ContextSnapshot {
        ContextSnapshot {
            iteration: self.iteration,
            model: model.to_owned(),
            interactions: self.interactions.clone(),
            interaction_id: self.interaction_id.clone(),
            tools: self.tools.clone(),
            system_instruction: self.system_instruction.clone(),
        }
    }

    /// Apply overrides returned by a transform or start hook.
    pub fn apply(&mut self, overrides: ContextOverrides) {
        if let Some(interactions) = overrides.interactions {
            self.interactions = interactions;
        }
        if let Some(tools) = overrides.tools {
            self.tools = tools;
        }
        if let Some(instruction) = overrides.system_instruction {
            self.system_instruction = Some(instruction);
        }
    }

    fn outcome(&self, stop_reason: StopReason) -> RunOutcome {
        RunOutcome {
            interactions: self.interactions.clone(),
            interaction_id: self.interaction_id.clone(),
            usage: self.usage,
            iterations: self.iteration,
            stop_reason,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent loop
// ─────────────────────────────────────────────────────────────────────────────

/// Drives runs against one model adapter.
#[derive(Clone)]
pub struct AgentLoop {
    adapter: ModelAdapter,
    config: EngineConfig,
    transform: Option<Arc<dyn ContextTransform>>,
}

impl AgentLoop {
    /// Loop over `adapter` with `config`.
    pub fn new(adapter: ModelAdapter, config: EngineConfig) -> Self {
        Self {
            adapter,
            config,
            transform: None,
        }
    }

    /// Install a context transform consulted before every model call.
    #[must_use]
    pub fn with_transform(mut self, transform: Arc<dyn ContextTransform>) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run to completion, emitting events on `channel`.
    ///
    /// Always pushes `agent.end` and ends `channel` with the outcome before
    /// returning, including when an iteration fails.
    #[instrument(skip_all, fields(model = %self.config.model, max_iterations = self.config.max_iterations))]
    pub async fn run(
        &self,
        mut state: LoopState,
        mut follow_up: FollowUpFn,
        channel: &AgentChannel,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, RuntimeError> {
        let guard = EndGuard::new(channel, &state);
        channel.push(AgentEvent::AgentStart);
        info!("agent run started");

        let result = self
            .iterate(&mut state, &mut follow_up, channel, cancel, &guard)
            .await;
        let stop_reason = match &result {
            Ok(reason) => *reason,
            Err(e) => {
                error!(category = e.category(), error = %e, "agent run failed");
                StopReason::Error
            }
        };

        let outcome = state.outcome(stop_reason);
        info!(
            iterations = outcome.iterations,
            stop_reason = ?outcome.stop_reason,
            total_tokens = outcome.usage.total_tokens,
            "agent run finished"
        );
        channel.push(AgentEvent::AgentEnd(outcome.clone()));
        channel.end(outcome.clone());
        guard.disarm();

        result.map(|_| outcome)
    }

    /// Spawn a run on the tokio runtime.
    pub fn spawn(
        &self,
        state: LoopState,
        follow_up: FollowUpFn,
        cancel: CancellationToken,
    ) -> AgentRun {
        let channel = agent_channel();
        let this = self.clone();
        let events = channel.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { this.run(state, follow_up, &events, &token).await });
        AgentRun {
            channel,
            handle,
            cancel,
        }
    }

    async fn iterate(
        &self,
        state: &mut LoopState,
        follow_up: &mut FollowUpFn,
        channel: &AgentChannel,
        cancel: &CancellationToken,
        guard: &EndGuard<'_>,
    ) -> Result<StopReason, RuntimeError> {
        while state.iteration < self.config.max_iterations {
            if cancel.is_cancelled() {
                info!(iteration = state.iteration, "run aborted");
                return Ok(StopReason::Aborted);
            }
            state.iteration += 1;
            guard.checkpoint(state);
            let iteration = state.iteration;
            channel.push(AgentEvent::InteractionStart { iteration });

            let input = state.latest_input();
            if let Some(transform) = &self.transform {
                let overrides = transform
                    .transform(state.snapshot(&self.config.model))
                    .await?;
                if !overrides.is_empty() {
                    debug!(iteration, "applying context overrides");
                    state.apply(overrides);
                }
            }

            let request = ModelRequest {
                model: self.config.model.clone(),
                input,
                tools: state.tools.definitions(),
                system_instruction: state.system_instruction.clone(),
                interaction_id: state.interaction_id.clone(),
            };
            let response = match self
                .adapter
                .call(&request, cancel, |event| channel.push(event))
                .await
            {
                Ok(response) => response,
                Err(ProviderError::Cancelled) => {
                    info!(iteration, "model call cancelled");
                    return Ok(StopReason::Aborted);
                }
                Err(e) => return Err(e.into()),
            };

            if response.interaction_id.is_some() {
                state.interaction_id = response.interaction_id;
            }
            state.usage += response.usage;
            let model_turn = Turn::model(response.outputs);
            let calls: Vec<_> = model_turn.function_calls().cloned().collect();
            state.interactions.push(model_turn);
            guard.checkpoint(state);

            if !calls.is_empty() {
                debug!(iteration, calls = calls.len(), "executing tool calls");
                let results = execute_calls(&calls, &state.tools, channel, cancel).await?;
                state.interactions.push(Turn::user(
                    results.into_iter().map(ContentBlock::FunctionResult).collect(),
                ));
                guard.checkpoint(state);
                channel.push(AgentEvent::InteractionEnd {
                    iteration,
                    usage: response.usage,
                });
                continue;
            }

            let follow_ups = follow_up();
            if !follow_ups.is_empty() {
                debug!(iteration, count = follow_ups.len(), "appending follow-up turns");
                state.interactions.extend(follow_ups);
                guard.checkpoint(state);
                channel.push(AgentEvent::InteractionEnd {
                    iteration,
                    usage: response.usage,
                });
                continue;
            }

            channel.push(AgentEvent::InteractionEnd {
                iteration,
                usage: response.usage,
            });
            return Ok(StopReason::Completed);
        }

        warn!(max_iterations = self.config.max_iterations, "iteration cap reached");
        Ok(StopReason::MaxIterations)
    }
}

impl std::fmt::Debug for AgentLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentLoop")
            .field("adapter", &self.adapter)
            .field("config", &self.config)
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

/// Ends the channel with an error outcome if the run future unwinds or is
/// dropped before finishing.
///
/// The outcome carries the state of the last checkpoint, so consumers still
/// see the turns and usage gathered before the failure.
struct EndGuard<'a> {
    channel: Option<&'a AgentChannel>,
    partial: Mutex<RunOutcome>,
}

impl<'a> EndGuard<'a> {
    fn new(channel: &'a AgentChannel, state: &LoopState) -> Self {
        Self {
            channel: Some(channel),
            partial: Mutex::new(state.outcome(StopReason::Error)),
        }
    }

    fn checkpoint(&self, state: &LoopState) {
        *self.partial.lock() = state.outcome(StopReason::Error);
    }

    fn disarm(mut self) {
        self.channel = None;
    }
}

impl Drop for EndGuard<'_> {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.take() {
            let outcome = std::mem::take(self.partial.get_mut());
            warn!(
                iterations = outcome.iterations,
                "agent run dropped before finishing"
            );
            channel.push(AgentEvent::AgentEnd(outcome.clone()));
            channel.end(outcome);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Spawned run
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to a spawned run: its event channel and its join handle.
///
/// Dropping the handle before the run finishes cancels the run's token and
/// aborts its task, so no run outlives the code driving it.
#[derive(Debug)]
pub struct AgentRun {
    channel: AgentChannel,
    handle: JoinHandle<Result<RunOutcome, RuntimeError>>,
    cancel: CancellationToken,
}

impl AgentRun {
    /// The run's event channel.
    pub fn events(&self) -> &AgentChannel {
        &self.channel
    }

    /// Next event, or `None` after the run ended and all events were pulled.
    pub async fn next_event(&self) -> Option<AgentEvent> {
        self.channel.next().await
    }

    /// The outcome the run ended with.
    pub async fn result(&self) -> Option<RunOutcome> {
        self.channel.result().await
    }

    /// Whether the run task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the run task and return its result.
    pub async fn join(mut self) -> Result<RunOutcome, RuntimeError> {
        match (&mut self.handle).await {
            Ok(result) => result,
            Err(e) => Err(RuntimeError::Internal(format!("agent run task failed: {e}"))),
        }
    }
}

impl Drop for AgentRun {
    fn drop(&mut self) {
        if !self.handle.is_finished() {
            debug!("stopping unfinished agent run");
            self.cancel.cancel();
            self.handle.abort();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
