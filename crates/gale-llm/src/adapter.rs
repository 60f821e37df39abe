//! # Model adapter
//!
//! Issues one streaming call and translates the provider protocol into the
//! semantic event vocabulary, keeping an index→accumulator map:
//!
//! | Provider signal | Action |
//! |---|---|
//! | `content.start` (text) | emit `text.start` |
//! | text delta | append, emit `text.delta` |
//! | thought summary delta | clean the fragment, append, emit `thought.summary` |
//! | thought signature delta | store on the accumulator |
//! | function call delta | accumulate id, name, arguments |
//! | `content.stop` (text) | emit `text.end` once |
//! | `interaction.*` | track the continuation ID, capture usage |
//! | `error` | fail the call |
//!
//! Events are the primary contract. The returned [`ModelResponse`] is what
//! the loop needs for its own bookkeeping.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use futures::StreamExt;
use gale_core::content::FunctionCall;
use gale_core::{AgentEvent, ContentBlock, Usage};
use regex::Regex;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::events::{ContentKind, ProviderDelta, ProviderEvent};
use crate::provider::{ModelRequest, ModelTransport, ProviderError, ProviderResult};

static EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*+|__").expect("emphasis pattern is valid"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Strip emphasis markup and collapse whitespace runs in one fragment.
///
/// Operates on the fragment alone: a marker split across two fragments is
/// not recognized.
#[must_use]
pub fn clean_thought_fragment(fragment: &str) -> String {
    let stripped = EMPHASIS.replace_all(fragment, "");
    WHITESPACE.replace_all(&stripped, " ").into_owned()
}

/// What one model call produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelResponse {
    /// Aggregated content blocks, in first-seen order.
    pub outputs: Vec<ContentBlock>,
    /// Continuation ID after this call.
    pub interaction_id: Option<String>,
    /// Usage reported for this call.
    pub usage: Usage,
}

/// Drives a [`ModelTransport`] and translates its events.
#[derive(Clone)]
pub struct ModelAdapter {
    transport: Arc<dyn ModelTransport>,
}

impl ModelAdapter {
    /// Wrap a transport.
    pub fn new(transport: Arc<dyn ModelTransport>) -> Self {
        Self { transport }
    }

    /// The wrapped transport.
    pub fn transport(&self) -> &Arc<dyn ModelTransport> {
        &self.transport
    }

    /// Issue one streaming call, emitting semantic events through `emit`.
    ///
    /// A provider `error` event or a transport failure ends the call with
    /// `Err`; nothing accumulated so far is returned. Cancellation stops the
    /// stream and yields [`ProviderError::Cancelled`], even if the transport
    /// ignores the token.
    #[instrument(skip_all, fields(transport = self.transport.name(), model = %request.model))]
    pub async fn call<F>(
        &self,
        request: &ModelRequest,
        cancel: &CancellationToken,
        mut emit: F,
    ) -> ProviderResult<ModelResponse>
    where
        F: FnMut(AgentEvent),
    {
        let stream = self.transport.stream(request, cancel).await?;
        let mut stream = std::pin::pin!(stream.take_until(cancel.clone().cancelled_owned()));
        let mut state = StreamState::new(request.interaction_id.clone());

        while let Some(item) = stream.next().await {
            state.process(item?, &mut emit)?;
        }

        // A stream cut short by cancellation holds partial blocks.
        if cancel.is_cancelled() {
            debug!("model call cancelled mid-stream");
            return Err(ProviderError::Cancelled);
        }

        let response = state.finish();
        debug!(
            outputs = response.outputs.len(),
            total_tokens = response.usage.total_tokens,
            "model call complete"
        );
        Ok(response)
    }
}

impl std::fmt::Debug for ModelAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelAdapter")
            .field("transport", &self.transport.name())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stream state
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory reconstruction of one streamed content block.
#[derive(Debug, Default)]
struct Accumulator {
    kind: Option<ContentKind>,
    text: String,
    signature: Option<String>,
    call_id: Option<String>,
    name: Option<String>,
    arguments: Map<String, Value>,
    raw_arguments: String,
    started: bool,
    ended: bool,
}

impl Accumulator {
    fn set_kind(&mut self, kind: ContentKind) {
        if self.kind.is_none() {
            self.kind = Some(kind);
        }
    }

    fn into_block(self) -> Option<ContentBlock> {
        match self.kind? {
            ContentKind::Text => Some(ContentBlock::Text { text: self.text }),
            ContentKind::Thought => Some(ContentBlock::ThoughtSummary {
                summary: self.text,
                signature: self.signature,
            }),
            ContentKind::FunctionCall => {
                let mut arguments = self.arguments;
                if !self.raw_arguments.trim().is_empty() {
                    match serde_json::from_str::<Map<String, Value>>(&self.raw_arguments) {
                        Ok(parsed) => arguments.extend(parsed),
                        Err(e) => warn!(
                            name = ?self.name,
                            error = %e,
                            "unparseable function call arguments, using what was merged"
                        ),
                    }
                }
                let id = self
                    .call_id
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| format!("call_{}", uuid::Uuid::now_v7().simple()));
                Some(ContentBlock::FunctionCall(FunctionCall {
                    id,
                    name: self.name.unwrap_or_default(),
                    arguments,
                }))
            }
            ContentKind::Unknown => None,
        }
    }
}

/// Accumulated state for one model call.
#[derive(Debug)]
struct StreamState {
    /// Block indices in first-seen order.
    order: Vec<u32>,
    blocks: HashMap<u32, Accumulator>,
    interaction_id: Option<String>,
    usage: Usage,
}

impl StreamState {
    fn new(interaction_id: Option<String>) -> Self {
        Self {
            order: Vec::new(),
            blocks: HashMap::new(),
            interaction_id,
            usage: Usage::default(),
        }
    }

    fn block(&mut self, index: u32) -> &mut Accumulator {
        if !self.blocks.contains_key(&index) {
            self.order.push(index);
        }
        self.blocks.entry(index).or_default()
    }

    fn process<F>(&mut self, event: ProviderEvent, emit: &mut F) -> ProviderResult<()>
    where
        F: FnMut(AgentEvent),
    {
        match event {
            ProviderEvent::InteractionStart { interaction_id } => {
                if interaction_id.is_some() {
                    self.interaction_id = interaction_id;
                }
            }
            ProviderEvent::InteractionComplete {
                interaction_id,
                usage,
            } => {
                if interaction_id.is_some() {
                    self.interaction_id = interaction_id;
                }
                if let Some(usage) = usage {
                    self.usage = usage;
                }
            }
            ProviderEvent::ContentStart { index, kind } => {
                let acc = self.block(index);
                acc.set_kind(kind);
                if acc.kind == Some(ContentKind::Text) && !acc.started {
                    acc.started = true;
                    emit(AgentEvent::TextStart { index });
                }
            }
            ProviderEvent::ContentDelta { index, delta } => {
                let acc = self.block(index);
                acc.set_kind(delta.kind());
                apply_delta(acc, index, delta, emit);
            }
            ProviderEvent::ContentStop { index } => {
                let Some(acc) = self.blocks.get_mut(&index) else {
                    debug!(index, "stop for unknown block, ignoring");
                    return Ok(());
                };
                if acc.ended {
                    return Ok(());
                }
                acc.ended = true;
                if acc.kind == Some(ContentKind::Text) {
                    emit(AgentEvent::TextEnd {
                        index,
                        text: acc.text.clone(),
                    });
                }
            }
            ProviderEvent::Error { code, message } => {
                return Err(ProviderError::Stream { code, message });
            }
        }
        Ok(())
    }

    fn finish(mut self) -> ModelResponse {
        let outputs = self
            .order
            .iter()
            .filter_map(|index| self.blocks.remove(index))
            .filter_map(Accumulator::into_block)
            .collect();
        ModelResponse {
            outputs,
            interaction_id: self.interaction_id,
            usage: self.usage,
        }
    }
}

fn apply_delta<F>(acc: &mut Accumulator, index: u32, delta: ProviderDelta, emit: &mut F)
where
    F: FnMut(AgentEvent),
{
    match delta {
        ProviderDelta::Text { text } => {
            if acc.kind != Some(ContentKind::Text) {
                return;
            }
            if !acc.started {
                acc.started = true;
                emit(AgentEvent::TextStart { index });
            }
            acc.text.push_str(&text);
            emit(AgentEvent::TextDelta { index, delta: text });
        }
        ProviderDelta::ThoughtSummary { text } => {
            let cleaned = clean_thought_fragment(&text);
            acc.text.push_str(&cleaned);
            if !cleaned.is_empty() {
                emit(AgentEvent::ThoughtSummary { delta: cleaned });
            }
        }
        ProviderDelta::ThoughtSignature { signature } => {
            acc.signature = Some(signature);
        }
        ProviderDelta::FunctionCall {
            id,
            name,
            arguments,
        } => {
            if id.is_some() {
                acc.call_id = id;
            }
            if name.is_some() {
                acc.name = name;
            }
            match arguments {
                Some(Value::Object(map)) => acc.arguments.extend(map),
                Some(Value::String(fragment)) => acc.raw_arguments.push_str(&fragment),
                Some(Value::Null) | None => {}
                Some(other) => warn!(arguments = %other, "ignoring non-object function call arguments"),
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
