//! In-memory transport that replays canned provider events.
//!
//! Each call to [`ModelTransport::stream`] consumes the next queued script
//! and records the request it was given. Running out of scripts is an error,
//! so a test that expects N model calls fails loudly on call N+1.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::{StreamExt, stream};
use gale_core::Usage;
use parking_lot::Mutex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::events::{ContentKind, ProviderDelta, ProviderEvent};
use crate::provider::{ModelRequest, ModelTransport, ProviderError, ProviderEventStream, ProviderResult};

/// One step of a scripted stream.
#[derive(Clone, Debug)]
pub enum ScriptStep {
    /// Yield this event.
    Event(ProviderEvent),
    /// Yield `ProviderError::Other` with this message and end the stream.
    Fail(String),
    /// Stop yielding and stay open until the call is cancelled, like a
    /// provider that has gone quiet mid-answer.
    Stall,
}

/// Replays one script per model call.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Vec<ScriptStep>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedTransport {
    /// Transport with nothing queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a script for the next unscripted call.
    pub fn push_script(&self, steps: Vec<ScriptStep>) {
        self.scripts.lock().push_back(steps);
    }

    /// Queue a script made only of events.
    pub fn push_events(&self, events: Vec<ProviderEvent>) {
        self.push_script(events.into_iter().map(ScriptStep::Event).collect());
    }

    /// Queue a plain text answer.
    pub fn push_text(&self, text: &str, usage: Usage) {
        self.push_events(text_response(text, usage));
    }

    /// Queue an answer made of function calls `(id, name, arguments)`.
    pub fn push_calls(&self, calls: &[(&str, &str, Value)], usage: Usage) {
        self.push_events(calls_response(calls, usage));
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().clone()
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Number of scripts not yet consumed.
    pub fn remaining(&self) -> usize {
        self.scripts.lock().len()
    }
}

#[async_trait]
impl ModelTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(
        &self,
        request: &ModelRequest,
        cancel: &CancellationToken,
    ) -> ProviderResult<ProviderEventStream> {
        self.requests.lock().push(request.clone());
        let Some(steps) = self.scripts.lock().pop_front() else {
            return Err(ProviderError::Other {
                message: "no scripted response left".into(),
            });
        };

        let mut items = Vec::with_capacity(steps.len());
        let mut stalled = false;
        for step in steps {
            match step {
                ScriptStep::Event(event) => items.push(Ok(event)),
                ScriptStep::Fail(message) => {
                    items.push(Err(ProviderError::Other { message }));
                    break;
                }
                ScriptStep::Stall => {
                    stalled = true;
                    break;
                }
            }
        }
        let tail: stream::BoxStream<'static, ProviderResult<ProviderEvent>> = if stalled {
            stream::pending().boxed()
        } else {
            stream::empty().boxed()
        };
        Ok(Box::pin(
            stream::iter(items)
                .chain(tail)
                .take_until(cancel.clone().cancelled_owned()),
        ))
    }
}

/// Events for a text answer at block 0, with usage.
pub fn text_response(text: &str, usage: Usage) -> Vec<ProviderEvent> {
    vec![
        ProviderEvent::InteractionStart {
            interaction_id: None,
        },
        ProviderEvent::ContentStart {
            index: 0,
            kind: ContentKind::Text,
        },
        ProviderEvent::ContentDelta {
            index: 0,
            delta: ProviderDelta::Text { text: text.into() },
        },
        ProviderEvent::ContentStop { index: 0 },
        ProviderEvent::InteractionComplete {
            interaction_id: None,
            usage: Some(usage),
        },
    ]
}

/// Events for one function-call block per entry, with usage.
pub fn calls_response(calls: &[(&str, &str, Value)], usage: Usage) -> Vec<ProviderEvent> {
    let mut events = Vec::new();
    for (index, (id, name, arguments)) in (0u32..).zip(calls) {
        events.push(ProviderEvent::ContentStart {
            index,
            kind: ContentKind::FunctionCall,
        });
        events.push(ProviderEvent::ContentDelta {
            index,
            delta: ProviderDelta::FunctionCall {
                id: Some((*id).to_string()),
                name: Some((*name).to_string()),
                arguments: Some(arguments.clone()),
            },
        });
        events.push(ProviderEvent::ContentStop { index });
    }
    events.push(ProviderEvent::InteractionComplete {
        interaction_id: None,
        usage: Some(usage),
    });
    events
}

/// Usage with only `total_tokens` set.
pub fn tokens(total: u64) -> Usage {
    Usage {
        total_tokens: total,
        ..Usage::default()
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn replays_in_order_and_records_requests() {
        let transport = ScriptedTransport::new();
        transport.push_text("one", tokens(1));
        transport.push_calls(&[("c1", "read", json!({}))], tokens(2));
        assert_eq!(transport.remaining(), 2);

        let cancel = CancellationToken::new();
        let first: Vec<_> = transport
            .stream(&ModelRequest::default(), &cancel)
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(first.len(), 5);

        let _ = transport
            .stream(&ModelRequest::default(), &cancel)
            .await
            .unwrap();
        assert_eq!(transport.call_count(), 2);
        assert!(
            transport
                .stream(&ModelRequest::default(), &cancel)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn fail_step_ends_stream() {
        let transport = ScriptedTransport::new();
        transport.push_script(vec![
            ScriptStep::Fail("down".into()),
            ScriptStep::Event(ProviderEvent::ContentStop { index: 0 }),
        ]);
        let items: Vec<_> = transport
            .stream(&ModelRequest::default(), &CancellationToken::new())
            .await
            .unwrap()
            .collect()
            .await;
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }
}
