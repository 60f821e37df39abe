//! Push/pull event channel with a one-shot final result.
//!
//! The producer calls [`EventChannel::push`] at network pace; the consumer
//! pulls with [`EventChannel::next`] (or [`EventChannel::into_stream`]) at its
//! own pace. Events sit in a FIFO buffer until pulled, or go straight to a
//! consumer already parked in the waiter slot, so order is preserved either
//! way.
//!
//! Termination and result are separate:
//! - an event matching the terminal predicate stops further pushes, but does
//!   not resolve the result
//! - only [`EventChannel::end`] resolves [`EventChannel::result`] and releases
//!   a waiting consumer with "done"

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use tracing::trace;

/// Predicate marking an event as the last one the channel accepts.
pub type TerminalFn<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

struct State<E> {
    buffer: VecDeque<E>,
    waiter: Option<oneshot::Sender<Option<E>>>,
    terminated: bool,
    ended: bool,
}

struct Shared<E, R> {
    state: Mutex<State<E>>,
    is_terminal: Option<TerminalFn<E>>,
    result: watch::Sender<Option<R>>,
}

/// Single-producer, single-consumer event transport.
///
/// Cloning yields another handle to the same channel.
pub struct EventChannel<E, R> {
    shared: Arc<Shared<E, R>>,
}

impl<E, R> Clone for EventChannel<E, R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E, R> Default for EventChannel<E, R> {
    fn default() -> Self {
        Self::build(None)
    }
}

impl<E, R> EventChannel<E, R> {
    /// Channel without a terminal predicate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel that stops accepting events after one matching `is_terminal`.
    pub fn with_terminal<F>(is_terminal: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self::build(Some(Arc::new(is_terminal)))
    }

    fn build(is_terminal: Option<TerminalFn<E>>) -> Self {
        let (result, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    buffer: VecDeque::new(),
                    waiter: None,
                    terminated: false,
                    ended: false,
                }),
                is_terminal,
                result,
            }),
        }
    }

    /// Deliver an event. Dropped silently once the channel is terminated.
    pub fn push(&self, event: E) {
        let mut state = self.shared.state.lock();
        if state.terminated {
            trace!("dropping event pushed after termination");
            return;
        }
        if self.shared.is_terminal.as_ref().is_some_and(|f| f(&event)) {
            state.terminated = true;
        }
        if let Some(waiter) = state.waiter.take() {
            // The consumer may have stopped waiting; keep the event for the next pull.
            if let Err(Some(event)) = waiter.send(Some(event)) {
                state.buffer.push_back(event);
            }
            return;
        }
        state.buffer.push_back(event);
    }

    /// Terminate the channel and resolve the result. Only the first call counts.
    pub fn end(&self, result: R) {
        let waiter = {
            let mut state = self.shared.state.lock();
            if state.ended {
                trace!("ignoring repeated end");
                return;
            }
            state.ended = true;
            state.terminated = true;
            state.waiter.take()
        };
        let _ = self.shared.result.send_replace(Some(result));
        if let Some(waiter) = waiter {
            let _ = waiter.send(None);
        }
    }

    /// Next event in push order, or `None` once the channel is ended and drained.
    pub async fn next(&self) -> Option<E> {
        let pending = {
            let mut state = self.shared.state.lock();
            if let Some(event) = state.buffer.pop_front() {
                return Some(event);
            }
            if state.ended {
                return None;
            }
            let (tx, rx) = oneshot::channel();
            state.waiter = Some(tx);
            rx
        };
        pending.await.ok().flatten()
    }

    /// Whether further pushes are dropped.
    pub fn is_terminated(&self) -> bool {
        self.shared.state.lock().terminated
    }

    /// Whether [`end`](Self::end) has been called.
    pub fn is_ended(&self) -> bool {
        self.shared.state.lock().ended
    }

    /// Events pushed but not yet pulled.
    pub fn buffered(&self) -> usize {
        self.shared.state.lock().buffer.len()
    }
}

impl<E, R: Clone> EventChannel<E, R> {
    /// The value given to [`end`](Self::end), waiting for it if necessary.
    pub async fn result(&self) -> Option<R> {
        let mut rx = self.shared.result.subscribe();
        let ready = rx.wait_for(Option::is_some).await.ok()?;
        (*ready).clone()
    }

    /// The result if already resolved.
    pub fn try_result(&self) -> Option<R> {
        self.shared.result.borrow().clone()
    }
}

impl<E, R> EventChannel<E, R>
where
    E: Send + 'static,
    R: Send + Sync + 'static,
{
    /// Consume the events as a single-pass stream.
    pub fn into_stream(self) -> impl Stream<Item = E> + Send {
        futures::stream::unfold(self, |channel| async move {
            channel.next().await.map(|event| (event, channel))
        })
    }
}

impl<E, R> fmt::Debug for EventChannel<E, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("EventChannel")
            .field("buffered", &state.buffer.len())
            .field("waiting", &state.waiter.is_some())
            .field("terminated", &state.terminated)
            .field("ended", &state.ended)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;

    use super::*;

    type Channel = EventChannel<u32, &'static str>;

    #[tokio::test]
    async fn buffered_events_in_push_order() {
        let channel = Channel::new();
        channel.push(1);
        channel.push(2);
        channel.push(3);
        channel.end("done");
        let events: Vec<_> = channel.clone().into_stream().collect().await;
        assert_eq!(events, vec![1, 2, 3]);
        assert_eq!(channel.result().await, Some("done"));
    }

    #[tokio::test]
    async fn waiting_consumer_receives_directly() {
        let channel = Channel::new();
        let consumer = tokio::spawn(channel.clone().into_stream().collect::<Vec<_>>());
        tokio::task::yield_now().await;
        channel.push(7);
        tokio::task::yield_now().await;
        channel.push(8);
        channel.end("ok");
        assert_eq!(consumer.await.unwrap(), vec![7, 8]);
    }

    #[tokio::test]
    async fn terminal_event_stops_pushes_but_not_result() {
        let channel = EventChannel::<u32, &str>::with_terminal(|e| *e == 99);
        channel.push(1);
        channel.push(99);
        channel.push(2);
        assert!(channel.is_terminated());
        assert!(!channel.is_ended());
        assert_eq!(channel.try_result(), None);

        channel.end("final");
        let events: Vec<_> = channel.clone().into_stream().collect().await;
        assert_eq!(events, vec![1, 99]);
        assert_eq!(channel.result().await, Some("final"));
    }

    #[tokio::test]
    async fn result_waits_for_end() {
        let channel = Channel::new();
        let waiting = {
            let channel = channel.clone();
            tokio::spawn(async move { channel.result().await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!waiting.is_finished());
        channel.end("late");
        assert_eq!(waiting.await.unwrap(), Some("late"));
    }

    #[tokio::test]
    async fn second_end_is_ignored() {
        let channel = Channel::new();
        channel.end("first");
        channel.end("second");
        assert_eq!(channel.result().await, Some("first"));
    }

    #[tokio::test]
    async fn end_releases_waiting_consumer() {
        let channel = Channel::new();
        let next = {
            let channel = channel.clone();
            tokio::spawn(async move { channel.next().await })
        };
        tokio::task::yield_now().await;
        channel.end("x");
        assert_eq!(next.await.unwrap(), None);
    }

    #[tokio::test]
    async fn pushes_after_end_dropped() {
        let channel = Channel::new();
        channel.end("x");
        channel.push(5);
        assert_eq!(channel.buffered(), 0);
        assert_eq!(channel.next().await, None);
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        fn run<F: std::future::Future>(f: F) -> F::Output {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap()
                .block_on(f)
        }

        proptest! {
            #[test]
            fn order_preserved_regardless_of_consumer_start(
                events in proptest::collection::vec(any::<u32>(), 0..64),
                early in 0usize..64,
            ) {
                let early = early.min(events.len());
                let received = run(async {
                    let channel = EventChannel::<u32, ()>::new();
                    for e in &events[..early] {
                        channel.push(*e);
                    }
                    let consumer = tokio::spawn(channel.clone().into_stream().collect::<Vec<_>>());
                    for e in &events[early..] {
                        channel.push(*e);
                        tokio::task::yield_now().await;
                    }
                    channel.end(());
                    consumer.await.unwrap()
                });
                prop_assert_eq!(received, events);
            }

            #[test]
            fn result_is_end_value_not_terminal_payload(
                before in proptest::collection::vec(0u32..10, 0..16),
                value in any::<u32>(),
            ) {
                let result = run(async {
                    let channel = EventChannel::<u32, u32>::with_terminal(|e| *e < 5);
                    for e in &before {
                        channel.push(*e);
                    }
                    channel.end(value);
                    channel.result().await
                });
                prop_assert_eq!(result, Some(value));
            }
        }
    }
}
