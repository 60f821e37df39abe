//! Hook handler trait.
//!
//! Defines the [`HookHandler`] trait that all hook implementations must satisfy,
//! plus [`FnHandler`], which adapts an async closure.

use std::future::Future;

use async_trait::async_trait;

use crate::errors::HookError;
use crate::types::{HookEvent, HookOutcome, HookPoint};

/// A hook handler bound to one extension point.
///
/// # Priority
///
/// Higher priority handlers run first. Default priority is 0. Handlers with
/// equal priority run in registration order.
#[async_trait]
pub trait HookHandler: Send + Sync {
    /// Name for this handler, unique within its point.
    fn name(&self) -> &str;

    /// Which extension point this handler responds to.
    fn point(&self) -> HookPoint;

    /// Execution priority. Higher runs first. Default: 0.
    fn priority(&self) -> i32 {
        0
    }

    /// Execute the handler with the given payload.
    ///
    /// An `Err` propagates out of the dispatch call.
    async fn handle(&self, event: &HookEvent) -> Result<HookOutcome, HookError>;
}

/// Handler backed by an async closure over an owned payload.
pub struct FnHandler<F> {
    name: String,
    point: HookPoint,
    priority: i32,
    f: F,
}

impl<F> FnHandler<F> {
    /// Wrap `f` as a handler for `point`.
    pub fn new(point: HookPoint, name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            point,
            priority: 0,
            f,
        }
    }

    /// Set the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

#[async_trait]
impl<F, Fut> HookHandler for FnHandler<F>
where
    F: Fn(HookEvent) -> Fut + Send + Sync,
    Fut: Future<Output = Result<HookOutcome, HookError>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn point(&self) -> HookPoint {
        self.point
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn handle(&self, event: &HookEvent) -> Result<HookOutcome, HookError> {
        (self.f)(event.clone()).await
    }
}
