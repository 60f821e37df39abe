//! Context transforms: per-iteration overrides applied by the agent loop.

use std::future::Future;

use async_trait::async_trait;
use gale_hooks::{ContextOverrides, ContextSnapshot, HookDispatcher};

use crate::errors::RuntimeError;
use crate::hooks::tool_wrapper::wrap_tools;

/// Called with a snapshot of loop state before every model call.
///
/// The returned overrides are applied by the loop itself.
#[async_trait]
pub trait ContextTransform: Send + Sync {
    /// Compute overrides for the coming model call.
    async fn transform(&self, snapshot: ContextSnapshot) -> Result<ContextOverrides, RuntimeError>;
}

/// `onInteractionStart` handlers act as the transform. A replaced tool set
/// is re-wrapped so the tool hook points keep applying.
#[async_trait]
impl ContextTransform for HookDispatcher {
    async fn transform(&self, snapshot: ContextSnapshot) -> Result<ContextOverrides, RuntimeError> {
        let mut overrides = self.on_interaction_start(snapshot).await?;
        if let Some(tools) = overrides.tools.take() {
            overrides.tools = Some(wrap_tools(&tools, self));
        }
        Ok(overrides)
    }
}

/// Adapts an async closure into a [`ContextTransform`].
pub struct FnTransform<F>(pub F);

#[async_trait]
impl<F, Fut> ContextTransform for FnTransform<F>
where
    F: Fn(ContextSnapshot) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ContextOverrides, RuntimeError>> + Send,
{
    async fn transform(&self, snapshot: ContextSnapshot) -> Result<ContextOverrides, RuntimeError> {
        (self.0)(snapshot).await
    }
}

impl<F> std::fmt::Debug for FnTransform<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnTransform")
    }
}
