//! Tool hook wrapper: routes every tool invocation through the tool points.
//!
//! `beforeToolExecute` gates the call (and may rewrite its arguments),
//! `afterToolExecute` may replace the result. The wrapped tool reports the
//! same name, description and schema as the original.

use std::sync::Arc;

use async_trait::async_trait;
use gale_hooks::{HookDispatcher, HookError};
use gale_tools::{AgentTool, ToolContext, ToolError, ToolOutput, ToolSet};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::agent::tool_executor::run_guarded;

/// A tool whose invocations pass through the tool hook points.
pub struct HookedTool {
    inner: Arc<dyn AgentTool>,
    hooks: HookDispatcher,
}

impl HookedTool {
    /// Wrap `inner`.
    pub fn new(inner: Arc<dyn AgentTool>, hooks: HookDispatcher) -> Self {
        Self { inner, hooks }
    }

    /// The wrapped tool.
    pub fn inner(&self) -> &Arc<dyn AgentTool> {
        &self.inner
    }
}

fn hook_failure(err: HookError) -> ToolError {
    ToolError::Hook(Box::new(err))
}

#[async_trait]
impl AgentTool for HookedTool {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn parameters(&self) -> Value {
        self.inner.parameters()
    }

    fn is_hooked(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        call_id: &str,
        arguments: Map<String, Value>,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let name = self.inner.name();
        let decision = self
            .hooks
            .before_tool_execute(call_id, name, &arguments)
            .await
            .map_err(hook_failure)?;

        if !decision.allow {
            let reason = decision
                .reason
                .unwrap_or_else(|| "no reason given".to_owned());
            warn!(tool_name = name, call_id, reason = %reason, "tool call denied by hook");
            return Ok(ToolOutput::error(format!("Tool call denied: {reason}")));
        }

        let arguments = decision.arguments.unwrap_or(arguments);
        let output = run_guarded(self.inner.as_ref(), call_id, arguments.clone(), ctx).await?;

        let replacement = self
            .hooks
            .after_tool_execute(call_id, name, &arguments, &output)
            .await
            .map_err(hook_failure)?;
        if replacement.is_some() {
            debug!(tool_name = name, call_id, "tool result replaced by hook");
        }
        Ok(replacement.unwrap_or(output))
    }
}

impl std::fmt::Debug for HookedTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookedTool")
            .field("name", &self.inner.name())
            .finish_non_exhaustive()
    }
}

/// Wrap every tool in `tools` that is not already hooked.
///
/// Wrapping an already wrapped set returns an equivalent set.
pub fn wrap_tools(tools: &ToolSet, hooks: &HookDispatcher) -> ToolSet {
    tools
        .iter()
        .map(|tool| {
            if tool.is_hooked() {
                Arc::clone(tool)
            } else {
                Arc::new(HookedTool::new(Arc::clone(tool), hooks.clone())) as Arc<dyn AgentTool>
            }
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
