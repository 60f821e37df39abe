//! Tool executor: resolves and runs one batch of model-requested calls.
//!
//! Calls run strictly one after another, so `tool.start` / `tool.end` pairs
//! never interleave. The returned batch has exactly one result per call, in
//! call order, whatever the individual calls did.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use gale_core::content::{FunctionCall, FunctionResult};
use gale_core::AgentEvent;
use gale_tools::{AgentTool, ProgressFn, ToolContext, ToolError, ToolOutput, ToolSet};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::agent::AgentChannel;
use crate::errors::{RuntimeError, from_tool_hook_failure};

/// Execute `calls` in order against `tools`, emitting tool events on `channel`.
///
/// Tool failures, unknown names and panics become error-flagged results.
/// Only a hook handler failure (carried as [`ToolError::Hook`]) escapes.
#[instrument(skip_all, fields(calls = calls.len()))]
pub async fn execute_calls(
    calls: &[FunctionCall],
    tools: &ToolSet,
    channel: &AgentChannel,
    cancel: &CancellationToken,
) -> Result<Vec<FunctionResult>, RuntimeError> {
    let mut results = Vec::with_capacity(calls.len());
    for call in calls {
        channel.push(AgentEvent::ToolStart {
            call_id: call.id.clone(),
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        });

        let output = match tools.get(&call.name) {
            Some(tool) => {
                let ctx = ToolContext::new(cancel.clone())
                    .with_progress(progress_sink(channel, call));
                run_guarded(tool.as_ref(), &call.id, call.arguments.clone(), &ctx)
                    .await
                    .map_err(from_tool_hook_failure)?
            }
            None => {
                warn!(tool_name = %call.name, call_id = %call.id, "tool not found");
                ToolOutput::error(format!("Tool not found: {}", call.name))
            }
        };
        debug!(
            tool_name = %call.name,
            call_id = %call.id,
            is_error = output.is_error,
            "tool call finished"
        );

        channel.push(AgentEvent::ToolEnd {
            call_id: call.id.clone(),
            name: call.name.clone(),
            result: output.result.clone(),
            is_error: output.is_error,
        });
        results.push(FunctionResult {
            call_id: call.id.clone(),
            name: call.name.clone(),
            result: output.result,
            is_error: output.is_error,
        });
    }
    Ok(results)
}

fn progress_sink(channel: &AgentChannel, call: &FunctionCall) -> ProgressFn {
    let channel = channel.clone();
    let call_id = call.id.clone();
    let name = call.name.clone();
    Arc::new(move |delta| {
        channel.push(AgentEvent::ToolDelta {
            call_id: call_id.clone(),
            name: name.clone(),
            delta,
        });
    })
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

/// Run a tool with failures and panics converted to error results.
///
/// Hook failures stay `Err` so callers can propagate them.
pub(crate) async fn run_guarded(
    tool: &dyn AgentTool,
    call_id: &str,
    arguments: Map<String, Value>,
    ctx: &ToolContext,
) -> Result<ToolOutput, ToolError> {
    let outcome = AssertUnwindSafe(tool.execute(call_id, arguments, ctx))
        .catch_unwind()
        .await;
    match outcome {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(err)) if err.is_hook_failure() => Err(err),
        Ok(Err(err)) => {
            warn!(tool_name = tool.name(), call_id, category = err.category(), error = %err, "tool failed");
            Ok(ToolOutput::error(err.to_string()))
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(tool_name = tool.name(), call_id, panic = %message, "tool panicked");
            Ok(ToolOutput::error(format!("Tool panicked: {message}")))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
