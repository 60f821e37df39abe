//! The tool capability trait and its execution context.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::errors::ToolError;

// ─────────────────────────────────────────────────────────────────────────────
// Tool context
// ─────────────────────────────────────────────────────────────────────────────

/// Progress sink a running tool may call zero or more times.
pub type ProgressFn = Arc<dyn Fn(String) + Send + Sync>;

/// Execution context passed to every tool invocation.
#[derive(Clone, Default)]
pub struct ToolContext {
    /// Cancellation token for cooperative cancellation.
    pub cancellation: CancellationToken,
    /// Optional progress sink, surfaced to callers as `tool.delta`.
    pub progress: Option<ProgressFn>,
}

impl ToolContext {
    /// Context with the given cancellation token and no progress sink.
    pub fn new(cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            progress: None,
        }
    }

    /// Attach a progress sink.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Report progress. Best-effort: a no-op without a sink.
    pub fn report(&self, delta: impl Into<String>) {
        if let Some(progress) = &self.progress {
            progress(delta.into());
        }
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolContext")
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool output / definition
// ─────────────────────────────────────────────────────────────────────────────

/// What a tool hands back: result text plus an error flag.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutput {
    /// Result text, opaque to the engine.
    pub result: String,
    /// Whether the result describes a failure.
    #[serde(default)]
    pub is_error: bool,
}

impl ToolOutput {
    /// A successful result.
    pub fn text(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
            is_error: false,
        }
    }

    /// An error-flagged result.
    pub fn error(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
            is_error: true,
        }
    }
}

/// Schema sent to the model for one tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema of the arguments object.
    pub parameters: Value,
}

// ─────────────────────────────────────────────────────────────────────────────
// AgentTool trait
// ─────────────────────────────────────────────────────────────────────────────

/// The capability every tool implements.
#[async_trait]
pub trait AgentTool: Send + Sync {
    /// Tool name, the exact string sent to and from the model.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema of the arguments object.
    fn parameters(&self) -> Value;

    /// Whether this tool already routes through the tool hook points.
    fn is_hooked(&self) -> bool {
        false
    }

    /// Schema for the model.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_owned(),
            description: self.description().to_owned(),
            parameters: self.parameters(),
        }
    }

    /// Run the tool.
    async fn execute(
        &self,
        call_id: &str,
        arguments: Map<String, Value>,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError>;
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    struct Upper;

    #[async_trait]
    impl AgentTool for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn description(&self) -> &str {
            "Uppercase the input"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}})
        }

        async fn execute(
            &self,
            _call_id: &str,
            arguments: Map<String, Value>,
            ctx: &ToolContext,
        ) -> Result<ToolOutput, ToolError> {
            ctx.report("working");
            let text = arguments
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::invalid_arguments("missing 'text'"))?;
            Ok(ToolOutput::text(text.to_uppercase()))
        }
    }

    #[test]
    fn definition_mirrors_metadata() {
        let def = Upper.definition();
        assert_eq!(def.name, "upper");
        assert_eq!(def.description, "Uppercase the input");
        assert_eq!(def.parameters["type"], "object");
        assert!(!Upper.is_hooked());
    }

    #[tokio::test]
    async fn execute_reports_progress() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let ctx = ToolContext::default().with_progress(Arc::new(move |d| {
            sink.lock().unwrap().push(d);
        }));

        let mut args = Map::new();
        let _ = args.insert("text".into(), json!("hi"));
        let out = Upper.execute("c1", args, &ctx).await.unwrap();

        assert_eq!(out, ToolOutput::text("HI"));
        assert_eq!(*seen.lock().unwrap(), vec!["working".to_string()]);
    }

    #[tokio::test]
    async fn execute_without_sink_is_fine() {
        let err = Upper
            .execute("c1", Map::new(), &ToolContext::default())
            .await
            .unwrap_err();
        assert_eq!(err.category(), "invalid_arguments");
    }

    #[test]
    fn output_serializes_camel_case() {
        let value = serde_json::to_value(ToolOutput::error("nope")).unwrap();
        assert_eq!(value, json!({"result": "nope", "isError": true}));
    }
}
