//! Runtime error types.

use gale_hooks::HookError;
use gale_llm::ProviderError;
use gale_tools::ToolError;

/// Errors that end a run or a session stream.
///
/// Tool failures never appear here: they become error-flagged results.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Model transport or provider stream error.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// A caller-supplied hook handler failed.
    #[error("Hook error: {0}")]
    Hook(#[from] HookError),

    /// Another `stream()` is already active on this session.
    #[error("Session busy: a stream is already active")]
    SessionBusy,

    /// Operation was cancelled via abort.
    #[error("Operation cancelled")]
    Cancelled,

    /// Internal / unexpected error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RuntimeError {
    /// Whether the caller can reasonably retry.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Provider(e) => e.is_retryable(),
            Self::Cancelled | Self::SessionBusy => true,
            Self::Hook(_) | Self::Internal(_) => false,
        }
    }

    /// Error category string for logging.
    pub fn category(&self) -> &str {
        match self {
            Self::Provider(_) => "provider",
            Self::Hook(_) => "hook",
            Self::SessionBusy => "session_busy",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }
}

/// Recover the hook failure carried by [`ToolError::Hook`].
pub(crate) fn from_tool_hook_failure(err: ToolError) -> RuntimeError {
    match err {
        ToolError::Hook(source) => match source.downcast::<HookError>() {
            Ok(hook) => RuntimeError::Hook(*hook),
            Err(other) => RuntimeError::Internal(other.to_string()),
        },
        other => RuntimeError::Internal(other.to_string()),
    }
}
