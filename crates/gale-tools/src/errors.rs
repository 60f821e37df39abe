//! Tool error types.

use thiserror::Error;

/// Errors a tool invocation can return.
///
/// The executor renders every variant except [`ToolError::Hook`] as an
/// error-flagged result for the model. `Hook` carries a failure raised by a
/// caller-supplied hook handler and is propagated out of the run instead.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Arguments did not match what the tool expects.
    #[error("invalid arguments: {message}")]
    InvalidArguments {
        /// Description of the mismatch.
        message: String,
    },

    /// The tool ran and failed.
    #[error("{message}")]
    Execution {
        /// Description of the failure.
        message: String,
    },

    /// The tool observed cancellation and stopped early.
    #[error("cancelled")]
    Cancelled,

    /// A hook handler wrapped around the tool failed.
    #[error("hook failed: {0}")]
    Hook(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ToolError {
    /// Shorthand for [`ToolError::Execution`].
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    /// Shorthand for [`ToolError::InvalidArguments`].
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            message: message.into(),
        }
    }

    /// Whether this error must escape the run rather than become a tool result.
    pub fn is_hook_failure(&self) -> bool {
        matches!(self, Self::Hook(_))
    }

    /// Short category string for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidArguments { .. } => "invalid_arguments",
            Self::Execution { .. } => "execution",
            Self::Cancelled => "cancelled",
            Self::Hook(_) => "hook",
        }
    }
}
