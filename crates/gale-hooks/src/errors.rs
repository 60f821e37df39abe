//! Hook error types.

use thiserror::Error;

/// Errors raised by hook handlers.
#[derive(Debug, Error)]
pub enum HookError {
    /// Hook handler returned an error.
    #[error("Hook handler error in '{name}': {message}")]
    HandlerError {
        /// Hook name.
        name: String,
        /// Error message from handler.
        message: String,
    },

    /// Generic internal error.
    #[error("{0}")]
    Internal(String),
}

impl HookError {
    /// Shorthand for [`HookError::HandlerError`].
    pub fn handler(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HandlerError {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Short category string for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::HandlerError { .. } => "handler",
            Self::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_error_display() {
        let err = HookError::handler("audit", "boom");
        assert_eq!(err.to_string(), "Hook handler error in 'audit': boom");
        assert_eq!(err.category(), "handler");
    }

    #[test]
    fn internal_display() {
        let err = HookError::Internal("bad state".into());
        assert_eq!(err.to_string(), "bad state");
        assert_eq!(err.category(), "internal");
    }
}
