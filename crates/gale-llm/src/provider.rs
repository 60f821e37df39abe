//! # Model transport
//!
//! Core abstraction for model backends. A transport performs exactly one
//! streaming call per [`ModelTransport::stream`] and returns a boxed stream of
//! [`ProviderEvent`]s; it knows nothing about turns, tools, or hooks.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use gale_core::ContentBlock;
use gale_tools::ToolDefinition;
use tokio_util::sync::CancellationToken;

use crate::events::ProviderEvent;

/// Result type alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Boxed stream of [`ProviderEvent`]s returned by [`ModelTransport::stream`].
pub type ProviderEventStream =
    Pin<Box<dyn Stream<Item = Result<ProviderEvent, ProviderError>> + Send>>;

/// Errors that can occur during provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SSE stream parsing failed.
    #[error("SSE parse error: {message}")]
    SseParse {
        /// Error description.
        message: String,
    },

    /// Authentication failed (missing or invalid key).
    #[error("Auth error: {message}")]
    Auth {
        /// Error description.
        message: String,
    },

    /// Rate limited by the provider.
    #[error("Rate limited: retry after {retry_after_ms}ms")]
    RateLimited {
        /// Suggested retry delay in milliseconds.
        retry_after_ms: u64,
        /// Error description.
        message: String,
    },

    /// Provider returned an API error.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description.
        message: String,
        /// Provider-specific error code.
        code: Option<String>,
        /// Whether this error can be retried.
        retryable: bool,
    },

    /// The provider reported an error inside an open stream.
    #[error("Stream error: {message}")]
    Stream {
        /// Provider-specific error code.
        code: Option<String>,
        /// Error description.
        message: String,
    },

    /// Stream was cancelled.
    #[error("Stream cancelled")]
    Cancelled,

    /// Provider-specific error.
    #[error("{message}")]
    Other {
        /// Error description.
        message: String,
    },
}

impl ProviderError {
    /// Whether this error is retryable.
    ///
    /// The engine itself never retries; this is for callers.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| {
                        s == reqwest::StatusCode::TOO_MANY_REQUESTS || s.is_server_error()
                    })
            }
            Self::RateLimited { .. } => true,
            Self::Api { retryable, .. } => *retryable,
            Self::SseParse { .. }
            | Self::Auth { .. }
            | Self::Stream { .. }
            | Self::Cancelled
            | Self::Json(_)
            | Self::Other { .. } => false,
        }
    }

    /// Extract retry-after delay in milliseconds, if available.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_ms, .. } => Some(*retry_after_ms),
            _ => None,
        }
    }

    /// Error category string for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Http(_) => "network",
            Self::Json(_) | Self::SseParse { .. } => "parse",
            Self::Auth { .. } => "auth",
            Self::RateLimited { .. } => "rate_limit",
            Self::Api { .. } | Self::Stream { .. } => "api",
            Self::Cancelled => "cancelled",
            Self::Other { .. } => "unknown",
        }
    }
}

/// Everything one model call needs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelRequest {
    /// Model ID.
    pub model: String,
    /// Input content (the latest user turn's blocks).
    pub input: Vec<ContentBlock>,
    /// Tool schemas offered to the model.
    pub tools: Vec<ToolDefinition>,
    /// System instruction.
    pub system_instruction: Option<String>,
    /// Continuation ID of the previous call, if any.
    pub interaction_id: Option<String>,
}

/// Core model transport trait.
///
/// Implementors must be `Send + Sync` for use across async tasks. Timeouts,
/// if any, are the transport's business.
#[async_trait]
pub trait ModelTransport: Send + Sync {
    /// Short backend name for logging (e.g., `"google"`).
    fn name(&self) -> &str;

    /// Issue one streaming call.
    async fn stream(
        &self,
        request: &ModelRequest,
        cancel: &CancellationToken,
    ) -> ProviderResult<ProviderEventStream>;
}
