//! Gemini Interactions API transport.
//!
//! Sends one streaming request per model call and turns the SSE body into
//! [`ProviderEvent`](gale_llm::ProviderEvent)s. HTTP failures are mapped to
//! [`ProviderError`] before any event is yielded.

use async_trait::async_trait;
use futures::StreamExt;
use gale_llm::sse::{SseParserOptions, parse_sse_lines};
use gale_llm::{ModelRequest, ModelTransport, ProviderError, ProviderEventStream, ProviderResult};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument};

use crate::message_converter::build_request;
use crate::stream_handler::process_data;
use crate::types::GeminiConfig;

/// Streaming transport for the Gemini Interactions API.
#[derive(Clone, Debug)]
pub struct GeminiTransport {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiTransport {
    /// Transport with a fresh HTTP client.
    pub fn new(config: GeminiConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Transport reusing an existing HTTP client.
    pub fn with_client(config: GeminiConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// Active configuration.
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn build_headers(&self) -> ProviderResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let _ = headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        let key = HeaderValue::from_str(&self.config.api_key).map_err(|e| ProviderError::Auth {
            message: format!("invalid API key header: {e}"),
        })?;
        let _ = headers.insert("x-goog-api-key", key);
        Ok(headers)
    }
}

#[async_trait]
impl ModelTransport for GeminiTransport {
    fn name(&self) -> &str {
        "google"
    }

    #[instrument(skip_all, fields(provider = "google", model = %request.model))]
    async fn stream(
        &self,
        request: &ModelRequest,
        cancel: &CancellationToken,
    ) -> ProviderResult<ProviderEventStream> {
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        let body = build_request(request);
        let headers = self.build_headers()?;
        debug!(
            input_items = body.input.len(),
            tools = body.tools.len(),
            continuation = body.previous_interaction_id.is_some(),
            "Sending Gemini interaction request"
        );

        let response = self
            .client
            .post(self.config.interactions_url())
            .headers(headers)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after_header);
            let body_text = response.text().await.unwrap_or_default();
            let info = parse_api_error(&body_text, status.as_u16());
            error!(
                status = status.as_u16(),
                code = info.code.as_deref().unwrap_or("unknown"),
                retryable = info.retryable,
                "Gemini API error"
            );
            return Err(match status.as_u16() {
                401 | 403 => ProviderError::Auth {
                    message: info.message,
                },
                429 => ProviderError::RateLimited {
                    retry_after_ms: retry_after.unwrap_or(0),
                    message: info.message,
                },
                code => ProviderError::Api {
                    status: code,
                    message: info.message,
                    code: info.code,
                    retryable: info.retryable,
                },
            });
        }

        let events = parse_sse_lines(response.bytes_stream(), &SseParserOptions::default())
            .filter_map(|line| async move {
                match line {
                    Ok(data) => process_data(&data).map(Ok),
                    Err(e) => Some(Err(e)),
                }
            })
            .take_until(cancel.clone().cancelled_owned());
        Ok(Box::pin(events))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Error parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Parsed API error information.
#[derive(Debug)]
struct ApiErrorInfo {
    message: String,
    code: Option<String>,
    retryable: bool,
}

/// Parse an error body: `{"error": {"message", "status"}}`, `{"message", "code"}`,
/// or anything else verbatim.
fn parse_api_error(body: &str, status: u16) -> ApiErrorInfo {
    let retryable = status == 429 || status >= 500;

    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(msg) = json["error"]["message"].as_str() {
            let code = json["error"]["status"]
                .as_str()
                .map(String::from)
                .or_else(|| json["error"]["code"].as_u64().map(|c| c.to_string()));
            return ApiErrorInfo {
                message: msg.to_string(),
                code,
                retryable,
            };
        }
        if let Some(msg) = json["message"].as_str() {
            return ApiErrorInfo {
                message: msg.to_string(),
                code: json["code"].as_str().map(String::from),
                retryable,
            };
        }
    }

    ApiErrorInfo {
        message: format!("HTTP {status}: {body}"),
        code: None,
        retryable,
    }
}

/// `Retry-After` in seconds → milliseconds.
fn parse_retry_after_header(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().map(|s| s.saturating_mul(1000))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
