//! OpenAI-compatible inference client.
//!
//! Sends chat completion requests to the configured provider and returns
//! complete responses, optionally streaming text tokens as they arrive.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Client as HttpClient;

use crate::config::{LlmConfig, Secret};

use super::errors::InferenceError;
use super::provider::{ChatModel, TokenSink};
use super::streaming::{parse_non_streaming_response, parse_sse_stream};
use super::types::{
    ChatCompletionRequest, ChatMessage, ModelResponse, SamplingOverrides, ToolCall, ToolDefinition,
};

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Streaming responses may take several times longer than a plain request
/// before the last token arrives.
const STREAM_TIMEOUT_FACTOR: u64 = 3;

// ─── InferenceClient ─────────────────────────────────────────────────────────

/// Client for an OpenAI-compatible chat completions endpoint.
pub struct InferenceClient {
    /// HTTP client for non-streaming requests.
    http: HttpClient,
    /// HTTP client for streaming requests (longer timeout).
    http_stream: HttpClient,
    api_base: String,
    api_key: Secret,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout_secs: u64,
}

impl InferenceClient {
    /// Create a client from the LLM section of the run configuration.
    ///
    /// Does NOT check connectivity; that happens on the first request.
    pub fn new(config: &LlmConfig) -> Result<Self, InferenceError> {
        let api_base = config.api_base.trim_end_matches('/').to_string();
        let timeout_secs = config.request_timeout_secs.max(1);

        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: api_base.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let http_stream = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(timeout_secs * STREAM_TIMEOUT_FACTOR))
            .build()
            .map_err(|e| InferenceError::ConnectionFailed {
                endpoint: api_base.clone(),
                reason: format!("failed to build streaming HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            http_stream,
            api_base,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs,
        })
    }

    fn build_request(
        &self,
        messages: Vec<ChatMessage>,
        tools: Option<Vec<ToolDefinition>>,
        sampling: SamplingOverrides,
        stream: bool,
    ) -> ChatCompletionRequest {
        let tools = tools.filter(|t| !t.is_empty());
        ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            tool_choice: tools.as_ref().map(|_| "auto".to_string()),
            tools,
            temperature: sampling.temperature.unwrap_or(self.temperature),
            top_p: sampling.top_p,
            max_tokens: sampling.max_tokens.unwrap_or(self.max_tokens),
            stream,
        }
    }

    /// POST the request and turn transport failures and non-2xx statuses into
    /// `InferenceError`s.
    async fn send(
        &self,
        http: &HttpClient,
        body: &ChatCompletionRequest,
    ) -> Result<reqwest::Response, InferenceError> {
        let url = format!("{}/chat/completions", self.api_base);

        tracing::info!(
            url = %url,
            model = %body.model,
            message_count = body.messages.len(),
            tool_count = body.tools.as_ref().map(|t| t.len()).unwrap_or(0),
            max_tokens = body.max_tokens,
            stream = body.stream,
            "=== LLM REQUEST ==="
        );

        let mut request = http.post(&url).json(body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(self.api_key.expose());
        }
        if body.stream {
            request = request.header("Accept", "text/event-stream");
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Timeout {
                    duration_secs: self.timeout_secs,
                }
            } else {
                InferenceError::ConnectionFailed {
                    endpoint: url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_secs(response.headers());
            let body_text = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body_text, "provider returned error");
            return Err(InferenceError::from_status(
                status.as_u16(),
                retry_after,
                body_text,
            ));
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatModel for InferenceClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        tools: Option<Vec<ToolDefinition>>,
        sampling: SamplingOverrides,
    ) -> Result<ModelResponse, InferenceError> {
        let body = self.build_request(messages, tools, sampling, false);
        let response = self.send(&self.http, &body).await?;

        let body_text = response.text().await.map_err(|e| InferenceError::StreamError {
            reason: format!("failed to read response body: {e}"),
        })?;

        parse_non_streaming_response(&body_text)
    }

    async fn complete_streaming(
        &self,
        messages: Vec<ChatMessage>,
        tools: Option<Vec<ToolDefinition>>,
        sampling: SamplingOverrides,
        tokens: &TokenSink,
    ) -> Result<ModelResponse, InferenceError> {
        let body = self.build_request(messages, tools, sampling, true);
        let response = self.send(&self.http_stream, &body).await?;

        let stream = parse_sse_stream(response);
        futures::pin_mut!(stream);

        let mut content = String::new();
        let mut tool_calls: Vec<ToolCall> = Vec::new();
        let mut finish_reason = None;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if let Some(token) = chunk.token {
                let _ = tokens.send(token.clone());
                content.push_str(&token);
            }
            for call in chunk.tool_calls.unwrap_or_default() {
                if !tool_calls.iter().any(|existing| existing.id == call.id) {
                    tool_calls.push(call);
                }
            }
            if chunk.finish_reason.is_some() {
                finish_reason = chunk.finish_reason;
            }
        }

        if !tool_calls.is_empty() {
            finish_reason = Some("tool_calls".into());
        }

        Ok(ModelResponse {
            content: Some(content).filter(|c| !c.is_empty()),
            tool_calls,
            finish_reason,
            usage: None,
        })
    }
}

fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
