//! The `ChatModel` seam between the conversation loop and a model provider.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::errors::InferenceError;
use super::types::{ChatMessage, ModelResponse, SamplingOverrides, ToolDefinition};

/// Receives incremental text tokens while a response is being generated.
pub type TokenSink = mpsc::UnboundedSender<String>;

/// A language model that can answer a conversation, optionally with tool calls.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Identifier of the underlying model (for logs and telemetry).
    fn model_name(&self) -> &str;

    /// Produce one complete response.
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        tools: Option<Vec<ToolDefinition>>,
        sampling: SamplingOverrides,
    ) -> Result<ModelResponse, InferenceError>;

    /// Produce one complete response, forwarding text tokens to `tokens` as
    /// they arrive. Providers without streaming send the whole text at once.
    async fn complete_streaming(
        &self,
        messages: Vec<ChatMessage>,
        tools: Option<Vec<ToolDefinition>>,
        sampling: SamplingOverrides,
        tokens: &TokenSink,
    ) -> Result<ModelResponse, InferenceError> {
        let response = self.complete(messages, tools, sampling).await?;
        if let Some(text) = response.content.as_ref().filter(|t| !t.is_empty()) {
            let _ = tokens.send(text.clone());
        }
        Ok(response)
    }
}
