//! Inference Client — OpenAI-compatible API client for the language model.
//!
//! This module handles all communication with the model provider:
//! - Streaming and non-streaming chat completions
//! - SSE stream parsing and tool-call accumulation
//! - Mapping provider failures (auth, rate limit, timeout) to `InferenceError`
//!
//! The conversation loop only sees the `ChatModel` trait, so tests can swap
//! in a scripted model.

pub mod client;
pub mod errors;
pub mod provider;
pub mod streaming;
pub mod types;

// Re-exports for convenience
pub use client::InferenceClient;
pub use errors::InferenceError;
pub use provider::{ChatModel, TokenSink};
pub use types::{
    ChatMessage, ModelResponse, Role, SamplingOverrides, StreamChunk, ToolCall, ToolDefinition,
    Usage,
};
