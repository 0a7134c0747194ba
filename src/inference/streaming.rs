//! Response parsing for OpenAI-compatible chat completions.
//!
//! Streaming: reads a `reqwest::Response` as a byte stream, splits on SSE
//! boundaries (`data: …\n\n`), parses each chunk as JSON, and accumulates
//! tool call fragments across deltas. Non-streaming: decodes the single JSON
//! body into a `ModelResponse`.

use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use super::errors::InferenceError;
use super::types::{ChatCompletionChunk, ModelResponse, StreamChunk, ToolCall, Usage};

// ─── SSE line parser ─────────────────────────────────────────────────────────

/// Parse raw SSE bytes into `StreamChunk`s.
pub fn parse_sse_stream(
    response: reqwest::Response,
) -> impl Stream<Item = Result<StreamChunk, InferenceError>> {
    let byte_stream = response.bytes_stream().fuse();
    let state = StreamState::new();

    stream::unfold(
        (byte_stream, state, String::new()),
        |(mut byte_stream, mut state, mut buffer)| async move {
            loop {
                if let Some(event_end) = buffer.find("\n\n") {
                    let event = buffer[..event_end].to_string();
                    buffer = buffer[event_end + 2..].to_string();

                    match state.process_event(&event) {
                        Ok(Some(chunk)) => return Some((Ok(chunk), (byte_stream, state, buffer))),
                        Ok(None) => continue,
                        Err(e) => return Some((Err(e), (byte_stream, state, buffer))),
                    }
                }

                match byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        let text = String::from_utf8_lossy(&bytes);
                        buffer.push_str(&text.replace("\r\n", "\n"));
                    }
                    Some(Err(e)) => {
                        return Some((
                            Err(InferenceError::StreamError {
                                reason: format!("stream read error: {e}"),
                            }),
                            (byte_stream, state, buffer),
                        ));
                    }
                    None => {
                        if !buffer.trim().is_empty() {
                            let rest = std::mem::take(&mut buffer);
                            match state.process_event(rest.trim()) {
                                Ok(Some(chunk)) => {
                                    return Some((Ok(chunk), (byte_stream, state, buffer)))
                                }
                                Ok(None) => {}
                                Err(e) => return Some((Err(e), (byte_stream, state, buffer))),
                            }
                        }
                        // Provider closed without [DONE]; flush what we have.
                        return match state.finalize() {
                            Ok(Some(chunk)) => Some((Ok(chunk), (byte_stream, state, buffer))),
                            Ok(None) => None,
                            Err(e) => Some((Err(e), (byte_stream, state, buffer))),
                        };
                    }
                }
            }
        },
    )
}

// ─── Stream State ────────────────────────────────────────────────────────────

/// In-progress tool call: `(index, id, name, arguments_buffer)`.
type PendingToolCall = (u32, Option<String>, String, String);

/// Mutable state for accumulating tool call fragments across SSE events.
struct StreamState {
    pending_tool_calls: Vec<PendingToolCall>,
    done: bool,
}

impl StreamState {
    fn new() -> Self {
        Self {
            pending_tool_calls: Vec::new(),
            done: false,
        }
    }

    /// Process a single SSE event string (may contain multiple `data:` lines).
    fn process_event(&mut self, event: &str) -> Result<Option<StreamChunk>, InferenceError> {
        let mut data_content = String::new();

        for line in event.lines() {
            if let Some(data) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) {
                let data = data.trim();
                if data == "[DONE]" {
                    return self.finalize();
                }
                data_content.push_str(data);
            }
        }

        if data_content.is_empty() {
            return Ok(None);
        }

        let chunk: ChatCompletionChunk =
            serde_json::from_str(&data_content).map_err(|e| InferenceError::StreamError {
                reason: format!("failed to parse SSE chunk: {e} (data: {data_content})"),
            })?;

        self.process_chunk(chunk)
    }

    fn process_chunk(
        &mut self,
        chunk: ChatCompletionChunk,
    ) -> Result<Option<StreamChunk>, InferenceError> {
        let choice = match chunk.choices.first() {
            Some(c) => c,
            None => return Ok(None),
        };

        let mut result = StreamChunk {
            token: None,
            tool_calls: None,
            finish_reason: choice.finish_reason.clone(),
        };

        if let Some(ref content) = choice.delta.content {
            if !content.is_empty() {
                result.token = Some(content.clone());
            }
        }

        if let Some(ref tool_calls) = choice.delta.tool_calls {
            for tc in tool_calls {
                let index = tc.index.unwrap_or(0);
                let pending = self
                    .pending_tool_calls
                    .iter_mut()
                    .find(|(idx, _, _, _)| *idx == index);

                match pending {
                    Some((_, ref mut id, ref mut name, ref mut args)) => {
                        if let Some(ref f) = tc.function {
                            if let Some(ref n) = f.name {
                                name.push_str(n);
                            }
                            if let Some(ref a) = f.arguments {
                                args.push_str(a);
                            }
                        }
                        if tc.id.is_some() {
                            *id = tc.id.clone();
                        }
                    }
                    None => {
                        let name = tc
                            .function
                            .as_ref()
                            .and_then(|f| f.name.clone())
                            .unwrap_or_default();
                        let args = tc
                            .function
                            .as_ref()
                            .and_then(|f| f.arguments.clone())
                            .unwrap_or_default();
                        self.pending_tool_calls
                            .push((index, tc.id.clone(), name, args));
                    }
                }
            }
        }

        if result.finish_reason.as_deref() == Some("tool_calls") {
            result.tool_calls = Some(self.finalize_native_tool_calls()?);
        }

        if result.token.is_none() && result.tool_calls.is_none() && result.finish_reason.is_none() {
            return Ok(None);
        }
        Ok(Some(result))
    }

    fn finalize_native_tool_calls(&mut self) -> Result<Vec<ToolCall>, InferenceError> {
        let mut pending = std::mem::take(&mut self.pending_tool_calls);
        pending.sort_by_key(|(index, _, _, _)| *index);
        pending
            .into_iter()
            .map(|(_, id, name, args)| parse_native_json_tool_call(id.as_deref(), &name, &args))
            .collect()
    }

    /// Emit any tool calls still pending when the stream ends.
    fn finalize(&mut self) -> Result<Option<StreamChunk>, InferenceError> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        if !self.pending_tool_calls.is_empty() {
            let calls = self.finalize_native_tool_calls()?;
            return Ok(Some(StreamChunk {
                token: None,
                tool_calls: Some(calls),
                finish_reason: Some("tool_calls".into()),
            }));
        }

        Ok(None)
    }
}

// ─── Tool call decoding ──────────────────────────────────────────────────────

/// Build a `ToolCall` from a name and JSON-encoded arguments.
///
/// Empty arguments are treated as `{}`; some providers send nothing for
/// zero-argument calls.
pub fn parse_native_json_tool_call(
    id: Option<&str>,
    name: &str,
    arguments_json: &str,
) -> Result<ToolCall, InferenceError> {
    let call_id = id
        .filter(|id| !id.is_empty())
        .map(String::from)
        .unwrap_or_else(|| format!("call_{}", Uuid::new_v4()));

    if name.trim().is_empty() {
        return Err(InferenceError::ToolCallParseError {
            raw_response: arguments_json.to_string(),
            reason: "empty tool name".into(),
        });
    }

    let arguments = if arguments_json.trim().is_empty() {
        serde_json::json!({})
    } else {
        serde_json::from_str(arguments_json).map_err(|e| InferenceError::ToolCallParseError {
            raw_response: arguments_json.to_string(),
            reason: format!("invalid JSON arguments: {e}"),
        })?
    };

    Ok(ToolCall {
        id: call_id,
        name: name.trim().to_string(),
        arguments,
    })
}

// ─── Non-streaming ───────────────────────────────────────────────────────────

/// Parse a non-streaming response body.
pub fn parse_non_streaming_response(body: &str) -> Result<ModelResponse, InferenceError> {
    #[derive(Deserialize)]
    struct NonStreamResponse {
        choices: Vec<NonStreamChoice>,
        #[serde(default)]
        usage: Option<Usage>,
    }

    #[derive(Deserialize)]
    struct NonStreamChoice {
        message: NonStreamMessage,
        finish_reason: Option<String>,
    }

    #[derive(Deserialize)]
    struct NonStreamMessage {
        content: Option<String>,
        tool_calls: Option<Vec<NonStreamToolCall>>,
    }

    #[derive(Deserialize)]
    struct NonStreamToolCall {
        id: Option<String>,
        function: NonStreamFunction,
    }

    #[derive(Deserialize)]
    struct NonStreamFunction {
        name: String,
        #[serde(default)]
        arguments: String,
    }

    let resp: NonStreamResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::StreamError {
            reason: format!("failed to parse non-streaming response: {e}"),
        })?;

    let choice = resp.choices.first().ok_or(InferenceError::StreamError {
        reason: "empty choices array".into(),
    })?;

    let content = choice.message.content.clone().filter(|c| !c.is_empty());

    let tool_calls = choice
        .message
        .tool_calls
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|tc| {
            parse_native_json_tool_call(tc.id.as_deref(), &tc.function.name, &tc.function.arguments)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let finish_reason = if !tool_calls.is_empty() {
        Some("tool_calls".into())
    } else {
        choice.finish_reason.clone()
    };

    Ok(ModelResponse {
        content,
        tool_calls,
        finish_reason,
        usage: resp.usage,
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
