//! Route handlers for the OpenAI-compatible API.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header::HeaderName;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

use crate::agent_core::tokens::estimate_usage;
use crate::agent_core::{TurnEvent, TurnRequest};
use crate::inference::types::Role;
use crate::inference::{ChatMessage, SamplingOverrides};

use super::errors::ApiError;
use super::types::{
    ChatCompletionChoice, ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse,
    HealthResponse, ModelObject, ModelsResponse, ResponseMessage, MODEL_IDS,
};
use super::AppState;

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "housing-agent".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn list_models() -> Json<ModelsResponse> {
    Json(ModelsResponse {
        object: "list".to_string(),
        data: MODEL_IDS.iter().map(|id| ModelObject::new(id)).collect(),
    })
}

pub async fn get_model(Path(model_id): Path<String>) -> Result<Json<ModelObject>, ApiError> {
    ensure_model(&model_id)?;
    Ok(Json(ModelObject::new(&model_id)))
}

pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    validate_request(&request)?;
    ensure_model(&request.model)?;

    let prompt = convert_messages(&request)?;
    let thread_id = match request.thread_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => format!("thread-{}", Uuid::new_v4()),
    };

    tracing::info!(
        thread_id = %thread_id,
        model = %request.model,
        stream = request.stream,
        user = request.user.as_deref().unwrap_or(""),
        messages = request.messages.len(),
        "chat completion requested"
    );

    let turn = TurnRequest {
        thread_id: thread_id.clone(),
        // Seeds a new thread; a thread with history only gets the last
        // user message, decided under the thread lock.
        new_messages: prompt.clone(),
        seed_if_new: true,
        sampling: SamplingOverrides {
            temperature: request.temperature,
            top_p: request.top_p,
            max_tokens: request.max_tokens,
        },
    };

    if request.stream {
        return Ok(stream_completion(state, turn, request.model));
    }

    let result = state.runtime.run_turn_with(turn, None).await?;
    let usage = result
        .usage
        .unwrap_or_else(|| estimate_usage(&prompt, &result.answer));

    Ok(Json(ChatCompletionResponse {
        id: completion_id(),
        object: "chat.completion".to_string(),
        created: chrono::Utc::now().timestamp(),
        model: request.model,
        choices: vec![ChatCompletionChoice {
            index: 0,
            message: ResponseMessage::assistant(result.answer),
            finish_reason: "stop".to_string(),
            logprobs: None,
        }],
        usage,
        thread_id,
        system_fingerprint: None,
    })
    .into_response())
}

/// Run the turn on a spawned task and relay its text tokens as
/// `chat.completion.chunk` events.
fn stream_completion(state: Arc<AppState>, turn: TurnRequest, model: String) -> Response {
    let (sse_tx, sse_rx) = mpsc::unbounded_channel::<Result<Event, Infallible>>();
    let id = completion_id();

    tokio::spawn(async move {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<TurnEvent>();
        let thread_id = turn.thread_id.clone();

        let run = state.runtime.run_turn_with(turn, Some(event_tx));
        let relay = async {
            while let Some(event) = event_rx.recv().await {
                if let TurnEvent::Token(text) = event {
                    let chunk = ChatCompletionChunk::new(&id, &model, text, None);
                    let _ = sse_tx.send(Ok(json_event(&chunk)));
                }
            }
        };
        let (result, ()) = tokio::join!(run, relay);

        match result {
            Ok(_) => {
                let done = ChatCompletionChunk::new(&id, &model, "", Some("stop"));
                let _ = sse_tx.send(Ok(json_event(&done)));
                let _ = sse_tx.send(Ok(Event::default().data("[DONE]")));
            }
            Err(e) => {
                tracing::error!(thread_id = %thread_id, error = %e, "streamed turn failed");
                let body = ApiError::from(e).body();
                let _ = sse_tx.send(Ok(json_event(&body)));
            }
        }
    });

    let sse = Sse::new(UnboundedReceiverStream::new(sse_rx)).keep_alive(KeepAlive::default());
    (
        [(HeaderName::from_static("x-accel-buffering"), "no")],
        sse,
    )
        .into_response()
}

fn json_event<T: serde::Serialize>(value: &T) -> Event {
    Event::default().data(serde_json::to_string(value).unwrap_or_default())
}

fn completion_id() -> String {
    format!("chatcmpl-{}", Uuid::new_v4())
}

fn ensure_model(model_id: &str) -> Result<(), ApiError> {
    if MODEL_IDS.contains(&model_id) {
        Ok(())
    } else {
        Err(ApiError::ModelNotFound(model_id.to_string()))
    }
}

fn validate_request(request: &ChatCompletionRequest) -> Result<(), ApiError> {
    if let Some(t) = request.temperature {
        if !(0.0..=2.0).contains(&t) {
            return Err(ApiError::BadRequest(format!(
                "temperature must be between 0 and 2, got {t}"
            )));
        }
    }
    if let Some(p) = request.top_p {
        if !(0.0..=1.0).contains(&p) {
            return Err(ApiError::BadRequest(format!(
                "top_p must be between 0 and 1, got {p}"
            )));
        }
    }
    if request.max_tokens == Some(0) {
        return Err(ApiError::BadRequest("max_tokens must be at least 1".into()));
    }
    if request.messages.is_empty() {
        return Err(ApiError::BadRequest("messages must not be empty".into()));
    }
    Ok(())
}

/// Map request messages onto chat messages. Only system, user and
/// assistant roles are accepted and the last message must come from the user.
fn convert_messages(request: &ChatCompletionRequest) -> Result<Vec<ChatMessage>, ApiError> {
    let mut out = Vec::with_capacity(request.messages.len());
    for (i, message) in request.messages.iter().enumerate() {
        let converted = match Role::parse(&message.role) {
            Some(Role::System) => ChatMessage::system(message.content.clone()),
            Some(Role::User) => ChatMessage::user(message.content.clone()),
            Some(Role::Assistant) => ChatMessage::assistant(message.content.clone()),
            _ => {
                return Err(ApiError::BadRequest(format!(
                    "messages[{i}]: unsupported role '{}'",
                    message.role
                )))
            }
        };
        out.push(converted);
    }
    match out.last() {
        Some(last) if last.role == Role::User && !last.text_content().trim().is_empty() => Ok(out),
        _ => Err(ApiError::BadRequest(
            "the last message must be a non-empty user message".into(),
        )),
    }
}
