//! OpenAI-compatible HTTP API over the agent runtime.
//!
//! Routes:
//! - `GET /health`, `GET /v1/health` (never behind auth)
//! - `GET /v1/models`, `GET /v1/models/{model_id}`
//! - `POST /v1/chat/completions` (JSON or SSE when `stream` is set)

pub mod auth;
pub mod errors;
pub mod handlers;
pub mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::routing::{get, post};
use axum::{middleware, Router};

use crate::agent_core::AgentRuntime;

use auth::{auth_middleware, AuthState};

pub use errors::ApiError;

/// Shared state handed to every handler.
pub struct AppState {
    pub runtime: Arc<AgentRuntime>,
}

pub fn router(runtime: Arc<AgentRuntime>) -> Router {
    let token = runtime
        .config()
        .server
        .api_token
        .as_ref()
        .filter(|t| !t.is_empty())
        .map(|t| Arc::<str>::from(t.expose()));
    let auth_state = AuthState { token };

    let public = Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/health", get(handlers::health));

    let protected = Router::new()
        .route("/v1/models", get(handlers::list_models))
        .route("/v1/models/{model_id}", get(handlers::get_model))
        .route("/v1/chat/completions", post(handlers::chat_completions))
        .route_layer(middleware::from_fn_with_state(auth_state, auth_middleware));

    Router::new()
        .merge(public)
        .merge(protected)
        .with_state(Arc::new(AppState { runtime }))
}

/// Bind and serve until ctrl-c.
pub async fn serve(runtime: Arc<AgentRuntime>, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    let bound = listener.local_addr().context("failed to read local addr")?;

    let auth = runtime.config().server.api_token.is_some();
    let app = router(runtime);

    tracing::info!(addr = %bound, auth, "housing agent API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down API server");
        })
        .await
        .context("API server error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::agent_core::agent_loop::tests::{tool_call, ScriptedModel};
    use crate::agent_core::ThreadStore;
    use crate::config::{AgentConfig, KnowledgeConfig, Secret};
    use crate::inference::{InferenceError, ModelResponse};
    use crate::tools::ToolRegistry;

    fn runtime(model: Arc<ScriptedModel>, token: Option<&str>) -> Arc<AgentRuntime> {
        let mut config = AgentConfig::default();
        config.telemetry.langsmith_api_key = Secret::new("");
        config.server.api_token = token.map(Secret::new);
        let registry = ToolRegistry::with_housing_tools(&KnowledgeConfig {
            host: String::new(),
            ..Default::default()
        })
        .unwrap();
        Arc::new(AgentRuntime::new(
            Arc::new(config),
            model,
            registry,
            ThreadStore::open_in_memory().unwrap(),
        ))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_on_both_paths() {
        let app = router(runtime(Arc::new(ScriptedModel::new(vec![])), None));
        for path in ["/health", "/v1/health"] {
            let response = app.clone().oneshot(get(path)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_json(response).await["status"], "ok");
        }
    }

    #[tokio::test]
    async fn test_list_and_get_models() {
        let app = router(runtime(Arc::new(ScriptedModel::new(vec![])), None));

        let response = app.clone().oneshot(get("/v1/models")).await.unwrap();
        let body = body_json(response).await;
        assert_eq!(body["object"], "list");
        assert_eq!(body["data"][0]["id"], "uk_housing");
        assert_eq!(body["data"][0]["owned_by"], "housing-agent");

        let response = app.clone().oneshot(get("/v1/models/uk_housing")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get("/v1/models/gpt-4")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"]["message"], "Graph/Model 'gpt-4' not found");
    }

    #[tokio::test]
    async fn test_chat_completion_non_streaming() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ModelResponse::with_tool_calls(vec![tool_call(
                "c1",
                "get_boiler_info",
                serde_json::json!({"boiler_brand": "Worcester"}),
            )])),
            Ok(ModelResponse::text("Bleed the radiator and check pressure.")),
        ]));
        let app = router(runtime(model.clone(), None));

        let response = app
            .oneshot(post_json(
                "/v1/chat/completions",
                serde_json::json!({
                    "model": "uk_housing",
                    "messages": [{"role": "user", "content": "My radiator is cold"}]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["object"], "chat.completion");
        assert!(body["id"].as_str().unwrap().starts_with("chatcmpl-"));
        assert_eq!(body["choices"][0]["finish_reason"], "stop");
        assert_eq!(
            body["choices"][0]["message"]["content"],
            "Bleed the radiator and check pressure."
        );
        assert!(body["thread_id"].as_str().unwrap().starts_with("thread-"));
        assert!(body["usage"]["total_tokens"].as_u64().unwrap() > 0);
        assert_eq!(model.invocations(), 2);
    }

    #[tokio::test]
    async fn test_thread_id_continues_history() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ModelResponse::text("first")),
            Ok(ModelResponse::text("second")),
        ]));
        let rt = runtime(model.clone(), None);
        let app = router(rt.clone());

        for content in ["boiler off", "still off"] {
            let response = app
                .clone()
                .oneshot(post_json(
                    "/v1/chat/completions",
                    serde_json::json!({
                        "model": "uk_housing",
                        "thread_id": "t-42",
                        "messages": [
                            {"role": "user", "content": "boiler off"},
                            {"role": "assistant", "content": "first"},
                            {"role": "user", "content": content}
                        ]
                    }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        // First call seeds three messages plus the answer; second appends one
        // user message plus the answer.
        assert_eq!(rt.store().message_count("t-42").unwrap(), 6);
    }

    #[tokio::test]
    async fn test_concurrent_first_requests_seed_thread_once() {
        let model = Arc::new(
            ScriptedModel::repeating(ModelResponse::text("ok"))
                .with_delay(std::time::Duration::from_millis(50)),
        );
        let rt = runtime(model, None);
        let app = router(rt.clone());
        let body = serde_json::json!({
            "model": "uk_housing",
            "thread_id": "fresh",
            "messages": [
                {"role": "user", "content": "boiler off"},
                {"role": "assistant", "content": "hm"},
                {"role": "user", "content": "still off"}
            ]
        });

        let (a, b) = tokio::join!(
            app.clone()
                .oneshot(post_json("/v1/chat/completions", body.clone())),
            app.oneshot(post_json("/v1/chat/completions", body)),
        );
        assert_eq!(a.unwrap().status(), StatusCode::OK);
        assert_eq!(b.unwrap().status(), StatusCode::OK);

        let texts: Vec<String> = rt
            .store()
            .load_history("fresh")
            .unwrap()
            .iter()
            .map(|m| m.text_content().to_string())
            .collect();
        assert_eq!(texts, vec!["boiler off", "hm", "still off", "ok", "still off", "ok"]);
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let app = router(runtime(Arc::new(ScriptedModel::new(vec![])), None));
        let cases = [
            serde_json::json!({"model": "uk_housing", "messages": [{"role": "user", "content": "hi"}], "temperature": 2.5}),
            serde_json::json!({"model": "uk_housing", "messages": [{"role": "user", "content": "hi"}], "top_p": 1.5}),
            serde_json::json!({"model": "uk_housing", "messages": [{"role": "user", "content": "hi"}], "max_tokens": 0}),
            serde_json::json!({"model": "uk_housing", "messages": []}),
            serde_json::json!({"model": "uk_housing", "messages": [{"role": "assistant", "content": "hi"}]}),
            serde_json::json!({"model": "uk_housing", "messages": [{"role": "tool", "content": "hi"}]}),
            serde_json::json!({"messages": [{"role": "user", "content": "hi"}]}),
        ];
        for case in cases {
            let response = app
                .clone()
                .oneshot(post_json("/v1/chat/completions", case.clone()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "case: {case}");
            let body = body_json(response).await;
            assert_eq!(body["error"]["type"], "invalid_request_error");
        }
    }

    #[tokio::test]
    async fn test_unknown_model_is_404() {
        let app = router(runtime(Arc::new(ScriptedModel::new(vec![])), None));
        let response = app
            .oneshot(post_json(
                "/v1/chat/completions",
                serde_json::json!({"model": "nope", "messages": [{"role": "user", "content": "hi"}]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_provider_failure_is_502() {
        let model = Arc::new(ScriptedModel::new(vec![Err(InferenceError::Unauthorized {
            status: 401,
            body: "bad key".into(),
        })]));
        let app = router(runtime(model, None));
        let response = app
            .oneshot(post_json(
                "/v1/chat/completions",
                serde_json::json!({"model": "uk_housing", "messages": [{"role": "user", "content": "hi"}]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_streaming_emits_chunks_then_done() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(ModelResponse::text(
            "Open a window after showering.",
        ))]));
        let app = router(runtime(model, None));

        let response = app
            .oneshot(post_json(
                "/v1/chat/completions",
                serde_json::json!({
                    "model": "uk_housing",
                    "stream": true,
                    "messages": [{"role": "user", "content": "condensation on windows"}]
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-accel-buffering"], "no");

        let text = body_text(response).await;
        let data: Vec<&str> = text
            .lines()
            .filter_map(|l| l.strip_prefix("data: "))
            .collect();
        assert_eq!(data.last(), Some(&"[DONE]"));

        let chunks: Vec<serde_json::Value> = data[..data.len() - 1]
            .iter()
            .map(|d| serde_json::from_str(d).unwrap())
            .collect();
        assert!(chunks.iter().all(|c| c["object"] == "chat.completion.chunk"));
        let streamed: String = chunks
            .iter()
            .map(|c| c["choices"][0]["delta"]["content"].as_str().unwrap())
            .collect();
        assert_eq!(streamed, "Open a window after showering.");
        assert_eq!(chunks.last().unwrap()["choices"][0]["finish_reason"], "stop");
    }

    #[tokio::test]
    async fn test_streaming_error_event() {
        let model = Arc::new(ScriptedModel::new(vec![Err(InferenceError::Timeout {
            duration_secs: 60,
        })]));
        let app = router(runtime(model, None));

        let response = app
            .oneshot(post_json(
                "/v1/chat/completions",
                serde_json::json!({
                    "model": "uk_housing",
                    "stream": true,
                    "messages": [{"role": "user", "content": "hello"}]
                }),
            ))
            .await
            .unwrap();
        let text = body_text(response).await;
        let data: Vec<&str> = text
            .lines()
            .filter_map(|l| l.strip_prefix("data: "))
            .collect();
        assert_eq!(data.len(), 1);
        let event: serde_json::Value = serde_json::from_str(data[0]).unwrap();
        assert_eq!(event["error"]["type"], "upstream_error");
    }

    #[tokio::test]
    async fn test_bearer_auth() {
        let app = router(runtime(
            Arc::new(ScriptedModel::repeating(ModelResponse::text("ok"))),
            Some("s3cret"),
        ));

        let response = app.clone().oneshot(get("/v1/models")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .uri("/v1/models")
            .header("authorization", "Bearer wrong")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let request = Request::builder()
            .uri("/v1/models")
            .header("authorization", "Bearer s3cret")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get("/v1/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
