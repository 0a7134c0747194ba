//! LangSmith run export.
//!
//! Each completed turn is posted as a `chain` run. Export happens on a
//! spawned task and never affects the turn: failures are logged and dropped.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client as HttpClient;
use serde::Serialize;
use thiserror::Error;

use crate::agent_core::types::TurnResult;
use crate::config::{Secret, TelemetryConfig};

const EXPORT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("LangSmith request failed: {reason}")]
    Request { reason: String },

    #[error("LangSmith rejected the run (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Everything needed to describe one finished turn.
#[derive(Debug, Clone)]
pub struct TurnTrace {
    pub thread_id: String,
    pub user_message: String,
    pub model: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub outcome: Result<TurnResult, String>,
}

#[derive(Debug, Serialize)]
struct RunPayload {
    id: String,
    name: &'static str,
    run_type: &'static str,
    session_name: String,
    start_time: String,
    end_time: String,
    inputs: serde_json::Value,
    outputs: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    extra: serde_json::Value,
    tags: Vec<String>,
}

#[derive(Clone)]
pub struct RunExporter {
    http: HttpClient,
    endpoint: String,
    api_key: Secret,
    project: String,
}

impl RunExporter {
    /// `None` when no API key is configured.
    pub fn from_config(config: &TelemetryConfig) -> Option<Self> {
        if !config.is_enabled() {
            return None;
        }
        let http = match HttpClient::builder().timeout(EXPORT_TIMEOUT).build() {
            Ok(http) => http,
            Err(e) => {
                tracing::warn!(error = %e, "failed to build telemetry client, export disabled");
                return None;
            }
        };
        tracing::info!(project = %config.langsmith_project, "LangSmith run export enabled");
        Some(Self {
            http,
            endpoint: config.langsmith_endpoint.trim_end_matches('/').to_string(),
            api_key: config.langsmith_api_key.clone(),
            project: config.langsmith_project.clone(),
        })
    }

    /// Spawn the export of one turn. Returns immediately.
    pub fn export(&self, trace: TurnTrace) {
        let exporter = self.clone();
        tokio::spawn(async move {
            let thread_id = trace.thread_id.clone();
            if let Err(e) = exporter.send(trace).await {
                tracing::warn!(thread_id = %thread_id, error = %e, "LangSmith export failed");
            }
        });
    }

    async fn send(&self, trace: TurnTrace) -> Result<(), ExportError> {
        let payload = self.payload(trace);
        let response = self
            .http
            .post(format!("{}/runs", self.endpoint))
            .header("x-api-key", self.api_key.expose())
            .json(&payload)
            .send()
            .await
            .map_err(|e| ExportError::Request {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExportError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        tracing::debug!(run_id = %payload.id, "LangSmith run exported");
        Ok(())
    }

    fn payload(&self, trace: TurnTrace) -> RunPayload {
        let (intent, outputs, error) = match &trace.outcome {
            Ok(result) => (
                Some(result.intent.as_str()),
                serde_json::json!({
                    "answer": result.answer,
                    "rounds": result.rounds,
                    "hit_round_limit": result.hit_round_limit,
                    "tool_calls": result.tool_calls,
                }),
                None,
            ),
            Err(e) => (None, serde_json::json!({}), Some(e.clone())),
        };

        RunPayload {
            id: uuid::Uuid::new_v4().to_string(),
            name: "uk_housing",
            run_type: "chain",
            session_name: self.project.clone(),
            start_time: trace.started_at.to_rfc3339(),
            end_time: trace.ended_at.to_rfc3339(),
            inputs: serde_json::json!({
                "thread_id": trace.thread_id,
                "message": trace.user_message,
                "intent": intent,
            }),
            outputs,
            error,
            extra: serde_json::json!({"metadata": {"model": trace.model}}),
            tags: vec!["housing-agent".to_string()],
        }
    }
}
