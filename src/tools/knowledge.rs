//! `search_housing_knowledge` — queries the OpenSearch knowledge index.
//!
//! The index is optional. When it is not configured, unreachable, or returns
//! an error, the tool answers with an explicit empty result so the model can
//! fall back to its own knowledge.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Deserialize;

use crate::agent_core::tokens::truncate_utf8;
use crate::config::KnowledgeConfig;

use super::{required_str, Tool, ToolError};

const TOOL_NAME: &str = "search_housing_knowledge";

const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest snippet kept per hit.
const MAX_SNIPPET_BYTES: usize = 600;

pub struct KnowledgeSearchTool {
    http: HttpClient,
    config: KnowledgeConfig,
}

impl KnowledgeSearchTool {
    pub fn new(config: KnowledgeConfig) -> Result<Self, ToolError> {
        let http = HttpClient::builder()
            .timeout(SEARCH_TIMEOUT)
            .build()
            .map_err(|e| ToolError::ExecutionFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { http, config })
    }

    async fn search(&self, query: &str) -> Result<Vec<Snippet>, String> {
        let url = format!("{}/{}/_search", self.config.base_url(), self.config.index);
        let body = serde_json::json!({
            "size": self.config.top_k.max(1),
            "query": {
                "multi_match": {
                    "query": query,
                    "fields": ["title^2", "content", "text"]
                }
            }
        });

        let mut request = self.http.post(&url).json(&body);
        if !self.config.user.is_empty() {
            request = request.basic_auth(&self.config.user, Some(self.config.password.expose()));
        }

        let response = request.send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(format!("index returned HTTP {}", status.as_u16()));
        }

        let parsed: SearchResponse = response.json().await.map_err(|e| e.to_string())?;
        Ok(parsed
            .hits
            .hits
            .into_iter()
            .filter_map(|hit| hit.source.into_snippet())
            .collect())
    }
}

#[async_trait]
impl Tool for KnowledgeSearchTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Search the UK housing knowledge base for guidance on tenant rights, repairs, \
         damp, heating and landlord obligations."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query about housing issues"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: &serde_json::Value) -> Result<String, ToolError> {
        let query = required_str(arguments, "query", TOOL_NAME)?;

        if !self.config.is_enabled() {
            tracing::debug!("knowledge index not configured");
            return Ok(empty_result(query, "knowledge base not configured"));
        }

        match self.search(query).await {
            Ok(snippets) if snippets.is_empty() => Ok(empty_result(query, "no matching documents")),
            Ok(snippets) => Ok(format_snippets(query, &snippets)),
            Err(reason) => {
                tracing::warn!(
                    index = %self.config.index,
                    error = %reason,
                    "knowledge search failed, returning empty result"
                );
                Ok(empty_result(query, "knowledge base unavailable"))
            }
        }
    }
}

// ─── Response decoding ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Deserialize)]
struct Hits {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "_source")]
    source: HitSource,
}

#[derive(Deserialize)]
struct HitSource {
    title: Option<String>,
    content: Option<String>,
    text: Option<String>,
}

impl HitSource {
    fn into_snippet(self) -> Option<Snippet> {
        let body = self.content.or(self.text)?;
        let body = body.trim();
        if body.is_empty() {
            return None;
        }
        Some(Snippet {
            title: self.title.filter(|t| !t.trim().is_empty()),
            body: truncate_utf8(body, MAX_SNIPPET_BYTES).to_string(),
        })
    }
}

struct Snippet {
    title: Option<String>,
    body: String,
}

fn format_snippets(query: &str, snippets: &[Snippet]) -> String {
    let mut out = format!("Knowledge base results for: {query}\n");
    for (i, snippet) in snippets.iter().enumerate() {
        out.push('\n');
        match &snippet.title {
            Some(title) => out.push_str(&format!("[{}] {title}\n", i + 1)),
            None => out.push_str(&format!("[{}]\n", i + 1)),
        }
        out.push_str(&snippet.body);
        out.push('\n');
    }
    out
}

fn empty_result(query: &str, reason: &str) -> String {
    format!("No knowledge base results for: {query} ({reason}).")
}

// ─── Tests ───────────────────────────────────────────────────────────────────
