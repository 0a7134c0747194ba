//! ToolRouter — dispatches model tool calls to the tool registry.
//!
//! Every call produces exactly one outcome, in the order the model asked for
//! them. Unknown tools, bad arguments and tool failures become
//! error-flavored results; nothing raises past `dispatch_tool_calls`.

use std::sync::Arc;
use std::time::Instant;

use crate::inference::types::{ToolCall, ToolDefinition};
use crate::tools::{ToolError, ToolRegistry};

use super::tokens::truncate_utf8;
use super::types::{ToolCallRecord, TurnEvent, TurnEventSink};

// ─── Constants ──────────────────────────────────────────────────────────────

/// Cap on a single tool result, in bytes.
pub const MAX_TOOL_RESULT_BYTES: usize = 6_000;

// ─── Outcome ────────────────────────────────────────────────────────────────

/// Result of dispatching one tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub call_id: String,
    pub tool_name: String,
    /// Text placed in the tool-result message.
    pub content: String,
    pub is_error: bool,
}

impl ToolOutcome {
    pub fn to_record(&self, arguments: &serde_json::Value) -> ToolCallRecord {
        ToolCallRecord {
            id: self.call_id.clone(),
            name: self.tool_name.clone(),
            arguments: arguments.clone(),
            is_error: self.is_error,
        }
    }
}

// ─── ToolRouter ─────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct ToolRouter {
    registry: Arc<ToolRegistry>,
}

impl ToolRouter {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Definitions sent with every model invocation. `None` when no tools
    /// are registered, so the request omits the field.
    pub fn tool_definitions(&self) -> Option<Vec<ToolDefinition>> {
        if self.registry.is_empty() {
            None
        } else {
            Some(self.registry.tool_definitions())
        }
    }

    /// Dispatch a batch of tool calls from the model.
    ///
    /// Processes tool calls sequentially (model expects ordered results).
    pub async fn dispatch_tool_calls(
        &self,
        tool_calls: &[ToolCall],
        events: Option<&TurnEventSink>,
    ) -> Vec<ToolOutcome> {
        let mut results = Vec::with_capacity(tool_calls.len());
        for tc in tool_calls {
            if let Some(sink) = events {
                let _ = sink.send(TurnEvent::ToolCall {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments: tc.arguments.clone(),
                });
            }

            let outcome = self.dispatch_single(tc).await;

            if let Some(sink) = events {
                let _ = sink.send(TurnEvent::ToolResult {
                    id: outcome.call_id.clone(),
                    name: outcome.tool_name.clone(),
                    is_error: outcome.is_error,
                });
            }
            results.push(outcome);
        }
        results
    }

    /// Dispatch a single tool call: look up, execute, render, cap.
    pub async fn dispatch_single(&self, tool_call: &ToolCall) -> ToolOutcome {
        let start = Instant::now();

        let result = match self.registry.get(&tool_call.name) {
            Some(tool) => tool.execute(&tool_call.arguments).await,
            None => Err(ToolError::UnknownTool {
                name: tool_call.name.clone(),
            }),
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        let (content, is_error) = match result {
            Ok(text) => {
                tracing::info!(
                    tool = %tool_call.name,
                    call_id = %tool_call.id,
                    elapsed_ms,
                    result_len = text.len(),
                    "tool executed"
                );
                (text, false)
            }
            Err(e) => {
                tracing::warn!(
                    tool = %tool_call.name,
                    call_id = %tool_call.id,
                    elapsed_ms,
                    error = %e,
                    "tool failed, returning error result to model"
                );
                (render_error(&e), true)
            }
        };

        ToolOutcome {
            call_id: tool_call.id.clone(),
            tool_name: tool_call.name.clone(),
            content: truncate_tool_result(&content, &tool_call.name),
            is_error,
        }
    }
}

/// Text the model sees for a failed call.
fn render_error(error: &ToolError) -> String {
    match error {
        ToolError::NotFound { what, hint: Some(hint) } => format!("Not found: {what} ({hint})"),
        ToolError::NotFound { what, hint: None } => format!("Not found: {what}"),
        other => format!("Error: {other}"),
    }
}

/// Truncate a tool result that exceeds `MAX_TOOL_RESULT_BYTES`, keeping the
/// beginning and appending a notice.
fn truncate_tool_result(result: &str, tool_name: &str) -> String {
    if result.len() <= MAX_TOOL_RESULT_BYTES {
        return result.to_string();
    }

    let truncated = truncate_utf8(result, MAX_TOOL_RESULT_BYTES);
    tracing::warn!(
        tool = %tool_name,
        original_len = result.len(),
        truncated_to = truncated.len(),
        "tool result truncated"
    );
    format!(
        "{truncated}\n\n[... truncated: showing first {} of {} bytes]",
        truncated.len(),
        result.len()
    )
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    struct BigTool;

    #[async_trait]
    impl Tool for BigTool {
        fn name(&self) -> &str {
            "big"
        }
        fn description(&self) -> &str {
            "returns a lot of text"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn execute(&self, _arguments: &serde_json::Value) -> Result<String, ToolError> {
            Ok("é".repeat(5_000))
        }
    }

    fn router() -> ToolRouter {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(crate::tools::BoilerInfoTool));
        registry.register(Arc::new(crate::tools::ScheduleEngineerTool));
        registry.register(Arc::new(BigTool));
        ToolRouter::new(Arc::new(registry))
    }

    fn call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: args,
        }
    }

    #[tokio::test]
    async fn test_results_in_call_order() {
        let calls = vec![
            call("a", "get_boiler_info", serde_json::json!({"boiler_brand": "Ideal"})),
            call("b", "get_boiler_info", serde_json::json!({"boiler_brand": "Vaillant"})),
        ];
        let out = router().dispatch_tool_calls(&calls, None).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].call_id, "a");
        assert!(out[0].content.contains("Ideal"));
        assert_eq!(out[1].call_id, "b");
        assert!(out[1].content.contains("Vaillant"));
        assert!(out.iter().all(|o| !o.is_error));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error_result() {
        let out = router()
            .dispatch_single(&call("x", "order_pizza", serde_json::json!({})))
            .await;
        assert!(out.is_error);
        assert_eq!(out.content, "Error: unknown tool: order_pizza");
    }

    #[tokio::test]
    async fn test_unknown_brand_is_not_found_result() {
        let out = router()
            .dispatch_single(&call("x", "get_boiler_info", serde_json::json!({"boiler_brand": "Acme"})))
            .await;
        assert!(out.is_error);
        assert!(out.content.starts_with("Not found: boiler brand 'Acme'"));
    }

    #[tokio::test]
    async fn test_invalid_arguments_is_error_result() {
        let out = router()
            .dispatch_single(&call(
                "x",
                "schedule_engineer",
                serde_json::json!({"issue_type": "heating", "urgency": "whenever"}),
            ))
            .await;
        assert!(out.is_error);
        assert!(out.content.starts_with("Error: invalid arguments for schedule_engineer"));
    }

    #[tokio::test]
    async fn test_large_result_truncated_on_char_boundary() {
        let out = router()
            .dispatch_single(&call("x", "big", serde_json::json!({})))
            .await;
        assert!(!out.is_error);
        assert!(out.content.contains("[... truncated: showing first 6000 of 10000 bytes]"));
        assert!(out.content.starts_with(&"é".repeat(3_000)));
    }

    #[tokio::test]
    async fn test_events_emitted_per_call() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let calls = vec![call("a", "get_boiler_info", serde_json::json!({"boiler_brand": "Baxi"}))];
        router().dispatch_tool_calls(&calls, Some(&tx)).await;
        drop(tx);

        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e);
        }
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], TurnEvent::ToolCall { name, .. } if name == "get_boiler_info"));
        assert!(matches!(&events[1], TurnEvent::ToolResult { is_error: false, .. }));
    }

    #[test]
    fn test_tool_definitions_none_when_empty() {
        let router = ToolRouter::new(Arc::new(ToolRegistry::new()));
        assert!(router.tool_definitions().is_none());
    }
}
