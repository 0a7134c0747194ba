//! Tools the model can call during a turn.
//!
//! - `knowledge`: OpenSearch-backed housing knowledge search
//! - `boiler`: static boiler brand facts
//! - `guidance`: canned repair guidance per issue category
//! - `engineer`: engineer booking and human escalation
//! - `registry`: name → tool lookup and OpenAI tool definitions

pub mod boiler;
pub mod engineer;
pub mod guidance;
pub mod knowledge;
pub mod registry;

use async_trait::async_trait;
use thiserror::Error;

pub use boiler::BoilerInfoTool;
pub use engineer::{EscalateToHumanTool, ScheduleEngineerTool};
pub use guidance::RepairGuidanceTool;
pub use knowledge::KnowledgeSearchTool;
pub use registry::ToolRegistry;

/// Errors a tool can report. The tool router turns every one of these into
/// a tool-result message; none of them end the turn.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// The lookup ran but had nothing for the given key.
    #[error("{what} not found")]
    NotFound { what: String, hint: Option<String> },

    #[error("tool execution failed: {reason}")]
    ExecutionFailed { reason: String },
}

/// A capability the model can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the arguments object.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Run the tool and return its textual result.
    async fn execute(&self, arguments: &serde_json::Value) -> Result<String, ToolError>;
}

/// Read a required, non-empty string argument.
pub(crate) fn required_str<'a>(
    arguments: &'a serde_json::Value,
    key: &str,
    tool: &str,
) -> Result<&'a str, ToolError> {
    match arguments.get(key) {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Ok(s.trim()),
        Some(serde_json::Value::String(_)) => Err(ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!("'{key}' must not be empty"),
        }),
        Some(other) => Err(ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!("'{key}' must be a string, got {other}"),
        }),
        None => Err(ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: format!("missing required argument '{key}'"),
        }),
    }
}
