//! Agent Core — the intent-routed conversation loop and its state.
//!
//! Submodules:
//! - `intent`: keyword (default) and model-backed intent classification
//! - `prompts`: specialist system prompts per intent category
//! - `conversation`: append-only conversation state
//! - `agent_loop`: the bounded model ⇄ tool loop for one turn
//! - `tool_router`: dispatches model tool calls to the tool registry
//! - `tokens`: token estimation and UTF-8 safe truncation
//! - `database`: SQLite thread store
//! - `runtime`: per-thread serialized turns over the store
//! - `types`: shared types across the agent core
//! - `errors`: agent-level error types

pub mod agent_loop;
pub mod conversation;
pub mod database;
pub mod errors;
pub mod intent;
pub mod prompts;
pub mod runtime;
pub mod tokens;
pub mod tool_router;
pub mod types;

// Re-exports for convenience
pub use agent_loop::{Agent, ROUND_LIMIT_ANSWER};
pub use conversation::Conversation;
pub use database::ThreadStore;
pub use errors::AgentError;
pub use intent::{classify_text, IntentClassifier, IntentStrategy};
pub use runtime::AgentRuntime;
pub use tool_router::ToolRouter;
pub use types::{
    IntentCategory, StoredMessage, ThreadRecord, ToolCallRecord, TurnEvent, TurnEventSink,
    TurnRequest, TurnResult,
};
