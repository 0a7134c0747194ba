//! Shared types for the agent core.
//!
//! Intent categories, turn results and events, and thread-store records used
//! across the loop, the runtime, the HTTP server and the CLI.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::inference::types::{ChatMessage, Usage};

// ─── Intent ─────────────────────────────────────────────────────────────────

/// Coarse housing-issue label that selects the specialist prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentCategory {
    Heating,
    Damp,
    Repairs,
    General,
}

impl IntentCategory {
    pub fn all() -> [IntentCategory; 4] {
        [Self::Heating, Self::Damp, Self::Repairs, Self::General]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Heating => "heating",
            Self::Damp => "damp",
            Self::Repairs => "repairs",
            Self::General => "general",
        }
    }

    /// Case-insensitive parse of a category name. Trailing punctuation is
    /// ignored so model answers like `"Damp."` still parse.
    pub fn parse(s: &str) -> Option<Self> {
        let cleaned = s
            .trim()
            .trim_matches(|c: char| !c.is_ascii_alphabetic())
            .to_ascii_lowercase();
        match cleaned.as_str() {
            "heating" => Some(Self::Heating),
            "damp" => Some(Self::Damp),
            "repairs" | "repair" => Some(Self::Repairs),
            "general" => Some(Self::General),
            _ => None,
        }
    }
}

impl fmt::Display for IntentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Turns ──────────────────────────────────────────────────────────────────

/// Progress notifications emitted while a turn runs.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnEvent {
    /// Intent picked for this turn.
    Intent(IntentCategory),
    /// Text token from the model.
    Token(String),
    /// The model asked for a tool.
    ToolCall {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },
    /// A tool finished; `is_error` marks error-flavored results.
    ToolResult {
        id: String,
        name: String,
        is_error: bool,
    },
}

pub type TurnEventSink = mpsc::UnboundedSender<TurnEvent>;

/// One dispatched tool call, as recorded on the turn result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
    pub is_error: bool,
}

/// Outcome of one turn of the loop.
#[derive(Debug, Clone)]
pub struct TurnResult {
    /// Final assistant text (the apology when the round limit was hit).
    pub answer: String,
    pub intent: IntentCategory,
    /// Number of model invocations.
    pub rounds: usize,
    pub tool_calls: Vec<ToolCallRecord>,
    pub hit_round_limit: bool,
    /// Provider-reported usage summed over rounds, when reported.
    pub usage: Option<Usage>,
}

/// What the runtime needs to run a turn on a thread.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub thread_id: String,
    /// Messages appended to the thread before the loop starts. The last one
    /// must be a user message.
    pub new_messages: Vec<ChatMessage>,
    /// `new_messages` is a full client transcript: it seeds a thread with
    /// no stored history, otherwise only its last message is appended.
    pub seed_if_new: bool,
    pub sampling: crate::inference::SamplingOverrides,
}

impl TurnRequest {
    pub fn user(thread_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            new_messages: vec![ChatMessage::user(message)],
            seed_if_new: false,
            sampling: Default::default(),
        }
    }
}

// ─── Threads ────────────────────────────────────────────────────────────────

/// Metadata for a stored conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub id: String,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
    /// ISO 8601 last activity timestamp.
    pub last_activity: String,
    /// Intent of the most recent completed turn.
    pub last_intent: Option<IntentCategory>,
    pub message_count: usize,
}

/// A message as stored in the thread history.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    /// Auto-incremented row ID.
    pub id: i64,
    pub timestamp: String,
    pub message: ChatMessage,
}
