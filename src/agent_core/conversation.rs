//! Conversation state for one thread.
//!
//! Append-only: within a turn, messages are pushed and never edited or
//! removed. The specialist system prompt is not part of this state; the loop
//! overlays it per model invocation.

use crate::inference::types::{ChatMessage, Role};

use super::tokens::estimate_message_tokens;

#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from stored history.
    pub fn from_history(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.push(ChatMessage::user(text));
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Messages appended at or after `index`.
    pub fn since(&self, index: usize) -> &[ChatMessage] {
        &self.messages[index.min(self.messages.len())..]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.text_content())
    }

    /// History with `system_prompt` in front, as sent to the model.
    pub fn with_system_prompt(&self, system_prompt: &str) -> Vec<ChatMessage> {
        let mut out = Vec::with_capacity(self.messages.len() + 1);
        out.push(ChatMessage::system(system_prompt));
        out.extend(self.messages.iter().cloned());
        out
    }

    pub fn estimated_tokens(&self) -> u32 {
        self.messages.iter().map(estimate_message_tokens).sum()
    }
}
