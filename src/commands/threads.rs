//! `threads` subcommands: list, show and delete stored conversations.

use std::io::Write;

use serde::Serialize;

use crate::agent_core::tokens::truncate_utf8;
use crate::agent_core::{AgentError, ThreadStore};
use crate::inference::types::Role;

/// Summary of a thread for the list view.
#[derive(Debug, Serialize)]
pub struct ThreadListItem {
    pub id: String,
    pub created_at: String,
    pub last_activity: String,
    pub last_intent: Option<String>,
    pub message_count: usize,
    pub preview: Option<String>,
}

/// Threads with at least one message, most recent activity first. The
/// preview is the first user message.
pub fn list_threads(store: &ThreadStore) -> Result<Vec<ThreadListItem>, AgentError> {
    let mut items = Vec::new();
    for thread in store.list_threads()? {
        if thread.message_count == 0 {
            continue;
        }
        let preview = store
            .load_history(&thread.id)?
            .into_iter()
            .find(|m| m.role == Role::User)
            .map(|m| preview_text(m.text_content()));

        items.push(ThreadListItem {
            id: thread.id,
            created_at: thread.created_at,
            last_activity: thread.last_activity,
            last_intent: thread.last_intent.map(|i| i.to_string()),
            message_count: thread.message_count,
            preview,
        });
    }
    Ok(items)
}

fn preview_text(text: &str) -> String {
    let line = text.lines().next().unwrap_or("");
    if line.len() > 80 {
        format!("{}…", truncate_utf8(line, 77))
    } else {
        line.to_string()
    }
}

pub fn print_list(store: &ThreadStore, out: &mut impl Write) -> anyhow::Result<()> {
    let items = list_threads(store)?;
    if items.is_empty() {
        writeln!(out, "No threads yet.")?;
        return Ok(());
    }
    for item in items {
        writeln!(
            out,
            "{}  {}  {:>3} msgs  {:<8}  {}",
            item.id,
            item.last_activity,
            item.message_count,
            item.last_intent.as_deref().unwrap_or("-"),
            item.preview.as_deref().unwrap_or("")
        )?;
    }
    Ok(())
}

pub fn print_thread(store: &ThreadStore, thread_id: &str, out: &mut impl Write) -> anyhow::Result<()> {
    let Some(thread) = store.get_thread(thread_id)? else {
        return Err(AgentError::ThreadNotFound {
            thread_id: thread_id.to_string(),
        }
        .into());
    };

    writeln!(
        out,
        "Thread {} (created {}, last intent: {})",
        thread.id,
        thread.created_at,
        thread.last_intent.map(|i| i.to_string()).unwrap_or_else(|| "-".into())
    )?;

    for stored in store.get_messages(thread_id)? {
        let message = &stored.message;
        writeln!(out, "\n[{}] {}", stored.timestamp, message.role.as_str())?;
        if let Some(calls) = &message.tool_calls {
            for call in calls {
                writeln!(out, "  -> {}({})", call.function.name, call.function.arguments)?;
            }
        }
        let text = message.text_content();
        if !text.is_empty() {
            writeln!(out, "{text}")?;
        }
    }
    Ok(())
}

pub fn delete(store: &ThreadStore, thread_id: &str, out: &mut impl Write) -> anyhow::Result<()> {
    store.delete_thread(thread_id)?;
    writeln!(out, "Deleted thread {thread_id}")?;
    Ok(())
}
