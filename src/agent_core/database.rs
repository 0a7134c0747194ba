//! SQLite thread store: thread metadata and append-only message history.
//!
//! Uses `rusqlite` synchronously behind a `std::sync::Mutex`. Every method
//! locks for one short synchronous section; no lock is held across an
//! `.await`. WAL mode is enabled for concurrent reads.

use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use super::errors::AgentError;
use super::types::{IntentCategory, StoredMessage, ThreadRecord};
use crate::inference::types::{ChatMessage, Role, ToolCallResponse};

// ─── ThreadStore ────────────────────────────────────────────────────────────

pub struct ThreadStore {
    conn: Mutex<Connection>,
}

impl ThreadStore {
    /// Open (or create) the thread store at the given path.
    ///
    /// Pass `":memory:"` for an in-memory database (tests).
    pub fn open(path: &str) -> Result<Self, AgentError> {
        let conn = Connection::open(path)?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_tables()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, AgentError> {
        Self::open(":memory:")
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, AgentError> {
        self.conn.lock().map_err(|_| AgentError::DatabaseError {
            reason: "thread store lock poisoned".into(),
        })
    }

    fn create_tables(&self) -> Result<(), AgentError> {
        self.lock()?.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS threads (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                last_activity TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                last_intent TEXT
            );

            CREATE TABLE IF NOT EXISTS thread_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                thread_id TEXT NOT NULL,
                timestamp TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                role TEXT NOT NULL,
                content TEXT,
                tool_calls TEXT,
                tool_call_id TEXT,
                FOREIGN KEY (thread_id) REFERENCES threads(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_thread_messages_thread
                ON thread_messages(thread_id, id);
            ",
        )?;
        Ok(())
    }

    // ─── Threads ────────────────────────────────────────────────────────

    /// Create a thread. Fails if the id already exists.
    pub fn create_thread(&self, thread_id: &str) -> Result<(), AgentError> {
        self.lock()?
            .execute("INSERT INTO threads (id) VALUES (?1)", params![thread_id])?;
        Ok(())
    }

    /// Create the thread if it does not exist yet.
    pub fn ensure_thread(&self, thread_id: &str) -> Result<(), AgentError> {
        self.lock()?.execute(
            "INSERT OR IGNORE INTO threads (id) VALUES (?1)",
            params![thread_id],
        )?;
        Ok(())
    }

    pub fn get_thread(&self, thread_id: &str) -> Result<Option<ThreadRecord>, AgentError> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                "SELECT t.id, t.created_at, t.last_activity, t.last_intent,
                        (SELECT COUNT(*) FROM thread_messages m WHERE m.thread_id = t.id)
                 FROM threads t WHERE t.id = ?1",
                params![thread_id],
                row_to_thread,
            )
            .optional()?;
        Ok(record)
    }

    pub fn thread_exists(&self, thread_id: &str) -> Result<bool, AgentError> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM threads WHERE id = ?1",
                params![thread_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// List all threads, most recent activity first.
    pub fn list_threads(&self) -> Result<Vec<ThreadRecord>, AgentError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT t.id, t.created_at, t.last_activity, t.last_intent,
                    (SELECT COUNT(*) FROM thread_messages m WHERE m.thread_id = t.id)
             FROM threads t
             ORDER BY t.last_activity DESC, t.id ASC",
        )?;

        let rows = stmt.query_map([], row_to_thread)?;
        let mut threads = Vec::new();
        for row in rows {
            threads.push(row?);
        }
        Ok(threads)
    }

    /// Delete a thread and its messages. Returns `ThreadNotFound` when there
    /// was nothing to delete.
    pub fn delete_thread(&self, thread_id: &str) -> Result<(), AgentError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM thread_messages WHERE thread_id = ?1",
            params![thread_id],
        )?;
        let removed = tx.execute("DELETE FROM threads WHERE id = ?1", params![thread_id])?;
        tx.commit()?;

        if removed == 0 {
            return Err(AgentError::ThreadNotFound {
                thread_id: thread_id.to_string(),
            });
        }
        Ok(())
    }

    /// Record the intent of the latest completed turn.
    pub fn set_last_intent(
        &self,
        thread_id: &str,
        intent: IntentCategory,
    ) -> Result<(), AgentError> {
        self.lock()?.execute(
            "UPDATE threads SET last_intent = ?2 WHERE id = ?1",
            params![thread_id, intent.as_str()],
        )?;
        Ok(())
    }

    // ─── Messages ───────────────────────────────────────────────────────

    /// Append messages to a thread in one transaction, creating the thread
    /// if needed.
    pub fn append_messages(
        &self,
        thread_id: &str,
        messages: &[ChatMessage],
    ) -> Result<(), AgentError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO threads (id) VALUES (?1)",
            params![thread_id],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO thread_messages (thread_id, role, content, tool_calls, tool_call_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for msg in messages {
                let tool_calls_json = msg
                    .tool_calls
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?;
                stmt.execute(params![
                    thread_id,
                    msg.role.as_str(),
                    msg.content,
                    tool_calls_json,
                    msg.tool_call_id,
                ])?;
            }
        }
        tx.execute(
            "UPDATE threads SET last_activity = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE id = ?1",
            params![thread_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// All stored messages of a thread, oldest first.
    pub fn get_messages(&self, thread_id: &str) -> Result<Vec<StoredMessage>, AgentError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, role, content, tool_calls, tool_call_id
             FROM thread_messages
             WHERE thread_id = ?1
             ORDER BY id ASC",
        )?;

        let rows = stmt.query_map(params![thread_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            let (id, timestamp, role, content, tool_calls, tool_call_id) = row?;
            let tool_calls = tool_calls
                .map(|s| serde_json::from_str::<Vec<ToolCallResponse>>(&s))
                .transpose()?;
            messages.push(StoredMessage {
                id,
                timestamp,
                message: ChatMessage {
                    role: Role::parse(&role).unwrap_or(Role::User),
                    content,
                    tool_call_id,
                    tool_calls,
                },
            });
        }
        Ok(messages)
    }

    /// Thread history as chat messages, oldest first. Empty for unknown
    /// threads.
    pub fn load_history(&self, thread_id: &str) -> Result<Vec<ChatMessage>, AgentError> {
        Ok(self
            .get_messages(thread_id)?
            .into_iter()
            .map(|m| m.message)
            .collect())
    }

    pub fn message_count(&self, thread_id: &str) -> Result<usize, AgentError> {
        let count: i64 = self.lock()?.query_row(
            "SELECT COUNT(*) FROM thread_messages WHERE thread_id = ?1",
            params![thread_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn row_to_thread(row: &rusqlite::Row<'_>) -> rusqlite::Result<ThreadRecord> {
    Ok(ThreadRecord {
        id: row.get(0)?,
        created_at: row.get(1)?,
        last_activity: row.get(2)?,
        last_intent: row
            .get::<_, Option<String>>(3)?
            .and_then(|s| IntentCategory::parse(&s)),
        message_count: row.get::<_, i64>(4)? as usize,
    })
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::types::ToolCall;

    fn test_store() -> ThreadStore {
        ThreadStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_create_and_get_thread() {
        let store = test_store();
        store.create_thread("thread-1").unwrap();

        let t = store.get_thread("thread-1").unwrap().unwrap();
        assert_eq!(t.id, "thread-1");
        assert_eq!(t.message_count, 0);
        assert!(t.last_intent.is_none());
        assert!(store.thread_exists("thread-1").unwrap());
    }

    #[test]
    fn test_create_duplicate_fails_but_ensure_is_idempotent() {
        let store = test_store();
        store.create_thread("t").unwrap();
        assert!(store.create_thread("t").is_err());
        store.ensure_thread("t").unwrap();
        store.ensure_thread("t").unwrap();
        assert_eq!(store.list_threads().unwrap().len(), 1);
    }

    #[test]
    fn test_thread_not_found() {
        let store = test_store();
        assert!(store.get_thread("nonexistent").unwrap().is_none());
        assert!(!store.thread_exists("nonexistent").unwrap());
        assert!(store.load_history("nonexistent").unwrap().is_empty());
    }

    #[test]
    fn test_append_and_load_history_with_tool_calls() {
        let store = test_store();
        let call = ToolCall {
            id: "call_1".into(),
            name: "get_boiler_info".into(),
            arguments: serde_json::json!({"boiler_brand": "Ideal"}),
        };
        let messages = vec![
            ChatMessage::user("my boiler shows F1"),
            ChatMessage::assistant_tool_calls(None, std::slice::from_ref(&call)),
            ChatMessage::tool_result("call_1", "Boiler information for Ideal"),
            ChatMessage::assistant("Repressurise to 1.5 bar."),
        ];
        store.append_messages("t1", &messages).unwrap();

        let loaded = store.load_history("t1").unwrap();
        assert_eq!(loaded, messages);
        assert_eq!(store.message_count("t1").unwrap(), 4);
        assert_eq!(store.get_thread("t1").unwrap().unwrap().message_count, 4);
    }

    #[test]
    fn test_append_is_ordered_across_calls() {
        let store = test_store();
        store.append_messages("t", &[ChatMessage::user("one")]).unwrap();
        store
            .append_messages("t", &[ChatMessage::assistant("two"), ChatMessage::user("three")])
            .unwrap();
        let texts: Vec<String> = store
            .load_history("t")
            .unwrap()
            .iter()
            .map(|m| m.text_content().to_string())
            .collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_set_last_intent() {
        let store = test_store();
        store.create_thread("t").unwrap();
        store.set_last_intent("t", IntentCategory::Damp).unwrap();
        assert_eq!(
            store.get_thread("t").unwrap().unwrap().last_intent,
            Some(IntentCategory::Damp)
        );
    }

    #[test]
    fn test_delete_thread() {
        let store = test_store();
        store.append_messages("t", &[ChatMessage::user("hello")]).unwrap();
        store.delete_thread("t").unwrap();
        assert!(store.get_thread("t").unwrap().is_none());
        assert_eq!(store.message_count("t").unwrap(), 0);
        assert!(matches!(
            store.delete_thread("t"),
            Err(AgentError::ThreadNotFound { .. })
        ));
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("threads.db");
        let path = path.to_str().unwrap();
        {
            let store = ThreadStore::open(path).unwrap();
            store.append_messages("t", &[ChatMessage::user("persist me")]).unwrap();
        }
        let store = ThreadStore::open(path).unwrap();
        assert_eq!(store.load_history("t").unwrap()[0].text_content(), "persist me");
    }
}
