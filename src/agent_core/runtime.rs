//! AgentRuntime — the process-wide entry point for running turns.
//!
//! Owns the configuration, the agent, the thread store and the optional run
//! exporter. Turns on the same thread id are serialized by a per-thread
//! async lock; different threads run concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::config::AgentConfig;
use crate::inference::types::Role;
use crate::inference::{ChatModel, InferenceClient};
use crate::telemetry::{RunExporter, TurnTrace};
use crate::tools::ToolRegistry;

use super::agent_loop::Agent;
use super::conversation::Conversation;
use super::database::ThreadStore;
use super::errors::AgentError;
use super::types::{TurnEventSink, TurnRequest, TurnResult};

pub struct AgentRuntime {
    config: Arc<AgentConfig>,
    agent: Agent,
    store: ThreadStore,
    exporter: Option<RunExporter>,
    thread_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AgentRuntime {
    pub fn new(
        config: Arc<AgentConfig>,
        model: Arc<dyn ChatModel>,
        registry: ToolRegistry,
        store: ThreadStore,
    ) -> Self {
        let agent = Agent::new(model, Arc::new(registry), &config.agent);
        let exporter = RunExporter::from_config(&config.telemetry);
        Self {
            config,
            agent,
            store,
            exporter,
            thread_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Validate the configuration, then assemble the HTTP model client,
    /// housing tools and the on-disk thread store.
    pub fn from_config(config: AgentConfig) -> Result<Self, AgentError> {
        config.validate().map_err(|e| AgentError::Setup {
            reason: e.to_string(),
        })?;
        let model = InferenceClient::new(&config.llm).map_err(|e| AgentError::Setup {
            reason: e.to_string(),
        })?;
        let registry =
            ToolRegistry::with_housing_tools(&config.knowledge).map_err(|e| AgentError::Setup {
                reason: e.to_string(),
            })?;
        let db_path = config.storage.resolve_database_path();
        let store = ThreadStore::open(&db_path)?;
        tracing::info!(
            db_path = %db_path,
            model = %config.llm.model,
            max_tool_rounds = config.agent.max_tool_rounds,
            "agent runtime ready"
        );
        Ok(Self::new(Arc::new(config), Arc::new(model), registry, store))
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn store(&self) -> &ThreadStore {
        &self.store
    }

    pub fn model_name(&self) -> &str {
        self.agent.model_name()
    }

    /// Run one user message on a thread, creating the thread if needed.
    pub async fn run_turn(
        &self,
        thread_id: &str,
        user_message: &str,
    ) -> Result<TurnResult, AgentError> {
        self.run_turn_with(TurnRequest::user(thread_id, user_message), None)
            .await
    }

    /// Run a turn: load history, append the request's messages, run the
    /// loop, then persist everything the turn added. A failed turn persists
    /// nothing. History is read under the per-thread lock, so `seed_if_new`
    /// seeds a thread at most once.
    pub async fn run_turn_with(
        &self,
        request: TurnRequest,
        events: Option<TurnEventSink>,
    ) -> Result<TurnResult, AgentError> {
        let Some(last) = request.new_messages.last() else {
            return Err(AgentError::InvalidRequest {
                reason: "no messages to add".into(),
            });
        };
        if last.role != Role::User || last.text_content().trim().is_empty() {
            return Err(AgentError::InvalidRequest {
                reason: "the last message must be a non-empty user message".into(),
            });
        }
        let user_message = last.text_content().to_string();

        let lock = self.thread_lock(&request.thread_id)?;
        let _guard = lock.lock().await;

        let history = self.store.load_history(&request.thread_id)?;
        let mut new_messages = request.new_messages;
        if request.seed_if_new && !history.is_empty() {
            new_messages = new_messages.split_off(new_messages.len() - 1);
        }
        let mut conversation = Conversation::from_history(history);
        let persisted = conversation.len();
        for message in new_messages {
            conversation.push(message);
        }

        tracing::info!(
            thread_id = %request.thread_id,
            history_len = persisted,
            "turn started"
        );

        let started_at = Utc::now();
        let outcome = self
            .agent
            .run_with(&mut conversation, request.sampling, events.as_ref())
            .await;
        let ended_at = Utc::now();

        if let Some(exporter) = &self.exporter {
            exporter.export(TurnTrace {
                thread_id: request.thread_id.clone(),
                user_message,
                model: self.agent.model_name().to_string(),
                started_at,
                ended_at,
                outcome: outcome
                    .as_ref()
                    .map(Clone::clone)
                    .map_err(|e| e.to_string()),
            });
        }

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(thread_id = %request.thread_id, error = %e, "turn failed");
                return Err(e);
            }
        };

        self.store
            .append_messages(&request.thread_id, conversation.since(persisted))?;
        self.store
            .set_last_intent(&request.thread_id, result.intent)?;

        tracing::info!(
            thread_id = %request.thread_id,
            intent = %result.intent,
            rounds = result.rounds,
            tool_calls = result.tool_calls.len(),
            hit_round_limit = result.hit_round_limit,
            elapsed_ms = (ended_at - started_at).num_milliseconds(),
            "turn finished"
        );
        Ok(result)
    }

    fn thread_lock(&self, thread_id: &str) -> Result<Arc<tokio::sync::Mutex<()>>, AgentError> {
        let mut locks = self.thread_locks.lock().map_err(|_| AgentError::Setup {
            reason: "thread lock table poisoned".into(),
        })?;
        // Drop entries no turn is holding.
        if locks.len() > 1024 {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        Ok(locks
            .entry(thread_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone())
    }
}
