//! The intent-routed conversation loop.
//!
//! One turn: classify the latest user message, then alternate between model
//! invocation and tool dispatch until the model answers without tool calls
//! or the round ceiling is reached.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::LoopConfig;
use crate::inference::types::{ChatMessage, ModelResponse, SamplingOverrides, ToolDefinition, Usage};
use crate::inference::{ChatModel, InferenceError};
use crate::tools::ToolRegistry;

use super::conversation::Conversation;
use super::errors::AgentError;
use super::intent::IntentClassifier;
use super::prompts::system_prompt;
use super::tool_router::ToolRouter;
use super::types::{IntentCategory, ToolCallRecord, TurnEvent, TurnEventSink, TurnResult};

/// Final answer when the model is still asking for tools at the ceiling.
pub const ROUND_LIMIT_ANSWER: &str = "I'm sorry, I wasn't able to finish working on your \
question. Please try rephrasing it, or ask me to escalate it to a housing officer.";

enum LoopState {
    AwaitingModel,
    Done { answer: String },
    LoopLimitReached,
}

pub struct Agent {
    model: Arc<dyn ChatModel>,
    router: ToolRouter,
    classifier: IntentClassifier,
    max_tool_rounds: usize,
}

impl Agent {
    pub fn new(model: Arc<dyn ChatModel>, registry: Arc<ToolRegistry>, config: &LoopConfig) -> Self {
        Self {
            model,
            router: ToolRouter::new(registry),
            classifier: IntentClassifier::new(config.intent_strategy),
            max_tool_rounds: config.max_tool_rounds.max(1),
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Run one turn with configured sampling and no event stream.
    pub async fn run(&self, conversation: &mut Conversation) -> Result<TurnResult, AgentError> {
        self.run_with(conversation, SamplingOverrides::default(), None)
            .await
    }

    /// Run one turn. The conversation's latest user message is the input;
    /// assistant and tool messages are appended as the turn progresses.
    pub async fn run_with(
        &self,
        conversation: &mut Conversation,
        sampling: SamplingOverrides,
        events: Option<&TurnEventSink>,
    ) -> Result<TurnResult, AgentError> {
        let intent = self
            .classifier
            .classify(conversation.messages(), self.model.as_ref())
            .await;
        tracing::info!(%intent, strategy = self.classifier.strategy().as_str(), "intent classified");
        emit(events, TurnEvent::Intent(intent));

        let prompt = system_prompt(intent);
        let tools = self.router.tool_definitions();

        let mut state = LoopState::AwaitingModel;
        let mut rounds = 0usize;
        let mut tool_records: Vec<ToolCallRecord> = Vec::new();
        let mut usage: Option<Usage> = None;

        loop {
            match state {
                LoopState::AwaitingModel if rounds >= self.max_tool_rounds => {
                    state = LoopState::LoopLimitReached;
                }
                LoopState::AwaitingModel => {
                    rounds += 1;
                    tracing::info!(
                        round = rounds,
                        max_rounds = self.max_tool_rounds,
                        history_len = conversation.len(),
                        estimated_tokens = conversation.estimated_tokens(),
                        model = self.model.model_name(),
                        "=== AGENT LOOP ROUND START ==="
                    );

                    let request = conversation.with_system_prompt(&prompt);
                    let response = self.invoke(request, tools.clone(), sampling, events).await?;
                    usage = add_usage(usage, response.usage);

                    if response.has_tool_calls() {
                        tracing::info!(
                            round = rounds,
                            tool_calls = response.tool_calls.len(),
                            "model requested tools"
                        );
                        conversation.push(ChatMessage::assistant_tool_calls(
                            response.content.clone().filter(|c| !c.is_empty()),
                            &response.tool_calls,
                        ));

                        let outcomes = self
                            .router
                            .dispatch_tool_calls(&response.tool_calls, events)
                            .await;
                        for (call, outcome) in response.tool_calls.iter().zip(&outcomes) {
                            tool_records.push(outcome.to_record(&call.arguments));
                            conversation.push(ChatMessage::tool_result(
                                outcome.call_id.clone(),
                                outcome.content.clone(),
                            ));
                        }
                        state = LoopState::AwaitingModel;
                    } else {
                        let answer = response.content.unwrap_or_default();
                        conversation.push(ChatMessage::assistant(answer.clone()));
                        state = LoopState::Done { answer };
                    }
                }
                LoopState::Done { answer } => {
                    tracing::info!(
                        rounds,
                        tool_calls = tool_records.len(),
                        answer_len = answer.len(),
                        "turn complete"
                    );
                    return Ok(self.result(answer, intent, rounds, tool_records, false, usage));
                }
                LoopState::LoopLimitReached => {
                    tracing::warn!(
                        rounds,
                        max_rounds = self.max_tool_rounds,
                        "round limit reached with tools still requested"
                    );
                    conversation.push(ChatMessage::assistant(ROUND_LIMIT_ANSWER));
                    emit(events, TurnEvent::Token(ROUND_LIMIT_ANSWER.to_string()));
                    return Ok(self.result(
                        ROUND_LIMIT_ANSWER.to_string(),
                        intent,
                        rounds,
                        tool_records,
                        true,
                        usage,
                    ));
                }
            }
        }
    }

    /// One model invocation. With an event sink, text tokens are forwarded
    /// as they arrive.
    async fn invoke(
        &self,
        messages: Vec<ChatMessage>,
        tools: Option<Vec<ToolDefinition>>,
        sampling: SamplingOverrides,
        events: Option<&TurnEventSink>,
    ) -> Result<ModelResponse, InferenceError> {
        let Some(sink) = events else {
            return self.model.complete(messages, tools, sampling).await;
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let model = &self.model;
        let completion = async move {
            let result = model.complete_streaming(messages, tools, sampling, &tx).await;
            drop(tx);
            result
        };
        let forward = async {
            while let Some(token) = rx.recv().await {
                let _ = sink.send(TurnEvent::Token(token));
            }
        };
        let (result, ()) = tokio::join!(completion, forward);
        result
    }

    fn result(
        &self,
        answer: String,
        intent: IntentCategory,
        rounds: usize,
        tool_calls: Vec<ToolCallRecord>,
        hit_round_limit: bool,
        usage: Option<Usage>,
    ) -> TurnResult {
        TurnResult {
            answer,
            intent,
            rounds,
            tool_calls,
            hit_round_limit,
            usage,
        }
    }
}

fn emit(events: Option<&TurnEventSink>, event: TurnEvent) {
    if let Some(sink) = events {
        let _ = sink.send(event);
    }
}

fn add_usage(total: Option<Usage>, round: Option<Usage>) -> Option<Usage> {
    match (total, round) {
        (None, r) => r,
        (t, None) => t,
        (Some(t), Some(r)) => Some(Usage {
            prompt_tokens: t.prompt_tokens + r.prompt_tokens,
            completion_tokens: t.completion_tokens + r.completion_tokens,
            total_tokens: t.total_tokens + r.total_tokens,
        }),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::agent_core::intent::IntentStrategy;
    use crate::inference::types::{Role, ToolCall};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records every request it receives.
    pub(crate) struct ScriptedModel {
        responses: Mutex<VecDeque<Result<ModelResponse, InferenceError>>>,
        /// Returned once the script runs out.
        fallback: Option<ModelResponse>,
        /// Sleep before answering, so concurrent turns interleave.
        delay: Option<std::time::Duration>,
        pub(crate) requests: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedModel {
        pub(crate) fn new(responses: Vec<Result<ModelResponse, InferenceError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                fallback: None,
                delay: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Always answers with `response`.
        pub(crate) fn repeating(response: ModelResponse) -> Self {
            Self {
                responses: Mutex::new(VecDeque::new()),
                fallback: Some(response),
                delay: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn with_delay(mut self, delay: std::time::Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub(crate) fn invocations(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            _tools: Option<Vec<ToolDefinition>>,
            _sampling: SamplingOverrides,
        ) -> Result<ModelResponse, InferenceError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.requests.lock().unwrap().push(messages);
            let next = self.responses.lock().unwrap().pop_front();
            match next {
                Some(r) => r,
                None => Ok(self
                    .fallback
                    .clone()
                    .unwrap_or_else(|| ModelResponse::text("(script exhausted)"))),
            }
        }
    }

    pub(crate) fn tool_call(id: &str, name: &str, args: serde_json::Value) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: args,
        }
    }

    fn agent(model: Arc<ScriptedModel>, max_tool_rounds: usize) -> Agent {
        let registry = ToolRegistry::with_housing_tools(&crate::config::KnowledgeConfig {
            host: String::new(),
            ..Default::default()
        })
        .unwrap();
        Agent::new(
            model,
            Arc::new(registry),
            &LoopConfig {
                max_tool_rounds,
                intent_strategy: IntentStrategy::Keyword,
            },
        )
    }

    #[tokio::test]
    async fn test_no_tool_calls_single_invocation() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(ModelResponse::text(
            "Check the boiler pressure gauge first.",
        ))]));
        let agent = agent(model.clone(), 8);

        let mut conv = Conversation::new();
        conv.push_user("My boiler is making a loud noise");
        let result = agent.run(&mut conv).await.unwrap();

        assert_eq!(result.intent, IntentCategory::Heating);
        assert_eq!(result.answer, "Check the boiler pressure gauge first.");
        assert_eq!(result.rounds, 1);
        assert!(!result.hit_round_limit);
        assert_eq!(model.invocations(), 1);
        assert_eq!(conv.len(), 2);
        assert_eq!(conv.messages()[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_tool_call_then_answer() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ModelResponse::with_tool_calls(vec![tool_call(
                "call_1",
                "get_boiler_info",
                serde_json::json!({"boiler_brand": "Worcester"}),
            )])),
            Ok(ModelResponse::text("Your Worcester Bosch may show fault EA.")),
        ]));
        let agent = agent(model.clone(), 8);

        let mut conv = Conversation::new();
        conv.push_user("My radiator is cold");
        let result = agent.run(&mut conv).await.unwrap();

        assert_eq!(result.intent, IntentCategory::Heating);
        assert_eq!(result.rounds, 2);
        assert_eq!(model.invocations(), 2);
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].name, "get_boiler_info");
        assert!(!result.tool_calls[0].is_error);

        // user, assistant(tool_calls), tool, assistant
        let roles: Vec<Role> = conv.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
        assert_eq!(conv.messages()[2].tool_call_id.as_deref(), Some("call_1"));
        assert!(conv.messages()[2].text_content().contains("Worcester Bosch"));

        // Second invocation saw the tool result, with the specialist prompt in front.
        let requests = model.requests.lock().unwrap();
        assert_eq!(requests[1][0].role, Role::System);
        assert!(requests[1][0].text_content().starts_with("You are a heating system expert"));
        assert_eq!(requests[1].last().unwrap().role, Role::Tool);
    }

    #[tokio::test]
    async fn test_every_tool_call_resolved_before_next_invocation() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ModelResponse::with_tool_calls(vec![
                tool_call("a", "get_repair_guidance", serde_json::json!({"issue_type": "damp"})),
                tool_call("b", "get_boiler_info", serde_json::json!({"boiler_brand": "Nope"})),
                tool_call("c", "not_a_tool", serde_json::json!({})),
            ])),
            Ok(ModelResponse::text("done")),
        ]));
        let agent = agent(model.clone(), 8);

        let mut conv = Conversation::new();
        conv.push_user("black mould on the ceiling");
        let result = agent.run(&mut conv).await.unwrap();

        assert_eq!(result.intent, IntentCategory::Damp);
        let requests = model.requests.lock().unwrap();
        let tool_msgs: Vec<&ChatMessage> =
            requests[1].iter().filter(|m| m.role == Role::Tool).collect();
        assert_eq!(tool_msgs.len(), 3);
        assert_eq!(tool_msgs[0].tool_call_id.as_deref(), Some("a"));
        assert!(tool_msgs[1].text_content().starts_with("Not found:"));
        assert!(tool_msgs[2].text_content().starts_with("Error: unknown tool"));
        assert_eq!(
            result.tool_calls.iter().map(|r| r.is_error).collect::<Vec<_>>(),
            vec![false, true, true]
        );
    }

    #[tokio::test]
    async fn test_round_limit() {
        let model = Arc::new(ScriptedModel::repeating(ModelResponse::with_tool_calls(vec![
            tool_call("loop", "get_repair_guidance", serde_json::json!({"issue_type": "repairs"})),
        ])));
        let agent = agent(model.clone(), 3);

        let mut conv = Conversation::new();
        conv.push_user("my tap is broken");
        let result = agent.run(&mut conv).await.unwrap();

        assert!(result.hit_round_limit);
        assert_eq!(result.rounds, 3);
        assert_eq!(model.invocations(), 3);
        assert_eq!(result.answer, ROUND_LIMIT_ANSWER);
        assert_eq!(conv.messages().last().unwrap().text_content(), ROUND_LIMIT_ANSWER);
    }

    #[tokio::test]
    async fn test_inference_error_fails_turn() {
        let model = Arc::new(ScriptedModel::new(vec![Err(InferenceError::Unauthorized {
            status: 401,
            body: "bad key".into(),
        })]));
        let agent = agent(model, 8);

        let mut conv = Conversation::new();
        conv.push_user("hello");
        let err = agent.run(&mut conv).await.unwrap_err();
        assert!(matches!(err, AgentError::Inference(InferenceError::Unauthorized { .. })));
        assert_eq!(conv.len(), 1);
    }

    #[tokio::test]
    async fn test_prior_messages_unaltered() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(ModelResponse::text("ok"))]));
        let agent = agent(model, 8);

        let history = vec![
            ChatMessage::user("first question"),
            ChatMessage::assistant("first answer"),
            ChatMessage::user("the toilet won't flush"),
        ];
        let mut conv = Conversation::from_history(history.clone());
        agent.run(&mut conv).await.unwrap();

        assert!(conv.len() > history.len());
        assert_eq!(&conv.messages()[..history.len()], history.as_slice());
    }

    #[tokio::test]
    async fn test_empty_response_is_final_answer() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(ModelResponse::default())]));
        let agent = agent(model, 8);

        let mut conv = Conversation::new();
        conv.push_user("hi");
        let result = agent.run(&mut conv).await.unwrap();
        assert_eq!(result.answer, "");
        assert_eq!(result.rounds, 1);
    }

    #[tokio::test]
    async fn test_events_stream_intent_tokens_and_tools() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ModelResponse::with_tool_calls(vec![tool_call(
                "c1",
                "get_boiler_info",
                serde_json::json!({"boiler_brand": "Baxi"}),
            )])),
            Ok(ModelResponse::text("Reset the boiler.")),
        ]));
        let agent = agent(model, 8);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut conv = Conversation::new();
        conv.push_user("boiler fault E133");
        agent
            .run_with(&mut conv, SamplingOverrides::default(), Some(&tx))
            .await
            .unwrap();
        drop(tx);

        let mut events = Vec::new();
        while let Some(e) = rx.recv().await {
            events.push(e);
        }
        assert_eq!(events[0], TurnEvent::Intent(IntentCategory::Heating));
        assert!(matches!(&events[1], TurnEvent::ToolCall { id, .. } if id == "c1"));
        assert!(matches!(&events[2], TurnEvent::ToolResult { is_error: false, .. }));
        assert_eq!(events[3], TurnEvent::Token("Reset the boiler.".into()));
    }

    #[test]
    fn test_add_usage() {
        let u = |p, c| Usage {
            prompt_tokens: p,
            completion_tokens: c,
            total_tokens: p + c,
        };
        assert_eq!(add_usage(None, None), None);
        assert_eq!(add_usage(None, Some(u(1, 2))), Some(u(1, 2)));
        assert_eq!(add_usage(Some(u(1, 2)), Some(u(3, 4))), Some(u(4, 6)));
    }
}
