//! The loop driver — a bounded state machine over chat turns and tool
//! dispatch.
//!
//! Termination is provable from the ceilings alone: the continuation policy
//! caps dispatch iterations at the tool-call budget, and the driver caps
//! total iterations at `max_iterations`. Hitting the budget is a normal
//! stop (the final answer notes the truncation); exceeding the iteration
//! ceiling means the loop failed to converge and is returned as a fatal
//! `LoopError`.

use std::sync::Arc;
use chrono::Utc;
use leash_core::error::LoopError;
use leash_core::event::{DomainEvent, EventBus};
use leash_core::message::{Conversation, Message};
use leash_core::provider::Provider;
use leash_core::tool::ToolRegistry;
use tracing::{debug, info, warn};

use crate::dispatch::dispatch;
use crate::executor::TurnExecutor;
use crate::policy::{ContinuationPolicy, Decision};

/// Appended to the final answer when the loop stops on the budget rather
/// than on the model's own text response.
const BUDGET_NOTE: &str =
    "\n\n[Note: the tool-call limit for this conversation was reached, so this \
answer may be based on incomplete results.]";

/// Loop execution state. `Done` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    /// Ask the model for the next assistant message.
    Running,
    /// The last assistant message requests tools; dispatch them.
    AwaitingTools,
    /// The conversation's turn is complete.
    Done,
}

/// The bounded tool-calling loop.
///
/// Shared read-only collaborators (provider, registry, event bus) are
/// `Arc`-held so one `AgentLoop` can serve concurrent sessions; each
/// conversation is driven sequentially with no internal locking.
pub struct AgentLoop {
    executor: TurnExecutor,
    tools: Arc<ToolRegistry>,
    policy: ContinuationPolicy,
    max_iterations: u32,
    event_bus: Arc<EventBus>,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            executor: TurnExecutor::new(provider, model, temperature, event_bus.clone()),
            tools,
            policy: ContinuationPolicy::default(),
            max_iterations: 15,
            event_bus,
        }
    }

    /// Set the tool-call budget (dispatch iterations per conversation).
    pub fn with_max_tool_calls(mut self, max: u32) -> Self {
        self.policy = ContinuationPolicy::new(max);
        self
    }

    /// Set the hard iteration ceiling.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.executor = self.executor.with_max_tokens(max);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.executor = self.executor.with_system_prompt(prompt);
        self
    }

    /// Drive one user turn to completion.
    ///
    /// Returns the final answer text. The conversation is mutated in place:
    /// the capability context (first turn only), every assistant message,
    /// and every tool result are appended in order.
    pub async fn process(
        &self,
        conversation: &mut Conversation,
    ) -> Result<String, leash_core::Error> {
        info!(
            conversation_id = %conversation.id,
            messages = conversation.messages.len(),
            tool_calls_used = conversation.tool_call_count,
            "Processing conversation"
        );

        self.executor.seed_context(conversation, &self.tools);

        let mut state = LoopState::Running;
        let mut iterations: u32 = 0;
        let mut stopped_on_budget = false;

        while state != LoopState::Done {
            match state {
                LoopState::Running => {
                    iterations += 1;
                    if iterations > self.max_iterations {
                        warn!(
                            conversation_id = %conversation.id,
                            iterations,
                            limit = self.max_iterations,
                            "Loop failed to converge"
                        );
                        self.event_bus.publish(DomainEvent::ErrorOccurred {
                            context: "loop_driver".into(),
                            error_message: "iteration ceiling exceeded".into(),
                            timestamp: Utc::now(),
                        });
                        return Err(LoopError::IterationCeilingExceeded {
                            iterations,
                            limit: self.max_iterations,
                        }
                        .into());
                    }

                    debug!(
                        conversation_id = %conversation.id,
                        iteration = iterations,
                        "Loop iteration"
                    );

                    let message = self.executor.execute(conversation, &self.tools).await;
                    if ContinuationPolicy::completion_hint(&message) {
                        debug!(
                            conversation_id = %conversation.id,
                            "Assistant message carries a completion phrase"
                        );
                    }
                    conversation.push(message);

                    state = match self.policy.decide(conversation) {
                        Decision::Stop => {
                            // A forced budget stop still has pending tool
                            // requests; a natural text stop does not and
                            // needs no truncation note.
                            if self.policy.budget_exhausted(conversation)
                                && conversation
                                    .last_message()
                                    .is_some_and(Message::requests_tools)
                            {
                                stopped_on_budget = true;
                            }
                            LoopState::Done
                        }
                        Decision::InvokeTools => LoopState::AwaitingTools,
                    };
                }

                LoopState::AwaitingTools => {
                    let requests = conversation
                        .last_message()
                        .map(|m| m.tool_calls.clone())
                        .unwrap_or_default();

                    let results = dispatch(&requests, &self.tools, &self.event_bus).await;
                    for result in results {
                        conversation.push(result);
                    }
                    conversation.record_tool_iteration();

                    state = LoopState::Running;
                }

                LoopState::Done => unreachable!("Done is terminal"),
            }
        }

        if stopped_on_budget {
            warn!(
                conversation_id = %conversation.id,
                tool_calls = conversation.tool_call_count,
                "Stopped on tool-call budget"
            );
            self.event_bus.publish(DomainEvent::BudgetExhausted {
                conversation_id: conversation.id.to_string(),
                tool_calls: conversation.tool_call_count,
                timestamp: Utc::now(),
            });
        }

        let mut answer = conversation
            .last_message()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        if stopped_on_budget {
            answer.push_str(BUDGET_NOTE);
            // The appended note must survive in the conversation too, so a
            // transcript reader sees the same answer the caller got.
            if let Some(last) = conversation.messages.last_mut() {
                last.content = answer.clone();
            }
        }

        Ok(answer)
    }

    /// Run a complete session from caller-supplied initial messages.
    ///
    /// Builds a fresh conversation with a zeroed tool-call budget, attaches
    /// the opaque session metadata, drives it to completion, and returns
    /// the final state. The loop owns no persistent storage; keeping the
    /// returned conversation is the caller's business.
    pub async fn run_session(
        &self,
        initial_messages: Vec<Message>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Conversation, leash_core::Error> {
        let mut conversation = Conversation::seeded(initial_messages, metadata);
        self.process(&mut conversation).await?;
        Ok(conversation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use leash_core::error::ProviderError;
    use leash_core::message::MessageToolCall;
    use leash_core::provider::{ProviderRequest, ProviderResponse, Usage};

    /// A provider that replies from a scripted queue of messages, then
    /// repeats the last one forever.
    struct ScriptedProvider {
        script: std::sync::Mutex<Vec<Message>>,
        fallback: Message,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Message>) -> Self {
            Self {
                script: std::sync::Mutex::new(script),
                fallback: Message::assistant("fallback"),
            }
        }

        fn repeating(message: Message) -> Self {
            Self {
                script: std::sync::Mutex::new(Vec::new()),
                fallback: message,
            }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }
        async fn complete(
            &self,
            _request: ProviderRequest,
        ) -> Result<ProviderResponse, ProviderError> {
            let mut script = self.script.lock().unwrap();
            let message = if script.is_empty() {
                self.fallback.clone()
            } else {
                script.remove(0)
            };
            Ok(ProviderResponse {
                message,
                usage: Some(Usage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                    total_tokens: 15,
                }),
                model: "mock".into(),
            })
        }
    }

    fn tool_request(name: &str) -> Message {
        Message::assistant_with_tools(
            "",
            vec![MessageToolCall {
                id: uuid::Uuid::new_v4().to_string(),
                name: name.into(),
                arguments: "{}".into(),
            }],
        )
    }

    fn agent(provider: ScriptedProvider) -> AgentLoop {
        AgentLoop::new(
            Arc::new(provider),
            "mock",
            0.5,
            Arc::new(ToolRegistry::new()),
            Arc::new(EventBus::default()),
        )
    }

    #[tokio::test]
    async fn plain_answer_takes_one_iteration() {
        let agent = agent(ScriptedProvider::new(vec![Message::assistant("Hi there")]));
        let mut conv = Conversation::new();
        conv.push(Message::user("Hello"));

        let answer = agent.process(&mut conv).await.unwrap();
        assert_eq!(answer, "Hi there");
        assert_eq!(conv.tool_call_count, 0);
        // System context + user + assistant.
        assert_eq!(conv.messages.len(), 3);
    }

    #[tokio::test]
    async fn forever_tool_requests_stop_on_budget() {
        let agent = agent(ScriptedProvider::repeating(tool_request("anything")));
        let mut conv = Conversation::new();
        conv.push(Message::user("go"));

        let answer = agent.process(&mut conv).await.unwrap();
        assert_eq!(conv.tool_call_count, 5);
        assert!(answer.contains("tool-call limit"));
    }

    #[tokio::test]
    async fn text_answer_on_exhausted_budget_has_no_note() {
        // The model spends its whole budget, then answers with plain text.
        // The budget-first stop must not annotate a natural text answer.
        let agent = agent(ScriptedProvider::new(vec![
            tool_request("anything"),
            Message::assistant("found it"),
        ]))
        .with_max_tool_calls(1);
        let mut conv = Conversation::new();
        conv.push(Message::user("go"));

        let answer = agent.process(&mut conv).await.unwrap();
        assert_eq!(conv.tool_call_count, 1);
        assert_eq!(answer, "found it");
    }

    #[tokio::test]
    async fn iteration_ceiling_is_fatal() {
        let agent = agent(ScriptedProvider::repeating(tool_request("anything")))
            // A budget the ceiling cannot outlast forces non-convergence.
            .with_max_tool_calls(100)
            .with_max_iterations(4);
        let mut conv = Conversation::new();
        conv.push(Message::user("go"));

        let err = agent.process(&mut conv).await.unwrap_err();
        assert!(matches!(
            err,
            leash_core::Error::Loop(LoopError::IterationCeilingExceeded { limit: 4, .. })
        ));
    }

    #[tokio::test]
    async fn run_session_returns_final_state() {
        let agent = agent(ScriptedProvider::new(vec![Message::assistant("done here")]));

        let mut metadata = serde_json::Map::new();
        metadata.insert("session_id".into(), serde_json::json!("s-1"));

        let conv = agent
            .run_session(vec![Message::user("Hello")], metadata)
            .await
            .unwrap();

        assert_eq!(conv.tool_call_count, 0);
        assert_eq!(conv.metadata["session_id"], serde_json::json!("s-1"));
        assert_eq!(conv.last_message().unwrap().content, "done here");
    }

    #[tokio::test]
    async fn budget_exhaustion_publishes_event() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let agent = AgentLoop::new(
            Arc::new(ScriptedProvider::repeating(tool_request("x"))),
            "mock",
            0.5,
            Arc::new(ToolRegistry::new()),
            bus,
        );

        let mut conv = Conversation::new();
        conv.push(Message::user("go"));
        agent.process(&mut conv).await.unwrap();

        let mut saw_budget = false;
        while let Ok(event) = rx.try_recv() {
            if let DomainEvent::BudgetExhausted { tool_calls, .. } = event.as_ref() {
                assert_eq!(*tool_calls, 5);
                saw_budget = true;
            }
        }
        assert!(saw_budget);
    }
}
