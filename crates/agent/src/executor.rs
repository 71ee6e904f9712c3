//! Turn executor — one model response per call, no exceptions.
//!
//! The executor owns the provider handle and the generation parameters. Its
//! `execute` is total: a provider failure (network, auth, malformed
//! response) is absorbed into a synthesized apology message with zero tool
//! requests, which the continuation policy then treats as a normal stop.
//! Model-service problems degrade the conversation; they never crash the
//! loop.

use std::sync::Arc;
use chrono::Utc;
use leash_core::event::{DomainEvent, EventBus};
use leash_core::message::{Conversation, Message};
use leash_core::provider::{Provider, ProviderRequest};
use leash_core::tool::ToolRegistry;
use tracing::{debug, warn};

const APOLOGY: &str = "I apologize, but I ran into a problem reaching the \
model service and could not generate a response. Please try again in a \
moment.";

pub struct TurnExecutor {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    system_prompt_override: Option<String>,
    event_bus: Arc<EventBus>,
}

impl TurnExecutor {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: None,
            system_prompt_override: None,
            event_bus,
        }
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Replace the synthesized capability context entirely.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt_override = Some(prompt.into());
        self
    }

    /// Prepend the capability context on the conversation's first turn.
    ///
    /// The rule is stateless and structural: seed only when there is no
    /// prior assistant message and no system message. A resumed
    /// conversation that already spoke, or a caller-supplied system
    /// prompt, is left untouched.
    pub fn seed_context(&self, conversation: &mut Conversation, tools: &ToolRegistry) {
        if conversation.has_assistant_message() || conversation.has_system_message() {
            return;
        }

        let prompt = match &self.system_prompt_override {
            Some(p) => p.clone(),
            None => Self::capability_context(tools),
        };

        debug!(conversation_id = %conversation.id, "Seeding capability context");
        conversation.messages.insert(0, Message::system(prompt));
    }

    /// The synthesized context message advertising registered capabilities.
    fn capability_context(tools: &ToolRegistry) -> String {
        let mut lines = vec![
            "You are a helpful assistant with access to the following tools:".to_string(),
            String::new(),
        ];
        for def in tools.definitions() {
            lines.push(format!("- {}: {}", def.name, def.description));
        }
        lines.push(String::new());
        lines.push(
            "Use tools when they help answer the user. When a tool result says an \
             operation is complete, do not repeat it. Answer directly when no tool \
             is needed."
                .to_string(),
        );
        lines.join("\n")
    }

    /// Produce exactly one assistant message for the current conversation.
    ///
    /// Tool definitions are advertised on every call so the model's view of
    /// its capabilities never drifts mid-session.
    pub async fn execute(&self, conversation: &Conversation, tools: &ToolRegistry) -> Message {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: conversation.messages.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: tools.definitions(),
        };

        match self.provider.complete(request).await {
            Ok(response) => {
                if let Some(usage) = &response.usage {
                    self.event_bus.publish(DomainEvent::ResponseGenerated {
                        conversation_id: conversation.id.to_string(),
                        model: response.model.clone(),
                        tokens_used: usage.total_tokens,
                        timestamp: Utc::now(),
                    });
                }
                response.message
            }
            Err(e) => {
                warn!(
                    conversation_id = %conversation.id,
                    provider = self.provider.name(),
                    error = %e,
                    "Provider call failed, absorbing into apology"
                );
                self.event_bus.publish(DomainEvent::ErrorOccurred {
                    context: "turn_executor".into(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                // Zero tool requests, so the policy stops normally.
                Message::assistant(APOLOGY)
            }
        }
    }
}
