//! Message and Conversation domain types.
//!
//! These are the value objects that flow through the loop: the user sends a
//! message, the turn executor produces an assistant message (text or tool
//! invocation requests), dispatch appends tool-result messages, and the
//! conversation carries the running tool-call counter the continuation
//! policy decides on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation (session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions (capability context)
    System,
    /// Tool execution result
    Tool,
}

/// A single message in a conversation. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content (empty when an assistant message only requests tools)
    pub content: String,

    /// Tool invocation requests issued by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,

    /// Optional metadata (provider info, markers)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Message {
    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message with text only.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create an assistant message carrying tool invocation requests.
    pub fn assistant_with_tools(
        content: impl Into<String>,
        tool_calls: Vec<MessageToolCall>,
    ) -> Self {
        let mut msg = Self::with_role(Role::Assistant, content);
        msg.tool_calls = tool_calls;
        msg
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::with_role(Role::Tool, content);
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Whether this message requests any tool invocations.
    pub fn requests_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A tool invocation request embedded in an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this tool call
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a JSON string, exactly as issued by the model
    pub arguments: String,
}

/// The conversation state the loop mutates: an ordered sequence of messages
/// (insertion order, never reordered) plus the running tool-call counter.
///
/// `tool_call_count` is monotonically non-decreasing within one loop run and
/// is incremented once per dispatch iteration, not per individual tool call.
/// Session metadata (user id, session id, turn counter) rides in `metadata`;
/// the loop threads it through but never interprets it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,

    /// Ordered messages
    pub messages: Vec<Message>,

    /// Dispatch iterations consumed so far in this session
    #[serde(default)]
    pub tool_call_count: u32,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last message was added
    pub updated_at: DateTime<Utc>,

    /// Opaque session metadata, owned by the caller
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Conversation {
    /// Create a new empty conversation with a fresh budget.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            messages: Vec::new(),
            tool_call_count: 0,
            created_at: now,
            updated_at: now,
            metadata: serde_json::Map::new(),
        }
    }

    /// Create a conversation seeded with initial messages and session metadata.
    pub fn seeded(
        messages: Vec<Message>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let mut conv = Self::new();
        conv.messages = messages;
        conv.metadata = metadata;
        conv
    }

    /// Add a message to the conversation.
    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    /// The most recently appended message, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Whether any assistant message has been appended yet.
    ///
    /// This is the stateless first-turn detection rule: a conversation with
    /// no assistant message has not had its first model turn.
    pub fn has_assistant_message(&self) -> bool {
        self.messages.iter().any(|m| m.role == Role::Assistant)
    }

    /// Whether a system/context message is present.
    pub fn has_system_message(&self) -> bool {
        self.messages.iter().any(|m| m.role == Role::System)
    }

    /// Record that one dispatch iteration completed.
    pub fn record_tool_iteration(&mut self) {
        self.tool_call_count += 1;
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello there");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello there");
        assert!(!msg.requests_tools());
    }

    #[test]
    fn assistant_with_tools_requests_tools() {
        let msg = Message::assistant_with_tools(
            "",
            vec![MessageToolCall {
                id: "call_1".into(),
                name: "search".into(),
                arguments: r#"{"query": "x"}"#.into(),
            }],
        );
        assert!(msg.requests_tools());
        assert_eq!(msg.tool_calls[0].name, "search");
    }

    #[test]
    fn tool_result_carries_call_id() {
        let msg = Message::tool_result("call_1", "results");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn conversation_starts_with_zero_budget_used() {
        let conv = Conversation::new();
        assert_eq!(conv.tool_call_count, 0);
        assert!(!conv.has_assistant_message());
        assert!(!conv.has_system_message());
    }

    #[test]
    fn conversation_tracks_updates() {
        let mut conv = Conversation::new();
        let created = conv.created_at;

        conv.push(Message::user("First message"));
        assert_eq!(conv.messages.len(), 1);
        assert!(conv.updated_at >= created);
    }

    #[test]
    fn tool_iteration_counter_is_monotonic() {
        let mut conv = Conversation::new();
        conv.record_tool_iteration();
        conv.record_tool_iteration();
        assert_eq!(conv.tool_call_count, 2);
    }

    #[test]
    fn seeded_conversation_keeps_order_and_metadata() {
        let mut meta = serde_json::Map::new();
        meta.insert("session_id".into(), serde_json::json!("abc-123"));

        let conv = Conversation::seeded(
            vec![Message::system("ctx"), Message::user("hi")],
            meta,
        );
        assert_eq!(conv.messages[0].role, Role::System);
        assert_eq!(conv.messages[1].role, Role::User);
        assert_eq!(conv.metadata["session_id"], serde_json::json!("abc-123"));
        assert_eq!(conv.tool_call_count, 0);
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::user("Test message");
        let json = serde_json::to_string(&msg).unwrap();
        let deserialized: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.content, "Test message");
        assert_eq!(deserialized.role, Role::User);
    }
}
