//! Continuation policy — the single decision point for whether the loop
//! keeps going.
//!
//! The policy is pure: it reads the conversation, performs no I/O, and
//! returns a `Decision`. Two rules terminate, in priority order:
//!
//! 1. The tool-call budget is exhausted (checked first, so no model output
//!    can defeat the ceiling).
//! 2. The last message requests no tools.
//!
//! Anything else continues into dispatch.

use leash_core::message::{Conversation, Message};
use tracing::debug;

/// What the loop driver should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The last assistant message requests tools and budget remains.
    InvokeTools,
    /// The turn is over: either a plain text answer or the ceiling.
    Stop,
}

/// Phrases that suggest the model considers its work finished. Advisory
/// only: when one appears the driver logs it, but termination always rests
/// on the two structural rules above.
const COMPLETION_PHRASES: &[&str] = &[
    "complete",
    "completed",
    "finished",
    "done",
    "delivered",
    "request finished",
    "task accomplished",
    "no further action",
];

/// The continuation policy with its tool-call budget.
#[derive(Debug, Clone)]
pub struct ContinuationPolicy {
    max_tool_calls: u32,
}

impl ContinuationPolicy {
    pub fn new(max_tool_calls: u32) -> Self {
        Self { max_tool_calls }
    }

    /// Decide whether the loop continues into tool dispatch.
    pub fn decide(&self, conversation: &Conversation) -> Decision {
        // Budget check comes first: even a message full of tool requests
        // stops here once the ceiling is reached.
        if conversation.tool_call_count >= self.max_tool_calls {
            debug!(
                tool_calls = conversation.tool_call_count,
                limit = self.max_tool_calls,
                "Tool-call budget exhausted"
            );
            return Decision::Stop;
        }

        match conversation.last_message() {
            Some(message) if message.requests_tools() => Decision::InvokeTools,
            _ => Decision::Stop,
        }
    }

    /// Whether the remaining budget allows at least one more dispatch.
    pub fn budget_exhausted(&self, conversation: &Conversation) -> bool {
        conversation.tool_call_count >= self.max_tool_calls
    }

    /// Advisory scan for completion phrases in an assistant message.
    /// Never load-bearing; callers may log when it fires.
    pub fn completion_hint(message: &Message) -> bool {
        let content = message.content.to_lowercase();
        COMPLETION_PHRASES.iter().any(|p| content.contains(p))
    }
}

impl Default for ContinuationPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leash_core::message::MessageToolCall;

    fn tool_request() -> Message {
        Message::assistant_with_tools(
            "",
            vec![MessageToolCall {
                id: "call_1".into(),
                name: "search".into(),
                arguments: "{}".into(),
            }],
        )
    }

    #[test]
    fn stops_on_plain_text_answer() {
        let policy = ContinuationPolicy::default();
        let mut conv = Conversation::new();
        conv.push(Message::user("hi"));
        conv.push(Message::assistant("hello"));
        assert_eq!(policy.decide(&conv), Decision::Stop);
    }

    #[test]
    fn continues_on_tool_request() {
        let policy = ContinuationPolicy::default();
        let mut conv = Conversation::new();
        conv.push(Message::user("search for x"));
        conv.push(tool_request());
        assert_eq!(policy.decide(&conv), Decision::InvokeTools);
    }

    #[test]
    fn ceiling_beats_tool_request() {
        let policy = ContinuationPolicy::new(5);
        let mut conv = Conversation::new();
        conv.push(tool_request());
        conv.tool_call_count = 5;
        assert_eq!(policy.decide(&conv), Decision::Stop);
        assert!(policy.budget_exhausted(&conv));
    }

    #[test]
    fn empty_conversation_stops() {
        let policy = ContinuationPolicy::default();
        assert_eq!(policy.decide(&Conversation::new()), Decision::Stop);
    }

    #[test]
    fn decide_is_pure() {
        let policy = ContinuationPolicy::default();
        let mut conv = Conversation::new();
        conv.push(tool_request());
        let before = conv.messages.len();
        let first = policy.decide(&conv);
        let second = policy.decide(&conv);
        assert_eq!(first, second);
        assert_eq!(conv.messages.len(), before);
        assert_eq!(conv.tool_call_count, 0);
    }

    #[test]
    fn completion_hint_matches_phrases() {
        assert!(ContinuationPolicy::completion_hint(&Message::assistant(
            "The search request is now complete."
        )));
        assert!(!ContinuationPolicy::completion_hint(&Message::assistant(
            "Let me look into that."
        )));
    }

    #[test]
    fn completion_hint_never_affects_decision() {
        // A message that *sounds* finished but still requests tools must
        // continue; the hint is advisory.
        let policy = ContinuationPolicy::default();
        let mut conv = Conversation::new();
        let mut msg = tool_request();
        msg.content = "Task accomplished, but let me double-check.".into();
        assert!(ContinuationPolicy::completion_hint(&msg));
        conv.push(msg);
        assert_eq!(policy.decide(&conv), Decision::InvokeTools);
    }
}
