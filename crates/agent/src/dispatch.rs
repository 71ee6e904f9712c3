//! Tool dispatch — total, ordered execution of a batch of tool requests.
//!
//! Every request produces exactly one tool-result message, in request
//! order. Failures are data: an unknown tool name or an execution error
//! becomes a synthesized tool-result the model can read and recover from.
//! Dispatch never raises past its boundary.

use chrono::Utc;
use leash_core::event::{DomainEvent, EventBus};
use leash_core::message::{Message, MessageToolCall};
use leash_core::tool::{ToolCall, ToolRegistry};
use tracing::{debug, warn};

/// Execute each request against the registry, returning one result message
/// per request, same order. The caller appends the results and bumps the
/// conversation's tool-call counter once for the whole batch.
pub async fn dispatch(
    requests: &[MessageToolCall],
    tools: &ToolRegistry,
    event_bus: &EventBus,
) -> Vec<Message> {
    let mut results = Vec::with_capacity(requests.len());

    for request in requests {
        debug!(tool = %request.name, call_id = %request.id, "Dispatching tool call");

        if tools.get(&request.name).is_none() {
            warn!(tool = %request.name, "Unknown tool requested");
            results.push(Message::tool_result(
                &request.id,
                format!(
                    "Unknown tool '{}'. It is not available; use one of the listed tools.",
                    request.name
                ),
            ));
            continue;
        }

        // Malformed argument JSON is a failure in its own right; a tool
        // without required parameters must not quietly accept a garbled
        // request.
        let arguments = match serde_json::from_str(&request.arguments) {
            Ok(value) => value,
            Err(e) => {
                warn!(tool = %request.name, error = %e, "Malformed tool arguments");
                results.push(Message::tool_result(
                    &request.id,
                    format!(
                        "Tool '{}' failed: invalid arguments (not valid JSON: {e})",
                        request.name
                    ),
                ));
                continue;
            }
        };

        let call = ToolCall {
            id: request.id.clone(),
            name: request.name.clone(),
            arguments,
        };

        let start = std::time::Instant::now();
        let outcome = tools.execute(&call).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => {
                event_bus.publish(DomainEvent::ToolExecuted {
                    tool_name: request.name.clone(),
                    success: result.success,
                    duration_ms,
                    timestamp: Utc::now(),
                });
                results.push(Message::tool_result(&request.id, &result.output));
            }
            Err(e) => {
                warn!(tool = %request.name, error = %e, "Tool execution failed");
                event_bus.publish(DomainEvent::ToolExecuted {
                    tool_name: request.name.clone(),
                    success: false,
                    duration_ms,
                    timestamp: Utc::now(),
                });
                results.push(Message::tool_result(
                    &request.id,
                    format!("Tool '{}' failed: {e}", request.name),
                ));
            }
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use leash_core::error::ToolError;
    use leash_core::tool::{Tool, ToolResult};

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            Ok(ToolResult {
                call_id: String::new(),
                success: true,
                output: arguments["text"].as_str().unwrap_or("").to_string(),
            })
        }
    }

    struct BrokenTool;

    #[async_trait]
    impl Tool for BrokenTool {
        fn name(&self) -> &str {
            "broken"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            Err(ToolError::ExecutionFailed {
                tool_name: "broken".into(),
                reason: "it is broken".into(),
            })
        }
    }

    fn request(id: &str, name: &str, arguments: &str) -> MessageToolCall {
        MessageToolCall {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    #[tokio::test]
    async fn one_result_per_request_in_order() {
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(EchoTool));
        let bus = EventBus::default();

        let requests = vec![
            request("call_1", "echo", r#"{"text": "first"}"#),
            request("call_2", "echo", r#"{"text": "second"}"#),
            request("call_3", "echo", r#"{"text": "third"}"#),
        ];
        let results = dispatch(&requests, &tools, &bus).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(results[0].content, "first");
        assert_eq!(results[1].content, "second");
        assert_eq!(results[2].tool_call_id.as_deref(), Some("call_3"));
    }

    #[tokio::test]
    async fn unknown_tool_is_a_result_not_an_error() {
        let tools = ToolRegistry::new();
        let bus = EventBus::default();

        let results = dispatch(&[request("call_1", "imaginary", "{}")], &tools, &bus).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].content.contains("Unknown tool 'imaginary'"));
        assert_eq!(results[0].tool_call_id.as_deref(), Some("call_1"));
    }

    #[tokio::test]
    async fn tool_failure_is_a_result_not_an_error() {
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(BrokenTool));
        let bus = EventBus::default();

        let results = dispatch(&[request("call_1", "broken", "{}")], &tools, &bus).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].content.contains("Tool 'broken' failed"));
    }

    #[tokio::test]
    async fn malformed_arguments_become_failure_result() {
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(EchoTool));
        let bus = EventBus::default();

        let results = dispatch(&[request("call_1", "echo", "not json")], &tools, &bus).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].content.contains("invalid arguments"));
        assert_eq!(results[0].tool_call_id.as_deref(), Some("call_1"));
    }

    #[tokio::test]
    async fn malformed_arguments_fail_even_without_required_params() {
        // A tool with an empty parameter schema would happily run on `{}`;
        // a garbled request must still surface as a marked failure.
        struct NoParamsTool;

        #[async_trait]
        impl Tool for NoParamsTool {
            fn name(&self) -> &str {
                "no_params"
            }
            fn description(&self) -> &str {
                "Takes no arguments"
            }
            fn parameters_schema(&self) -> serde_json::Value {
                serde_json::json!({"type": "object", "properties": {}})
            }
            async fn execute(
                &self,
                _arguments: serde_json::Value,
            ) -> Result<ToolResult, ToolError> {
                Ok(ToolResult {
                    call_id: String::new(),
                    success: true,
                    output: "ran".into(),
                })
            }
        }

        let mut tools = ToolRegistry::new();
        tools.register(Box::new(NoParamsTool));
        let bus = EventBus::default();

        let results = dispatch(&[request("call_1", "no_params", "{broken")], &tools, &bus).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].content.contains("invalid arguments"));
    }

    #[tokio::test]
    async fn publishes_tool_executed_events() {
        let mut tools = ToolRegistry::new();
        tools.register(Box::new(EchoTool));
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        dispatch(&[request("call_1", "echo", "{}")], &tools, &bus).await;

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::ToolExecuted { tool_name, success, .. } => {
                assert_eq!(tool_name, "echo");
                assert!(success);
            }
            _ => panic!("Expected ToolExecuted event"),
        }
    }
}
