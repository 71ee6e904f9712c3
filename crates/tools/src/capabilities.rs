//! The `help` tool.
//!
//! Registered last, after every other tool, so its listing always
//! reflects the final registry contents and the registry is never empty.

use async_trait::async_trait;
use leash_core::error::ToolError;
use leash_core::tool::{Tool, ToolResult};

const HELP_NAME: &str = "help";
const HELP_DESCRIPTION: &str =
    "List the assistant's available tools and what each one does. Use when asked what you can do.";

/// Lists every registered tool, itself included.
pub struct HelpTool {
    entries: Vec<(String, String)>,
}

impl HelpTool {
    /// `entries` are the (name, description) pairs of the tools registered
    /// before this one.
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl Tool for HelpTool {
    fn name(&self) -> &str {
        HELP_NAME
    }

    fn description(&self) -> &str {
        HELP_DESCRIPTION
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let mut lines = vec!["Available capabilities:".to_string(), String::new()];
        for (name, description) in &self.entries {
            lines.push(format!("- {name}: {description}"));
        }
        lines.push(format!("- {HELP_NAME}: {HELP_DESCRIPTION}"));
        lines.push(String::new());
        lines.push("That is the complete list of available tools.".to_string());

        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output: lines.join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_entries_and_itself() {
        let tool = HelpTool::new(vec![(
            "search".to_string(),
            "Search the web".to_string(),
        )]);
        let result = tool.execute(serde_json::json!({})).await.unwrap();
        assert!(result.success);
        assert!(result.output.contains("- search: Search the web"));
        assert!(result.output.contains("- help:"));
        assert!(result.output.contains("complete list"));
    }

    #[tokio::test]
    async fn empty_registry_still_lists_help() {
        let tool = HelpTool::new(vec![]);
        let result = tool.execute(serde_json::json!({})).await.unwrap();
        assert!(result.output.contains("- help:"));
    }
}
