//! Web search tool — Tavily-backed when an API key is configured,
//! otherwise a stub that explains search is unavailable.
//!
//! Construction never fails: the degraded mode is a real tool with a
//! definitive response, not an absent one, so the model gets a concrete
//! answer instead of retrying forever.

use async_trait::async_trait;
use leash_config::SearchConfig;
use leash_core::error::ToolError;
use leash_core::tool::{Tool, ToolResult};
use serde::Deserialize;
use tracing::{debug, warn};

const TAVILY_URL: &str = "https://api.tavily.com/search";

pub struct SearchTool {
    /// None = degraded stub mode
    api_key: Option<String>,
    max_results: u32,
    client: reqwest::Client,
}

impl SearchTool {
    pub fn from_config(config: &SearchConfig) -> Self {
        if config.api_key.is_none() {
            warn!("No search API key configured, search tool degrades to stub");
        }
        Self {
            api_key: config.api_key.clone(),
            max_results: config.max_results.clamp(1, 5),
            client: reqwest::Client::new(),
        }
    }

    /// A stub-only search tool (no network access).
    pub fn stub() -> Self {
        Self::from_config(&SearchConfig::default())
    }

    async fn live_search(&self, api_key: &str, query: &str) -> Result<String, ToolError> {
        let body = serde_json::json!({
            "api_key": api_key,
            "query": query,
            "max_results": self.max_results,
            "search_depth": "advanced",
            "include_answer": true,
            "include_raw_content": false,
            "include_images": false,
        });

        debug!(query = %query, "Sending search request");

        let response = self
            .client
            .post(TAVILY_URL)
            .json(&body)
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "search".into(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ToolError::ExecutionFailed {
                tool_name: "search".into(),
                reason: format!("search API returned status {}", response.status()),
            });
        }

        let parsed: TavilyResponse =
            response
                .json()
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    tool_name: "search".into(),
                    reason: format!("unparseable search response: {e}"),
                })?;

        Ok(format_results(query, &parsed))
    }

    fn stub_response(query: &str) -> String {
        format!(
            "Search results for: '{query}'\n\n\
             Real-time web search is not available in this environment (no search \
             API key configured). I can still help with:\n\
             - General information and analysis\n\
             - CRM operations and queries\n\
             - Technical guidance and best practices\n\n\
             Regarding your query: based on existing knowledge I can provide general \
             guidance about {query}. For the most current information, check official \
             sources directly.\n\n\
             This completes the search request."
        )
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search for current information. Use this when you need recent data or current events."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let output = match &self.api_key {
            Some(key) => self.live_search(key, query).await?,
            None => Self::stub_response(query),
        };

        Ok(ToolResult {
            call_id: String::new(),
            success: true,
            output,
        })
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    title: String,
    url: String,
    #[serde(default)]
    content: String,
}

fn format_results(query: &str, response: &TavilyResponse) -> String {
    let mut out = format!("Search results for: '{query}'\n");

    if let Some(answer) = &response.answer {
        out.push_str(&format!("\nAnswer: {answer}\n"));
    }

    for (i, result) in response.results.iter().enumerate() {
        out.push_str(&format!(
            "\n{}. {}\n   {}\n   {}\n",
            i + 1,
            result.title,
            result.url,
            result.content
        ));
    }

    if response.results.is_empty() && response.answer.is_none() {
        out.push_str("\nNo results found.\n");
    }

    out.push_str("\nThis completes the search request.");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_search_returns_definitive_response() {
        let tool = SearchTool::stub();
        let result = tool
            .execute(serde_json::json!({"query": "rust programming"}))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.output.contains("rust programming"));
        assert!(result.output.contains("completes the search request"));
    }

    #[tokio::test]
    async fn missing_query_returns_error() {
        let tool = SearchTool::stub();
        let result = tool.execute(serde_json::json!({})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[test]
    fn tool_definition() {
        let tool = SearchTool::stub();
        let def = tool.to_definition();
        assert_eq!(def.name, "search");
        assert!(!def.description.is_empty());
    }

    #[test]
    fn format_results_with_answer() {
        let response = TavilyResponse {
            answer: Some("Rust is a systems language".into()),
            results: vec![TavilyResult {
                title: "The Rust Book".into(),
                url: "https://doc.rust-lang.org/book/".into(),
                content: "Official guide".into(),
            }],
        };
        let out = format_results("rust", &response);
        assert!(out.contains("Answer: Rust is a systems language"));
        assert!(out.contains("1. The Rust Book"));
        assert!(out.ends_with("This completes the search request."));
    }

    #[test]
    fn format_results_empty() {
        let response = TavilyResponse {
            answer: None,
            results: vec![],
        };
        let out = format_results("nothing", &response);
        assert!(out.contains("No results found"));
    }
}
